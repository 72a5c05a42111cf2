use std::collections::HashMap;

use log::warn;
use serde_json::Value;
use thiserror::Error;

/// Sentinel used when test-suite normalization fails. Best-effort: a bad
/// suite label must never abort the whole extraction.
pub const UNKNOWN_TEST_SUITE: &str = "UnknownTestSuite";

/// Normalized run parameters derived from the Jenkins parameter actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParameters {
    pub protocol: String,
    pub test_suite: String,
    pub cluster: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("empty test-suite segment in '{0}'")]
    EmptySegment(String),
}

/// Flattens the `actions[].parameters[]` list of a run's JSON metadata into
/// one name-to-value map. Later duplicates overwrite earlier ones
/// (last-write-wins, matching Jenkins parameter semantics).
pub fn flatten_parameters(metadata: &Value) -> HashMap<String, String> {
    let mut parameters = HashMap::new();

    let actions = metadata
        .get("actions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for action in actions {
        let Some(entries) = action.get("parameters").and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            let Some(name) = entry.get("name").and_then(Value::as_str) else {
                continue;
            };
            let value = match entry.get("value") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            parameters.insert(name.to_string(), value);
        }
    }

    parameters
}

/// Derives the protocol / test-suite / cluster triple from run metadata.
///
/// `tests_file == "other"` means the suite was supplied inline; `tests_list`
/// is read instead. A resolved suite is reduced to its file stem; when that
/// reduction fails the suite degrades to [`UNKNOWN_TEST_SUITE`] rather than
/// failing the extraction.
pub fn extract_parameters(metadata: &Value) -> RunParameters {
    let parameters = flatten_parameters(metadata);

    let get = |key: &str| {
        parameters
            .get(key)
            .cloned()
            .unwrap_or_else(|| "None".to_string())
    };

    let protocol = get("INFRA_PROTOCOL");
    let cluster = get("cluster_label");

    let mut test_suite = get("tests_file");
    if test_suite == "other" {
        test_suite = get("tests_list");
    }

    if !test_suite.is_empty() && test_suite != "other" {
        test_suite = match normalize_test_suite(&test_suite) {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!("Test-suite normalization failed: {e}");
                UNKNOWN_TEST_SUITE.to_string()
            }
        };
    }

    RunParameters {
        protocol,
        test_suite,
        cluster,
    }
}

/// Reduces a test-suite path to its file stem: the final `/`-segment, with
/// everything from the first `.` dropped.
pub fn normalize_test_suite(path: &str) -> Result<String, NormalizationError> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let stem = file_name.split('.').next().unwrap_or(file_name);

    if stem.is_empty() {
        return Err(NormalizationError::EmptySegment(path.to_string()));
    }

    Ok(stem.to_string())
}
