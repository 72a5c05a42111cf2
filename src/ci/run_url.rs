use std::sync::LazyLock;

use regex::Regex;

use crate::error::{PerfLensError, Result};

static RUN_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(https?://[^/]+)/job/([^/]+)/(\d+)").unwrap());

/// Parsed identity of one Jenkins run: base address, job name, build number.
///
/// Only constructed by [`RunReference::parse`]; a URL that does not match the
/// `scheme://host[:port]/job/<name>/<number>` shape never produces a
/// partially-filled value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReference {
    pub base_url: String,
    pub job_name: String,
    pub build_number: u64,
}

impl RunReference {
    /// Parses a Jenkins run URL.
    ///
    /// # Errors
    ///
    /// Returns [`PerfLensError::Parse`] echoing the input when the URL does
    /// not match the required shape or the build number is not a positive
    /// integer. A well-formed reference to a job that does not exist is not
    /// detected here; that surfaces later from the CI server.
    pub fn parse(url: &str) -> Result<Self> {
        let captures = RUN_URL_RE
            .captures(url)
            .ok_or_else(|| PerfLensError::Parse(format!("invalid Jenkins run URL: {url}")))?;

        let build_number: u64 = captures[3]
            .parse()
            .map_err(|_| PerfLensError::Parse(format!("invalid build number in: {url}")))?;
        if build_number == 0 {
            return Err(PerfLensError::Parse(format!(
                "build number must be positive in: {url}"
            )));
        }

        Ok(Self {
            base_url: captures[1].to_string(),
            job_name: captures[2].to_string(),
            build_number,
        })
    }

    /// URL of the run's plain-text console log.
    pub fn console_url(&self) -> String {
        url_join(&[
            &self.base_url,
            "job",
            &self.job_name,
            &self.build_number.to_string(),
            "consoleText",
        ])
    }

    /// URL of the run's JSON metadata (parameter actions and friends).
    pub fn metadata_url(&self) -> String {
        url_join(&[
            &self.base_url,
            "job",
            &self.job_name,
            &self.build_number.to_string(),
            "api",
            "json",
        ])
    }
}

fn url_join(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| part.trim_matches('/'))
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed_url() {
        let reference =
            RunReference::parse("https://ci.example.com:8080/job/run_tests_vperfv2/142").unwrap();
        assert_eq!(reference.base_url, "https://ci.example.com:8080");
        assert_eq!(reference.job_name, "run_tests_vperfv2");
        assert_eq!(reference.build_number, 142);
    }

    #[test]
    fn test_parse_tolerates_trailing_path() {
        let reference =
            RunReference::parse("http://ci.example.com/job/nightly/7/console").unwrap();
        assert_eq!(reference.job_name, "nightly");
        assert_eq!(reference.build_number, 7);
    }

    #[test]
    fn test_parse_rejects_malformed_urls() {
        for url in [
            "",
            "not a url",
            "https://ci.example.com/nightly/7",
            "https://ci.example.com/job/nightly",
            "https://ci.example.com/job/nightly/abc",
            "ftp://ci.example.com/job/nightly/7",
        ] {
            let result = RunReference::parse(url);
            assert!(
                matches!(result, Err(PerfLensError::Parse(_))),
                "expected Parse error for {url:?}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_build_zero() {
        let result = RunReference::parse("https://ci.example.com/job/nightly/0");
        assert!(matches!(result, Err(PerfLensError::Parse(_))));
    }

    #[test]
    fn test_derived_urls() {
        let reference = RunReference::parse("https://ci.example.com/job/nightly/42").unwrap();
        assert_eq!(
            reference.console_url(),
            "https://ci.example.com/job/nightly/42/consoleText"
        );
        assert_eq!(
            reference.metadata_url(),
            "https://ci.example.com/job/nightly/42/api/json"
        );
    }
}
