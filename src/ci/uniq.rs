use std::sync::LazyLock;

use regex::Regex;

// CSI grammar: ESC [ parameter-bytes intermediate-bytes final-byte.
static ANSI_CSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1B\[[0-?]*[ -/]*[@-~]").unwrap());

static UNIQ_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Uniq\s+(\d{10})\s*$").unwrap());

static FINISHED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Finished:\s*(\w+)").unwrap());

/// Removes ANSI CSI escape sequences from console output.
///
/// Idempotent: stripping twice yields the same text as stripping once.
pub fn strip_ansi(text: &str) -> String {
    ANSI_CSI_RE.replace_all(text, "").into_owned()
}

/// Extracts the 10-digit uniq id printed by a test run.
///
/// The id appears on its own line as `Uniq <10 digits>`, possibly indented
/// and wrapped in ANSI styling. The first matching line wins. `None` means
/// the run has not printed an id (yet, or at all) and is a valid outcome,
/// not an error.
pub fn extract_uniq(raw_text: &str) -> Option<String> {
    let clean = strip_ansi(raw_text);
    UNIQ_RE
        .captures(&clean)
        .map(|captures| captures[1].to_string())
}

/// Scans the tail of a console log for the Jenkins finish status line
/// (`Finished: SUCCESS`, `Finished: FAILURE`, ...). Only the last 10 lines
/// are considered; a run that is still executing has no status.
pub fn finish_status(console_text: &str) -> Option<String> {
    let lines: Vec<&str> = console_text.trim().lines().collect();
    let start = lines.len().saturating_sub(10);
    let tail = lines[start..].join("\n");

    FINISHED_RE
        .captures(&tail)
        .map(|captures| captures[1].to_string())
}
