use log::debug;

use super::repo::GitRepo;
use crate::error::{PerfLensError, Result};

/// Ceiling on the commit count of any two-sided diff. Checked against the
/// range-mode walk before the diff subprocess is spawned, so an oversized
/// range is rejected without doing the expensive work.
pub const MAX_DIFF_COMMITS: usize = 50;

/// Outcome of a scope-restricted diff or change overview.
///
/// A structurally valid but empty diff (commits exist, none touch the scope
/// path) is meaningfully different from an empty commit range; the two must
/// never be collapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    Changes(String),
    NoScopeChanges,
    NoCommits,
}

impl DiffOutcome {
    fn from_text(text: String) -> Self {
        if text.trim().is_empty() {
            Self::NoScopeChanges
        } else {
            Self::Changes(text)
        }
    }
}

/// Diff between two revisions, restricted to `scope_path`.
///
/// With `ref2` absent the diff is taken against the working tree and no
/// range precondition applies (there is no bounded range to measure).
pub async fn scoped_diff(
    repo: &GitRepo,
    ref1: &str,
    ref2: Option<&str>,
    scope_path: &str,
) -> Result<DiffOutcome> {
    if let Some(ref2) = ref2 {
        let range = repo.first_parent_log(ref1, Some(ref2)).await?;
        if range.is_empty() {
            return Ok(DiffOutcome::NoCommits);
        }
        if range.len() > MAX_DIFF_COMMITS {
            return Err(PerfLensError::PreconditionFailed(format!(
                "range {ref1}..{ref2} spans {} commits, over the {MAX_DIFF_COMMITS}-commit \
                 diff ceiling; narrow the range and retry",
                range.len()
            )));
        }
        debug!("Diffing {ref1}..{ref2} under '{scope_path}' ({} commits)", range.len());

        let text = repo.git(&["diff", ref1, ref2, "--", scope_path]).await?;
        return Ok(DiffOutcome::from_text(text));
    }

    let text = repo.git(&["diff", ref1, "--", scope_path]).await?;
    Ok(DiffOutcome::from_text(text))
}

/// One-line-per-commit change overview between two revisions, restricted to
/// `scope_path` and excluding merge commits.
pub async fn change_overview(
    repo: &GitRepo,
    ref1: &str,
    ref2: &str,
    scope_path: &str,
) -> Result<DiffOutcome> {
    let range = repo.first_parent_log(ref1, Some(ref2)).await?;
    if range.is_empty() {
        return Ok(DiffOutcome::NoCommits);
    }

    let rev_spec = format!("{ref1}..{ref2}");
    let text = repo
        .git(&[
            "log",
            "--first-parent",
            "--no-merges",
            "--oneline",
            "--name-status",
            &rev_spec,
            "--",
            scope_path,
        ])
        .await?;

    Ok(DiffOutcome::from_text(text))
}
