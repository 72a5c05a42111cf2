use std::path::{Path, PathBuf};

use log::{debug, info};
use tokio::process::Command;

use crate::error::{PerfLensError, Result};

/// Fixed prefix length used for hash correlation against the results store,
/// balancing collision risk against tolerance for abbreviated hashes
/// recorded elsewhere.
pub const HASH_PREFIX_LEN: usize = 8;

/// Ordered first-parent commit path, newest first.
///
/// The ordering is the walk's natural emission order and every downstream
/// consumer (diff windowing, result correlation) relies on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRange(Vec<String>);

impl CommitRange {
    pub fn new(hashes: Vec<String>) -> Self {
        Self(hashes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn hashes(&self) -> &[String] {
        &self.0
    }

    /// Fixed-length hash prefixes for store correlation. Hashes shorter than
    /// the prefix length (already-abbreviated input) are kept whole.
    pub fn prefixes(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|hash| hash.get(..HASH_PREFIX_LEN).unwrap_or(hash).to_string())
            .collect()
    }
}

impl IntoIterator for CommitRange {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Handle to the local product repository.
///
/// The working copy is cloned on first use when the configured path does not
/// exist yet. All history access shells out to git, so the handle itself
/// carries no mutable state and is safe to share across invocations.
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    /// Opens the repository at `path`, cloning from `clone_url` when the
    /// path does not exist.
    pub async fn open_or_clone(path: &Path, clone_url: Option<&str>) -> Result<Self> {
        if path.exists() {
            debug!("Repository already present at '{}'", path.display());
            return Ok(Self {
                path: path.to_path_buf(),
            });
        }

        let Some(clone_url) = clone_url else {
            return Err(PerfLensError::Config(format!(
                "repository path '{}' does not exist and no clone URL is configured",
                path.display()
            )));
        };

        info!("Cloning repository from {clone_url}...");
        let output = Command::new("git")
            .arg("clone")
            .arg(clone_url)
            .arg(path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(PerfLensError::Git(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Runs a git subcommand against this repository and returns stdout.
    pub(super) async fn git(&self, args: &[&str]) -> Result<String> {
        debug!("git -C {} {}", self.path.display(), args.join(" "));
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.path)
            .args(args)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_unknown_revision(&stderr) {
                return Err(PerfLensError::NotFound(format!(
                    "revision not found: {}",
                    stderr.trim()
                )));
            }
            return Err(PerfLensError::Git(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Resolves a revision reference to a full commit hash.
    pub async fn resolve(&self, revision: &str) -> Result<String> {
        let stdout = self.git(&["rev-parse", "--verify", revision]).await?;
        Ok(stdout.trim().to_string())
    }

    /// Walks first-parent history, newest first.
    ///
    /// With one reference: everything reachable from `ref1` back to the
    /// history start. With two: standard `ref1..ref2` range semantics,
    /// `ref1` exclusive and `ref2` inclusive.
    pub async fn first_parent_log(&self, ref1: &str, ref2: Option<&str>) -> Result<CommitRange> {
        let rev_spec = match ref2 {
            Some(ref2) => format!("{ref1}..{ref2}"),
            None => ref1.to_string(),
        };

        let stdout = self
            .git(&["log", "--first-parent", "--pretty=format:%H", &rev_spec])
            .await?;

        let hashes = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Ok(CommitRange::new(hashes))
    }
}

fn is_unknown_revision(stderr: &str) -> bool {
    stderr.contains("unknown revision")
        || stderr.contains("bad revision")
        || stderr.contains("ambiguous argument")
}
