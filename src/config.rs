use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration file structure for perflens.
///
/// Describes the four long-lived collaborators: the Jenkins instance,
/// the product git repository, the results database, and the optional
/// spreadsheet service. Secrets may be left out of the file and supplied
/// through the environment instead (see the CLI token arguments).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Jenkins instance settings
    #[serde(default)]
    pub jenkins: JenkinsConfig,

    /// Product repository settings
    #[serde(default)]
    pub repository: RepositoryConfig,

    /// Results database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Spreadsheet service settings
    #[serde(default)]
    pub sheets: SheetsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JenkinsConfig {
    /// Jenkins base URL (e.g., 'https://jenkins.example.com:8080')
    pub base_url: Option<String>,

    /// Jenkins account username
    pub username: Option<String>,

    /// Jenkins API token
    pub api_token: Option<String>,

    /// Job used by the trigger tool when none is given
    #[serde(default = "default_trigger_job")]
    pub default_job: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RepositoryConfig {
    /// Local working copy path; cloned on first use when absent
    pub local_path: Option<String>,

    /// URL to clone from when the local path does not exist
    pub clone_url: Option<String>,

    /// Subtree that diffs and change overviews are restricted to
    #[serde(default = "default_scope_path")]
    pub scope_path: String,

    /// GitLab instance base URL, for pipeline-id resolution
    pub gitlab_url: Option<String>,

    /// GitLab project id, for pipeline-id resolution
    #[serde(default = "default_gitlab_project")]
    pub gitlab_project: u64,

    /// GitLab private token
    pub gitlab_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DatabaseConfig {
    /// SQLite database file holding performance results
    pub path: Option<String>,

    /// Results table name
    #[serde(default = "default_results_table")]
    pub table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SheetsConfig {
    /// OAuth bearer token with spreadsheets.readonly scope
    pub token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jenkins: JenkinsConfig::default(),
            repository: RepositoryConfig::default(),
            database: DatabaseConfig::default(),
            sheets: SheetsConfig::default(),
        }
    }
}

impl Default for JenkinsConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            username: None,
            api_token: None,
            default_job: default_trigger_job(),
        }
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            local_path: None,
            clone_url: None,
            scope_path: default_scope_path(),
            gitlab_url: None,
            gitlab_project: default_gitlab_project(),
            gitlab_token: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            table: default_results_table(),
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self { token: None }
    }
}

fn default_trigger_job() -> String {
    "run_tests_vperfv2".to_string()
}

fn default_scope_path() -> String {
    "src".to_string()
}

fn default_gitlab_project() -> u64 {
    3
}

fn default_results_table() -> String {
    "vperf".to_string()
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Loads configuration from the given path, or defaults when no path is
    /// given and no `perflens.toml` exists in the current directory.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let local = Path::new("perflens.toml");
        if local.exists() {
            return Self::load(local);
        }

        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database.table, "vperf");
        assert_eq!(config.repository.scope_path, "src");
        assert_eq!(config.repository.gitlab_project, 3);
        assert_eq!(config.jenkins.default_job, "run_tests_vperfv2");
    }

    #[test]
    fn test_default_matches_empty_file() {
        // An absent config file and an empty one must describe the same
        // configuration.
        let from_empty: Config = toml::from_str("").unwrap();
        let default = Config::default();
        assert_eq!(from_empty.database.table, default.database.table);
        assert_eq!(from_empty.repository.scope_path, default.repository.scope_path);
        assert_eq!(
            from_empty.repository.gitlab_project,
            default.repository.gitlab_project
        );
        assert_eq!(from_empty.jenkins.default_job, default.jenkins.default_job);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[jenkins]\nbase-url = \"https://ci.example.com:8080\"\n\n[database]\npath = \"/var/lib/results.db\"\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(
            config.jenkins.base_url.as_deref(),
            Some("https://ci.example.com:8080")
        );
        assert_eq!(config.database.path.as_deref(), Some("/var/lib/results.db"));
        // Unspecified sections fall back to defaults
        assert_eq!(config.database.table, "vperf");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/perflens.toml"));
        assert!(result.is_err());
    }
}
