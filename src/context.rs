use std::path::Path;

use log::debug;
use tokio::sync::Mutex;

use crate::ci::client::JenkinsClient;
use crate::config::Config;
use crate::error::{PerfLensError, Result};
use crate::scm::repo::GitRepo;
use crate::sheets::SheetsClient;
use crate::store::ResultsDb;

/// Process-wide collaborator handles, constructed once at startup and handed
/// to every tool invocation.
///
/// Collaborators that are not configured stay absent; the tools that need
/// them fail with a configuration error instead of the whole process
/// refusing to start. The results connection is mutex-guarded so concurrent
/// invocations never interleave queries on one connection.
pub struct AppContext {
    pub config: Config,
    jenkins: Option<JenkinsClient>,
    repo: Option<GitRepo>,
    pub db: Mutex<ResultsDb>,
    pub sheets: SheetsClient,
    pub http: reqwest::Client,
}

impl AppContext {
    /// Builds the context and connects the long-lived resources.
    pub async fn initialize(config: Config) -> Result<Self> {
        let jenkins = match &config.jenkins.base_url {
            Some(base_url) => Some(JenkinsClient::new(
                base_url.clone(),
                config.jenkins.username.clone(),
                config.jenkins.api_token.clone(),
            )?),
            None => {
                debug!("No Jenkins base URL configured");
                None
            }
        };

        let repo = match &config.repository.local_path {
            Some(local_path) => Some(
                GitRepo::open_or_clone(
                    Path::new(local_path),
                    config.repository.clone_url.as_deref(),
                )
                .await?,
            ),
            None => {
                debug!("No repository path configured");
                None
            }
        };

        let mut db = ResultsDb::new(config.database.path.clone(), config.database.table.clone())?;
        if config.database.path.is_some() {
            db.connect()?;
        }

        let sheets = SheetsClient::new(config.sheets.token.clone())?;

        let http = reqwest::Client::builder()
            .user_agent("perflens/0.3")
            .build()
            .map_err(|e| PerfLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            jenkins,
            repo,
            db: Mutex::new(db),
            sheets,
            http,
        })
    }

    pub fn jenkins(&self) -> Result<&JenkinsClient> {
        self.jenkins
            .as_ref()
            .ok_or_else(|| PerfLensError::Config("Jenkins is not configured".to_string()))
    }

    pub fn repo(&self) -> Result<&GitRepo> {
        self.repo
            .as_ref()
            .ok_or_else(|| PerfLensError::Config("repository is not configured".to_string()))
    }

    /// Tears down the long-lived resources. Explicit rather than relying on
    /// drop order so shutdown is observable in the logs.
    pub async fn shutdown(&self) {
        self.db.lock().await.close();
    }
}
