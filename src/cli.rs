use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::info;

use crate::config::Config;
use crate::context::AppContext;
use crate::tools;

#[derive(Parser)]
#[command(name = "perflens")]
#[command(author, version, about = "CI run / git history / performance results correlation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./perflens.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,

    #[arg(long, global = true, env = "JENKINS_URL")]
    jenkins_url: Option<String>,

    #[arg(long, global = true, env = "JENKINS_USERNAME")]
    jenkins_username: Option<String>,

    #[arg(long, global = true, env = "JENKINS_API_TOKEN")]
    jenkins_token: Option<String>,

    #[arg(long, global = true, env = "LOCAL_REPO_PATH")]
    repo_path: Option<String>,

    #[arg(long, global = true, env = "GITLAB_URL")]
    gitlab_url: Option<String>,

    #[arg(long, global = true, env = "GITLAB_TOKEN")]
    gitlab_token: Option<String>,

    #[arg(long, global = true, env = "RESULTS_DB_PATH")]
    db_path: Option<String>,

    #[arg(long, global = true, env = "SHEETS_TOKEN")]
    sheets_token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the uniq id of a run from its Jenkins URL
    Uniq { run_url: String },

    /// Extract the protocol / test-suite / cluster parameters of a run
    Params { run_url: String },

    /// Read the finish status of a run from its console log
    Status { run_url: String },

    /// First-parent commit hashes between two revisions (or back to
    /// history start with one)
    Commits {
        ref1: String,
        ref2: Option<String>,
    },

    /// Scope-restricted diff between two revisions
    Diff {
        ref1: String,
        ref2: Option<String>,
    },

    /// One-line-per-commit change overview between two revisions
    Overview { ref1: String, ref2: String },

    /// Performance records for every commit in a revision range
    Results {
        ref1: String,
        ref2: Option<String>,
    },

    /// Performance record stored under one uniq id
    ResultsUniq { uniq: String },

    /// Trigger a parameterized build
    Trigger {
        #[arg(short, long)]
        job: Option<String>,

        /// Build parameters as KEY=VALUE pairs
        #[arg(short = 'P', long = "param")]
        params: Vec<String>,
    },

    /// Abort a running build
    Abort { job: String, build: u64 },

    /// List job names on the CI server
    Jobs { filter: Option<String> },

    /// Resolve a GitLab pipeline id to its commit sha
    PipelineSha { pipeline_id: u64 },

    /// Read a cell range from a spreadsheet URL
    Sheet {
        url: String,

        #[arg(short, long, default_value = "A:Z")]
        range: String,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let mut config = Config::load_or_default(self.config.as_deref())?;
        self.apply_overrides(&mut config);

        let ctx = AppContext::initialize(config).await?;
        let value = self.dispatch(&ctx).await;
        ctx.shutdown().await;

        let json_output = if self.pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };

        if let Some(output_path) = &self.output {
            std::fs::write(output_path, json_output)?;
            info!("Result written to: {}", output_path.display());
        } else {
            println!("{json_output}");
        }

        Ok(())
    }

    async fn dispatch(&self, ctx: &AppContext) -> serde_json::Value {
        let result = match &self.command {
            Commands::Uniq { run_url } => tools::get_uniq_from_url(ctx, run_url).await,
            Commands::Params { run_url } => tools::get_run_parameters(ctx, run_url).await,
            Commands::Status { run_url } => tools::get_finish_status(ctx, run_url).await,
            Commands::Commits { ref1, ref2 } => {
                tools::commits_between(ctx, ref1, ref2.as_deref()).await
            }
            Commands::Diff { ref1, ref2 } => tools::diff_between(ctx, ref1, ref2.as_deref()).await,
            Commands::Overview { ref1, ref2 } => tools::overview_between(ctx, ref1, ref2).await,
            Commands::Results { ref1, ref2 } => {
                tools::results_for_commits(ctx, ref1, ref2.as_deref()).await
            }
            Commands::ResultsUniq { uniq } => tools::results_for_uniq(ctx, uniq).await,
            Commands::Trigger { job, params } => match parse_params(params) {
                Ok(params) => tools::trigger_job(ctx, job.as_deref(), &params).await,
                Err(e) => Err(crate::error::PerfLensError::Parse(e.to_string())),
            },
            Commands::Abort { job, build } => tools::abort_build(ctx, job, *build).await,
            Commands::Jobs { filter } => tools::list_jobs(ctx, filter.as_deref()).await,
            Commands::PipelineSha { pipeline_id } => tools::pipeline_sha(ctx, *pipeline_id).await,
            Commands::Sheet { url, range } => tools::read_sheet(ctx, url, range).await,
        };

        tools::tool_value(result)
    }

    fn apply_overrides(&self, config: &mut Config) {
        if self.jenkins_url.is_some() {
            config.jenkins.base_url = self.jenkins_url.clone();
        }
        if self.jenkins_username.is_some() {
            config.jenkins.username = self.jenkins_username.clone();
        }
        if self.jenkins_token.is_some() {
            config.jenkins.api_token = self.jenkins_token.clone();
        }
        if self.repo_path.is_some() {
            config.repository.local_path = self.repo_path.clone();
        }
        if self.gitlab_url.is_some() {
            config.repository.gitlab_url = self.gitlab_url.clone();
            if config.repository.clone_url.is_none() {
                config.repository.clone_url = self.gitlab_url.clone();
            }
        }
        if self.gitlab_token.is_some() {
            config.repository.gitlab_token = self.gitlab_token.clone();
        }
        if self.db_path.is_some() {
            config.database.path = self.db_path.clone();
        }
        if self.sheets_token.is_some() {
            config.sheets.token = self.sheets_token.clone();
        }
    }
}

fn parse_params(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut params = HashMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid parameter '{pair}', expected KEY=VALUE");
        };
        params.insert(key.to_string(), value.to_string());
    }
    Ok(params)
}
