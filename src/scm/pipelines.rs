use log::debug;
use serde_json::Value;

use crate::error::{PerfLensError, Result};

/// Resolves a GitLab pipeline id to the commit sha it ran against.
///
/// One REST call; a missing pipeline is `NotFound`, any other non-success
/// status is a transport failure.
pub async fn fetch_pipeline_sha(
    client: &reqwest::Client,
    gitlab_url: &str,
    project_id: u64,
    pipeline_id: u64,
    token: Option<&str>,
) -> Result<String> {
    let url = format!(
        "{}/api/v4/projects/{project_id}/pipelines/{pipeline_id}",
        gitlab_url.trim_end_matches('/')
    );
    debug!("GET {url}");

    let mut request = client.get(&url);
    if let Some(token) = token {
        request = request.header("PRIVATE-TOKEN", token);
    }

    let response = request.send().await?;
    let status = response.status();
    if status.as_u16() == 404 {
        return Err(PerfLensError::NotFound(format!(
            "pipeline {pipeline_id} not found in project {project_id}"
        )));
    }
    if !status.is_success() {
        return Err(PerfLensError::Transport {
            status: status.as_u16(),
            url,
        });
    }

    let body: Value = response.json().await?;
    body.get("sha")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            PerfLensError::NotFound(format!("pipeline {pipeline_id} has no sha field"))
        })
}
