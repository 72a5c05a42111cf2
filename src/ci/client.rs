use std::collections::HashMap;

use log::{debug, info};
use serde_json::Value;
use url::Url;

use crate::error::{PerfLensError, Result};

/// Jenkins API client.
///
/// Thin GET/POST surface over basic auth: the tools only need raw text and
/// JSON bodies plus single-shot job trigger/abort. Transport-level retry is
/// deliberately absent; every invocation reflects current server state.
#[derive(Clone)]
pub struct JenkinsClient {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    api_token: Option<String>,
}

impl JenkinsClient {
    /// Creates a new Jenkins client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        base_url: String,
        username: Option<String>,
        api_token: Option<String>,
    ) -> Result<Self> {
        Url::parse(&base_url)
            .map_err(|e| PerfLensError::Config(format!("Invalid Jenkins base URL: {e}")))?;

        let client = reqwest::Client::builder()
            .user_agent("perflens/0.3")
            .build()
            .map_err(|e| PerfLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            api_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(username) = &self.username {
            request.basic_auth(username, self.api_token.as_deref())
        } else {
            request
        }
    }

    /// Fetches a URL as plain text, returning the raw status code alongside
    /// the body. Callers decide what a non-200 means for them; the console
    /// fetch for uniq extraction needs the status, not an error.
    pub async fn fetch_text(&self, url: &str) -> Result<(u16, String)> {
        debug!("GET {url}");
        let response = self.auth_request(self.client.get(url)).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// Fetches a URL as JSON. Non-success statuses are a transport failure.
    pub async fn fetch_json(&self, url: &str) -> Result<Value> {
        debug!("GET {url}");
        let response = self.auth_request(self.client.get(url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PerfLensError::Transport {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json().await?)
    }

    /// Triggers a parameterized build of `job_name`.
    pub async fn trigger_job(
        &self,
        job_name: &str,
        params: &HashMap<String, String>,
    ) -> Result<()> {
        let url = format!("{}/job/{job_name}/buildWithParameters", self.base_url);
        info!("Triggering job '{job_name}'");

        let response = self
            .auth_request(self.client.post(&url).form(params))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PerfLensError::Transport {
                status: status.as_u16(),
                url,
            });
        }
        Ok(())
    }

    /// Aborts a running build.
    pub async fn abort_build(&self, job_name: &str, build_number: u64) -> Result<()> {
        let url = format!("{}/job/{job_name}/{build_number}/stop", self.base_url);
        info!("Aborting build {build_number} of '{job_name}'");

        let response = self.auth_request(self.client.post(&url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PerfLensError::Transport {
                status: status.as_u16(),
                url,
            });
        }
        Ok(())
    }

    /// Lists job names on the server, optionally filtered by a
    /// case-insensitive substring.
    pub async fn list_jobs(&self, filter: Option<&str>) -> Result<Vec<String>> {
        let url = format!("{}/api/json", self.base_url);
        let body = self.fetch_json(&url).await?;

        let jobs = body
            .get("jobs")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let needle = filter.map(str::to_lowercase);
        let names = jobs
            .iter()
            .filter_map(|job| job.get("name").and_then(Value::as_str))
            .filter(|name| match &needle {
                Some(needle) => name.to_lowercase().contains(needle),
                None => true,
            })
            .map(str::to_string)
            .collect();

        Ok(names)
    }
}
