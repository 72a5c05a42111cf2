//! Agent-facing tool surface.
//!
//! One callable per operation. Every callable returns a structured JSON
//! value; [`tool_value`] is the outermost boundary and turns any failure
//! into a structured `{"error": message}` object so a calling agent always
//! sees a normalized shape, never a propagated panic.

use std::collections::HashMap;

use log::info;
use serde_json::{json, Value};

use crate::ci::params::extract_parameters;
use crate::ci::run_url::RunReference;
use crate::ci::uniq::{extract_uniq, finish_status};
use crate::context::AppContext;
use crate::error::{PerfLensError, Result};
use crate::scm::diff::{change_overview, scoped_diff, DiffOutcome};
use crate::scm::pipelines::fetch_pipeline_sha;
use crate::store::record::to_records;

/// Maps a tool result to the wire shape: the success value as-is, or
/// `{"error": message}`.
pub fn tool_value(result: Result<Value>) -> Value {
    match result {
        Ok(value) => value,
        Err(e) => json!({ "error": e.to_string() }),
    }
}

/// Resolves a run URL to its uniq id.
///
/// A 200 console fetch with no uniq line is a valid empty result
/// (`"uniq": null`); a non-200 fetch is a transport error.
pub async fn get_uniq_from_url(ctx: &AppContext, run_url: &str) -> Result<Value> {
    let reference = RunReference::parse(run_url)?;
    let (status, body) = ctx.jenkins()?.fetch_text(&reference.console_url()).await?;

    if status != 200 {
        return Err(PerfLensError::Transport {
            status,
            url: reference.console_url(),
        });
    }

    let uniq = extract_uniq(&body);
    match &uniq {
        Some(uniq) => info!("Extracted uniq id {uniq} from build {}", reference.build_number),
        None => info!("No uniq id in console log of build {}", reference.build_number),
    }

    Ok(json!({
        "job_name": reference.job_name,
        "build_number": reference.build_number,
        "status": status,
        "uniq": uniq,
    }))
}

/// Resolves a run URL to its protocol / test-suite / cluster triple.
pub async fn get_run_parameters(ctx: &AppContext, run_url: &str) -> Result<Value> {
    let reference = RunReference::parse(run_url)?;
    let metadata = ctx.jenkins()?.fetch_json(&reference.metadata_url()).await?;
    let params = extract_parameters(&metadata);

    Ok(json!({
        "job_name": reference.job_name,
        "build_number": reference.build_number,
        "protocol": params.protocol,
        "test_suite": params.test_suite,
        "cluster": params.cluster,
    }))
}

/// Reads the Jenkins finish status of a run from the tail of its console
/// log. A run that has not finished has no status ("finish_status": null).
pub async fn get_finish_status(ctx: &AppContext, run_url: &str) -> Result<Value> {
    let reference = RunReference::parse(run_url)?;
    let (status, body) = ctx.jenkins()?.fetch_text(&reference.console_url()).await?;

    if status != 200 {
        return Err(PerfLensError::Transport {
            status,
            url: reference.console_url(),
        });
    }

    Ok(json!({
        "job_name": reference.job_name,
        "build_number": reference.build_number,
        "finish_status": finish_status(&body),
    }))
}

/// First-parent commit hashes between two revisions (or back to history
/// start when only one is given), newest first.
pub async fn commits_between(
    ctx: &AppContext,
    ref1: &str,
    ref2: Option<&str>,
) -> Result<Value> {
    let range = ctx.repo()?.first_parent_log(ref1, ref2).await?;
    Ok(json!({
        "count": range.len(),
        "commits": range.hashes(),
    }))
}

/// Scope-restricted diff between two revisions (or against the working tree
/// when `ref2` is absent).
pub async fn diff_between(ctx: &AppContext, ref1: &str, ref2: Option<&str>) -> Result<Value> {
    let scope_path = ctx.config.repository.scope_path.clone();
    let outcome = scoped_diff(ctx.repo()?, ref1, ref2, &scope_path).await?;
    Ok(diff_outcome_value(outcome, ref1, ref2, &scope_path))
}

/// One-line-per-commit change overview between two revisions, merge commits
/// excluded, restricted to the configured scope path.
pub async fn overview_between(ctx: &AppContext, ref1: &str, ref2: &str) -> Result<Value> {
    let scope_path = ctx.config.repository.scope_path.clone();
    let outcome = change_overview(ctx.repo()?, ref1, ref2, &scope_path).await?;
    Ok(diff_outcome_value(outcome, ref1, Some(ref2), &scope_path))
}

fn diff_outcome_value(
    outcome: DiffOutcome,
    ref1: &str,
    ref2: Option<&str>,
    scope_path: &str,
) -> Value {
    let endpoints = match ref2 {
        Some(ref2) => format!("{ref1}..{ref2}"),
        None => format!("{ref1}..working tree"),
    };
    match outcome {
        DiffOutcome::Changes(text) => json!({ "changes": text }),
        DiffOutcome::NoScopeChanges => json!({
            "changes": null,
            "message": format!("no changes under '{scope_path}' in {endpoints}"),
        }),
        DiffOutcome::NoCommits => json!({
            "changes": null,
            "message": format!("no commits found in {endpoints}"),
        }),
    }
}

/// Performance records for every commit in a revision range, correlated by
/// 8-character hash prefix.
pub async fn results_for_commits(
    ctx: &AppContext,
    ref1: &str,
    ref2: Option<&str>,
) -> Result<Value> {
    let range = ctx.repo()?.first_parent_log(ref1, ref2).await?;
    let rows = ctx.db.lock().await.fetch_by_commits(&range)?;

    if rows.is_empty() {
        return Ok(json!({
            "records": [],
            "message": format!("no data for the {} commits in the range", range.len()),
        }));
    }

    Ok(json!({ "records": to_records(&rows) }))
}

/// Performance record stored under one uniq id.
pub async fn results_for_uniq(ctx: &AppContext, uniq: &str) -> Result<Value> {
    let rows = ctx.db.lock().await.fetch_by_uniq(uniq)?;

    if rows.is_empty() {
        return Ok(json!({
            "records": [],
            "message": format!("no data for uniq id {uniq}"),
        }));
    }

    Ok(json!({ "records": to_records(&rows) }))
}

/// Triggers a parameterized build; the job defaults to the configured one.
pub async fn trigger_job(
    ctx: &AppContext,
    job_name: Option<&str>,
    params: &HashMap<String, String>,
) -> Result<Value> {
    let job_name = job_name.unwrap_or(&ctx.config.jenkins.default_job);
    ctx.jenkins()?.trigger_job(job_name, params).await?;
    Ok(json!({ "triggered": job_name }))
}

/// Aborts a running build.
pub async fn abort_build(ctx: &AppContext, job_name: &str, build_number: u64) -> Result<Value> {
    ctx.jenkins()?.abort_build(job_name, build_number).await?;
    Ok(json!({ "aborted": { "job_name": job_name, "build_number": build_number } }))
}

/// Lists job names on the CI server, optionally substring-filtered.
pub async fn list_jobs(ctx: &AppContext, filter: Option<&str>) -> Result<Value> {
    let jobs = ctx.jenkins()?.list_jobs(filter).await?;
    Ok(json!({ "jobs": jobs }))
}

/// Resolves a GitLab pipeline id to the commit sha it ran against.
pub async fn pipeline_sha(ctx: &AppContext, pipeline_id: u64) -> Result<Value> {
    let gitlab_url = ctx
        .config
        .repository
        .gitlab_url
        .as_deref()
        .ok_or_else(|| PerfLensError::Config("GitLab URL is not configured".to_string()))?;

    let sha = fetch_pipeline_sha(
        &ctx.http,
        gitlab_url,
        ctx.config.repository.gitlab_project,
        pipeline_id,
        ctx.config.repository.gitlab_token.as_deref(),
    )
    .await?;

    Ok(json!({ "pipeline_id": pipeline_id, "sha": sha }))
}

/// Reads a cell range from a spreadsheet URL.
pub async fn read_sheet(ctx: &AppContext, url: &str, range: &str) -> Result<Value> {
    ctx.sheets.read_range(url, range).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    async fn context_with_jenkins(server: &mockito::Server) -> AppContext {
        let mut config = Config::default();
        config.jenkins.base_url = Some(server.url());
        config.jenkins.username = Some("ci-bot".to_string());
        config.jenkins.api_token = Some("token".to_string());
        AppContext::initialize(config).await.unwrap()
    }

    #[tokio::test]
    async fn test_context_starts_from_default_config() {
        // Env-var-only usage constructs the context from defaults; no
        // collaborator may be required just to start.
        let ctx = AppContext::initialize(Config::default()).await.unwrap();
        assert!(ctx.jenkins().is_err());
        assert!(ctx.repo().is_err());
    }

    #[test]
    fn test_tool_value_wraps_errors() {
        let value = tool_value(Err(PerfLensError::Parse("bad input".to_string())));
        assert_eq!(value["error"], "invalid run reference: bad input");
    }

    #[test]
    fn test_tool_value_passes_success_through() {
        let value = tool_value(Ok(json!({ "uniq": "1234567890" })));
        assert_eq!(value["uniq"], "1234567890");
    }

    #[tokio::test]
    async fn test_get_uniq_from_url_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/job/nightly/7/consoleText")
            .with_status(200)
            .with_body("setup\n\x1B[1mUniq 1234567890\x1B[0m\nFinished: SUCCESS\n")
            .create_async()
            .await;

        let ctx = context_with_jenkins(&server).await;
        let url = format!("{}/job/nightly/7", server.url());
        let value = get_uniq_from_url(&ctx, &url).await.unwrap();

        assert_eq!(value["uniq"], "1234567890");
        assert_eq!(value["status"], 200);
        assert_eq!(value["job_name"], "nightly");
        assert_eq!(value["build_number"], 7);
    }

    #[tokio::test]
    async fn test_get_uniq_absent_is_valid_empty_result() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/job/nightly/8/consoleText")
            .with_status(200)
            .with_body("still warming up\n")
            .create_async()
            .await;

        let ctx = context_with_jenkins(&server).await;
        let url = format!("{}/job/nightly/8", server.url());
        let value = get_uniq_from_url(&ctx, &url).await.unwrap();
        assert!(value["uniq"].is_null());
    }

    #[tokio::test]
    async fn test_get_uniq_non_200_is_transport_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/job/nightly/9/consoleText")
            .with_status(503)
            .create_async()
            .await;

        let ctx = context_with_jenkins(&server).await;
        let url = format!("{}/job/nightly/9", server.url());
        let result = get_uniq_from_url(&ctx, &url).await;
        assert!(matches!(
            result,
            Err(PerfLensError::Transport { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_get_uniq_malformed_url_is_parse_error() {
        let server = mockito::Server::new_async().await;
        let ctx = context_with_jenkins(&server).await;
        let result = get_uniq_from_url(&ctx, "https://ci.example.com/nightly/9").await;
        assert!(matches!(result, Err(PerfLensError::Parse(_))));
    }

    #[tokio::test]
    async fn test_get_run_parameters() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/job/nightly/7/api/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"actions":[{"parameters":[
                    {"name":"INFRA_PROTOCOL","value":"iscsi"},
                    {"name":"cluster_label","value":"c9"},
                    {"name":"tests_file","value":"suites/full.yaml"}
                ]}]}"#,
            )
            .create_async()
            .await;

        let ctx = context_with_jenkins(&server).await;
        let url = format!("{}/job/nightly/7", server.url());
        let value = get_run_parameters(&ctx, &url).await.unwrap();
        assert_eq!(value["protocol"], "iscsi");
        assert_eq!(value["test_suite"], "full");
        assert_eq!(value["cluster"], "c9");
    }

    #[tokio::test]
    async fn test_diff_messages_distinguish_empty_cases() {
        // Pure formatting check; no repository involved.
        let no_commits = diff_outcome_value(DiffOutcome::NoCommits, "a", Some("b"), "src");
        let no_scope = diff_outcome_value(DiffOutcome::NoScopeChanges, "a", Some("b"), "src");
        assert_ne!(no_commits["message"], no_scope["message"]);
        assert!(no_commits["changes"].is_null());
        assert!(no_scope["changes"].is_null());
    }

    #[tokio::test]
    async fn test_results_for_uniq_no_data_message() {
        let mut config = Config::default();
        config.database.path = Some(":memory:".to_string());
        let ctx = AppContext::initialize(config).await.unwrap();
        ctx.db
            .lock()
            .await
            .execute(
                "CREATE TABLE vperf (
                    date TEXT, build TEXT, test_name TEXT,
                    bw REAL, iops REAL, latency REAL,
                    cluster TEXT, uniq TEXT, commit_hash TEXT
                )",
            )
            .unwrap();

        let value = results_for_uniq(&ctx, "0000000000").await.unwrap();
        assert_eq!(value["records"], json!([]));
        assert_eq!(value["message"], "no data for uniq id 0000000000");
    }

    #[tokio::test]
    async fn test_results_for_uniq_reshapes_rows() {
        let mut config = Config::default();
        config.database.path = Some(":memory:".to_string());
        let ctx = AppContext::initialize(config).await.unwrap();
        {
            let db = ctx.db.lock().await;
            db.execute(
                "CREATE TABLE vperf (
                    date TEXT, build TEXT, test_name TEXT,
                    bw REAL, iops REAL, latency REAL,
                    cluster TEXT, uniq TEXT, commit_hash TEXT
                )",
            )
            .unwrap();
            db.execute(
                "INSERT INTO vperf VALUES
                 ('2024-01-01','b123','random_read_4K',100,5000,2.1,'c1','u1','abc'),
                 ('2024-01-01','b123','seq_write_128K',300,10,2.1,'c1','u1','abc')",
            )
            .unwrap();
        }

        let value = results_for_uniq(&ctx, "u1").await.unwrap();
        let record = &value["records"][0];
        assert_eq!(record["date"], "January 01, 2024");
        assert_eq!(record["random_read_4K"], 5000.0);
        assert_eq!(record["seq_write_128K"], 300.0);
    }

    #[tokio::test]
    async fn test_results_before_connect_is_storage_error() {
        let mut config = Config::default();
        config.database.path = Some(":memory:".to_string());
        let ctx = AppContext::initialize(config).await.unwrap();
        ctx.shutdown().await;

        let result = results_for_uniq(&ctx, "u1").await;
        assert!(matches!(result, Err(PerfLensError::Storage(_))));
    }
}
