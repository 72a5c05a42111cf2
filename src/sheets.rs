use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde_json::{json, Value};

use crate::error::{PerfLensError, Result};

const DEFAULT_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

static SPREADSHEET_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/spreadsheets/d/([a-zA-Z0-9_-]+)").unwrap());

static GID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#gid=(\d+)").unwrap());

/// Parses a spreadsheet URL into (spreadsheet id, optional sheet gid).
///
/// # Errors
///
/// Returns [`PerfLensError::Parse`] echoing the input when no spreadsheet id
/// can be extracted.
pub fn parse_sheets_url(url: &str) -> Result<(String, Option<String>)> {
    let id = SPREADSHEET_ID_RE
        .captures(url)
        .map(|captures| captures[1].to_string())
        .ok_or_else(|| {
            PerfLensError::Parse(format!("cannot extract spreadsheet id from: {url}"))
        })?;

    let gid = GID_RE.captures(url).map(|captures| captures[1].to_string());

    Ok((id, gid))
}

/// Read-only spreadsheet client.
///
/// Takes a ready bearer token; obtaining and refreshing credentials is the
/// transport's concern, not this client's.
pub struct SheetsClient {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl SheetsClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_api_url(DEFAULT_API_URL.to_string(), token)
    }

    pub fn with_api_url(api_url: String, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("perflens/0.3")
            .build()
            .map_err(|e| PerfLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        debug!("GET {url}");
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PerfLensError::Transport {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json().await?)
    }

    /// Fetches spreadsheet metadata (title plus per-sheet properties).
    pub async fn spreadsheet_info(&self, spreadsheet_id: &str) -> Result<Value> {
        self.get_json(&format!("{}/{spreadsheet_id}", self.api_url))
            .await
    }

    /// Resolves a sheet gid to its title via the spreadsheet metadata.
    ///
    /// An unknown gid is `NotFound`: the spreadsheet exists but has no such
    /// tab.
    pub async fn sheet_name_from_gid(&self, spreadsheet_id: &str, gid: &str) -> Result<String> {
        let info = self.spreadsheet_info(spreadsheet_id).await?;

        let sheets = info
            .get("sheets")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for sheet in sheets {
            let Some(properties) = sheet.get("properties") else {
                continue;
            };
            let sheet_id = properties
                .get("sheetId")
                .map(|id| id.to_string())
                .unwrap_or_default();
            if sheet_id == gid {
                if let Some(title) = properties.get("title").and_then(Value::as_str) {
                    return Ok(title.to_string());
                }
            }
        }

        Err(PerfLensError::NotFound(format!(
            "no sheet with gid {gid} in spreadsheet {spreadsheet_id}"
        )))
    }

    /// Reads a cell range from the spreadsheet addressed by a full URL.
    ///
    /// When the URL carries a `#gid=` fragment the range is scoped to that
    /// sheet tab; otherwise the spreadsheet's default sheet is read.
    pub async fn read_range(&self, url: &str, range: &str) -> Result<Value> {
        let (spreadsheet_id, gid) = parse_sheets_url(url)?;

        let sheet_name = match gid {
            Some(gid) => Some(self.sheet_name_from_gid(&spreadsheet_id, &gid).await?),
            None => None,
        };

        let full_range = match &sheet_name {
            Some(name) => format!("{name}!{range}"),
            None => range.to_string(),
        };

        let info = self.spreadsheet_info(&spreadsheet_id).await?;
        let title = info
            .pointer("/properties/title")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();

        let values_url = format!(
            "{}/{spreadsheet_id}/values/{full_range}?valueRenderOption=FORMATTED_VALUE&dateTimeRenderOption=FORMATTED_STRING",
            self.api_url
        );
        let result = self.get_json(&values_url).await?;
        let data = result.get("values").cloned().unwrap_or_else(|| json!([]));

        Ok(json!({
            "spreadsheet_title": title,
            "sheet_name": sheet_name.unwrap_or_else(|| "Default".to_string()),
            "range": full_range,
            "data": data,
        }))
    }
}
