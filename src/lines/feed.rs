use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::models::LineRecord;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("malformed lines CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("lines CSV has no '{0}' column")]
    MissingColumn(String),

    #[error("no \"Updated:\" marker found in {url}")]
    MissingUpdatedMarker { url: String },
}

/// Remote source of the raw lines feed.
#[async_trait]
pub trait LinesSource: Send + Sync {
    /// Fetch the predictions CSV as text.
    async fn fetch_lines_csv(&self) -> Result<String, FeedError>;

    /// Fetch the human-readable "last updated" text.
    async fn fetch_last_updated(&self) -> Result<String, FeedError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// The Prediction Tracker's NCAA feed.
/// Site: <https://www.thepredictiontracker.com/>
#[derive(Clone)]
pub struct PredictionTracker {
    http: Client,
    lines_url: String,
    updated_url: String,
}

impl PredictionTracker {
    pub fn new(lines_url: &str, updated_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(PredictionTracker {
            http,
            lines_url: lines_url.to_string(),
            updated_url: updated_url.to_string(),
        })
    }

    async fn get_text(&self, url: &str) -> Result<String, FeedError> {
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await.map_err(|source| FeedError::Http {
            url: url.to_string(),
            source,
        })?;

        if !resp.status().is_success() {
            return Err(FeedError::Status {
                url: url.to_string(),
                status: resp.status(),
            });
        }

        resp.text().await.map_err(|source| FeedError::Http {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl LinesSource for PredictionTracker {
    fn name(&self) -> &str {
        "PredictionTracker"
    }

    async fn fetch_lines_csv(&self) -> Result<String, FeedError> {
        self.get_text(&self.lines_url).await
    }

    async fn fetch_last_updated(&self) -> Result<String, FeedError> {
        let html = self.get_text(&self.updated_url).await?;
        parse_last_updated(&html).ok_or_else(|| FeedError::MissingUpdatedMarker {
            url: self.updated_url.clone(),
        })
    }
}

/// Columns the feed must carry, even when every cell in one is empty.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "home",
    "road",
    "lineopen",
    "line",
    "linemidweek",
    "lineavg",
    "linestd",
    "linemedian",
    "phcover",
    "phwin",
];

/// Parse the predictions CSV. Every required column must be present; others are ignored.
pub fn parse_lines_csv(text: &str) -> Result<Vec<LineRecord>, FeedError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    // serde fills an absent Option column with None, so check headers up front.
    let headers = reader.headers()?;
    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|col| !headers.iter().any(|h| h == **col))
    {
        return Err(FeedError::MissingColumn(missing.to_string()));
    }

    let mut records = Vec::new();
    for result in reader.deserialize::<LineRecord>() {
        records.push(result?);
    }
    Ok(records)
}

const UPDATED_MARKER: &str = "Updated: ";

/// Extract the freshness text from the metadata page.
///
/// Takes everything after the first `Updated: ` up to the next `:` on the
/// same line, then drops the final three characters (the page writes
/// "Updated: Sunday Oct 12, 2025 10:35 AM", which leaves the day and date).
pub fn parse_last_updated(html: &str) -> Option<String> {
    for (idx, _) in html.match_indices(UPDATED_MARKER) {
        let rest = &html[idx + UPDATED_MARKER.len()..];
        let line = rest.split('\n').next().unwrap_or_default();
        if let Some(end) = line.find(':') {
            let captured = &line[..end];
            let keep = captured.chars().count().saturating_sub(3);
            return Some(captured.chars().take(keep).collect());
        }
    }
    None
}
