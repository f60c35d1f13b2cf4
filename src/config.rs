use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// College football lines dashboard
#[derive(Parser, Debug, Clone)]
#[command(name = "cfb-lines", version, about)]
pub struct Config {
    /// Dashboard listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8080")]
    pub dashboard_addr: String,

    /// Local CSV with `School` and `Conference` columns (Power-5 teams)
    #[arg(long, env = "AFFILIATION_PATH", default_value = "p5_affliation.csv")]
    pub affiliation_path: String,

    /// Betting lines CSV published by The Prediction Tracker
    #[arg(
        long,
        env = "LINES_URL",
        default_value = "https://www.thepredictiontracker.com/ncaapredictions.csv"
    )]
    pub lines_url: String,

    /// HTML page carrying the "Updated:" freshness marker
    #[arg(
        long,
        env = "UPDATED_URL",
        default_value = "https://www.thepredictiontracker.com/predncaa.html"
    )]
    pub updated_url: String,

    /// Also scrape the "last updated" marker on every refresh
    #[arg(long, env = "FETCH_LAST_UPDATED", default_value = "false")]
    pub fetch_last_updated: bool,

    /// How long a fetched snapshot is served before refetching, in seconds
    #[arg(long, env = "CACHE_TTL_SECS", default_value = "900")]
    pub cache_ttl_secs: u64,

    /// Timeout applied to each upstream HTTP request, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "10")]
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.dashboard_addr
            .parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("invalid dashboard_addr '{}': {}", self.dashboard_addr, e))?;
        validate_http_url("lines_url", &self.lines_url)?;
        validate_http_url("updated_url", &self.updated_url)?;
        if self.http_timeout_secs == 0 {
            anyhow::bail!("http_timeout_secs must be positive");
        }
        if self.affiliation_path.trim().is_empty() {
            anyhow::bail!("affiliation_path must not be empty");
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn validate_http_url(name: &str, raw: &str) -> anyhow::Result<()> {
    let parsed = url::Url::parse(raw).map_err(|e| anyhow::anyhow!("invalid {} '{}': {}", name, raw, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => anyhow::bail!("{} must use http or https, got '{}'", name, other),
    }
}
