
pub mod coordinator;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::CrawlConfig;
use crate::embeddings::truncate_chars;
use crate::models::EnrichedPageContext;

const TRIGGER_TIMEOUT_SECONDS: u64 = 30;

/// How much of the main content survives into the cache.
pub const MAX_STORED_CONTENT_CHARS: usize = 2000;

/// Status of an actor run on the crawl backend. The wire spells
/// timed-out with a hyphen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Ready,
    Running,
    Succeeded,
    Failed,
    Aborted,
    #[serde(rename = "TIMED-OUT")]
    TimedOut,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Aborted | RunStatus::TimedOut
        )
    }
}

impl std::fmt::Display for RunStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            RunStatus::Ready => write!(f, "READY"),
            RunStatus::Running => write!(f, "RUNNING"),
            RunStatus::Succeeded => write!(f, "SUCCEEDED"),
            RunStatus::Failed => write!(f, "FAILED"),
            RunStatus::Aborted => write!(f, "ABORTED"),
            RunStatus::TimedOut => write!(f, "TIMED-OUT"),
            RunStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Actor run metadata returned by trigger and status calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunData {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub default_dataset_id: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActorRunInput {
    start_urls: Vec<StartUrl>,
    max_requests_per_crawl: u32,
    max_concurrency: u32,
}

#[derive(Debug, Serialize)]
struct StartUrl {
    url: String,
}

/// One structured record from the crawl dataset. Only the first record
/// of a run is consumed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPageRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub headings: Vec<String>,
    #[serde(default)]
    pub main_content: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub visual_styles: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub system_info: BTreeMap<String, serde_json::Value>,
}

impl RawPageRecord {
    /// Build the cacheable context, capping stored content length.
    #[inline]
    pub fn into_context(self, url: &str, run_id: &str) -> EnrichedPageContext {
        EnrichedPageContext {
            url: url.to_string(),
            title: self.title,
            headings: self.headings,
            main_content: self
                .main_content
                .map(|c| truncate_chars(&c, MAX_STORED_CONTENT_CHARS).to_string()),
            keywords: self.keywords,
            topics: self.topics,
            visual_styles: self.visual_styles,
            system_info: self.system_info,
            description: self.description,
            author: self.author,
            embedding: None,
            crawl_run_id: Some(run_id.to_string()),
            crawled_at: Utc::now(),
        }
    }
}

/// Client for the external crawl backend's actor-run API: submit a run,
/// poll it, fetch its dataset.
#[derive(Debug, Clone)]
pub struct CrawlBackendClient {
    base_url: Url,
    actor_id: String,
    token: Option<String>,
    agent: ureq::Agent,
}

impl CrawlBackendClient {
    #[inline]
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).context("Invalid crawl backend base URL")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(TRIGGER_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            actor_id: config.actor_id.clone(),
            token: config.resolve_token(),
            agent,
        })
    }

    /// Crawling is disabled entirely when no API token is configured.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    /// Submit a crawl run for one URL. Deliberately not retried: a
    /// retried submit could start duplicate runs.
    #[inline]
    pub fn trigger_crawl(&self, url: &str) -> Result<RunData> {
        let token = self.require_token()?;
        let endpoint = self
            .endpoint(&format!("acts/{}/runs", self.actor_id))
            .context("Failed to build run trigger URL")?;

        let input = ActorRunInput {
            start_urls: vec![StartUrl {
                url: url.to_string(),
            }],
            max_requests_per_crawl: 1,
            max_concurrency: 1,
        };
        let body = serde_json::to_string(&input).context("Failed to serialize actor input")?;

        let response_text = self
            .agent
            .post(endpoint.as_str())
            .header("Authorization", format!("Bearer {token}").as_str())
            .header("Content-Type", "application/json")
            .send(&body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| anyhow!("Crawl trigger request failed: {e}"))?;

        let envelope: ApiEnvelope<RunData> = serde_json::from_str(&response_text)
            .context("Failed to parse crawl trigger response")?;

        debug!(
            "Triggered crawl for {} (run {}, status {})",
            url, envelope.data.id, envelope.data.status
        );
        Ok(envelope.data)
    }

    /// One status poll for a run.
    #[inline]
    pub fn run_status(&self, run_id: &str) -> Result<RunData> {
        let token = self.require_token()?;
        let endpoint = self
            .endpoint(&format!("actor-runs/{run_id}"))
            .context("Failed to build run status URL")?;

        let response_text = self
            .agent
            .get(endpoint.as_str())
            .header("Authorization", format!("Bearer {token}").as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| anyhow!("Run status request failed: {e}"))?;

        let envelope: ApiEnvelope<RunData> =
            serde_json::from_str(&response_text).context("Failed to parse run status response")?;
        Ok(envelope.data)
    }

    /// Fetch the dataset records of a completed run.
    #[inline]
    pub fn fetch_results(&self, run: &RunData) -> Result<Vec<RawPageRecord>> {
        let token = self.require_token()?;
        let dataset_id = run
            .default_dataset_id
            .as_deref()
            .ok_or_else(|| anyhow!("Run {} has no dataset", run.id))?;

        let endpoint = self
            .endpoint(&format!("datasets/{dataset_id}/items"))
            .context("Failed to build dataset URL")?;

        let response_text = self
            .agent
            .get(endpoint.as_str())
            .header("Authorization", format!("Bearer {token}").as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| anyhow!("Dataset fetch failed: {e}"))?;

        let records: Vec<RawPageRecord> =
            serde_json::from_str(&response_text).context("Failed to parse dataset items")?;

        debug!("Fetched {} records for run {}", records.len(), run.id);
        Ok(records)
    }

    /// Join a path below the configured base, which may itself carry a
    /// path prefix like /v2.
    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{path}")).context("Failed to build backend endpoint URL")
    }

    fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| anyhow!("Crawl backend token is not configured"))
    }
}
