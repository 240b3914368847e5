use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a source exposes its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// RSS/Atom feed document at the endpoint.
    Feed,
    /// Plain HTML page whose rendered text is the item.
    PageList,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Feed => "feed",
            SourceKind::PageList => "page-list",
        }
    }
}

/// One configured origin of content. Loaded at registry construction and
/// never mutated during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub key: String,
    pub name: String,
    pub kind: SourceKind,
    pub endpoint: String,
    /// Per-source steady-state window; falls back to the global default.
    #[serde(default)]
    pub lookback_hours: Option<i64>,
}

/// A remote item as reported by the fetch adapter, before any store-side
/// deduplication.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub url: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Content embedded in the feed entry, when present. Items without it
    /// get their text from the content extractor at enrichment time.
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    New,
    Enriched,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::New => "new",
            ItemStatus::Enriched => "enriched",
            ItemStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "new" => Ok(ItemStatus::New),
            "enriched" => Ok(ItemStatus::Enriched),
            "failed" => Ok(ItemStatus::Failed),
            other => Err(NewsbriefError::Parse(format!("unknown item status: {other}"))),
        }
    }
}

/// A persisted article candidate, keyed by URL.
#[derive(Debug, Clone)]
pub struct Item {
    pub url: String,
    pub source_key: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub content: Option<String>,
    pub status: ItemStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Structured output of the single analysis call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub summary: String,
    pub key_concept: String,
    pub social_post: String,
    pub explanation: String,
}

/// Enrichment row, one-to-one with an `Enriched` item.
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub id: Uuid,
    pub item_url: String,
    pub summary: String,
    pub key_concept: String,
    pub social_post: String,
    pub explanation: String,
    pub model_id: String,
    pub prompt_version: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a create-if-absent insert. A uniqueness conflict is a normal
/// outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone)]
pub struct RenderedDigest {
    pub subject: String,
    pub body: String,
    pub item_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestOutcome {
    Delivered,
    /// The window held no enriched items; delivery was not attempted.
    Empty,
    Failed(String),
}

/// User-visible report for one full pass.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub sources_ok: usize,
    pub sources_failed: Vec<(String, String)>,
    pub items_created: usize,
    pub items_enriched: usize,
    pub items_failed: usize,
    pub digest: DigestOutcome,
}

impl RunSummary {
    /// True when every source and every item went through cleanly.
    pub fn is_clean(&self) -> bool {
        self.sources_failed.is_empty()
            && self.items_failed == 0
            && !matches!(self.digest, DigestOutcome::Failed(_))
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "run {}: sources ok={} failed={}, items created={} enriched={} failed={}, digest={:?}",
            self.run_id,
            self.sources_ok,
            self.sources_failed.len(),
            self.items_created,
            self.items_enriched,
            self.items_failed,
            self.digest
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NewsbriefError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Extraction failed for {url}: {reason}")]
    Extraction { url: String, reason: String },

    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("Analysis result rejected: {0}")]
    Validation(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NewsbriefError {
    /// Store unavailability poisons the whole run; everything else stays
    /// contained at its source or item boundary.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NewsbriefError::Database(_))
    }
}

pub type Result<T> = std::result::Result<T, NewsbriefError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_status_round_trips() {
        for status in [ItemStatus::New, ItemStatus::Enriched, ItemStatus::Failed] {
            assert_eq!(ItemStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(ItemStatus::parse("delivered").is_err());
    }

    #[test]
    fn clean_summary_requires_no_failures() {
        let summary = RunSummary {
            run_id: Uuid::new_v4(),
            sources_ok: 2,
            sources_failed: vec![],
            items_created: 3,
            items_enriched: 3,
            items_failed: 0,
            digest: DigestOutcome::Empty,
        };
        assert!(summary.is_clean());

        let mut partial = summary.clone();
        partial.sources_failed.push(("bad".into(), "timeout".into()));
        assert!(!partial.is_clean());

        let mut failed_delivery = summary;
        failed_delivery.digest = DigestOutcome::Failed("smtp down".into());
        assert!(!failed_delivery.is_clean());
    }
}
