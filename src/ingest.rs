use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::extract::ContentExtractor;
use crate::fetch::Fetcher;
use crate::parser::parse_candidates;
use crate::registry::SourceRegistry;
use crate::store::Store;
use crate::types::{
    Candidate, InsertOutcome, Item, ItemStatus, Result, SourceConfig, SourceKind,
};

/// Type-polymorphic fetch adapter: turns one source's endpoint into a finite
/// sequence of candidates. No persistence, no store-side dedup.
#[async_trait]
pub trait FetchCandidates: Send + Sync {
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<Candidate>>;
}

/// Production adapter dispatching on the source kind.
pub struct SourceFetcher {
    fetcher: Fetcher,
    extractor: Arc<dyn ContentExtractor>,
}

impl SourceFetcher {
    pub fn new(fetcher: Fetcher, extractor: Arc<dyn ContentExtractor>) -> Self {
        Self { fetcher, extractor }
    }
}

#[async_trait]
impl FetchCandidates for SourceFetcher {
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<Candidate>> {
        match source.kind {
            SourceKind::Feed => {
                let document = self.fetcher.fetch_document(&source.endpoint).await?;
                parse_candidates(&document, &source.key)
            }
            SourceKind::PageList => {
                // The page itself is the item; its rendered text is captured
                // up front so enrichment needs no second fetch.
                let text = self.extractor.extract(&source.endpoint).await?;
                Ok(vec![Candidate {
                    url: source.endpoint.clone(),
                    title: source.name.clone(),
                    published_at: None,
                    content: Some(text),
                }])
            }
        }
    }
}

/// What one ingestion pass did, per source and overall.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub created: Vec<Item>,
    pub sources_ok: usize,
    pub sources_failed: Vec<(String, String)>,
}

/// Decides which remote candidates become persisted items: cold-start
/// bootstrap for sources with no history, recency filtering in steady state,
/// store-backed dedup for everything that survives.
pub struct Orchestrator<'a> {
    store: &'a Store,
    default_lookback_hours: i64,
    bootstrap_count: usize,
}

impl<'a> Orchestrator<'a> {
    pub fn new(store: &'a Store, default_lookback_hours: i64, bootstrap_count: usize) -> Self {
        Self {
            store,
            default_lookback_hours,
            bootstrap_count,
        }
    }

    /// Run ingestion for every source in registry order. A failing source is
    /// logged and skipped; store errors other than URL conflicts propagate.
    pub async fn ingest_all(
        &self,
        registry: &SourceRegistry,
        adapter: &dyn FetchCandidates,
        now: DateTime<Utc>,
    ) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for source in registry.sources() {
            match self.ingest_source(source, adapter, now).await {
                Ok(mut created) => {
                    info!(
                        source = %source.key,
                        created = created.len(),
                        "source ingested"
                    );
                    report.sources_ok += 1;
                    report.created.append(&mut created);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(source = %source.key, error = %e, "source failed, skipping");
                    report.sources_failed.push((source.key.clone(), e.to_string()));
                }
            }
        }

        Ok(report)
    }

    async fn ingest_source(
        &self,
        source: &SourceConfig,
        adapter: &dyn FetchCandidates,
        now: DateTime<Utc>,
    ) -> Result<Vec<Item>> {
        self.store.upsert_source(source, now).await?;

        let history = self.store.has_any_history(&source.key).await?;
        let mut candidates = adapter.fetch(source).await?;

        if history {
            let lookback = source.lookback_hours.unwrap_or(self.default_lookback_hours);
            let cutoff = now - Duration::hours(lookback);
            // Undated candidates cannot be excluded by recency, so they stay
            // in; the URL dedup below keeps them from re-ingesting forever.
            candidates.retain(|c| c.published_at.map_or(true, |t| t >= cutoff));
            debug!(
                source = %source.key,
                surviving = candidates.len(),
                lookback_hours = lookback,
                "steady-state window applied"
            );
        } else {
            // Cold start: take only the freshest few instead of the backlog.
            candidates.sort_by(|a, b| match (a.published_at, b.published_at) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
            candidates.truncate(self.bootstrap_count);
            debug!(
                source = %source.key,
                selected = candidates.len(),
                "cold start bootstrap applied"
            );
        }

        let mut created = Vec::new();
        for candidate in candidates {
            if self.store.item_exists(&candidate.url).await? {
                debug!(url = %candidate.url, "already persisted, skipping");
                continue;
            }

            match self.store.insert_item(&source.key, &candidate, now).await? {
                InsertOutcome::Created => {
                    info!(source = %source.key, url = %candidate.url, "new item");
                    created.push(Item {
                        url: candidate.url,
                        source_key: source.key.clone(),
                        title: candidate.title,
                        published_at: candidate.published_at,
                        content: candidate.content,
                        status: ItemStatus::New,
                        failure_reason: None,
                        created_at: now,
                        delivered_at: None,
                    });
                }
                InsertOutcome::AlreadyExists => {
                    // Lost a race with a concurrent run; the constraint is
                    // the authority, so this is not an error.
                    debug!(url = %candidate.url, "insert collided, treating as existing");
                }
            }
        }

        Ok(created)
    }
}
