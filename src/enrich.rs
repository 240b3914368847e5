use chrono::Utc;
use tracing::{debug, info, warn};

use crate::extract::ContentExtractor;
use crate::llm::{self, Analyzer};
use crate::store::Store;
use crate::types::{Item, ItemStatus, NewsbriefError, Result};

#[derive(Debug, Default, Clone, Copy)]
pub struct EnrichReport {
    pub enriched: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Idempotent per-item enrichment: at most one analysis call per item, ever.
/// A failed extraction or analysis marks the item failed and moves on; only
/// store errors abort the run.
pub struct EnrichmentPipeline<'a> {
    store: &'a Store,
    analyzer: &'a dyn Analyzer,
    extractor: &'a dyn ContentExtractor,
    social_post_max_chars: usize,
    analysis_char_budget: usize,
}

impl<'a> EnrichmentPipeline<'a> {
    pub fn new(
        store: &'a Store,
        analyzer: &'a dyn Analyzer,
        extractor: &'a dyn ContentExtractor,
        social_post_max_chars: usize,
        analysis_char_budget: usize,
    ) -> Self {
        Self {
            store,
            analyzer,
            extractor,
            social_post_max_chars,
            analysis_char_budget,
        }
    }

    pub async fn enrich_all(&self, items: &[Item]) -> Result<EnrichReport> {
        let mut report = EnrichReport::default();

        for item in items {
            match self.enrich_one(item).await {
                Ok(ItemResult::Enriched) => report.enriched += 1,
                Ok(ItemResult::Failed) => report.failed += 1,
                Ok(ItemResult::Skipped) => report.skipped += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    // Anything non-fatal was supposed to be recorded against
                    // the item already; keep the run going regardless.
                    warn!(url = %item.url, error = %e, "item enrichment errored");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn enrich_one(&self, item: &Item) -> Result<ItemResult> {
        // Idempotence gate: the store's current state decides, not the
        // in-memory copy. Anything past `new` never reaches a collaborator.
        match self.store.item_status(&item.url).await? {
            Some(ItemStatus::New) => {}
            Some(_) => {
                debug!(url = %item.url, "already processed, skipping");
                return Ok(ItemResult::Skipped);
            }
            None => {
                debug!(url = %item.url, "item vanished from store, skipping");
                return Ok(ItemResult::Skipped);
            }
        }

        let text = match self.source_text(item).await {
            Ok(text) => text,
            Err(e) => {
                warn!(url = %item.url, error = %e, "content extraction failed");
                self.store.mark_failed(&item.url, &e.to_string()).await?;
                return Ok(ItemResult::Failed);
            }
        };

        let budgeted: String = text.chars().take(self.analysis_char_budget).collect();

        // The one analysis call this item will ever get.
        let analysis = match self.analyzer.analyze(&budgeted).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(url = %item.url, error = %e, "analysis failed");
                self.store.mark_failed(&item.url, &e.to_string()).await?;
                return Ok(ItemResult::Failed);
            }
        };

        if let Err(e) = llm::validate(&analysis, self.social_post_max_chars) {
            warn!(url = %item.url, error = %e, "analysis result rejected");
            self.store.mark_failed(&item.url, &e.to_string()).await?;
            return Ok(ItemResult::Failed);
        }

        let wrote = self
            .store
            .record_enrichment(
                &item.url,
                &analysis,
                &self.analyzer.model_id(),
                llm::PROMPT_VERSION,
                Utc::now(),
            )
            .await?;

        if wrote {
            info!(url = %item.url, "item enriched");
            Ok(ItemResult::Enriched)
        } else {
            debug!(url = %item.url, "state moved under us, nothing written");
            Ok(ItemResult::Skipped)
        }
    }

    async fn source_text(&self, item: &Item) -> Result<String> {
        if let Some(content) = item.content.as_deref() {
            let trimmed = content.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }
        let text = self.extractor.extract(&item.url).await?;
        if text.trim().is_empty() {
            return Err(NewsbriefError::Extraction {
                url: item.url.clone(),
                reason: "extractor returned empty text".to_string(),
            });
        }
        Ok(text)
    }
}

enum ItemResult {
    Enriched,
    Failed,
    Skipped,
}
