use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::delivery::{Deliver, SendGridMailer, StdoutDelivery};
use crate::digest::DigestAssembler;
use crate::enrich::EnrichmentPipeline;
use crate::extract::HtmlExtractor;
use crate::fetch::Fetcher;
use crate::ingest::{Orchestrator, SourceFetcher};
use crate::llm::{Analyzer, OfflineAnalyzer, OpenAiAnalyzer};
use crate::registry::SourceRegistry;
use crate::store::Store;
use crate::types::{DigestOutcome, Result, RunSummary};

/// One full pass: ingest every source, enrich whatever is new, assemble and
/// deliver the digest. Sequential and run-to-completion; an unreachable
/// store is the only fatal outcome.
pub async fn run_once(
    config: &Config,
    registry: &SourceRegistry,
    force_stdout: bool,
) -> Result<RunSummary> {
    let run_id = Uuid::new_v4();
    let now = Utc::now();
    info!(%run_id, sources = registry.len(), "starting pass");

    let store = Store::connect(&config.database_url).await?;
    store.init().await?;

    let fetcher = Fetcher::new(config.http_timeout_secs, &config.user_agent);
    let extractor = Arc::new(HtmlExtractor::new(fetcher.clone()));
    let adapter = SourceFetcher::new(fetcher, extractor.clone());

    let orchestrator = Orchestrator::new(&store, config.lookback_hours, config.bootstrap_count);
    let ingest = orchestrator.ingest_all(registry, &adapter, now).await?;
    info!(
        created = ingest.created.len(),
        sources_ok = ingest.sources_ok,
        sources_failed = ingest.sources_failed.len(),
        "ingestion finished"
    );

    let analyzer = build_analyzer(config);
    let pipeline = EnrichmentPipeline::new(
        &store,
        analyzer.as_ref(),
        extractor.as_ref(),
        config.social_post_max_chars,
        config.analysis_char_budget,
    );
    let enrich = pipeline.enrich_all(&ingest.created).await?;
    info!(
        enriched = enrich.enriched,
        failed = enrich.failed,
        skipped = enrich.skipped,
        "enrichment finished"
    );

    let window_start = now - Duration::hours(config.digest_window_hours);
    let assembler = DigestAssembler::new(&store);
    let digest_outcome = match assembler
        .assemble(window_start, Utc::now(), config.max_digest_items)
        .await?
    {
        None => {
            info!("digest window empty, nothing to deliver");
            DigestOutcome::Empty
        }
        Some(digest) => {
            let deliverer = build_deliverer(config, force_stdout);
            info!(via = deliverer.name(), "delivering digest");
            match deliverer.deliver(&digest).await {
                Ok(()) => {
                    store.mark_delivered(&digest.item_urls, Utc::now()).await?;
                    DigestOutcome::Delivered
                }
                Err(e) => {
                    error!(error = %e, "digest delivery failed");
                    DigestOutcome::Failed(e.to_string())
                }
            }
        }
    };

    let summary = RunSummary {
        run_id,
        sources_ok: ingest.sources_ok,
        sources_failed: ingest.sources_failed,
        items_created: ingest.created.len(),
        items_enriched: enrich.enriched,
        items_failed: enrich.failed,
        digest: digest_outcome,
    };
    info!(%summary, "pass complete");
    Ok(summary)
}

fn build_analyzer(config: &Config) -> Box<dyn Analyzer> {
    match &config.openai_api_key {
        Some(key) => Box::new(OpenAiAnalyzer::new(
            reqwest::Client::new(),
            key.clone(),
            config.openai_model.clone(),
        )),
        None => {
            warn!("OPENAI_API_KEY not set, using offline fallback analyzer");
            Box::new(OfflineAnalyzer::new(config.social_post_max_chars))
        }
    }
}

fn build_deliverer(config: &Config, force_stdout: bool) -> Box<dyn Deliver> {
    if !force_stdout && config.email_configured() {
        // email_configured guarantees all three values.
        let api_key = config.sendgrid_api_key.clone().unwrap_or_default();
        let sender = config.sender_email.clone().unwrap_or_default();
        let recipient = config.recipient_email.clone().unwrap_or_default();
        Box::new(SendGridMailer::new(
            reqwest::Client::new(),
            api_key,
            sender,
            recipient,
        ))
    } else {
        Box::new(StdoutDelivery)
    }
}
