use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use newsbrief::{
    Candidate, FetchCandidates, NewsbriefError, Orchestrator, SourceConfig, SourceKind,
    SourceRegistry, Store,
};

/// Canned fetch adapter: per-source candidate lists, plus a set of sources
/// that fail on fetch.
struct StaticAdapter {
    candidates: HashMap<String, Vec<Candidate>>,
    failing: HashSet<String>,
}

impl StaticAdapter {
    fn new() -> Self {
        Self {
            candidates: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    fn with_candidates(mut self, key: &str, candidates: Vec<Candidate>) -> Self {
        self.candidates.insert(key.to_string(), candidates);
        self
    }

    fn with_failure(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }
}

#[async_trait]
impl FetchCandidates for StaticAdapter {
    async fn fetch(&self, source: &SourceConfig) -> newsbrief::Result<Vec<Candidate>> {
        if self.failing.contains(&source.key) {
            return Err(NewsbriefError::Parse(format!(
                "{}: synthetic fetch failure",
                source.key
            )));
        }
        Ok(self
            .candidates
            .get(&source.key)
            .cloned()
            .unwrap_or_default())
    }
}

fn feed_source(key: &str) -> SourceConfig {
    SourceConfig {
        key: key.to_string(),
        name: key.to_string(),
        kind: SourceKind::Feed,
        endpoint: format!("https://example.com/{key}.xml"),
        lookback_hours: None,
    }
}

fn candidate(url: &str, published_at: Option<DateTime<Utc>>) -> Candidate {
    Candidate {
        url: url.to_string(),
        title: format!("Article at {url}"),
        published_at,
        content: Some("embedded article body".to_string()),
    }
}

async fn memory_store() -> Store {
    let store = Store::connect("sqlite::memory:").await.unwrap();
    store.init().await.unwrap();
    store
}

fn registry(keys: &[&str]) -> SourceRegistry {
    SourceRegistry::new(keys.iter().map(|k| feed_source(k)).collect()).unwrap()
}

#[tokio::test]
async fn cold_start_takes_the_freshest_bootstrap_count() {
    let store = memory_store().await;
    let now = Utc::now();

    // Five candidates, newest first expected to win.
    let candidates: Vec<Candidate> = (1..=5)
        .map(|i| {
            candidate(
                &format!("https://example.com/a{i}"),
                Some(now - Duration::hours(i)),
            )
        })
        .collect();
    let adapter = StaticAdapter::new().with_candidates("blog", candidates);

    let orchestrator = Orchestrator::new(&store, 48, 2);
    let report = orchestrator
        .ingest_all(&registry(&["blog"]), &adapter, now)
        .await
        .unwrap();

    let urls: Vec<&str> = report.created.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(urls, vec!["https://example.com/a1", "https://example.com/a2"]);
    assert_eq!(store.count_items().await.unwrap(), 2);
}

#[tokio::test]
async fn cold_start_sorts_undated_candidates_last() {
    let store = memory_store().await;
    let now = Utc::now();

    let candidates = vec![
        candidate("https://example.com/undated", None),
        candidate("https://example.com/older", Some(now - Duration::hours(30))),
        candidate("https://example.com/newer", Some(now - Duration::hours(2))),
    ];
    let adapter = StaticAdapter::new().with_candidates("blog", candidates);

    let orchestrator = Orchestrator::new(&store, 48, 2);
    let report = orchestrator
        .ingest_all(&registry(&["blog"]), &adapter, now)
        .await
        .unwrap();

    let urls: Vec<&str> = report.created.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(
        urls,
        vec!["https://example.com/newer", "https://example.com/older"]
    );
}

#[tokio::test]
async fn steady_state_filters_by_lookback_but_keeps_undated() {
    let store = memory_store().await;
    let now = Utc::now();

    // Seed history so the source is past its cold start.
    store.upsert_source(&feed_source("blog"), now).await.unwrap();
    store
        .insert_item(
            "blog",
            &candidate("https://example.com/seed", Some(now - Duration::days(10))),
            now,
        )
        .await
        .unwrap();

    let candidates = vec![
        candidate("https://example.com/fresh", Some(now - Duration::hours(10))),
        candidate("https://example.com/stale", Some(now - Duration::hours(60))),
        candidate("https://example.com/undated", None),
    ];
    let adapter = StaticAdapter::new().with_candidates("blog", candidates);

    let orchestrator = Orchestrator::new(&store, 48, 2);
    let report = orchestrator
        .ingest_all(&registry(&["blog"]), &adapter, now)
        .await
        .unwrap();

    let urls: Vec<&str> = report.created.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(
        urls,
        vec!["https://example.com/fresh", "https://example.com/undated"]
    );
}

#[tokio::test]
async fn per_source_lookback_overrides_the_default() {
    let store = memory_store().await;
    let now = Utc::now();

    let mut source = feed_source("blog");
    source.lookback_hours = Some(72);
    store.upsert_source(&source, now).await.unwrap();
    store
        .insert_item(
            "blog",
            &candidate("https://example.com/seed", Some(now - Duration::days(10))),
            now,
        )
        .await
        .unwrap();

    let adapter = StaticAdapter::new().with_candidates(
        "blog",
        vec![candidate(
            "https://example.com/sixty-hours-old",
            Some(now - Duration::hours(60)),
        )],
    );

    let orchestrator = Orchestrator::new(&store, 48, 2);
    let report = orchestrator
        .ingest_all(
            &SourceRegistry::new(vec![source]).unwrap(),
            &adapter,
            now,
        )
        .await
        .unwrap();

    assert_eq!(report.created.len(), 1);
}

#[tokio::test]
async fn repeated_ingestion_never_duplicates_urls() {
    let store = memory_store().await;
    let now = Utc::now();

    let candidates = vec![
        candidate("https://example.com/a", Some(now - Duration::hours(1))),
        candidate("https://example.com/b", Some(now - Duration::hours(2))),
    ];
    let adapter = StaticAdapter::new().with_candidates("blog", candidates);
    let reg = registry(&["blog"]);

    let orchestrator = Orchestrator::new(&store, 48, 2);
    let first = orchestrator.ingest_all(&reg, &adapter, now).await.unwrap();
    let second = orchestrator.ingest_all(&reg, &adapter, now).await.unwrap();

    assert_eq!(first.created.len(), 2);
    assert_eq!(second.created.len(), 0);
    assert_eq!(store.count_items().await.unwrap(), 2);
}

#[tokio::test]
async fn one_failing_source_does_not_block_the_others() {
    let store = memory_store().await;
    let now = Utc::now();

    let adapter = StaticAdapter::new()
        .with_failure("broken")
        .with_candidates(
            "healthy",
            vec![candidate("https://example.com/ok", Some(now - Duration::hours(1)))],
        );

    let orchestrator = Orchestrator::new(&store, 48, 2);
    let report = orchestrator
        .ingest_all(&registry(&["broken", "healthy"]), &adapter, now)
        .await
        .unwrap();

    assert_eq!(report.sources_ok, 1);
    assert_eq!(report.sources_failed.len(), 1);
    assert_eq!(report.sources_failed[0].0, "broken");
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].url, "https://example.com/ok");
}

#[tokio::test]
async fn created_items_follow_registry_then_discovery_order() {
    let store = memory_store().await;
    let now = Utc::now();

    let adapter = StaticAdapter::new()
        .with_candidates(
            "second",
            vec![candidate("https://example.com/s1", Some(now - Duration::hours(1)))],
        )
        .with_candidates(
            "first",
            vec![
                candidate("https://example.com/f1", Some(now - Duration::hours(1))),
                candidate("https://example.com/f2", Some(now - Duration::hours(2))),
            ],
        );

    let orchestrator = Orchestrator::new(&store, 48, 5);
    let report = orchestrator
        .ingest_all(&registry(&["first", "second"]), &adapter, now)
        .await
        .unwrap();

    let urls: Vec<&str> = report.created.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://example.com/f1",
            "https://example.com/f2",
            "https://example.com/s1"
        ]
    );
}
