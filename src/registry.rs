use std::collections::HashSet;
use std::path::Path;

use url::Url;

use crate::types::{NewsbriefError, Result, SourceConfig, SourceKind};

/// The set of sources one pass covers. An explicit value handed to the
/// orchestrator, built once per invocation.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<SourceConfig>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<SourceConfig>) -> Result<Self> {
        let mut keys = HashSet::new();
        for source in &sources {
            if !keys.insert(source.key.clone()) {
                return Err(NewsbriefError::Config(format!(
                    "duplicate source key: {}",
                    source.key
                )));
            }
            Url::parse(&source.endpoint)?;
        }
        Ok(Self { sources })
    }

    /// Load the registry from a JSON array of source configs.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            NewsbriefError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let sources: Vec<SourceConfig> = serde_json::from_str(&raw)
            .map_err(|e| NewsbriefError::Config(format!("invalid sources file: {e}")))?;
        Self::new(sources)
    }

    /// Default feed set for runs without a sources file.
    pub fn builtin() -> Self {
        let sources = vec![
            feed(
                "anthropic-engineering",
                "Anthropic Engineering",
                "https://raw.githubusercontent.com/Olshansk/rss-feeds/main/feeds/feed_anthropic_engineering.xml",
            ),
            feed(
                "anthropic-research",
                "Anthropic Research",
                "https://raw.githubusercontent.com/Olshansk/rss-feeds/main/feeds/feed_anthropic_research.xml",
            ),
            feed(
                "ars-technica",
                "Ars Technica",
                "https://feeds.arstechnica.com/arstechnica/index",
            ),
            feed(
                "surge-ai",
                "Surge AI Blog",
                "https://raw.githubusercontent.com/Olshansk/rss-feeds/main/feeds/feed_blogsurgeai.xml",
            ),
        ];
        // Built-in keys and endpoints are fixed and valid.
        Self::new(sources).expect("builtin registry is valid")
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

fn feed(key: &str, name: &str, endpoint: &str) -> SourceConfig {
    SourceConfig {
        key: key.to_string(),
        name: name.to_string(),
        kind: SourceKind::Feed,
        endpoint: endpoint.to_string(),
        lookback_hours: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_is_nonempty() {
        let registry = SourceRegistry::builtin();
        assert!(!registry.is_empty());
    }

    #[test]
    fn duplicate_keys_rejected() {
        let sources = vec![
            feed("a", "A", "https://example.com/feed.xml"),
            feed("a", "A again", "https://example.com/other.xml"),
        ];
        let err = SourceRegistry::new(sources).unwrap_err();
        assert!(matches!(err, NewsbriefError::Config(_)));
    }

    #[test]
    fn invalid_endpoint_rejected() {
        let sources = vec![feed("a", "A", "not a url")];
        assert!(SourceRegistry::new(sources).is_err());
    }

    #[test]
    fn parses_json_source_list() {
        let raw = r#"[
            {"key": "blog", "name": "Blog", "kind": "feed", "endpoint": "https://example.com/feed.xml"},
            {"key": "page", "name": "Page", "kind": "page-list", "endpoint": "https://example.com/news", "lookback_hours": 72}
        ]"#;
        let sources: Vec<SourceConfig> = serde_json::from_str(raw).unwrap();
        let registry = SourceRegistry::new(sources).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.sources()[1].kind, SourceKind::PageList);
        assert_eq!(registry.sources()[1].lookback_hours, Some(72));
    }
}
