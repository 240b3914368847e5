use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::store::Store;
use crate::types::{Enrichment, Item, RenderedDigest, Result};

/// Queries enriched items in a delivery window and renders them into one
/// plain-text digest. An empty window is a `None`, distinct from any
/// delivery failure; the caller decides whether anything gets sent.
pub struct DigestAssembler<'a> {
    store: &'a Store,
}

impl<'a> DigestAssembler<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub async fn assemble(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        max_items: usize,
    ) -> Result<Option<RenderedDigest>> {
        let rows = self
            .store
            .enriched_in_window(window_start, window_end, max_items)
            .await?;

        if rows.is_empty() {
            debug!("no enriched items in window, digest is empty");
            return Ok(None);
        }

        info!(items = rows.len(), "assembling digest");
        Ok(Some(render(&rows, window_end)))
    }
}

fn render(rows: &[(Item, Enrichment)], window_end: DateTime<Utc>) -> RenderedDigest {
    let subject = format!(
        "Daily brief: {} article{} ({})",
        rows.len(),
        if rows.len() == 1 { "" } else { "s" },
        window_end.format("%Y-%m-%d")
    );

    let mut body = String::new();
    for (item, enrichment) in rows {
        let published = item
            .published_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown".to_string());

        body.push_str(&format!(
            "## {}\n{}\n\n{}\n\n{}\n\nPublished: {}\n\n---\n\n",
            item.title, item.url, enrichment.social_post, enrichment.explanation, published
        ));
    }

    RenderedDigest {
        subject,
        body,
        item_urls: rows.iter().map(|(item, _)| item.url.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemStatus;
    use uuid::Uuid;

    fn row(title: &str, url: &str) -> (Item, Enrichment) {
        let now = Utc::now();
        (
            Item {
                url: url.into(),
                source_key: "src".into(),
                title: title.into(),
                published_at: Some(now),
                content: None,
                status: ItemStatus::Enriched,
                failure_reason: None,
                created_at: now,
                delivered_at: None,
            },
            Enrichment {
                id: Uuid::new_v4(),
                item_url: url.into(),
                summary: "summary".into(),
                key_concept: "concept".into(),
                social_post: "post text".into(),
                explanation: "explained".into(),
                model_id: "test-model".into(),
                prompt_version: "v1".into(),
                created_at: now,
            },
        )
    }

    #[test]
    fn renders_every_item_with_link_and_post() {
        let rows = vec![
            row("First", "https://example.com/1"),
            row("Second", "https://example.com/2"),
        ];
        let digest = render(&rows, Utc::now());

        assert!(digest.subject.contains("2 articles"));
        assert!(digest.body.contains("## First"));
        assert!(digest.body.contains("https://example.com/2"));
        assert!(digest.body.contains("post text"));
        assert_eq!(digest.item_urls.len(), 2);
    }

    #[test]
    fn singular_subject_for_one_item() {
        let rows = vec![row("Only", "https://example.com/only")];
        let digest = render(&rows, Utc::now());
        assert!(digest.subject.contains("1 article ("));
    }
}
