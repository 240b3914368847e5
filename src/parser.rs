use std::collections::HashSet;

use chrono::Utc;
use feed_rs::parser;
use tracing::{debug, warn};

use crate::types::{Candidate, NewsbriefError, Result};

/// Parse an RSS/Atom document into candidate items.
///
/// Entries without a recoverable URL are dropped with a warning rather than
/// failing the whole feed, and within-document URL duplicates collapse to the
/// first occurrence. No persistence and no store-side dedup happens here.
pub fn parse_candidates(content: &str, source_key: &str) -> Result<Vec<Candidate>> {
    let feed = parser::parse(content.as_bytes())
        .map_err(|e| NewsbriefError::Parse(format!("{source_key}: {e}")))?;

    let mut seen_urls = HashSet::new();
    let mut candidates = Vec::new();

    for entry in feed.entries {
        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.clone())
            .unwrap_or_else(|| "Untitled".to_string());

        let Some(url) = entry.links.first().map(|l| l.href.clone()) else {
            warn!(source_key, title = %title, "dropping feed entry without a link");
            continue;
        };

        if !seen_urls.insert(url.clone()) {
            debug!(source_key, url = %url, "skipping duplicate entry within feed");
            continue;
        }

        // Publication timestamp, falling back to the update timestamp when
        // the feed only carries the latter.
        let published_at = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc));

        let content = match &entry.content {
            Some(content) => content.body.clone(),
            None => entry.summary.as_ref().map(|s| s.content.clone()),
        };

        candidates.push(Candidate {
            url,
            title,
            published_at,
            content,
        });
    }

    debug!(source_key, count = candidates.len(), "parsed feed");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_FIXTURE: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Example Blog</title>
    <item>
      <title>First post</title>
      <link>https://example.com/first</link>
      <pubDate>Mon, 17 Aug 2026 09:00:00 GMT</pubDate>
      <description>Short teaser for the first post.</description>
    </item>
    <item>
      <title>Entry with no link</title>
      <description>Should be dropped, not fail the feed.</description>
    </item>
    <item>
      <title>First post again</title>
      <link>https://example.com/first</link>
    </item>
    <item>
      <title>Undated post</title>
      <link>https://example.com/undated</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn drops_linkless_entries_and_dedups_urls() {
        let candidates = parse_candidates(RSS_FIXTURE, "example").unwrap();
        let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://example.com/first", "https://example.com/undated"]
        );
    }

    #[test]
    fn captures_timestamps_and_embedded_content() {
        let candidates = parse_candidates(RSS_FIXTURE, "example").unwrap();
        let first = &candidates[0];
        assert_eq!(first.title, "First post");
        assert!(first.published_at.is_some());
        assert_eq!(
            first.content.as_deref(),
            Some("Short teaser for the first post.")
        );

        let undated = &candidates[1];
        assert!(undated.published_at.is_none());
    }

    #[test]
    fn atom_updated_stands_in_for_published() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <id>urn:example:feed</id>
  <updated>2026-08-20T12:00:00Z</updated>
  <entry>
    <title>Atom entry</title>
    <id>urn:example:entry1</id>
    <link href="https://example.com/atom-entry"/>
    <updated>2026-08-20T12:00:00Z</updated>
  </entry>
</feed>"#;
        let candidates = parse_candidates(atom, "atom").unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].published_at.is_some());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(parse_candidates("not xml at all", "junk").is_err());
    }
}
