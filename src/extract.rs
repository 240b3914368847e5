use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::fetch::Fetcher;
use crate::types::{NewsbriefError, Result};

/// Content-extraction collaborator: URL in, plain text out. Failure carries
/// a reason and marks the owning item failed at the pipeline boundary.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String>;
}

/// Default extractor: fetch the page and reduce the HTML to readable text.
#[derive(Clone)]
pub struct HtmlExtractor {
    fetcher: Fetcher,
}

impl HtmlExtractor {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl ContentExtractor for HtmlExtractor {
    async fn extract(&self, url: &str) -> Result<String> {
        let html = self
            .fetcher
            .fetch_document(url)
            .await
            .map_err(|e| NewsbriefError::Extraction {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let text = html_to_text(&html);
        if text.is_empty() {
            return Err(NewsbriefError::Extraction {
                url: url.to_string(),
                reason: "no text content after stripping markup".to_string(),
            });
        }

        debug!(url, chars = text.len(), "extracted page text");
        Ok(text)
    }
}

fn script_style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>")
            .expect("valid regex")
    })
}

fn block_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</p>|</div>|</h[1-6]>|<br\s*/?>").expect("valid regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]+>").expect("valid regex"))
}

/// Best-effort HTML-to-text: strip scripts and styles, keep block boundaries
/// as newlines, drop the remaining tags, decode entities, tidy whitespace.
pub fn html_to_text(html: &str) -> String {
    let without_scripts = script_style_re().replace_all(html, " ");
    let with_breaks = block_break_re().replace_all(&without_scripts, "\n");
    let stripped = tag_re().replace_all(&with_breaks, " ");
    let decoded = html_escape::decode_html_entities(&stripped);

    decoded
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
