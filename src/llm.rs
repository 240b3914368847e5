use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::types::{Analysis, NewsbriefError, Result};

/// Prompt revision recorded next to every enrichment row.
pub const PROMPT_VERSION: &str = "v1";

const SYSTEM_PROMPT: &str = "You are an expert content analyzer and writer. \
Your task is to analyze articles and create engaging content for different audiences. \
Be concise, accurate, and compelling in all your outputs.";

/// Analysis collaborator: one structured call per item, no retries.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<Analysis>;
    /// Identifier persisted with each result for provenance.
    fn model_id(&self) -> String;
}

/// Reject analysis output that would produce an unusable digest entry: every
/// field populated, and the social post within its length ceiling.
pub fn validate(analysis: &Analysis, social_post_max_chars: usize) -> Result<()> {
    let fields = [
        ("summary", &analysis.summary),
        ("key_concept", &analysis.key_concept),
        ("social_post", &analysis.social_post),
        ("explanation", &analysis.explanation),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(NewsbriefError::Validation(format!("empty field: {name}")));
        }
    }

    let post_len = analysis.social_post.chars().count();
    if post_len > social_post_max_chars {
        return Err(NewsbriefError::Validation(format!(
            "social post is {post_len} chars, ceiling is {social_post_max_chars}"
        )));
    }

    Ok(())
}

/// OpenAI chat-completions client using structured JSON output.
pub struct OpenAiAnalyzer {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl OpenAiAnalyzer {
    pub fn new(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }

    fn response_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "Concise 2-3 sentence summary of the article suitable for digest emails"
                },
                "key_concept": {
                    "type": "string",
                    "description": "The single most important idea from the article in one clear sentence"
                },
                "social_post": {
                    "type": "string",
                    "description": "Punchy social post under 260 characters highlighting 1-2 key points, third-person perspective, no link, at most one emoji"
                },
                "explanation": {
                    "type": "string",
                    "description": "Plain-language explanation for non-technical readers, ending with a short analogy mapping the concepts to everyday situations"
                }
            },
            "required": ["summary", "key_concept", "social_post", "explanation"],
            "additionalProperties": false
        })
    }
}

#[async_trait]
impl Analyzer for OpenAiAnalyzer {
    async fn analyze(&self, text: &str) -> Result<Analysis> {
        debug!(model = %self.model, chars = text.len(), "requesting article analysis");

        let payload = json!({
            "model": &self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": format!("Analyze this article comprehensively:\n\n{text}") }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "article_analysis",
                    "strict": true,
                    "schema": Self::response_schema()
                }
            }
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NewsbriefError::Analysis(e.to_string()))?
            .error_for_status()
            .map_err(|e| NewsbriefError::Analysis(e.to_string()))?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| NewsbriefError::Analysis(format!("bad response body: {e}")))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| NewsbriefError::Analysis("response held no choices".to_string()))?;

        serde_json::from_str(content)
            .map_err(|e| NewsbriefError::Analysis(format!("unparseable structured output: {e}")))
    }

    fn model_id(&self) -> String {
        self.model.clone()
    }
}

/// No-API-key fallback: derives all four fields from truncated source text so
/// a local run still produces a digest.
pub struct OfflineAnalyzer {
    social_post_max_chars: usize,
}

impl OfflineAnalyzer {
    pub fn new(social_post_max_chars: usize) -> Self {
        Self {
            social_post_max_chars,
        }
    }
}

#[async_trait]
impl Analyzer for OfflineAnalyzer {
    async fn analyze(&self, text: &str) -> Result<Analysis> {
        let truncated: String = text.chars().take(400).collect();
        let truncated = truncated.trim().to_string();
        if truncated.is_empty() {
            return Err(NewsbriefError::Analysis("no text to fall back on".to_string()));
        }

        let social_post: String = text
            .chars()
            .take(self.social_post_max_chars)
            .collect::<String>()
            .trim()
            .to_string();

        Ok(Analysis {
            summary: truncated.clone(),
            key_concept: "No analysis model configured".to_string(),
            social_post,
            explanation: truncated,
        })
    }

    fn model_id(&self) -> String {
        "offline-fallback".to_string()
    }
}

/// Scripted analyzer for tests: fixed outcome plus a call counter, so tests
/// can assert the one-call-per-item budget.
pub struct MockAnalyzer {
    outcome: std::result::Result<Analysis, String>,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockAnalyzer {
    pub fn succeeding(analysis: Analysis) -> Self {
        Self {
            outcome: Ok(analysis),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: Err(reason.to_string()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    async fn analyze(&self, _text: &str) -> Result<Analysis> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match &self.outcome {
            Ok(analysis) => Ok(analysis.clone()),
            Err(reason) => Err(NewsbriefError::Analysis(reason.clone())),
        }
    }

    fn model_id(&self) -> String {
        "mock-model".to_string()
    }
}
