// src/summarize.rs
//! Summarization delegate: provider abstraction over the LLM API.
//!
//! Adapters hand fetched content to `summarize(text, hint)` and get back
//! `{summary, tags, sentiment}`. The remote call is opaque to the rest of
//! the pipeline; failures surface as adapter-level errors on the item.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Market read attached to each summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Bullish => "bullish",
            Sentiment::Bearish => "bearish",
            Sentiment::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthHint {
    Brief,
    Standard,
    Detailed,
}

impl LengthHint {
    fn instruction(&self) -> &'static str {
        match self {
            LengthHint::Brief => "two sentences at most",
            LengthHint::Standard => "one short paragraph",
            LengthHint::Detailed => "three paragraphs with the key numbers",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "neutral")]
    pub sentiment: Sentiment,
}

fn neutral() -> Sentiment {
    Sentiment::Neutral
}

#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, hint: LengthHint) -> Result<Summary>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type SharedSummarizer = Arc<dyn Summarizer>;

/// Factory honoring environment overrides:
/// * `SUMMARIZER=mock` -> deterministic mock (tests/local runs)
/// * `OPENAI_API_KEY` set -> OpenAI provider
/// * otherwise -> disabled (summarizing adapters report "not configured")
pub fn build_summarizer() -> SharedSummarizer {
    if std::env::var("SUMMARIZER")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockSummarizer::default());
    }
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Arc::new(OpenAiSummarizer::new(key, None)),
        _ => Arc::new(DisabledSummarizer),
    }
}

// ------------------------------------------------------------
// OpenAI provider
// ------------------------------------------------------------

pub struct OpenAiSummarizer {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiSummarizer {
    pub fn new(api_key: String, model_override: Option<&str>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("market-minds/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key,
            model: model_override.unwrap_or("gpt-4o-mini").to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, text: &str, hint: LengthHint) -> Result<Summary> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let sys = format!(
            "You summarize market research content for an investor dashboard. \
             Respond with strict JSON: {{\"summary\": string ({}), \
             \"tags\": up to 5 short lowercase topic strings, \
             \"sentiment\": one of \"bullish\"|\"bearish\"|\"neutral\"}}. \
             Output only the JSON object.",
            hint.instruction()
        );
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &sys,
                },
                Msg {
                    role: "user",
                    content: text,
                },
            ],
            temperature: 0.2,
            max_tokens: 700,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("summarize request")?;
        if !resp.status().is_success() {
            return Err(anyhow!("summarize failed: HTTP {}", resp.status()));
        }
        let body: Resp = resp.json().await.context("summarize response json")?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or("");
        parse_summary_json(content)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Model output occasionally wraps the JSON in a code fence; strip before parse.
fn parse_summary_json(content: &str) -> Result<Summary> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let parsed: Summary = serde_json::from_str(trimmed)
        .with_context(|| format!("unexpected summarizer output: {}", &trimmed.chars().take(120).collect::<String>()))?;
    if parsed.summary.trim().is_empty() {
        return Err(anyhow!("summarizer returned an empty summary"));
    }
    Ok(parsed)
}

// ------------------------------------------------------------
// Disabled + mock clients
// ------------------------------------------------------------

/// Used when no provider is configured; summarizing adapters turn this into
/// a recoverable "not configured" item error.
pub struct DisabledSummarizer;

#[async_trait::async_trait]
impl Summarizer for DisabledSummarizer {
    async fn summarize(&self, _text: &str, _hint: LengthHint) -> Result<Summary> {
        Err(anyhow!("summarizer not configured"))
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

#[derive(Clone)]
pub struct MockSummarizer {
    pub fixed: Summary,
}

impl Default for MockSummarizer {
    fn default() -> Self {
        Self {
            fixed: Summary {
                summary: "Mock summary.".to_string(),
                tags: vec!["mock".to_string()],
                sentiment: Sentiment::Neutral,
            },
        }
    }
}

#[async_trait::async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, _text: &str, _hint: LengthHint) -> Result<Summary> {
        Ok(self.fixed.clone())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
