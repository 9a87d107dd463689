//! AI adapter: the narrow `LlmClient` seam plus the OpenAI-compatible and mock providers.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::analyze::classifier::{parse_classification, ClassifyError, SYSTEM_PROMPT};
use crate::config::OpenAiConfig;
use crate::event::Classification;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

pub type ClassifyFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Classification, ClassifyError>> + Send + 'a>>;

/// One model call per post: text in, validated classification (or error) out.
pub trait LlmClient: Send + Sync {
    fn classify<'a>(&'a self, text: &'a str) -> ClassifyFuture<'a>;
    /// Provider name for logs and run reports.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynLlmClient = Arc<dyn LlmClient>;

// ------------------------------------------------------------
// OpenAI chat completions
// ------------------------------------------------------------

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: Option<String>,
}

pub struct OpenAiClient {
    http: reqwest::Client,
    cfg: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(cfg: OpenAiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("fin-event-explorer/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building llm http client")?;
        Ok(Self { http, cfg })
    }

    pub fn model(&self) -> &str {
        &self.cfg.model
    }

    async fn classify_impl(&self, text: &str) -> Result<Classification, ClassifyError> {
        let req = Req {
            model: &self.cfg.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT.as_str(),
                },
                Msg {
                    role: "user",
                    content: text,
                },
            ],
            temperature: self.cfg.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(self.cfg.completions_url())
            .bearer_auth(&self.cfg.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ClassifyError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClassifyError::Transport(format!("status {status}: {}", body.trim())));
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| ClassifyError::Transport(format!("decoding completion: {e}")))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(ClassifyError::Transport("completion without content".into()));
        }
        tracing::debug!(target: "classify", len = content.len(), "llm reply received");
        parse_classification(&content)
    }
}

impl LlmClient for OpenAiClient {
    fn classify<'a>(&'a self, text: &'a str) -> ClassifyFuture<'a> {
        Box::pin(self.classify_impl(text))
    }
    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Mock provider
// ------------------------------------------------------------

/// Replays scripted raw model replies in order, then repeats `fallback`.
/// Replies go through the same `parse_classification` as the real client.
pub struct MockClient {
    script: Mutex<VecDeque<String>>,
    fallback: String,
}

impl MockClient {
    /// Every call answers with the same raw reply.
    pub fn fixed(reply: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: reply.into(),
        }
    }

    /// Answer with `replies` one by one, then with a neutral "OTHER" reply.
    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fallback: r#"{"event_type":"OTHER","country_region":"Global","impact":"Low","explanation":"Neutral (mock)."}"#.to_string(),
        }
    }

    fn next_reply(&self) -> String {
        let mut g = self.script.lock().unwrap_or_else(|p| p.into_inner());
        g.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

impl LlmClient for MockClient {
    fn classify<'a>(&'a self, _text: &'a str) -> ClassifyFuture<'a> {
        let reply = self.next_reply();
        Box::pin(async move { parse_classification(&reply) })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Impact;

    #[tokio::test]
    async fn scripted_mock_replays_then_falls_back() {
        let client = MockClient::scripted([
            r#"{"event_type":"CRYPTO","country_region":"US","impact":"High","explanation":"ETF flows."}"#,
            "garbage",
        ]);
        let first = client.classify("a").await.unwrap();
        assert_eq!(first.impact, Impact::High);
        assert!(matches!(client.classify("b").await, Err(ClassifyError::Malformed(_))));
        let third = client.classify("c").await.unwrap();
        assert_eq!(third.explanation, "Neutral (mock).");
    }

    #[test]
    fn request_omits_temperature_when_unset() {
        let req = Req {
            model: "m",
            messages: vec![],
            temperature: None,
            response_format: ResponseFormat { kind: "json_object" },
        };
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("temperature").is_none());
        assert_eq!(v["response_format"]["type"], "json_object");
    }
}
