//! X API v2 timeline source.
//!
//! Resolve the handle to a user id once, then page through
//! `/users/{id}/tweets` with retweets and replies excluded server-side. Posts
//! that still reference a retweeted/replied-to post are dropped client-side.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::XApiConfig;
use crate::event::RawTweet;
use crate::ingest::types::TweetSource;

/// The timeline endpoint accepts `max_results` in this range only.
const API_MIN_RESULTS: usize = 5;
const API_MAX_RESULTS: usize = 100;

#[derive(Debug, Deserialize)]
struct UserLookup {
    data: Option<UserData>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TimelinePage {
    #[serde(default)]
    data: Vec<ApiTweet>,
    #[serde(default)]
    meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiTweet {
    pub id: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub referenced_tweets: Vec<ReferencedTweet>,
    pub in_reply_to_user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReferencedTweet {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ApiTweet {
    pub fn is_retweet(&self) -> bool {
        self.referenced_tweets.iter().any(|r| r.kind == "retweeted")
    }

    pub fn is_reply(&self) -> bool {
        self.in_reply_to_user_id.is_some()
            || self.referenced_tweets.iter().any(|r| r.kind == "replied_to")
    }

    /// Original post = neither retweet nor reply. Quotes count as original.
    pub fn is_original(&self) -> bool {
        !self.is_retweet() && !self.is_reply()
    }
}

pub struct XApiSource {
    cfg: XApiConfig,
    client: reqwest::Client,
}

impl XApiSource {
    pub fn new(cfg: XApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fin-event-explorer/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building X api http client")?;
        Ok(Self { cfg, client })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        tracing::debug!(target: "ingest", %url, "GET");
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.cfg.bearer_token)
            .query(query)
            .send()
            .await
            .with_context(|| format!("x api request to {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("x api error {status}: {}", body.trim()));
        }
        resp.json::<T>()
            .await
            .with_context(|| format!("decoding x api response from {url}"))
    }

    /// Resolve `@handle` to the numeric user id.
    pub async fn user_id(&self, username: &str) -> Result<String> {
        let url = format!("{}/users/by/username/{}", self.cfg.base_url, username);
        let body: UserLookup = self
            .get_json(&url, &[("user.fields", "id".to_string())])
            .await?;
        let id = body
            .data
            .map(|d| d.id)
            .ok_or_else(|| anyhow!("x api: user @{username} not found"))?;
        tracing::info!(target: "ingest", username, user_id = %id, "resolved user id");
        Ok(id)
    }
}

#[async_trait]
impl TweetSource for XApiSource {
    async fn fetch_recent(&self, username: &str, max: usize) -> Result<Vec<RawTweet>> {
        if max == 0 {
            return Ok(Vec::new());
        }
        let username = crate::ingest::clean_username(username)?;
        let user_id = self.user_id(&username).await?;
        let url = format!("{}/users/{}/tweets", self.cfg.base_url, user_id);

        let mut out: Vec<RawTweet> = Vec::new();
        let mut dropped = 0usize;
        let mut next_token: Option<String> = None;

        loop {
            let remaining = max - out.len();
            let page_size = remaining.clamp(API_MIN_RESULTS, API_MAX_RESULTS);
            let mut query = vec![
                ("max_results", page_size.to_string()),
                ("exclude", "retweets,replies".to_string()),
                (
                    "tweet.fields",
                    "created_at,referenced_tweets,in_reply_to_user_id".to_string(),
                ),
            ];
            if let Some(tok) = next_token.take() {
                query.push(("pagination_token", tok));
            }

            let page: TimelinePage = self.get_json(&url, &query).await?;
            for t in page.data {
                if !t.is_original() {
                    dropped += 1;
                    continue;
                }
                let Some(created_at) = t.created_at else {
                    tracing::warn!(target: "ingest", tweet_id = %t.id, "post without created_at skipped");
                    dropped += 1;
                    continue;
                };
                out.push(RawTweet {
                    id: t.id,
                    created_at,
                    text: crate::ingest::normalize_text(&t.text),
                });
            }

            next_token = page.meta.and_then(|m| m.next_token);
            if out.len() >= max || next_token.is_none() {
                break;
            }
        }

        if dropped > 0 {
            tracing::debug!(target: "ingest", dropped, "non-original posts dropped");
        }
        Ok(crate::ingest::finalize(out, max))
    }

    fn name(&self) -> &'static str {
        "x-api"
    }
}
