// src/ingest/fixture.rs
use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::event::RawTweet;
use crate::ingest::types::TweetSource;

/// Serves a fixed list of posts; used by tests and for offline replays of a
/// previously saved `raw_tweets/*.json` file.
pub struct FixtureSource {
    tweets: Vec<RawTweet>,
}

impl FixtureSource {
    pub fn new(tweets: Vec<RawTweet>) -> Self {
        Self { tweets }
    }

    /// Parse a JSON array of raw tweets (the store's raw file format).
    pub fn from_json_str(s: &str) -> Result<Self> {
        let tweets: Vec<RawTweet> =
            serde_json::from_str(s).context("parsing raw tweets fixture")?;
        Ok(Self::new(tweets))
    }
}

#[async_trait]
impl TweetSource for FixtureSource {
    async fn fetch_recent(&self, _username: &str, max: usize) -> Result<Vec<RawTweet>> {
        let tweets = self
            .tweets
            .iter()
            .map(|t| RawTweet {
                id: t.id.clone(),
                created_at: t.created_at,
                text: crate::ingest::normalize_text(&t.text),
            })
            .collect();
        Ok(crate::ingest::finalize(tweets, max))
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
