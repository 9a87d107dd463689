// src/ingest/types.rs
use anyhow::Result;

use crate::event::RawTweet;

/// Anything that can list the most recent original posts of an account.
///
/// Implementations return posts already normalized, most-recent-first and
/// at most `max` long; errors abort the pipeline run.
#[async_trait::async_trait]
pub trait TweetSource: Send + Sync {
    async fn fetch_recent(&self, username: &str, max: usize) -> Result<Vec<RawTweet>>;
    fn name(&self) -> &'static str;
}
