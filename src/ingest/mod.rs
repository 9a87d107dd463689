// src/ingest/mod.rs
pub mod fixture;
pub mod types;
pub mod x_api;

use std::collections::HashSet;

use anyhow::{bail, Result};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::event::RawTweet;
use crate::ingest::types::TweetSource;

/// Normalize post text: decode HTML entities, collapse runs of spaces/tabs,
/// trim. Line breaks inside the post are kept.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"[ \t\u{00A0}]+").expect("ws regex"));
    let collapsed = re_ws.replace_all(&decoded, " ");

    collapsed
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Strip a leading `@` and surrounding whitespace; empty handles are rejected.
pub fn clean_username(raw: &str) -> Result<String> {
    let name = raw.trim().trim_start_matches('@').trim();
    if name.is_empty() {
        bail!("empty X username");
    }
    Ok(name.to_string())
}

/// Most-recent-first, unique by id, at most `max` items.
pub fn finalize(mut tweets: Vec<RawTweet>, max: usize) -> Vec<RawTweet> {
    tweets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let mut seen = HashSet::new();
    tweets.retain(|t| seen.insert(t.id.clone()));
    tweets.truncate(max);
    tweets
}

/// Fetch through any source, recording telemetry. Errors bubble up unchanged.
pub async fn fetch_tweets(
    source: &dyn TweetSource,
    username: &str,
    max: usize,
) -> Result<Vec<RawTweet>> {
    crate::metrics::ensure_described();

    match source.fetch_recent(username, max).await {
        Ok(tweets) => {
            counter!("pipeline_tweets_fetched_total").increment(tweets.len() as u64);
            tracing::info!(
                target: "ingest",
                source = source.name(),
                username,
                count = tweets.len(),
                "tweets fetched"
            );
            Ok(tweets)
        }
        Err(e) => {
            tracing::warn!(target: "ingest", error = ?e, source = source.name(), "fetch failed");
            counter!("pipeline_fetch_errors_total").increment(1);
            Err(e)
        }
    }
}
