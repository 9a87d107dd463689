//! One batch run: fetch, persist raw, classify each post, persist events.
//!
//! Stages run strictly in sequence and one post at a time. A bad model reply
//! skips that post; fetch failures, credential rejections and write failures
//! abort the run. Files already written before an abort stay on disk.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;

use crate::analyze::{ClassifyError, LlmClient};
use crate::event::StructuredEvent;
use crate::ingest::types::TweetSource;
use crate::store::EventStore;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid username: {0}")]
    InvalidUsername(String),
    #[error("fetching tweets failed: {0:#}")]
    Fetch(anyhow::Error),
    #[error("classifier aborted the run: {0}")]
    Classifier(ClassifyError),
    #[error("persisting results failed: {0:#}")]
    Persist(anyhow::Error),
}

/// A post excluded from the events file, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTweet {
    pub tweet_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub username: String,
    pub started_at: DateTime<Utc>,
    pub source: String,
    pub classifier: String,
    pub fetched: usize,
    pub events_written: usize,
    pub skipped: Vec<SkippedTweet>,
    pub raw_file: Option<PathBuf>,
    pub events_file: Option<PathBuf>,
}

/// Short, stable fingerprint for a post body; logs carry this instead of the text.
pub(crate) fn text_fingerprint(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Execute one full run. `now` names the run; pass `Utc::now()` outside tests.
pub async fn execute_pipeline(
    source: &dyn TweetSource,
    classifier: &dyn LlmClient,
    store: &EventStore,
    username: &str,
    max_tweets: usize,
    now: DateTime<Utc>,
) -> Result<RunReport, PipelineError> {
    crate::metrics::ensure_described();
    counter!("pipeline_runs_total").increment(1);

    let username = crate::ingest::clean_username(username)
        .map_err(|_| PipelineError::InvalidUsername(username.to_string()))?;
    let run_id = crate::store::run_id(&username, now);

    let mut report = RunReport {
        run_id: run_id.clone(),
        username: username.clone(),
        started_at: now,
        source: source.name().to_string(),
        classifier: classifier.provider_name().to_string(),
        fetched: 0,
        events_written: 0,
        skipped: Vec::new(),
        raw_file: None,
        events_file: None,
    };

    // 1) Fetch
    let tweets = crate::ingest::fetch_tweets(source, &username, max_tweets)
        .await
        .map_err(PipelineError::Fetch)?;
    report.fetched = tweets.len();

    if tweets.is_empty() {
        tracing::warn!(target: "pipeline", %username, "no tweets fetched, stopping run");
        return Ok(report);
    }

    report.raw_file = Some(
        store
            .write_raw(&run_id, &tweets)
            .map_err(PipelineError::Persist)?,
    );

    // 2) Classify, one post at a time
    tracing::info!(
        target: "pipeline",
        count = tweets.len(),
        provider = classifier.provider_name(),
        "classifying tweets"
    );
    let mut events: Vec<StructuredEvent> = Vec::with_capacity(tweets.len());
    for t in &tweets {
        match classifier.classify(&t.text).await {
            Ok(c) => events.push(StructuredEvent::from_parts(t, c)),
            Err(e) if e.is_fatal() => {
                tracing::error!(target: "pipeline", error = %e, "classifier rejected credentials");
                return Err(PipelineError::Classifier(e));
            }
            Err(e) => {
                tracing::warn!(
                    target: "pipeline",
                    tweet_id = %t.id,
                    text_id = %text_fingerprint(&t.text),
                    error = %e,
                    "classification failed, post skipped"
                );
                counter!("pipeline_classify_failures_total").increment(1);
                report.skipped.push(SkippedTweet {
                    tweet_id: t.id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    // 3) Persist
    report.events_file = Some(
        store
            .write_events(&run_id, &events)
            .map_err(PipelineError::Persist)?,
    );
    report.events_written = events.len();

    counter!("pipeline_events_written_total").increment(events.len() as u64);
    gauge!("pipeline_last_run_ts").set(Utc::now().timestamp() as f64);
    tracing::info!(
        target: "pipeline",
        %username,
        events = report.events_written,
        skipped = report.skipped.len(),
        "pipeline completed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_short_and_stable() {
        let a = text_fingerprint("Fed cuts rates");
        assert_eq!(a.len(), 12);
        assert_eq!(a, text_fingerprint("Fed cuts rates"));
        assert_ne!(a, text_fingerprint("Fed holds rates"));
    }
}
