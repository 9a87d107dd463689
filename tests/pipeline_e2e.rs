// tests/pipeline_e2e.rs
//
// Full fetch → classify → store runs with a fixture source, the scripted
// mock classifier and a temporary output directory.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use fin_event_explorer::analyze::ai_adapter::ClassifyFuture;
use fin_event_explorer::analyze::{ClassifyError, LlmClient, MockClient};
use fin_event_explorer::config::StoreConfig;
use fin_event_explorer::ingest::fixture::FixtureSource;
use fin_event_explorer::ingest::types::TweetSource;
use fin_event_explorer::store::{self, EventStore};
use fin_event_explorer::{execute_pipeline, Impact, PipelineError, RawTweet};

const HIGH_US: &str = r#"{"event_type":"MACRO_DATA","country_region":"US","impact":"High","explanation":"CPI beat."}"#;
const MED_EU: &str = r#"{"event_type":"CENTRAL_BANK","country_region":"EU","impact":"Medium","explanation":"ECB holds."}"#;
const BAD_IMPACT: &str = r#"{"event_type":"OTHER","country_region":"Global","impact":"Severe","explanation":"?"}"#;

fn tweet(id: &str, minute: u32, text: &str) -> RawTweet {
    RawTweet {
        id: id.to_string(),
        created_at: Utc.with_ymd_and_hms(2025, 11, 22, 10, minute, 0).unwrap(),
        text: text.to_string(),
    }
}

fn fixture() -> FixtureSource {
    FixtureSource::new(vec![
        tweet("101", 0, "US CPI 3.2% vs 3.1% exp"),
        tweet("102", 5, "ECB holds rates at 4%"),
        tweet("103", 10, "Some noise"),
    ])
}

fn run_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 22, 12, 0, 0).unwrap()
}

fn temp_store() -> (TempDir, EventStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = EventStore::new(&StoreConfig {
        output_dir: dir.path().to_path_buf(),
    });
    (dir, store)
}

struct FailingSource;

#[async_trait]
impl TweetSource for FailingSource {
    async fn fetch_recent(&self, _username: &str, _max: usize) -> Result<Vec<RawTweet>> {
        bail!("x api error 503: over capacity")
    }
    fn name(&self) -> &'static str {
        "failing"
    }
}

struct RevokedKey;

impl LlmClient for RevokedKey {
    fn classify<'a>(&'a self, _text: &'a str) -> ClassifyFuture<'a> {
        Box::pin(async { Err(ClassifyError::Unauthorized(401)) })
    }
    fn provider_name(&self) -> &'static str {
        "revoked"
    }
}

#[tokio::test]
async fn every_valid_post_becomes_one_event_with_matching_fields() {
    let (_dir, store) = temp_store();
    // Posts are classified most recent first.
    let classifier = MockClient::scripted([MED_EU, MED_EU, HIGH_US]);

    let report = execute_pipeline(&fixture(), &classifier, &store, "@financialjuice", 10, run_at())
        .await
        .expect("run");

    assert_eq!(report.run_id, "financialjuice_20251122_120000");
    assert_eq!(report.fetched, 3);
    assert_eq!(report.events_written, 3);
    assert!(report.skipped.is_empty());

    let raw_file = report.raw_file.expect("raw file");
    assert!(raw_file.ends_with("raw_tweets/financialjuice_20251122_120000.json"));
    let raw = store::load_raw(&raw_file).unwrap();
    assert_eq!(raw.len(), 3);

    let (latest, events) = store.load_latest().unwrap().expect("events present");
    assert_eq!(Some(latest), report.events_file);
    assert_eq!(events.len(), 3);
    for ev in &events {
        let src = raw.iter().find(|t| t.id == ev.tweet_id).expect("source post");
        assert_eq!(ev.tweet_created_at, src.created_at);
        assert_eq!(ev.tweet_text, src.text);
    }
    let cpi = events.iter().find(|e| e.tweet_id == "101").unwrap();
    assert_eq!(cpi.impact, Impact::High);
    assert_eq!(cpi.explanation, "CPI beat.");
}

#[tokio::test]
async fn invalid_reply_is_excluded_and_reported() {
    let (_dir, store) = temp_store();
    let classifier = MockClient::scripted([BAD_IMPACT, "not json at all", HIGH_US]);

    let report = execute_pipeline(&fixture(), &classifier, &store, "financialjuice", 10, run_at())
        .await
        .expect("run");

    assert_eq!(report.fetched, 3);
    assert_eq!(report.events_written, 1);
    let skipped: Vec<_> = report.skipped.iter().map(|s| s.tweet_id.as_str()).collect();
    assert_eq!(skipped, vec!["103", "102"]);
    assert!(report.skipped[0].reason.contains("impact"));

    let (_, events) = store.load_latest().unwrap().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tweet_id, "101");
}

#[tokio::test]
async fn empty_fetch_writes_nothing() {
    let (_dir, store) = temp_store();
    let classifier = MockClient::fixed(HIGH_US);

    let report = execute_pipeline(
        &FixtureSource::new(vec![]),
        &classifier,
        &store,
        "financialjuice",
        10,
        run_at(),
    )
    .await
    .expect("empty run is not an error");

    assert_eq!(report.fetched, 0);
    assert!(report.raw_file.is_none());
    assert!(report.events_file.is_none());
    assert!(store.load_latest().unwrap().is_none());
}

#[tokio::test]
async fn fetch_failure_aborts_before_any_write() {
    let (_dir, store) = temp_store();
    let classifier = MockClient::fixed(HIGH_US);

    let err = execute_pipeline(&FailingSource, &classifier, &store, "financialjuice", 10, run_at())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Fetch(_)), "{err:?}");
    assert!(err.to_string().contains("503"));
    assert!(!store.raw_dir().exists());
}

#[tokio::test]
async fn blank_username_is_rejected() {
    let (_dir, store) = temp_store();
    let classifier = MockClient::fixed(HIGH_US);

    let err = execute_pipeline(&fixture(), &classifier, &store, " @ ", 10, run_at())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidUsername(_)), "{err:?}");
}

#[tokio::test]
async fn limit_caps_classified_posts() {
    let (_dir, store) = temp_store();
    let classifier = MockClient::fixed(HIGH_US);

    let report = execute_pipeline(&fixture(), &classifier, &store, "financialjuice", 2, run_at())
        .await
        .unwrap();
    assert_eq!(report.fetched, 2);
    assert_eq!(report.events_written, 2);

    let (_, events) = store.load_latest().unwrap().unwrap();
    let mut ids: Vec<_> = events.iter().map(|e| e.tweet_id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["102", "103"]);
}

#[tokio::test]
async fn later_run_becomes_latest() {
    let (_dir, store) = temp_store();
    let first = MockClient::fixed(HIGH_US);
    execute_pipeline(&fixture(), &first, &store, "financialjuice", 10, run_at())
        .await
        .unwrap();

    let second = MockClient::fixed(MED_EU);
    let later = run_at() + chrono::Duration::hours(1);
    let report = execute_pipeline(&fixture(), &second, &store, "financialjuice", 10, later)
        .await
        .unwrap();

    let (path, events) = store.load_latest().unwrap().unwrap();
    assert_eq!(Some(path), report.events_file);
    assert!(events.iter().all(|e| e.impact == Impact::Medium));
    assert_eq!(store.list_event_files().unwrap().len(), 2);
}

#[tokio::test]
async fn rejected_credentials_abort_the_run_but_keep_raw_file() {
    let (_dir, store) = temp_store();

    let err = execute_pipeline(&fixture(), &RevokedKey, &store, "financialjuice", 10, run_at())
        .await
        .unwrap_err();

    assert!(
        matches!(err, PipelineError::Classifier(ClassifyError::Unauthorized(401))),
        "{err:?}"
    );
    assert!(store
        .raw_dir()
        .join("financialjuice_20251122_120000.json")
        .exists());
    assert!(store.load_latest().unwrap().is_none());
}

#[tokio::test]
async fn second_run_in_same_second_keeps_first_run_files() {
    let (_dir, store) = temp_store();
    let first = FixtureSource::new(vec![tweet("A", 0, "first batch")]);
    let second = FixtureSource::new(vec![tweet("B", 1, "second batch")]);
    let classifier = MockClient::fixed(HIGH_US);

    let report = execute_pipeline(&first, &classifier, &store, "fj", 10, run_at())
        .await
        .unwrap();

    let err = execute_pipeline(
        &second,
        &classifier,
        &store,
        "fj",
        10,
        run_at() + chrono::Duration::milliseconds(400),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PipelineError::Persist(_)), "{err:?}");

    assert_eq!(store.list_event_files().unwrap().len(), 1);
    let (path, events) = store.load_latest().unwrap().unwrap();
    assert_eq!(Some(path), report.events_file);
    let ids: Vec<_> = events.iter().map(|e| e.tweet_id.as_str()).collect();
    assert_eq!(ids, vec!["A"]);
    let raw = store::load_raw(&report.raw_file.unwrap()).unwrap();
    assert_eq!(raw[0].id, "A");
}
