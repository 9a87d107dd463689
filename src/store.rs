//! Flat-file event store.
//!
//! ```text
//! <output_dir>/raw_tweets/<run-id>.json                 array of RawTweet
//! <output_dir>/structured_events/<run-id>_events.json   array of StructuredEvent
//! ```
//!
//! A run id is `<username>_<YYYYmmdd_HHMMSS>` (UTC). Files are written once
//! and never rewritten.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::config::StoreConfig;
use crate::event::{RawTweet, StructuredEvent};

pub const RAW_DIR: &str = "raw_tweets";
pub const EVENTS_DIR: &str = "structured_events";
pub const EVENTS_SUFFIX: &str = "_events.json";
const RUN_TS_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Identifier of one fetch→classify→store run.
pub fn run_id(username: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}", username, at.format(RUN_TS_FORMAT))
}

/// Timestamp encoded at the end of a run id (`..._YYYYmmdd_HHMMSS`).
pub fn run_timestamp(run_id: &str) -> Option<DateTime<Utc>> {
    // The timestamp is the last 15 chars; usernames may contain `_`.
    let n = run_id.len();
    if n < 15 || !run_id.is_char_boundary(n - 15) {
        return None;
    }
    NaiveDateTime::parse_from_str(&run_id[n - 15..], RUN_TS_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone)]
pub struct EventStore {
    root: PathBuf,
}

impl EventStore {
    pub fn new(cfg: &StoreConfig) -> Self {
        Self {
            root: cfg.output_dir.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join(RAW_DIR)
    }

    pub fn events_dir(&self) -> PathBuf {
        self.root.join(EVENTS_DIR)
    }

    pub fn write_raw(&self, run_id: &str, tweets: &[RawTweet]) -> Result<PathBuf> {
        let path = self.raw_dir().join(format!("{run_id}.json"));
        write_json(&path, tweets)?;
        tracing::info!(target: "store", path = %path.display(), count = tweets.len(), "raw tweets saved");
        Ok(path)
    }

    pub fn write_events(&self, run_id: &str, events: &[StructuredEvent]) -> Result<PathBuf> {
        let path = self.events_dir().join(format!("{run_id}{EVENTS_SUFFIX}"));
        write_json(&path, events)?;
        tracing::info!(target: "store", path = %path.display(), count = events.len(), "structured events saved");
        Ok(path)
    }

    /// All events files, oldest first (run timestamp, then mtime, then name).
    pub fn list_event_files(&self) -> Result<Vec<PathBuf>> {
        let dir = self.events_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut keyed = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("listing {}", dir.display()))? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(stem) = name.strip_suffix(EVENTS_SUFFIX) else {
                continue;
            };
            let ts = run_timestamp(stem).or_else(|| modified_at(&path));
            keyed.push((ts, name.to_string(), path));
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        Ok(keyed.into_iter().map(|(_, _, p)| p).collect())
    }

    /// The most recent events file, if any run has completed.
    pub fn latest_events_file(&self) -> Result<Option<PathBuf>> {
        Ok(self.list_event_files()?.pop())
    }

    /// Load the newest events file that parses. Unreadable files are logged
    /// and skipped so one damaged run does not hide the earlier ones.
    /// `None` when no file loads.
    pub fn load_latest(&self) -> Result<Option<(PathBuf, Vec<StructuredEvent>)>> {
        for path in self.list_event_files()?.into_iter().rev() {
            match load_events(&path) {
                Ok(events) => return Ok(Some((path, events))),
                Err(e) => {
                    tracing::warn!(
                        target: "store",
                        path = %path.display(),
                        error = ?e,
                        "skipping unreadable events file"
                    );
                }
            }
        }
        Ok(None)
    }
}

/// Strictly deserialize an events file; unknown enum values fail the load.
pub fn load_events(path: &Path) -> Result<Vec<StructuredEvent>> {
    let s = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parsing {}", path.display()))
}

pub fn load_raw(path: &Path) -> Result<Vec<RawTweet>> {
    let s = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parsing {}", path.display()))
}

/// Write `value` as pretty JSON to a new file at `path`.
///
/// The body goes to a hidden temp file in the same directory first and is
/// then hard-linked into place: a partial write never carries the final
/// name, and an existing file is never replaced.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no file name", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;

    let json = serde_json::to_string_pretty(value).context("serializing json")?;
    let tmp = parent.join(format!(".{name}.{}.tmp", std::process::id()));
    let written = write_tmp(&tmp, json.as_bytes())
        .and_then(|_| fs::hard_link(&tmp, path));
    let _ = fs::remove_file(&tmp);

    match written {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            bail!("{} already exists, refusing to overwrite an earlier run", path.display())
        }
        Err(e) => Err(e).with_context(|| format!("writing {}", path.display())),
    }
}

fn write_tmp(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut f = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    f.write_all(bytes)?;
    f.sync_all()
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(|t: SystemTime| DateTime::<Utc>::from(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventType, Impact, Region};
    use chrono::TimeZone;

    fn temp_store() -> (tempfile::TempDir, EventStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(&StoreConfig {
            output_dir: dir.path().to_path_buf(),
        });
        (dir, store)
    }

    #[test]
    fn run_id_roundtrips_timestamp() {
        let at = Utc.with_ymd_and_hms(2025, 11, 22, 2, 34, 36).unwrap();
        let id = run_id("financial_juice", at);
        assert_eq!(id, "financial_juice_20251122_023436");
        assert_eq!(run_timestamp(&id), Some(at));
        assert_eq!(run_timestamp("short"), None);
        assert_eq!(run_timestamp("someone_notatimestamp1"), None);
    }

    #[test]
    fn latest_prefers_name_timestamp_over_username_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(&StoreConfig {
            output_dir: dir.path().to_path_buf(),
        });
        // "aaa" sorts first alphabetically but is the newer run.
        store.write_events("zzz_20250101_000000", &[]).unwrap();
        store.write_events("aaa_20250301_000000", &[]).unwrap();
        store.write_events("mmm_20250201_000000", &[]).unwrap();
        fs::write(store.events_dir().join("notes.txt"), "ignored").unwrap();

        let latest = store.latest_events_file().unwrap().unwrap();
        assert!(latest.ends_with("aaa_20250301_000000_events.json"));
        assert_eq!(store.list_event_files().unwrap().len(), 3);
    }

    #[test]
    fn empty_store_has_no_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(&StoreConfig {
            output_dir: dir.path().join("nothing-here"),
        });
        assert!(store.load_latest().unwrap().is_none());
    }

    #[test]
    fn events_file_reads_back_equal() {
        let (_dir, store) = temp_store();
        let base = Utc.with_ymd_and_hms(2025, 11, 22, 2, 34, 36).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        let texts = [
            "Öl & <gas> \"quoted\"",
            "US CPI 3.2% vs 3.1%\nline two",
            "日本銀行 holds; €/$ flat",
        ];
        let events: Vec<StructuredEvent> = EventType::ALL
            .iter()
            .enumerate()
            .map(|(i, et)| StructuredEvent {
                tweet_id: format!("19920{i}"),
                tweet_created_at: base + chrono::Duration::milliseconds(i as i64 * 1500),
                tweet_text: texts[i % texts.len()].to_string(),
                event_type: *et,
                country_region: Region::ALL[i % Region::ALL.len()],
                impact: Impact::ALL[i % Impact::ALL.len()],
                explanation: format!("<b>why</b> & how #{i}"),
            })
            .collect();
        assert!(events.iter().any(|e| e.event_type == EventType::PolicyRegulation));
        assert!(events.iter().any(|e| e.country_region == Region::China));

        let path = store.write_events("financialjuice_20251122_023436", &events).unwrap();
        assert_eq!(load_events(&path).unwrap(), events);
    }

    #[test]
    fn damaged_newest_file_falls_back_to_previous_run() {
        let (_dir, store) = temp_store();
        let good = StructuredEvent {
            tweet_id: "1".into(),
            tweet_created_at: Utc.with_ymd_and_hms(2025, 11, 22, 11, 0, 0).unwrap(),
            tweet_text: "ECB holds".into(),
            event_type: EventType::CentralBank,
            country_region: Region::Eu,
            impact: Impact::Medium,
            explanation: "As expected.".into(),
        };
        let older = store
            .write_events("financialjuice_20251122_120000", &[good.clone()])
            .unwrap();
        fs::write(
            store
                .events_dir()
                .join("financialjuice_20251122_130000_events.json"),
            r#"[{"tweet_id":"2""#,
        )
        .unwrap();

        let (path, events) = store.load_latest().unwrap().expect("older run loads");
        assert_eq!(path, older);
        assert_eq!(events, vec![good]);
    }

    #[test]
    fn only_damaged_files_means_nothing_to_load() {
        let (_dir, store) = temp_store();
        fs::create_dir_all(store.events_dir()).unwrap();
        fs::write(store.events_dir().join("fj_20251122_130000_events.json"), "[").unwrap();
        assert!(store.load_latest().unwrap().is_none());
    }

    #[test]
    fn existing_run_file_is_never_replaced() {
        let (_dir, store) = temp_store();
        let tweet = RawTweet {
            id: "A".into(),
            created_at: Utc.with_ymd_and_hms(2025, 11, 22, 10, 0, 0).unwrap(),
            text: "first".into(),
        };
        let path = store.write_raw("fj_20251122_120000", &[tweet.clone()]).unwrap();

        let other = RawTweet {
            id: "B".into(),
            text: "second".into(),
            ..tweet.clone()
        };
        let err = store.write_raw("fj_20251122_120000", &[other]).unwrap_err();
        assert!(err.to_string().contains("already exists"), "{err:#}");
        assert_eq!(load_raw(&path).unwrap(), vec![tweet]);

        // No temp files left behind next to the run file.
        let names: Vec<_> = fs::read_dir(store.raw_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }
}
