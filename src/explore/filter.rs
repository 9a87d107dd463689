// src/explore/filter.rs
//! User-selected filters over a loaded events file.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::event::{EventType, Impact, Region, StructuredEvent};

/// Window relative to the most recent event in the loaded set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeWindow {
    #[default]
    All,
    Last30Minutes,
    Last1Hour,
    Last2Hours,
    Last24Hours,
    Last5Days,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 6] = [
        TimeWindow::All,
        TimeWindow::Last30Minutes,
        TimeWindow::Last1Hour,
        TimeWindow::Last2Hours,
        TimeWindow::Last24Hours,
        TimeWindow::Last5Days,
    ];

    pub fn duration(&self) -> Option<Duration> {
        match self {
            TimeWindow::All => None,
            TimeWindow::Last30Minutes => Some(Duration::minutes(30)),
            TimeWindow::Last1Hour => Some(Duration::hours(1)),
            TimeWindow::Last2Hours => Some(Duration::hours(2)),
            TimeWindow::Last24Hours => Some(Duration::days(1)),
            TimeWindow::Last5Days => Some(Duration::days(5)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::All => "all",
            TimeWindow::Last30Minutes => "last_30_minutes",
            TimeWindow::Last1Hour => "last_1_hour",
            TimeWindow::Last2Hours => "last_2_hours",
            TimeWindow::Last24Hours => "last_24_hours",
            TimeWindow::Last5Days => "last_5_days",
        }
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Ok(TimeWindow::All),
            "30m" => Ok(TimeWindow::Last30Minutes),
            "1h" => Ok(TimeWindow::Last1Hour),
            "2h" => Ok(TimeWindow::Last2Hours),
            "24h" | "1d" => Ok(TimeWindow::Last24Hours),
            "5d" => Ok(TimeWindow::Last5Days),
            other => TimeWindow::ALL
                .iter()
                .copied()
                .find(|w| w.as_str() == other)
                .ok_or_else(|| format!("unknown time window: {other:?}")),
        }
    }
}

/// Conjunction of all predicates. Empty sets mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub window: TimeWindow,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// UTC calendar day ("session").
    pub day: Option<NaiveDate>,
    pub impacts: HashSet<Impact>,
    pub event_types: HashSet<EventType>,
    pub regions: HashSet<Region>,
}

impl EventFilter {
    pub fn with_impacts<I: IntoIterator<Item = Impact>>(mut self, it: I) -> Self {
        self.impacts = it.into_iter().collect();
        self
    }

    pub fn with_event_types<I: IntoIterator<Item = EventType>>(mut self, it: I) -> Self {
        self.event_types = it.into_iter().collect();
        self
    }

    pub fn with_regions<I: IntoIterator<Item = Region>>(mut self, it: I) -> Self {
        self.regions = it.into_iter().collect();
        self
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_range(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_day(mut self, day: Option<NaiveDate>) -> Self {
        self.day = day;
        self
    }

    /// Lower time bound implied by `window`, anchored at `latest`.
    fn window_start(&self, latest: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        let delta = self.window.duration()?;
        latest.map(|t| t - delta)
    }

    fn matches(&self, ev: &StructuredEvent, window_start: Option<DateTime<Utc>>) -> bool {
        let t = ev.tweet_created_at;
        window_start.map_or(true, |start| t >= start)
            && self.from.map_or(true, |from| t >= from)
            && self.to.map_or(true, |to| t <= to)
            && self.day.map_or(true, |d| t.date_naive() == d)
            && (self.impacts.is_empty() || self.impacts.contains(&ev.impact))
            && (self.event_types.is_empty() || self.event_types.contains(&ev.event_type))
            && (self.regions.is_empty() || self.regions.contains(&ev.country_region))
    }
}

fn chronological(a: &StructuredEvent, b: &StructuredEvent) -> Ordering {
    a.tweet_created_at
        .cmp(&b.tweet_created_at)
        .then_with(|| a.tweet_id.cmp(&b.tweet_id))
}

/// Events satisfying every predicate, oldest first. The relative window is
/// anchored at the latest event of the whole input, not of the filtered set.
pub fn apply(events: &[StructuredEvent], filter: &EventFilter) -> Vec<StructuredEvent> {
    let latest = events.iter().map(|e| e.tweet_created_at).max();
    let start = filter.window_start(latest);
    let mut out: Vec<StructuredEvent> = events
        .iter()
        .filter(|e| filter.matches(e, start))
        .cloned()
        .collect();
    out.sort_by(chronological);
    out
}

/// Distinct UTC days present in the data, ascending.
pub fn sessions(events: &[StructuredEvent]) -> Vec<NaiveDate> {
    events
        .iter()
        .map(|e| e.tweet_created_at.date_naive())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Time,
    Impact,
    EventType,
    Region,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "time" | "tweet_created_at" => Ok(SortKey::Time),
            "impact" => Ok(SortKey::Impact),
            "event_type" => Ok(SortKey::EventType),
            "region" | "country_region" => Ok(SortKey::Region),
            other => Err(format!("unknown sort key: {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {other:?}")),
        }
    }
}

/// Table ordering. Ties always fall back to chronological order so the
/// result is deterministic.
pub fn sort_rows(rows: &mut [StructuredEvent], key: SortKey, order: SortOrder) {
    rows.sort_by(|a, b| {
        let primary = match key {
            SortKey::Time => Ordering::Equal,
            SortKey::Impact => a.impact.cmp(&b.impact),
            SortKey::EventType => a.event_type.cmp(&b.event_type),
            SortKey::Region => a.country_region.cmp(&b.country_region),
        };
        let ord = primary.then_with(|| chronological(a, b));
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}
