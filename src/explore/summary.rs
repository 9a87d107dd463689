// src/explore/summary.rs
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::{EventType, Impact, StructuredEvent};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImpactBreakdown {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    pub event_type: EventType,
    pub label: &'static str,
    pub count: usize,
}

/// Context panel shown above the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
    pub count: usize,
    pub impact: ImpactBreakdown,
    /// At most five entries, most frequent first.
    pub top_event_types: Vec<TypeCount>,
}

pub fn summarize(events: &[StructuredEvent]) -> Summary {
    let mut impact = ImpactBreakdown::default();
    let mut by_type: HashMap<EventType, usize> = HashMap::new();
    for e in events {
        match e.impact {
            Impact::High => impact.high += 1,
            Impact::Medium => impact.medium += 1,
            Impact::Low => impact.low += 1,
        }
        *by_type.entry(e.event_type).or_default() += 1;
    }

    let mut top: Vec<TypeCount> = by_type
        .into_iter()
        .map(|(event_type, count)| TypeCount {
            event_type,
            label: event_type.label(),
            count,
        })
        .collect();
    // Equal counts keep the taxonomy's display order.
    top.sort_by(|a, b| b.count.cmp(&a.count).then(a.event_type.cmp(&b.event_type)));
    top.truncate(5);

    Summary {
        first: events.iter().map(|e| e.tweet_created_at).min(),
        last: events.iter().map(|e| e.tweet_created_at).max(),
        count: events.len(),
        impact,
        top_event_types: top,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Region;

    fn ev(ts: &str, impact: Impact, et: EventType) -> StructuredEvent {
        StructuredEvent {
            tweet_id: ts.into(),
            tweet_created_at: ts.parse().unwrap(),
            tweet_text: String::new(),
            event_type: et,
            country_region: Region::Global,
            impact,
            explanation: "x".into(),
        }
    }

    #[test]
    fn counts_span_and_top_types() {
        let events = vec![
            ev("2025-11-22T10:00:00Z", Impact::High, EventType::Geopolitics),
            ev("2025-11-22T09:00:00Z", Impact::Low, EventType::Crypto),
            ev("2025-11-22T11:00:00Z", Impact::High, EventType::Geopolitics),
            ev("2025-11-22T08:00:00Z", Impact::Medium, EventType::MacroData),
        ];
        let s = summarize(&events);
        assert_eq!(s.count, 4);
        assert_eq!(s.first.unwrap().to_rfc3339(), "2025-11-22T08:00:00+00:00");
        assert_eq!(s.last.unwrap().to_rfc3339(), "2025-11-22T11:00:00+00:00");
        assert_eq!(s.impact, ImpactBreakdown { high: 2, medium: 1, low: 1 });
        assert_eq!(s.top_event_types[0].event_type, EventType::Geopolitics);
        assert_eq!(s.top_event_types[0].count, 2);
        // MacroData precedes Crypto in display order at equal counts.
        assert_eq!(s.top_event_types[1].event_type, EventType::MacroData);
    }

    #[test]
    fn empty_input() {
        let s = summarize(&[]);
        assert_eq!(s.count, 0);
        assert!(s.first.is_none());
        assert!(s.top_event_types.is_empty());
    }
}
