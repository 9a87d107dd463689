//! Raw posts, the fixed classification taxonomy and the joined
//! `StructuredEvent` record that the store persists and the explorer reads.
//!
//! Enum wire strings are part of the on-disk format; renaming a variant's
//! serde tag breaks every previously written events file.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An original post as fetched from the account timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTweet {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
}

/// Error returned when a taxonomy string is not one of the allowed values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

/// Coarse category of a market-moving event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "MACRO_DATA")]
    MacroData,
    #[serde(rename = "CENTRAL_BANK")]
    CentralBank,
    #[serde(rename = "EARNINGS")]
    Earnings,
    #[serde(rename = "GEOPOLITICS")]
    Geopolitics,
    #[serde(rename = "CRYPTO")]
    Crypto,
    #[serde(rename = "COMMODITIES")]
    Commodities,
    #[serde(rename = "POLICY/REGULATION")]
    PolicyRegulation,
    #[serde(rename = "OTHER")]
    Other,
}

impl EventType {
    /// Display order used by the prompt, the timeline axis and the filters.
    pub const ALL: [EventType; 8] = [
        EventType::MacroData,
        EventType::CentralBank,
        EventType::Earnings,
        EventType::Geopolitics,
        EventType::Crypto,
        EventType::Commodities,
        EventType::PolicyRegulation,
        EventType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::MacroData => "MACRO_DATA",
            EventType::CentralBank => "CENTRAL_BANK",
            EventType::Earnings => "EARNINGS",
            EventType::Geopolitics => "GEOPOLITICS",
            EventType::Crypto => "CRYPTO",
            EventType::Commodities => "COMMODITIES",
            EventType::PolicyRegulation => "POLICY/REGULATION",
            EventType::Other => "OTHER",
        }
    }

    /// Human-friendly label for charts and tables.
    pub fn label(&self) -> &'static str {
        match self {
            EventType::MacroData => "Macro data",
            EventType::CentralBank => "Central banks",
            EventType::Earnings => "Earnings",
            EventType::Geopolitics => "Geopolitics",
            EventType::Crypto => "Crypto",
            EventType::Commodities => "Commodities",
            EventType::PolicyRegulation => "Policy & regulation",
            EventType::Other => "Other",
        }
    }
}

/// Geographic scope of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "EU")]
    Eu,
    #[serde(rename = "China")]
    China,
    #[serde(rename = "UK")]
    Uk,
    #[serde(rename = "Global")]
    Global,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Region::Us,
        Region::Eu,
        Region::China,
        Region::Uk,
        Region::Global,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Us => "US",
            Region::Eu => "EU",
            Region::China => "China",
            Region::Uk => "UK",
            Region::Global => "Global",
        }
    }
}

/// Expected market impact. Variants are declared in severity order so the
/// derived `Ord` gives `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    pub const ALL: [Impact; 3] = [Impact::Low, Impact::Medium, Impact::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Low => "Low",
            Impact::Medium => "Medium",
            Impact::High => "High",
        }
    }
}

macro_rules! taxonomy_str_impls {
    ($ty:ty, $kind:literal) => {
        impl FromStr for $ty {
            type Err = UnknownValue;

            /// Exact match against the wire strings; no case folding, no aliases.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty>::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| UnknownValue {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

taxonomy_str_impls!(EventType, "event_type");
taxonomy_str_impls!(Region, "country_region");
taxonomy_str_impls!(Impact, "impact");

/// The four fields produced by the classifier for one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub event_type: EventType,
    pub country_region: Region,
    pub impact: Impact,
    pub explanation: String,
}

/// One post joined 1:1 with its classification. Never updated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredEvent {
    pub tweet_id: String,
    pub tweet_created_at: DateTime<Utc>,
    pub tweet_text: String,
    pub event_type: EventType,
    pub country_region: Region,
    pub impact: Impact,
    pub explanation: String,
}

impl StructuredEvent {
    pub fn from_parts(tweet: &RawTweet, c: Classification) -> Self {
        Self {
            tweet_id: tweet.id.clone(),
            tweet_created_at: tweet.created_at,
            tweet_text: tweet.text.clone(),
            event_type: c.event_type,
            country_region: c.country_region,
            impact: c.impact,
            explanation: c.explanation,
        }
    }
}
