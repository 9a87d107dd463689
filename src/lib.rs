// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod api;
pub mod config;
pub mod event;
pub mod explore;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::config::Settings;
pub use crate::event::{Classification, EventType, Impact, RawTweet, Region, StructuredEvent};
pub use crate::pipeline::{execute_pipeline, PipelineError, RunReport};
pub use crate::store::EventStore;
