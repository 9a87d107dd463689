//! Read-only exploration of stored events: filters, summary panel, timeline
//! encoding (SVG + JSON points) and a terminal listing.

pub mod filter;
pub mod summary;
pub mod terminal;
pub mod timeline;

use chrono::NaiveDate;
use serde::Serialize;

use crate::event::StructuredEvent;

pub use filter::{apply, sessions, sort_rows, EventFilter, SortKey, SortOrder, TimeWindow};
pub use summary::{summarize, Summary};
pub use timeline::{build_points, render_svg, TimelinePoint};

/// Everything one UI refresh needs, computed from a single loaded file.
#[derive(Debug, Clone, Serialize)]
pub struct ExploreView {
    /// Rows for the table, in the requested sort order.
    pub events: Vec<StructuredEvent>,
    pub summary: Summary,
    /// Markers in chronological order.
    pub timeline: Vec<TimelinePoint>,
    /// Days available for the session picker (from the unfiltered file).
    pub sessions: Vec<NaiveDate>,
}

pub fn build_view(
    all: &[StructuredEvent],
    filter: &EventFilter,
    sort: SortKey,
    order: SortOrder,
) -> ExploreView {
    let filtered = apply(all, filter);
    let summary = summarize(&filtered);
    let timeline = build_points(&filtered);
    let mut rows = filtered;
    sort_rows(&mut rows, sort, order);
    ExploreView {
        events: rows,
        summary,
        timeline,
        sessions: sessions(all),
    }
}
