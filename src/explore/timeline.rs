// src/explore/timeline.rs
//! Timeline encoding (one marker per event: x = time, y = event type,
//! colour/size = impact) and a standalone SVG renderer for it.

use std::fmt::Write as _;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::event::{EventType, Impact, Region, StructuredEvent};

/// Maximum marker displacement so posts in the same minute do not overlap.
pub const JITTER_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImpactStyle {
    pub color: &'static str,
    /// Marker area in px².
    pub size: u32,
}

/// High = red/largest, Medium = yellow, Low = grey/smallest.
pub fn impact_style(impact: Impact) -> ImpactStyle {
    match impact {
        Impact::High => ImpactStyle {
            color: "#FF0000",
            size: 160,
        },
        Impact::Medium => ImpactStyle {
            color: "#FFC300",
            size: 80,
        },
        Impact::Low => ImpactStyle {
            color: "#B0B0B0",
            size: 40,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub tweet_id: String,
    pub time: DateTime<Utc>,
    pub plotted_time: DateTime<Utc>,
    pub event_type: EventType,
    pub event_type_label: &'static str,
    pub region: Region,
    pub impact: Impact,
    pub color: &'static str,
    pub size: u32,
    pub tweet_text: String,
    pub explanation: String,
}

/// Deterministic offset in `[-JITTER_SECS, JITTER_SECS]` derived from the id.
pub fn jitter_secs(tweet_id: &str) -> i64 {
    let digest = Sha256::digest(tweet_id.as_bytes());
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest[..8]);
    let v = u64::from_be_bytes(buf);
    (v % (2 * JITTER_SECS as u64 + 1)) as i64 - JITTER_SECS
}

pub fn build_points(events: &[StructuredEvent]) -> Vec<TimelinePoint> {
    events
        .iter()
        .map(|e| {
            let style = impact_style(e.impact);
            TimelinePoint {
                tweet_id: e.tweet_id.clone(),
                time: e.tweet_created_at,
                plotted_time: e.tweet_created_at + Duration::seconds(jitter_secs(&e.tweet_id)),
                event_type: e.event_type,
                event_type_label: e.event_type.label(),
                region: e.country_region,
                impact: e.impact,
                color: style.color,
                size: style.size,
                tweet_text: e.tweet_text.clone(),
                explanation: e.explanation.clone(),
            }
        })
        .collect()
}

const WIDTH: f64 = 1200.0;
const ROW_HEIGHT: f64 = 56.0;
const MARGIN_LEFT: f64 = 170.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 60.0;
const X_TICKS: i64 = 5;

fn esc(s: &str) -> String {
    html_escape::encode_text(s).to_string()
}

/// Render points as a self-contained SVG document. Rows are the event types
/// present in the data, in taxonomy order; hovering a marker shows its
/// post text and explanation.
pub fn render_svg(points: &[TimelinePoint], title: &str) -> String {
    let rows: Vec<EventType> = EventType::ALL
        .iter()
        .copied()
        .filter(|t| points.iter().any(|p| p.event_type == *t))
        .collect();
    let height = MARGIN_TOP + MARGIN_BOTTOM + ROW_HEIGHT * rows.len().max(1) as f64;
    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;

    let (t0, t1) = match (
        points.iter().map(|p| p.plotted_time).min(),
        points.iter().map(|p| p.plotted_time).max(),
    ) {
        (Some(a), Some(b)) if a < b => (a, b),
        (Some(a), _) => (a - Duration::minutes(30), a + Duration::minutes(30)),
        _ => {
            let now = Utc::now();
            (now - Duration::hours(1), now)
        }
    };
    let span = (t1 - t0).num_milliseconds().max(1) as f64;
    let x_of = |t: DateTime<Utc>| MARGIN_LEFT + plot_w * ((t - t0).num_milliseconds() as f64 / span);
    let y_of = |et: EventType| {
        let idx = rows.iter().position(|r| *r == et).unwrap_or(0);
        MARGIN_TOP + ROW_HEIGHT * (idx as f64 + 0.5)
    };

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{height}" viewBox="0 0 {WIDTH} {height}" font-family="sans-serif" font-size="12">"#
    );
    let _ = writeln!(svg, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##);
    let _ = writeln!(
        svg,
        r#"<text x="{MARGIN_LEFT}" y="24" font-size="16" font-weight="bold">{}</text>"#,
        esc(title)
    );

    // Rows + labels
    for et in &rows {
        let y = y_of(*et);
        let _ = writeln!(
            svg,
            r##"<line x1="{MARGIN_LEFT}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="#eeeeee"/>"##,
            WIDTH - MARGIN_RIGHT
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{}</text>"#,
            MARGIN_LEFT - 10.0,
            y + 4.0,
            esc(et.label())
        );
    }

    // X axis ticks
    let axis_y = height - MARGIN_BOTTOM;
    for i in 0..=X_TICKS {
        let t = t0 + Duration::milliseconds((span as i64) * i / X_TICKS);
        let x = x_of(t);
        let _ = writeln!(
            svg,
            r##"<line x1="{x:.1}" y1="{MARGIN_TOP}" x2="{x:.1}" y2="{axis_y:.1}" stroke="#dddddd" stroke-dasharray="4 4"/>"##
        );
        let _ = writeln!(
            svg,
            r#"<text x="{x:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
            axis_y + 18.0,
            t.format("%m/%d %H:%M")
        );
    }

    // Markers: low impact first so high-impact dots stay on top.
    let mut ordered: Vec<&TimelinePoint> = points.iter().collect();
    ordered.sort_by(|a, b| a.impact.cmp(&b.impact).then(a.time.cmp(&b.time)));
    for p in ordered {
        let r = (p.size as f64).sqrt() / 2.0;
        let _ = writeln!(
            svg,
            r#"<circle cx="{:.1}" cy="{:.1}" r="{r:.1}" fill="{}" fill-opacity="0.8"><title>{} | {} | {} | {}&#10;{}&#10;{}</title></circle>"#,
            x_of(p.plotted_time),
            y_of(p.event_type),
            p.color,
            p.time.format("%Y/%m/%d %H:%M:%S"),
            esc(p.event_type_label),
            p.region,
            p.impact,
            esc(&p.tweet_text),
            esc(&p.explanation)
        );
    }

    // Legend
    let mut lx = MARGIN_LEFT;
    let ly = height - 18.0;
    for impact in Impact::ALL.iter().rev() {
        let style = impact_style(*impact);
        let _ = writeln!(
            svg,
            r#"<circle cx="{lx:.1}" cy="{ly:.1}" r="{:.1}" fill="{}"/><text x="{:.1}" y="{:.1}">{}</text>"#,
            (style.size as f64).sqrt() / 2.0,
            style.color,
            lx + 10.0,
            ly + 4.0,
            impact
        );
        lx += 90.0;
    }

    svg.push_str("</svg>\n");
    svg
}
