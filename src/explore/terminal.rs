// src/explore/terminal.rs
use std::io::{self, Write};

use crate::event::{EventType, Impact, StructuredEvent};

const RED: &str = "\x1b[91m";
const YELLOW: &str = "\x1b[93m";
const GREY: &str = "\x1b[90m";
const RESET: &str = "\x1b[0m";

fn ansi_for(impact: Impact) -> &'static str {
    match impact {
        Impact::High => RED,
        Impact::Medium => YELLOW,
        Impact::Low => GREY,
    }
}

/// Print events grouped by type (taxonomy order), one coloured line each.
/// `color = false` writes plain text (pipes, tests).
pub fn render_grouped<W: Write>(
    out: &mut W,
    events: &[StructuredEvent],
    color: bool,
) -> io::Result<()> {
    for et in EventType::ALL {
        let group: Vec<&StructuredEvent> = events.iter().filter(|e| e.event_type == et).collect();
        if group.is_empty() {
            continue;
        }
        writeln!(out, "=== {} ({}) ===", et, group.len())?;
        for e in group {
            let text = e.tweet_text.replace('\n', " ");
            let line = format!("- [{}] {} | {}", e.impact, e.country_region, text);
            if color {
                writeln!(out, "{}{}{}", ansi_for(e.impact), line, RESET)?;
            } else {
                writeln!(out, "{line}")?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Region;

    fn ev(id: &str, impact: Impact, et: EventType) -> StructuredEvent {
        StructuredEvent {
            tweet_id: id.into(),
            tweet_created_at: "2025-11-22T10:00:00Z".parse().unwrap(),
            tweet_text: format!("headline {id}\nsecond line"),
            event_type: et,
            country_region: Region::Us,
            impact,
            explanation: "x".into(),
        }
    }

    #[test]
    fn groups_in_taxonomy_order() {
        let events = vec![
            ev("1", Impact::Low, EventType::Other),
            ev("2", Impact::High, EventType::CentralBank),
            ev("3", Impact::Medium, EventType::Other),
        ];
        let mut buf = Vec::new();
        render_grouped(&mut buf, &events, false).unwrap();
        let s = String::from_utf8(buf).unwrap();
        let cb = s.find("=== CENTRAL_BANK (1) ===").unwrap();
        let other = s.find("=== OTHER (2) ===").unwrap();
        assert!(cb < other);
        assert!(s.contains("- [High] US | headline 2 second line"));
        assert!(!s.contains('\x1b'));
    }

    #[test]
    fn colour_codes_follow_impact() {
        let mut buf = Vec::new();
        render_grouped(&mut buf, &[ev("9", Impact::High, EventType::Crypto)], true).unwrap();
        let s = String::from_utf8(buf).unwrap();
        assert!(s.contains("\x1b[91m- [High]"));
        assert!(s.contains(RESET));
    }
}
