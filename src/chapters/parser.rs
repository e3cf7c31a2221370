//! Duration and chapter parsing for video metadata

use super::Chapter;
use crate::error::{QuickBitsError, Result};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("duration pattern is valid")
    })
}

fn chapter_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // "1:02:03 Title", "12:34 - Title", "0:00 –– Title"
        Regex::new(r"^\s*(?:(\d{1,2}):)?(\d{1,2}):(\d{2})\s*(?:[-–—]+\s*)*(.*?)\s*$")
            .expect("chapter pattern is valid")
    })
}

/// Parse an ISO-8601 style duration token (`PT1H2M3S`) to seconds.
///
/// Every component is optional but at least one must be present; a bare
/// `PT` is rejected.
pub fn parse_duration(text: &str) -> Result<u64> {
    let invalid = || QuickBitsError::InvalidDurationFormat(text.to_string());
    let trimmed = text.trim();

    let captures = duration_regex().captures(trimmed).ok_or_else(invalid)?;

    if (1..=3).all(|i| captures.get(i).is_none()) {
        return Err(invalid());
    }

    let component = |index: usize| -> Result<u64> {
        match captures.get(index) {
            Some(m) => m.as_str().parse::<u64>().map_err(|_| invalid()),
            None => Ok(0),
        }
    };

    let hours = component(1)?;
    let minutes = component(2)?;
    let seconds = component(3)?;

    hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .and_then(|hm| hm.checked_add(seconds))
        .ok_or_else(invalid)
}

/// Parse a single description line into `(start_seconds, title)`
fn parse_chapter_line(line: &str) -> Option<(u64, String)> {
    let caps = chapter_line_regex().captures(line)?;

    let hours: u64 = match caps.get(1) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let minutes: u64 = caps[2].parse().ok()?;
    let seconds: u64 = caps[3].parse().ok()?;

    if seconds >= 60 || (caps.get(1).is_some() && minutes >= 60) {
        return None;
    }

    let title = caps[4].trim();
    if title.is_empty() {
        return None;
    }

    Some((hours * 3600 + minutes * 60 + seconds, title.to_string()))
}

/// Parse chapters from a video description.
///
/// Chapters keep the order they appear in the text. A timestamp beyond
/// `total_duration` or earlier than the previously kept chapter is dropped,
/// so every chapter ends where the next one starts and the last one ends at
/// `total_duration`.
pub fn parse_chapters(description: &str, total_duration: u64) -> Vec<Chapter> {
    let mut starts: Vec<(u64, String)> = Vec::new();

    for line in description.lines() {
        let Some((start, title)) = parse_chapter_line(line) else {
            continue;
        };

        if start > total_duration {
            debug!("Dropping chapter '{}' at {}s (beyond video duration {}s)", title, start, total_duration);
            continue;
        }

        if let Some((previous, _)) = starts.last() {
            if start < *previous {
                debug!("Dropping out-of-order chapter '{}' at {}s (previous at {}s)", title, start, previous);
                continue;
            }
        }

        starts.push((start, title));
    }

    let ends: Vec<u64> = starts
        .iter()
        .skip(1)
        .map(|(start, _)| *start)
        .chain(std::iter::once(total_duration))
        .collect();

    starts
        .into_iter()
        .zip(ends)
        .map(|((start, title), end)| Chapter::new(title, start, end.min(total_duration)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_full() {
        assert_eq!(parse_duration("PT1H2M3S").unwrap(), 3723);
    }

    #[test]
    fn test_parse_duration_partial_components() {
        assert_eq!(parse_duration("PT15M").unwrap(), 900);
        assert_eq!(parse_duration("PT45S").unwrap(), 45);
        assert_eq!(parse_duration("PT2H").unwrap(), 7200);
        assert_eq!(parse_duration("PT1H30S").unwrap(), 3630);
    }

    #[test]
    fn test_parse_duration_rejects_empty_marker() {
        assert!(matches!(
            parse_duration("PT"),
            Err(QuickBitsError::InvalidDurationFormat(_))
        ));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("1h2m3s").is_err());
        assert!(parse_duration("PT1X").is_err());
        assert!(parse_duration("PT3S1M").is_err());
        assert!(parse_duration("P1D").is_err());
    }

    #[test]
    fn test_parse_chapters_scenario() {
        let chapters = parse_chapters("0:00 Intro\n1:30 Main Content\n4:00 Outro", 300);
        assert_eq!(
            chapters,
            vec![
                Chapter::new("Intro", 0, 90),
                Chapter::new("Main Content", 90, 240),
                Chapter::new("Outro", 240, 300),
            ]
        );
        assert_eq!(chapters[1].duration, 150);
        assert_eq!(chapters[2].duration, 60);
    }

    #[test]
    fn test_parse_chapters_hours_and_dashes() {
        let description = "Timestamps:\n00:00 - Welcome\n12:05 -- Quick Bits\n1:02:03 — Wrap up\n";
        let chapters = parse_chapters(description, 4000);

        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].title, "Welcome");
        assert_eq!(chapters[1].title, "Quick Bits");
        assert_eq!(chapters[1].start, 725);
        assert_eq!(chapters[2].title, "Wrap up");
        assert_eq!(chapters[2].start, 3723);
        assert_eq!(chapters[2].end, 4000);
    }

    #[test]
    fn test_parse_chapters_no_timestamps() {
        assert!(parse_chapters("Just a regular description\nwith no times", 600).is_empty());
        assert!(parse_chapters("", 600).is_empty());
    }

    #[test]
    fn test_parse_chapters_drops_beyond_duration() {
        let chapters = parse_chapters("0:00 Intro\n2:00 Middle\n9:00 Phantom", 300);
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[1].title, "Middle");
        assert_eq!(chapters[1].end, 300);
    }

    #[test]
    fn test_parse_chapters_drops_out_of_order() {
        let chapters = parse_chapters("0:00 Intro\n3:00 Later\n1:00 Earlier\n4:00 End", 300);
        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Intro", "Later", "End"]);
        assert!(chapters.iter().all(|c| c.end >= c.start));
    }

    #[test]
    fn test_parse_chapters_ignores_mid_line_times_and_bad_seconds() {
        let description = "Recorded at 10:30 in the morning\n0:75 Not a time\n0:00 Real";
        let chapters = parse_chapters(description, 100);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "Real");
    }

    #[test]
    fn test_parse_chapters_boundaries_are_contiguous() {
        let description = "0:00 A\n0:10 B\n0:45 C\n2:00 D\n2:01 E";
        let total = 500;
        let chapters = parse_chapters(description, total);

        for pair in chapters.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(chapters.last().unwrap().end, total);
        assert!(chapters.iter().all(|c| c.duration == c.end - c.start));
    }
}
