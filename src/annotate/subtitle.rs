//! Subtitle entries, SRT parsing and the timeline index
//!
//! Entries keep the order they had in the file. Lookup answers "first entry
//! in file order whose interval contains t", so overlapping cues resolve to
//! whichever came first, not whichever starts latest.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// `HH:MM:SS,mmm --> HH:MM:SS,mmm`. Field widths are fixed (hours may run
/// past two digits); values are not range-checked (`M=61` is accepted).
static TIME_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(\d{2,}):(\d{2}):(\d{2}),(\d{3})\s*-->\s*(\d{2,}):(\d{2}):(\d{2}),(\d{3})",
    )
    .expect("time range pattern is valid")
});

/// Blank line between blocks, tolerating trailing spaces and runs of blanks.
static BLOCK_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("block separator pattern is valid"));

/// A single subtitle entry with timing and text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    /// Start time in milliseconds
    pub start_ms: u64,
    /// End time in milliseconds (inclusive)
    pub end_ms: u64,
    /// Subtitle text, continuation lines joined with a single space
    pub text: String,
}

impl SubtitleEntry {
    /// Create a new subtitle entry
    #[must_use]
    pub fn new(start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    /// Whether `time_ms` falls inside `[start_ms, end_ms]`
    #[must_use]
    pub fn contains(&self, time_ms: u64) -> bool {
        time_ms >= self.start_ms && time_ms <= self.end_ms
    }

    /// Format time as SRT timestamp (HH:MM:SS,mmm)
    #[must_use]
    pub fn format_srt_time(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1000;
        let millis = ms % 1000;
        format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
    }

    /// The entry's time range in SRT notation
    #[must_use]
    pub fn time_range(&self) -> String {
        format!(
            "{} --> {}",
            Self::format_srt_time(self.start_ms),
            Self::format_srt_time(self.end_ms)
        )
    }
}

/// Parse SRT content into entries, in block order.
///
/// Malformed blocks (fewer than three lines, or an unrecognised time range on
/// the second line) are skipped rather than reported.
pub fn parse_srt(content: &str) -> Vec<SubtitleEntry> {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");

    BLOCK_SEPARATOR
        .split(&normalized)
        .filter_map(parse_block)
        .collect()
}

fn parse_block(block: &str) -> Option<SubtitleEntry> {
    let lines: Vec<&str> = block.trim_matches('\n').lines().collect();
    if lines.len() < 3 {
        if !block.trim().is_empty() {
            debug!(lines = lines.len(), "Skipping short subtitle block");
        }
        return None;
    }

    let Some((start_ms, end_ms)) = parse_time_range(lines[1]) else {
        debug!(line = lines[1], "Skipping block with malformed time range");
        return None;
    };

    Some(SubtitleEntry::new(start_ms, end_ms, lines[2..].join(" ")))
}

/// Parse "HH:MM:SS,mmm --> HH:MM:SS,mmm" into start/end milliseconds
fn parse_time_range(line: &str) -> Option<(u64, u64)> {
    let caps = TIME_RANGE.captures(line)?;
    let field = |i: usize| -> Option<u64> { caps.get(i)?.as_str().parse().ok() };

    let start = to_millis(field(1)?, field(2)?, field(3)?, field(4)?)?;
    let end = to_millis(field(5)?, field(6)?, field(7)?, field(8)?)?;
    Some((start, end))
}

fn to_millis(hours: u64, minutes: u64, seconds: u64, millis: u64) -> Option<u64> {
    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)?
        .checked_mul(1000)?
        .checked_add(millis)
}

/// Convert a playback position in seconds to whole milliseconds.
///
/// Negative and non-finite positions map to 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn millis_from_secs(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1000.0).floor() as u64
    } else {
        0
    }
}

/// Ordered, read-only collection of subtitle entries
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    entries: Vec<SubtitleEntry>,
}

impl Timeline {
    /// Create an empty timeline
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a timeline from already-parsed entries
    #[must_use]
    pub fn from_entries(entries: Vec<SubtitleEntry>) -> Self {
        Self { entries }
    }

    /// Replace the whole timeline; nothing from the previous load survives.
    pub fn load(&mut self, entries: Vec<SubtitleEntry>) {
        self.entries = entries;
    }

    /// Index of the first entry (in load order) active at `time_ms`
    #[must_use]
    pub fn active_index(&self, time_ms: u64) -> Option<usize> {
        self.entries.iter().position(|e| e.contains(time_ms))
    }

    /// First entry (in load order) active at `time_ms`
    #[must_use]
    pub fn active_at(&self, time_ms: u64) -> Option<&SubtitleEntry> {
        self.active_index(time_ms).map(|i| &self.entries[i])
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SubtitleEntry> {
        self.entries.get(index)
    }

    #[must_use]
    pub fn entries(&self) -> &[SubtitleEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Latest end time across all entries
    #[must_use]
    pub fn end_ms(&self) -> u64 {
        self.entries.iter().map(|e| e.end_ms).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srt_time_format() {
        assert_eq!(SubtitleEntry::format_srt_time(0), "00:00:00,000");
        assert_eq!(SubtitleEntry::format_srt_time(1000), "00:00:01,000");
        assert_eq!(SubtitleEntry::format_srt_time(61000), "00:01:01,000");
        assert_eq!(SubtitleEntry::format_srt_time(3661500), "01:01:01,500");
    }

    #[test]
    fn test_parse_time_range() {
        let content = "1\n00:00:01,000 --> 00:00:02,500\nこんにちは\n";
        let entries = parse_srt(content);
        assert_eq!(entries, vec![SubtitleEntry::new(1000, 2500, "こんにちは")]);
    }

    #[test]
    fn test_parse_srt_joins_lines_with_space() {
        let content = r"1
00:00:00,000 --> 00:00:02,000
Hello, world!

2
00:00:02,500 --> 00:00:04,000
This is a test.
With multiple lines.

";
        let entries = parse_srt(content);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].start_ms, 0);
        assert_eq!(entries[0].end_ms, 2000);
        assert_eq!(entries[0].text, "Hello, world!");
        assert_eq!(entries[1].text, "This is a test. With multiple lines.");
    }

    #[test]
    fn test_parse_normalizes_line_endings() {
        let crlf = "1\r\n00:00:01,000 --> 00:00:02,000\r\nA\r\n\r\n2\r\n00:00:03,000 --> 00:00:04,000\r\nB\r\n";
        let cr = crlf.replace("\r\n", "\r");
        for content in [crlf.to_string(), cr] {
            let entries = parse_srt(&content);
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[1].text, "B");
        }
    }

    #[test]
    fn test_parse_skips_malformed_blocks() {
        let content = "1\n00:00:01,000 --> 00:00:02,000\n\n\
                       2\nnot a time\ntext\n\n\
                       3\n0:0:1,5 --> 0:0:2,5\nshort fields\n\n\
                       4\n00:00:01,00 --> 00:00:02,000\nshort millis\n\n\
                       5\n00:00:05,000 --> 00:00:06,000\nkept\n";
        let entries = parse_srt(content);
        assert_eq!(entries, vec![SubtitleEntry::new(5000, 6000, "kept")]);
    }

    #[test]
    fn test_parse_accepts_out_of_range_components() {
        let entries = parse_srt("1\n00:61:00,000 --> 00:61:01,000\nx\n");
        assert_eq!(entries[0].start_ms, 61 * 60 * 1000);
    }

    #[test]
    fn test_parse_accepts_long_hours() {
        let entries = parse_srt("1\n100:00:00,000 --> 100:00:01,000\nx\n");
        assert_eq!(entries[0].start_ms, 100 * 3_600_000);
    }

    #[test]
    fn test_parse_keeps_block_order() {
        let content = "1\n00:00:05,000 --> 00:00:06,000\nlater\n\n\
                       2\n00:00:01,000 --> 00:00:02,000\nearlier\n";
        let entries = parse_srt(content);
        assert_eq!(entries[0].text, "later");
        assert_eq!(entries[1].text, "earlier");
    }

    #[test]
    fn test_active_at_inclusive_bounds() {
        let timeline = Timeline::from_entries(vec![
            SubtitleEntry::new(1000, 2000, "a"),
            SubtitleEntry::new(3000, 4000, "b"),
        ]);
        assert_eq!(timeline.active_at(1000).map(|e| e.text.as_str()), Some("a"));
        assert_eq!(timeline.active_at(2000).map(|e| e.text.as_str()), Some("a"));
        assert_eq!(timeline.active_at(3500).map(|e| e.text.as_str()), Some("b"));
        assert!(timeline.active_at(999).is_none());
        assert!(timeline.active_at(2500).is_none());
        assert!(timeline.active_at(4001).is_none());
    }

    #[test]
    fn test_active_at_prefers_first_in_load_order() {
        let timeline = Timeline::from_entries(vec![
            SubtitleEntry::new(2000, 5000, "first"),
            SubtitleEntry::new(1000, 6000, "second"),
        ]);
        assert_eq!(timeline.active_at(3000).unwrap().text, "first");
        assert_eq!(timeline.active_at(1500).unwrap().text, "second");
        assert_eq!(timeline.active_index(3000), Some(0));
    }

    #[test]
    fn test_load_replaces_timeline() {
        let mut timeline = Timeline::from_entries(vec![SubtitleEntry::new(0, 1000, "old")]);
        timeline.load(vec![SubtitleEntry::new(5000, 6000, "new")]);
        assert_eq!(timeline.len(), 1);
        assert!(timeline.active_at(500).is_none());
        assert_eq!(timeline.end_ms(), 6000);
    }

    #[test]
    fn test_millis_from_secs() {
        assert_eq!(millis_from_secs(1.2345), 1234);
        assert_eq!(millis_from_secs(0.0), 0);
        assert_eq!(millis_from_secs(-3.0), 0);
        assert_eq!(millis_from_secs(f64::NAN), 0);
    }
}
