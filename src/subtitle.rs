use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{Result, SubdubError};

/// One subtitle block: index, display window and text.
///
/// Multi-line text is kept joined with `\n`, each line trimmed, so that
/// serializing and re-parsing yields the same entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEntry {
    pub index: u32,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

impl TimedEntry {
    pub fn new<S: Into<String>>(index: u32, start: Duration, end: Duration, text: S) -> Self {
        Self {
            index,
            start,
            end,
            text: text.into(),
        }
    }

    /// Build an entry from second offsets, rounded to milliseconds.
    pub fn from_secs<S: Into<String>>(index: u32, start: f64, end: f64, text: S) -> Self {
        Self::new(index, secs_to_duration(start), secs_to_duration(end), text)
    }

    pub fn start_secs(&self) -> f64 {
        self.start.as_secs_f64()
    }

    pub fn end_secs(&self) -> f64 {
        self.end.as_secs_f64()
    }

    /// Length of the display window in seconds.
    pub fn window(&self) -> f64 {
        self.end_secs() - self.start_secs()
    }

    /// Number of spoken characters, line breaks excluded.
    pub fn char_count(&self) -> usize {
        self.text.chars().filter(|c| *c != '\n' && *c != '\r').count()
    }

    /// Characters per second over the display window.
    pub fn density(&self) -> f64 {
        let window = self.window();
        if window <= 0.0 {
            return f64::INFINITY;
        }
        self.char_count() as f64 / window
    }
}

fn secs_to_duration(seconds: f64) -> Duration {
    Duration::from_millis((seconds.max(0.0) * 1000.0).round() as u64)
}

/// Read and parse an SRT file.
pub async fn load_srt<P: AsRef<Path>>(path: P) -> Result<Vec<TimedEntry>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SubdubError::FileNotFound(path.display().to_string()));
    }

    let content = fs::read_to_string(path).await?;
    let entries = parse_srt(&content)?;
    debug!("Parsed {} subtitle entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Parse SRT content into ordered entries.
pub fn parse_srt(content: &str) -> Result<Vec<TimedEntry>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut entries = Vec::new();
    let mut block: Vec<(usize, &str)> = Vec::new();

    for (number, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            if !block.is_empty() {
                entries.push(parse_block(&block)?);
                block.clear();
            }
            continue;
        }
        block.push((number + 1, line));
    }

    if !block.is_empty() {
        entries.push(parse_block(&block)?);
    }

    Ok(entries)
}

fn parse_block(block: &[(usize, &str)]) -> Result<TimedEntry> {
    let (index_line, index_text) = block[0];
    let index = index_text.parse::<u32>().map_err(|_| {
        SubdubError::malformed(index_line, format!("expected subtitle index, found '{}'", index_text))
    })?;

    let (timing_line, timing_text) = *block
        .get(1)
        .ok_or_else(|| SubdubError::malformed(index_line, format!("entry {} has no timing line", index)))?;
    let (start, end) = parse_timing(timing_text)
        .ok_or_else(|| SubdubError::malformed(timing_line, format!("invalid timing '{}'", timing_text)))?;

    if end <= start {
        return Err(SubdubError::malformed(
            timing_line,
            format!("entry {} ends before it starts", index),
        ));
    }

    if block.len() < 3 {
        return Err(SubdubError::malformed(
            timing_line,
            format!("entry {} has no text", index),
        ));
    }

    let text = block[2..]
        .iter()
        .map(|(_, line)| *line)
        .collect::<Vec<_>>()
        .join("\n");

    Ok(TimedEntry::new(index, start, end, text))
}

fn parse_timing(line: &str) -> Option<(Duration, Duration)> {
    let (left, right) = line.split_once("-->")?;
    let start = parse_srt_time(left.trim())?;
    // Anything after the end stamp (display coordinates) is ignored.
    let end = parse_srt_time(right.split_whitespace().next()?)?;
    Some((start, end))
}

/// Parse `HH:MM:SS,mmm` (or `HH:MM:SS.mmm`) into a duration.
pub fn parse_srt_time(stamp: &str) -> Option<Duration> {
    let mut parts = stamp.split(':');
    let hours: u64 = parts.next()?.trim().parse().ok()?;
    let minutes: u64 = parts.next()?.trim().parse().ok()?;
    let seconds_part = parts.next()?.trim();
    if parts.next().is_some() || minutes >= 60 {
        return None;
    }

    let (seconds, fraction) = match seconds_part.split_once([',', '.']) {
        Some((s, f)) => (s, f),
        None => (seconds_part, "0"),
    };
    let seconds: u64 = seconds.parse().ok()?;
    if seconds >= 60 || fraction.is_empty() || fraction.len() > 3 {
        return None;
    }
    let millis: u64 = fraction.parse::<u64>().ok()? * 10u64.pow(3 - fraction.len() as u32);

    let total = hours
        .checked_mul(60)?
        .checked_add(minutes)?
        .checked_mul(60)?
        .checked_add(seconds)?
        .checked_mul(1000)?
        .checked_add(millis)?;
    Some(Duration::from_millis(total))
}

/// Format a duration as an SRT timestamp (HH:MM:SS,mmm)
pub fn format_srt_time(time: Duration) -> String {
    let total_milliseconds = time.as_millis() as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Serialize entries in canonical SRT form.
pub fn to_srt(entries: &[TimedEntry]) -> String {
    let mut srt_content = String::new();

    for entry in entries {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            entry.index,
            format_srt_time(entry.start),
            format_srt_time(entry.end),
            entry.text
        ));
    }

    srt_content
}

/// Write entries to an SRT file, replacing any existing file.
pub async fn write_srt<P: AsRef<Path>>(entries: &[TimedEntry], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Writing SRT file: {}", output_path.display());

    fs::write(output_path, to_srt(entries)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\n00:00:00,000 --> 00:00:02,000\nHello there\n\n\
                          2\n00:00:02,000 --> 00:00:04,500\nSecond line\ncontinues here\n\n\
                          7\n00:01:05,123 --> 00:01:06,000\nGap in numbering\n";

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(Duration::ZERO), "00:00:00,000");
        assert_eq!(format_srt_time(Duration::from_millis(65_123)), "00:01:05,123");
        assert_eq!(format_srt_time(Duration::from_millis(3_661_500)), "01:01:01,500");
    }

    #[test]
    fn test_parse_srt_time_variants() {
        assert_eq!(parse_srt_time("00:00:01,500"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_srt_time("00:00:01.5"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_srt_time("100:00:00,000"), Some(Duration::from_secs(360_000)));
        assert_eq!(parse_srt_time("00:61:00,000"), None);
        assert_eq!(parse_srt_time("00:00,000"), None);
        assert_eq!(parse_srt_time("aa:00:00,000"), None);
    }

    #[test]
    fn test_overflowing_timestamp_is_malformed() {
        assert_eq!(parse_srt_time("99999999999999999:00:00,000"), None);

        let result = parse_srt("1\n99999999999999999:00:00,000 --> 99999999999999999:00:01,000\nText\n");
        assert!(matches!(result, Err(SubdubError::MalformedSubtitle { .. })));
    }

    #[test]
    fn test_parse_entries() {
        let entries = parse_srt(SAMPLE).unwrap();
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].index, 1);
        assert_eq!(entries[0].start_secs(), 0.0);
        assert_eq!(entries[0].end_secs(), 2.0);
        assert_eq!(entries[0].text, "Hello there");

        assert_eq!(entries[1].text, "Second line\ncontinues here");
        assert_eq!(entries[1].window(), 2.5);

        assert_eq!(entries[2].index, 7);
        assert_eq!(entries[2].start, Duration::from_millis(65_123));
    }

    #[test]
    fn test_parse_bom_crlf_and_coordinates() {
        let content = "\u{feff}1\r\n00:00:01,000 --> 00:00:03,000 X1:10 X2:20\r\n  Hi  \r\n";
        let entries = parse_srt(content).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "Hi");
        assert_eq!(entries[0].end, Duration::from_secs(3));
    }

    #[test]
    fn test_round_trip_is_idempotent() {
        let first = parse_srt(SAMPLE).unwrap();
        let serialized = to_srt(&first);
        let second = parse_srt(&serialized).unwrap();
        assert_eq!(first, second);
        assert_eq!(to_srt(&second), serialized);
    }

    #[test]
    fn test_canonical_input_survives_byte_for_byte() {
        let canonical = "1\n00:00:00,000 --> 00:00:02,000\nA\n\n2\n00:00:02,000 --> 00:00:04,000\nB\nC\n\n";
        assert_eq!(to_srt(&parse_srt(canonical).unwrap()), canonical);
    }

    #[test]
    fn test_missing_text_is_malformed() {
        let err = parse_srt("1\n00:00:00,000 --> 00:00:01,000\n\n").unwrap_err();
        assert!(matches!(err, SubdubError::MalformedSubtitle { line: 2, .. }));
    }

    #[test]
    fn test_missing_timing_is_malformed() {
        let err = parse_srt("1\n\n").unwrap_err();
        assert!(matches!(err, SubdubError::MalformedSubtitle { line: 1, .. }));
    }

    #[test]
    fn test_bad_index_is_malformed() {
        let err = parse_srt("one\n00:00:00,000 --> 00:00:01,000\nText\n").unwrap_err();
        assert!(matches!(err, SubdubError::MalformedSubtitle { line: 1, .. }));
    }

    #[test]
    fn test_undecomposable_timing_is_malformed() {
        let err = parse_srt("1\n00:00:00,000 -> 00:00:01,000\nText\n").unwrap_err();
        assert!(matches!(err, SubdubError::MalformedSubtitle { line: 2, .. }));
    }

    #[test]
    fn test_inverted_window_is_malformed() {
        assert!(parse_srt("1\n00:00:02,000 --> 00:00:01,000\nText\n").is_err());
        assert!(parse_srt("1\n00:00:02,000 --> 00:00:02,000\nText\n").is_err());
    }

    #[test]
    fn test_density_ignores_line_breaks() {
        let entry = TimedEntry::from_secs(1, 1.0, 3.0, "ab\ncd");
        assert_eq!(entry.char_count(), 4);
        assert_eq!(entry.density(), 2.0);
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");
        let entries = parse_srt(SAMPLE).unwrap();

        write_srt(&entries, &path).await.unwrap();
        let loaded = load_srt(&path).await.unwrap();
        assert_eq!(loaded, entries);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = load_srt("/definitely/not/here.srt").await.unwrap_err();
        assert!(matches!(err, SubdubError::FileNotFound(_)));
    }
}
