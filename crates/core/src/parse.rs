//! Line-local extractors for rsync's `--progress` output.
//!
//! All extraction here is best-effort: a line that fails a pattern, or a
//! numeric field that fails to parse, degrades to a zero/empty value.
//! Nothing in this module returns an error; partial or malformed progress
//! output must never abort a running drain.
//!
//! Typical input lines:
//!
//! ```text
//!         999,999 99%  999.99kB/s    0:00:59 (xfr#9, to-chk=999/9999)
//!          2.39G  68%  659.73MB/s    0:00:03 (xfr#7217, to-chk=1113/10003)
//! ```

use std::sync::OnceLock;

use regex::Regex;

use crate::progress::TaskProgress;

fn counter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The prefix before `-chk=` varies across rsync versions (`to-chk`,
    // `ir-chk`), so only the suffix is anchored.
    RE.get_or_init(|| Regex::new(r"\(.+-chk=(\d+.\d+)").expect("counter regex"))
}

fn speed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+\.\d+.{2}/s)").expect("speed regex"))
}

fn transferred_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Greedy up to the last `%` on the line. A filename containing `%`
    // earlier in the line would mis-parse here; that is a known limitation
    // of the grammar, not something this matcher can detect.
    RE.get_or_init(|| Regex::new(r"(\S+.*)%").expect("transferred regex"))
}

/// `(remain, total)` from the `-chk=` trailer, or `None` when absent.
/// A malformed capture half parses as `0`.
pub(crate) fn match_counter(line: &str) -> Option<(u64, u64)> {
    let caps = counter_re().captures(line)?;
    let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    match raw.split_once('/') {
        Some((remain, total)) => Some((remain.parse().unwrap_or(0), total.parse().unwrap_or(0))),
        None => Some((0, 0)),
    }
}

/// First rate token shaped like `999.99kB/s`, kept verbatim.
pub(crate) fn match_speed(line: &str) -> Option<String> {
    let caps = speed_re().captures(line)?;
    Some(caps.get(1).map(|m| m.as_str())?.to_string())
}

/// `(bytes, percent)` from a per-file progress line: the text before the
/// last `%` splits on spaces into a size token first and percent digits
/// last.
pub(crate) fn match_transferred(line: &str) -> Option<(u64, u8)> {
    let caps = transferred_re().captures(line)?;
    let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

    let fields: Vec<&str> = raw.split(' ').collect();
    if fields.len() < 2 {
        return Some((0, 0));
    }
    let percent = fields[fields.len() - 1].parse().unwrap_or(0);
    Some((size_in_bytes(fields[0]), percent))
}

const UNITS: [(&str, u64); 8] = [
    ("KB", 1 << 10),
    ("K", 1 << 10),
    ("MB", 1 << 20),
    ("M", 1 << 20),
    ("GB", 1 << 30),
    ("G", 1 << 30),
    ("TB", 1 << 40),
    ("T", 1 << 40),
];

fn strip_unit_suffix(token: &str) -> (&str, u64) {
    for (suffix, scale) in UNITS {
        let Some(cut) = token.len().checked_sub(suffix.len()) else {
            continue;
        };
        // Two-letter units must win before their one-letter prefix, so the
        // list order above is load-bearing.
        if token.as_bytes()[cut..].eq_ignore_ascii_case(suffix.as_bytes()) {
            return (&token[..cut], scale);
        }
    }
    (token, 1)
}

/// Decodes a human-readable size token (`123,456`, `21.90G`, `87.65kB`)
/// into bytes. Units are powers of 1024; the multiply runs on `f64` and
/// truncates, losing fractional bytes on very large inputs. Malformed
/// numbers decode to zero.
pub(crate) fn size_in_bytes(token: &str) -> u64 {
    let (digits, scale) = strip_unit_suffix(token);
    let cleaned = digits.replace(',', "");
    let number: f64 = cleaned.trim().parse().unwrap_or(0.0);
    (number * scale as f64) as u64
}

const STATUS_NOISE: [&str; 11] = [
    "building file list ",
    "sending ",
    "created ",
    "done",
    "total ",
    "total: ",
    "client ",
    "server ",
    "to consider",
    "to-chk=",
    "to-check=",
];

/// Line-shape heuristic: does this stdout line name the file currently
/// being transferred, as opposed to progress/summary noise? Indented lines
/// (per-file progress, summaries) and known status banners are rejected,
/// as are directory-only listings ending in `/`.
pub(crate) fn is_filename(line: &str) -> bool {
    if line.is_empty() || line.starts_with(' ') {
        return false;
    }
    if STATUS_NOISE.iter().any(|noise| line.contains(noise)) {
        return false;
    }
    if line.starts_with("sent") {
        return false;
    }
    !line.ends_with('/')
}

/// Runs every matcher over one stdout line and folds the results into
/// `progress`. Matchers are not mutually exclusive; one line may update
/// several field groups. Returns whether anything changed.
pub(crate) fn apply_line(progress: &mut TaskProgress, line: &str) -> bool {
    let mut changed = false;

    if let Some((remain, total)) = match_counter(line) {
        progress.remain = remain;
        progress.total = total;
        let copied = total.saturating_sub(remain) as f64;
        progress.fraction = (copied / total.max(1) as f64).clamp(0.0, 1.0);
        changed = true;
    }

    if let Some(speed) = match_speed(line) {
        progress.speed = speed;
        changed = true;
    }

    if let Some((bytes, percent)) = match_transferred(line) {
        progress.transferred_bytes = bytes;
        progress.transferred_percent = percent;
        changed = true;
    }

    if is_filename(line) {
        progress.filename = line.to_string();
        changed = true;
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRESS_LINE: &str = "999,999 99%  999.99kB/s    0:00:59 (xfr#9, to-chk=999/9999)";

    #[test]
    fn counter_extracts_remain_and_total() {
        assert_eq!(match_counter(PROGRESS_LINE), Some((999, 9999)));
    }

    #[test]
    fn counter_accepts_other_chk_prefixes() {
        let line = "999,999 99%  999.99kB/s    0:00:59 (xfr#9, ir-chk=999/9999)";
        assert_eq!(match_counter(line), Some((999, 9999)));
    }

    #[test]
    fn counter_is_absent_on_plain_lines() {
        assert_eq!(match_counter("some/path/file.txt"), None);
    }

    #[test]
    fn speed_takes_the_first_rate_token() {
        assert_eq!(match_speed(PROGRESS_LINE).as_deref(), Some("999.99kB/s"));
    }

    #[test]
    fn transferred_extracts_bytes_and_percent() {
        let line = "123,456 78%  87.65kB/s    0:00:59 (xfr#9, to-chk=999/9999)";
        assert_eq!(match_transferred(line), Some((123_456, 78)));
    }

    #[test]
    fn transferred_scales_unit_suffixes() {
        let line = "21.90G  98%  428.46MB/s    0:00:48 (xfr#9416, ir-chk=3383/13809)";
        assert_eq!(match_transferred(line), Some((23_514_945_945, 98)));
    }

    #[test]
    fn size_handles_comma_grouped_plain_numbers() {
        assert_eq!(size_in_bytes("123,456"), 123_456);
    }

    #[test]
    fn size_scales_1024_based_suffixes() {
        assert_eq!(size_in_bytes("87.65kB"), 89_753);
        assert_eq!(size_in_bytes("21.90G"), 23_514_945_945);
        assert_eq!(size_in_bytes("1M"), 1_048_576);
        assert_eq!(size_in_bytes("2TB"), 2 * (1u64 << 40));
    }

    #[test]
    fn size_degrades_to_zero_on_garbage() {
        assert_eq!(size_in_bytes("not-a-number"), 0);
        assert_eq!(size_in_bytes(""), 0);
    }

    #[test]
    fn filename_accepts_plain_paths() {
        assert!(is_filename("some/path/file.txt"));
    }

    #[test]
    fn filename_rejects_noise() {
        assert!(!is_filename(""));
        assert!(!is_filename(" indented summary"));
        assert!(!is_filename("sending incremental file list"));
        assert!(!is_filename("sent 1,234 bytes  received 35 bytes"));
        assert!(!is_filename("some/directory/"));
        assert!(!is_filename(PROGRESS_LINE));
    }

    #[test]
    fn one_line_updates_every_field_group() {
        let mut progress = TaskProgress::default();
        assert!(apply_line(&mut progress, PROGRESS_LINE));

        assert_eq!(progress.remain, 999);
        assert_eq!(progress.total, 9999);
        assert!((progress.fraction - 0.9).abs() < 1e-3);
        assert_eq!(progress.speed, "999.99kB/s");
        assert_eq!(progress.transferred_bytes, 999_999);
        assert_eq!(progress.transferred_percent, 99);
        assert!(progress.filename.is_empty());
    }

    #[test]
    fn fraction_never_divides_by_zero() {
        let mut progress = TaskProgress::default();
        apply_line(&mut progress, "0 0%  0.00kB/s    0:00:00 (xfr#0, to-chk=0/0)");
        assert_eq!(progress.fraction, 0.0);
    }

    #[test]
    fn repeated_lines_are_idempotent() {
        let mut progress = TaskProgress::default();
        apply_line(&mut progress, PROGRESS_LINE);
        let first = progress.clone();
        apply_line(&mut progress, PROGRESS_LINE);

        assert_eq!(progress.remain, first.remain);
        assert_eq!(progress.total, first.total);
        assert_eq!(progress.fraction, first.fraction);
        assert_eq!(progress.transferred_bytes, first.transferred_bytes);
    }

    #[test]
    fn unmatched_lines_leave_state_untouched() {
        let mut progress = TaskProgress::default();
        apply_line(&mut progress, PROGRESS_LINE);
        let before = progress.speed.clone();

        assert!(apply_line(&mut progress, "some/path/file.txt"));
        assert_eq!(progress.speed, before);
        assert_eq!(progress.filename, "some/path/file.txt");
    }
}
