//! Version parsing and comparison.
//!
//! Versions use a Maven-style ordering that differs from semver:
//! - Segments are split on `.` and `-`
//! - Numeric segments compare as numbers
//! - String qualifiers have a special ordering:
//!   `alpha` < `beta` < `milestone` < `rc` < `snapshot` < `""` (release) < `sp`
//! - Trailing zero segments are normalised away (`1.0.0` == `1.0`)
//! - SNAPSHOT versions sort before their release equivalent

use std::cmp::Ordering;
use std::fmt;

/// A parsed version with comparable segments.
#[derive(Debug, Clone)]
pub struct Version {
    pub original: String,
    segments: Vec<Segment>,
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Segment {
    Numeric(u64),
    Qualifier(QualifierKind),
    Text(String),
}

/// Well-known qualifiers with defined ordering.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub enum QualifierKind {
    Alpha,
    Beta,
    Milestone,
    Rc,
    Snapshot,
    Release,
    Sp,
}

impl Version {
    pub fn parse(version: &str) -> Self {
        let segments = parse_segments(version);
        Self {
            original: version.to_string(),
            segments,
        }
    }

    pub fn is_snapshot(&self) -> bool {
        self.original.ends_with("-SNAPSHOT") || has_snapshot_timestamp(&self.original)
    }

    /// The base version: timestamped snapshot qualifiers collapsed back to
    /// `-SNAPSHOT`, per §3's "base version" definition.
    pub fn base_version(&self) -> String {
        if let Some(stripped) = self.original.strip_suffix("-SNAPSHOT") {
            return stripped.to_string();
        }
        if let Some(idx) = find_snapshot_timestamp_start(&self.original) {
            return self.original[..idx].to_string();
        }
        self.original.clone()
    }
}

/// `true` if `version` contains a `YYYYMMDD.HHMMSS-N` timestamp suffix in
/// place of a literal `-SNAPSHOT` tag.
fn has_snapshot_timestamp(version: &str) -> bool {
    find_snapshot_timestamp_start(version).is_some()
}

fn find_snapshot_timestamp_start(version: &str) -> Option<usize> {
    let last_dash = version.rfind('-')?;
    let build = &version[last_dash + 1..];
    if build.is_empty() || !build.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let before_build = &version[..last_dash];
    let timestamp_dash = before_build.rfind('-')?;
    let timestamp = &before_build[timestamp_dash + 1..];
    let (date, time) = timestamp.split_once('.')?;
    if date.len() == 8
        && date.bytes().all(|b| b.is_ascii_digit())
        && time.len() == 6
        && time.bytes().all(|b| b.is_ascii_digit())
    {
        Some(timestamp_dash)
    } else {
        None
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let max_len = self.segments.len().max(other.segments.len());
        for i in 0..max_len {
            let a = self.segments.get(i);
            let b = other.segments.get(i);
            let ord = compare_segments(a, b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compare_segments(a: Option<&Segment>, b: Option<&Segment>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(s), None) => compare_segment_to_empty(s),
        (None, Some(s)) => compare_segment_to_empty(s).reverse(),
        (Some(a), Some(b)) => compare_two_segments(a, b),
    }
}

fn compare_segment_to_empty(seg: &Segment) -> Ordering {
    match seg {
        Segment::Numeric(0) => Ordering::Equal,
        Segment::Numeric(n) => {
            if *n > 0 {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        Segment::Qualifier(q) => q.cmp(&QualifierKind::Release),
        Segment::Text(s) if s.is_empty() => Ordering::Equal,
        Segment::Text(_) => Ordering::Less,
    }
}

fn compare_two_segments(a: &Segment, b: &Segment) -> Ordering {
    match (a, b) {
        (Segment::Numeric(a), Segment::Numeric(b)) => a.cmp(b),
        (Segment::Qualifier(a), Segment::Qualifier(b)) => a.cmp(b),
        (Segment::Numeric(_), Segment::Qualifier(_)) => Ordering::Greater,
        (Segment::Qualifier(_), Segment::Numeric(_)) => Ordering::Less,
        (Segment::Numeric(_), Segment::Text(_)) => Ordering::Greater,
        (Segment::Text(_), Segment::Numeric(_)) => Ordering::Less,
        (Segment::Text(a), Segment::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        // An unrecognised qualifier always sorts after every known
        // qualifier kind, not just those below `Release`.
        (Segment::Qualifier(_), Segment::Text(_)) => Ordering::Less,
        (Segment::Text(_), Segment::Qualifier(_)) => Ordering::Greater,
    }
}

fn parse_segments(version: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();

    for ch in version.chars() {
        if ch == '.' || ch == '-' {
            if !current.is_empty() {
                segments.push(classify(&current));
                current.clear();
            }
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        segments.push(classify(&current));
    }

    segments
}

fn classify(token: &str) -> Segment {
    if let Ok(n) = token.parse::<u64>() {
        return Segment::Numeric(n);
    }
    match token.to_lowercase().as_str() {
        "alpha" | "a" => Segment::Qualifier(QualifierKind::Alpha),
        "beta" | "b" => Segment::Qualifier(QualifierKind::Beta),
        "milestone" | "m" => Segment::Qualifier(QualifierKind::Milestone),
        "rc" | "cr" => Segment::Qualifier(QualifierKind::Rc),
        "snapshot" => Segment::Qualifier(QualifierKind::Snapshot),
        "" | "ga" | "final" | "release" => Segment::Qualifier(QualifierKind::Release),
        "sp" => Segment::Qualifier(QualifierKind::Sp),
        _ => Segment::Text(token.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_ordering() {
        let v1 = Version::parse("1.0");
        let v2 = Version::parse("2.0");
        assert!(v1 < v2);
    }

    #[test]
    fn three_part_ordering() {
        let v1 = Version::parse("1.0.0");
        let v2 = Version::parse("1.0.1");
        let v3 = Version::parse("1.1.0");
        assert!(v1 < v2);
        assert!(v2 < v3);
    }

    #[test]
    fn qualifier_ordering() {
        let alpha = Version::parse("1.0-alpha");
        let beta = Version::parse("1.0-beta");
        let rc = Version::parse("1.0-rc");
        let release = Version::parse("1.0");
        let sp = Version::parse("1.0-sp");

        assert!(alpha < beta);
        assert!(beta < rc);
        assert!(rc < release);
        assert!(release < sp);
    }

    #[test]
    fn unknown_qualifier_sorts_after_every_known_qualifier() {
        let ga = Version::parse("1.0-ga");
        let xyz = Version::parse("1.0-xyz");
        assert!(ga < xyz);
        let sp = Version::parse("1.0-sp");
        assert!(sp < xyz);
    }

    #[test]
    fn snapshot_before_release() {
        let snap = Version::parse("1.0-SNAPSHOT");
        let rel = Version::parse("1.0");
        assert!(snap < rel);
    }

    #[test]
    fn trailing_zeros_equal() {
        let v1 = Version::parse("1.0");
        let v2 = Version::parse("1.0.0");
        assert_eq!(v1, v2);
    }

    #[test]
    fn numeric_vs_string() {
        let v1 = Version::parse("1.0.0");
        let v2 = Version::parse("1.0.0-jre");
        assert!(v1 > v2);
    }

    #[test]
    fn is_snapshot_literal() {
        let v = Version::parse("1.0-SNAPSHOT");
        assert!(v.is_snapshot());
        assert_eq!(v.base_version(), "1.0");

        let v2 = Version::parse("1.0.0");
        assert!(!v2.is_snapshot());
    }

    #[test]
    fn is_snapshot_timestamped() {
        let v = Version::parse("1.0-20240115.093000-3");
        assert!(v.is_snapshot());
        assert_eq!(v.base_version(), "1.0");
    }

    #[test]
    fn display() {
        let v = Version::parse("1.8.0");
        assert_eq!(v.to_string(), "1.8.0");
    }
}
