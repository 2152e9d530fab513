//! Natural order comparison.
//!
//! A string is split into alternating runs of non digit and digit characters. Runs are compared
//! element by element, digit runs by integer value and the others lexicographically, so that
//! `item2 < item10`. A shorter sequence sorts before a longer one with the same prefix.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

fn digits_regex() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new("[0-9]+").expect("valid digits regex"))
}

/// The integer value of a digit run, kept as its significant digits so that arbitrarily long
/// runs compare correctly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Digits(String);

impl Digits {
    fn new(digits: &str) -> Digits {
        Digits(digits.trim_start_matches('0').to_string())
    }
}

impl PartialOrd<Self> for Digits {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Digits {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Segment {
    Text {
        s: String
    },
    Number {
        n: Digits
    },
}

/// Natural order sort key of a string.
///
/// The segment sequence always starts and ends with a (possibly empty) text segment and
/// alternates in between, so two keys only ever compare segments of the same kind.
///
/// # Examples
/// ```
/// use csv_sort_merge::key::NaturalKey;
/// assert!(NaturalKey::new("item2") < NaturalKey::new("item10"));
/// assert!(NaturalKey::new("item") < NaturalKey::new("item0"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct NaturalKey {
    segments: Vec<Segment>,
}

impl NaturalKey {
    pub fn new(value: &str) -> NaturalKey {
        let mut segments = Vec::new();
        let mut last = 0;
        for m in digits_regex().find_iter(value) {
            segments.push(Segment::Text { s: value[last..m.start()].to_string() });
            segments.push(Segment::Number { n: Digits::new(m.as_str()) });
            last = m.end();
        }
        segments.push(Segment::Text { s: value[last..].to_string() });
        NaturalKey {
            segments
        }
    }
}

/// Compare two strings in natural order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    NaturalKey::new(a).cmp(&NaturalKey::new(b))
}

/// Sort paths in natural order of their string form. The sort is stable.
pub fn natural_sort(paths: &mut [PathBuf]) {
    paths.sort_by_cached_key(|path| NaturalKey::new(&path.to_string_lossy()));
}
