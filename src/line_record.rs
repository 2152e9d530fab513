use std::cmp::Ordering;

use crate::key::NaturalKey;
use crate::sort_key::SortKey;

/// A raw line together with its precomputed sort key. Records compare by key only.
#[derive(Debug)]
pub(crate) struct LineRecord {
    line: String,
    key: NaturalKey,
}

impl LineRecord {
    pub(crate) fn new(line: String, sort_key: &SortKey, field_separator: char) -> Result<LineRecord, anyhow::Error> {
        let key = sort_key.extract(&line, field_separator)?;
        Ok(
            LineRecord {
                line,
                key,
            }
        )
    }

    pub(crate) fn line(&self) -> &str {
        &self.line
    }
}

impl Eq for LineRecord {}

impl PartialEq<Self> for LineRecord {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl PartialOrd<Self> for LineRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LineRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}
