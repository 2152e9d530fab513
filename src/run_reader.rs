use std::cmp::Ordering;
use std::path::Path;

use crate::line_record::LineRecord;
use crate::lines::LineReader;
use crate::sort_key::SortKey;

/// An open run positioned at its smallest unmerged line.
///
/// Ordering is inverted for use in a max [std::collections::BinaryHeap]: the reader with the
/// smallest head pops first, and equal heads pop in source order.
pub(crate) struct RunReader {
    source: usize,
    reader: LineReader,
    head: LineRecord,
}

impl RunReader {
    /// Open a run, returning None if it is empty.
    pub(crate) fn open(source: usize, path: &Path, sort_key: &SortKey, field_separator: char) -> Result<Option<RunReader>, anyhow::Error> {
        let mut reader = LineReader::open_run(path)?;
        match reader.read_line()? {
            Some(line) => {
                let head = LineRecord::new(line, sort_key, field_separator)?;
                Ok(Some(RunReader { source, reader, head }))
            }
            None => Ok(None),
        }
    }

    pub(crate) fn head(&self) -> &LineRecord {
        &self.head
    }

    /// Advance to the next line, returning None and closing the run when it is exhausted.
    pub(crate) fn advance(mut self, sort_key: &SortKey, field_separator: char) -> Result<Option<RunReader>, anyhow::Error> {
        match self.reader.read_line()? {
            Some(line) => {
                self.head = LineRecord::new(line, sort_key, field_separator)?;
                Ok(Some(self))
            }
            None => Ok(None),
        }
    }
}

impl Eq for RunReader {}

impl PartialEq<Self> for RunReader {
    fn eq(&self, other: &Self) -> bool {
        self.head == other.head && self.source == other.source
    }
}

impl PartialOrd<Self> for RunReader {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RunReader {
    fn cmp(&self, other: &Self) -> Ordering {
        // comparison is flipped to work with BinaryHeap (Max Heap)
        other.head
            .cmp(&self.head)
            .then_with(|| other.source.cmp(&self.source))
    }
}
