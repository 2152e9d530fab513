use std::path::{Path, PathBuf};

use encoding_rs::Encoding;

pub use crate::chunk_iterator::ChunkIterator;
use crate::error::CsvError;
pub use crate::lines::LineReader;
use crate::row::parse_row;

/// A delimited text file read as lines, optionally preceded by a header line.
///
/// A row source can be opened any number of times, each time reading from the start.
///
/// # Examples
/// ```no_run
/// use std::path::PathBuf;
/// use csv_sort_merge::row_source::RowSource;
///
/// fn count(path: PathBuf) -> Result<usize, anyhow::Error> {
///     let source = RowSource::new(path, ';', encoding_rs::UTF_8, true)?;
///     source.len()
/// }
/// ```
#[derive(Clone, Debug)]
pub struct RowSource {
    path: PathBuf,
    field_separator: char,
    encoding: &'static Encoding,
    has_header: bool,
}

impl RowSource {
    /// Create a row source, failing with [CsvError::Path] when the file does not exist.
    pub fn new(path: PathBuf, field_separator: char, encoding: &'static Encoding, has_header: bool) -> Result<RowSource, anyhow::Error> {
        if !path.is_file() {
            return Err(CsvError::path(path).into());
        }
        Ok(
            RowSource {
                path,
                field_separator,
                encoding,
                has_header,
            }
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn field_separator(&self) -> char {
        self.field_separator
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn has_header(&self) -> bool {
        self.has_header
    }

    /// Open the file positioned at the first line, header included.
    pub fn open(&self) -> Result<LineReader, anyhow::Error> {
        LineReader::open(&self.path, self.encoding)
    }

    /// Open the file positioned at the first data line, returning the raw header line if the
    /// source has one. A header is None for an empty file.
    pub fn open_data(&self) -> Result<(Option<String>, LineReader), anyhow::Error> {
        let mut reader = self.open()?;
        let header = if self.has_header {
            reader.read_line()?
        } else {
            None
        };
        Ok((header, reader))
    }

    /// The parsed header, or None when the source has no header or is empty.
    pub fn header(&self) -> Result<Option<Vec<String>>, anyhow::Error> {
        let (header, _) = self.open_data()?;
        Ok(header.map(|line| parse_row(&line, self.field_separator)))
    }

    /// Number of data rows, header excluded.
    pub fn len(&self) -> Result<usize, anyhow::Error> {
        let (_, reader) = self.open_data()?;
        let mut rows = 0;
        for line in reader {
            line?;
            rows += 1;
        }
        Ok(rows)
    }

    pub fn is_empty(&self) -> Result<bool, anyhow::Error> {
        Ok(self.len()? == 0)
    }

    /// Iterate over the data rows in chunks of at most `chunk_size` lines.
    pub fn chunks(&self, chunk_size: usize) -> Result<ChunkIterator<LineReader>, anyhow::Error> {
        let (_, reader) = self.open_data()?;
        ChunkIterator::new(reader, chunk_size)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use encoding_rs::UTF_8;
    use tempfile::tempdir;

    use crate::error::CsvError;
    use crate::row_source::RowSource;

    #[test]
    fn test_missing_file() {
        let error = RowSource::new(PathBuf::from("./no/such/file.csv"), ',', UTF_8, true).unwrap_err();
        assert!(matches!(error.downcast_ref::<CsvError>(), Some(CsvError::Path { .. })));
    }

    #[test]
    fn test_header_and_len() -> Result<(), anyhow::Error> {
        let dir = tempdir()?;
        let path = dir.path().join("data.csv");
        fs::write(&path, "id;\"a;b\"\n1;x\n2;y\n3;z\n")?;
        let source = RowSource::new(path.clone(), ';', UTF_8, true)?;
        assert_eq!(source.header()?, Some(vec!["id".to_string(), "\"a;b\"".to_string()]));
        assert_eq!(source.len()?, 3);
        // restartable
        assert_eq!(source.len()?, 3);

        let headless = RowSource::new(path, ';', UTF_8, false)?;
        assert_eq!(headless.header()?, None);
        assert_eq!(headless.len()?, 4);
        Ok(())
    }

    #[test]
    fn test_chunks() -> Result<(), anyhow::Error> {
        let dir = tempdir()?;
        let path = dir.path().join("data.csv");
        fs::write(&path, "h\n1\n2\n3\n4\n5\n")?;
        let source = RowSource::new(path, ',', UTF_8, true)?;
        let chunks: Vec<Vec<String>> = source.chunks(2)?.collect::<Result<_, _>>()?;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], vec!["5".to_string()]);
        Ok(())
    }

    #[test]
    fn test_empty_file() -> Result<(), anyhow::Error> {
        let dir = tempdir()?;
        let path = dir.path().join("empty.csv");
        fs::write(&path, "")?;
        let source = RowSource::new(path, ',', UTF_8, true)?;
        assert_eq!(source.header()?, None);
        assert!(source.is_empty()?);
        Ok(())
    }
}
