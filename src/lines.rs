use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use encoding_rs::{Encoding, UTF_8};

use crate::error::CsvError;
use crate::row::strip_endl;

/// Sequential reader of decoded lines, without line endings.
pub struct LineReader {
    path: PathBuf,
    reader: BufReader<File>,
    encoding: &'static Encoding,
    buf: Vec<u8>,
    line_number: usize,
}

impl LineReader {
    /// Open a file for reading lines in the given encoding.
    pub fn open(path: &Path, encoding: &'static Encoding) -> Result<LineReader, anyhow::Error> {
        let file = File::open(path)
            .with_context(|| format!("path: {}", path.display()))?;
        Ok(
            LineReader {
                path: path.to_path_buf(),
                reader: BufReader::new(file),
                encoding,
                buf: Vec::new(),
                line_number: 0,
            }
        )
    }

    /// Open a run file, which is always UTF-8.
    pub(crate) fn open_run(path: &Path) -> Result<LineReader, anyhow::Error> {
        LineReader::open(path, UTF_8)
    }

    /// Read the next line, or None at the end of the file.
    pub fn read_line(&mut self) -> Result<Option<String>, anyhow::Error> {
        self.buf.clear();
        let bytes = self.reader.read_until(b'\n', &mut self.buf)
            .with_context(|| format!("path: {}, line: {}", self.path.display(), self.line_number + 1))?;
        if bytes == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        let (line, had_errors) = self.encoding.decode_without_bom_handling(&self.buf);
        if had_errors {
            return Err(
                CsvError::format(
                    format!(
                        "invalid {} data, path: {}, line: {}",
                        self.encoding.name(),
                        self.path.display(),
                        self.line_number,
                    )
                ).into()
            );
        }
        Ok(Some(strip_endl(&line).to_string()))
    }

    /// Number of lines read so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl Iterator for LineReader {
    type Item = Result<String, anyhow::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_line().transpose()
    }
}

/// Buffered writer of encoded, newline terminated lines.
pub(crate) struct LineWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    encoding: &'static Encoding,
    lines: usize,
}

impl LineWriter {
    pub(crate) fn create(path: &Path, encoding: &'static Encoding) -> Result<LineWriter, anyhow::Error> {
        let file = File::create(path)
            .with_context(|| format!("path: {}", path.display()))?;
        Ok(LineWriter::new(path, file, encoding))
    }

    pub(crate) fn create_run(path: &Path) -> Result<LineWriter, anyhow::Error> {
        LineWriter::create(path, UTF_8)
    }

    pub(crate) fn new(path: &Path, file: File, encoding: &'static Encoding) -> LineWriter {
        LineWriter {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            encoding,
            lines: 0,
        }
    }

    pub(crate) fn write_line(&mut self, line: &str) -> Result<(), anyhow::Error> {
        let (bytes, _, had_errors) = self.encoding.encode(line);
        if had_errors {
            return Err(
                CsvError::format(
                    format!(
                        "data not representable in {}, path: {}, line: {}",
                        self.encoding.name(),
                        self.path.display(),
                        self.lines + 1,
                    )
                ).into()
            );
        }
        self.writer.write_all(&bytes)
            .and_then(|_| self.writer.write_all(b"\n"))
            .with_context(|| format!("path: {}", self.path.display()))?;
        self.lines += 1;
        Ok(())
    }

    /// Flush and close, returning the number of lines written.
    pub(crate) fn finish(mut self) -> Result<usize, anyhow::Error> {
        self.writer.flush()
            .with_context(|| format!("path: {}", self.path.display()))?;
        Ok(self.lines)
    }
}
