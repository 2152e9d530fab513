use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use anyhow::Context;
use encoding_rs::UTF_8;
use tempfile::NamedTempFile;

use crate::error::CsvError;
use crate::header::{build_index, extend_union};
use crate::lines::LineReader;
use crate::row::{parse_row, serialize_row};

/// Storage for records waiting to be written by a [CsvWriter].
pub trait RecordBuffer {
    type Record;

    /// Drop all buffered records.
    fn reset(&mut self);

    fn add(&mut self, record: Self::Record);

    /// Number of buffered rows.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Columns of the buffered records, without duplicates, in the order they are first seen.
    fn columns(&self) -> Vec<String>;

    /// Write the buffered rows aligned to `header`, one line each. Columns a record lacks are
    /// written as empty values.
    fn write_rows<W: Write>(&self, header: &[String], field_separator: char, out: &mut W) -> Result<(), anyhow::Error>;
}

/// Make a value safe to write as a single field: newlines are removed and a value containing
/// the separator is wrapped in double quotes.
pub fn clean_value(value: &str, field_separator: char) -> String {
    let value: String = value.chars().filter(|c| *c != '\n' && *c != '\r').collect();
    if value.contains(field_separator) {
        format!("\"{}\"", value)
    } else {
        value
    }
}

/// Buffered writer of records with a dynamic set of columns.
///
/// Records are buffered and appended to the file every `buffer_size` records. The file may
/// already exist, in which case its header is kept and extended. Columns first seen after the
/// header was written are appended to the header, and the header line of the file is rewritten
/// by [CsvWriter::finish].
///
/// # Examples
/// ```no_run
/// use std::collections::BTreeMap;
/// use std::path::PathBuf;
/// use csv_sort_merge::writer::{CsvWriter, KeyValueBuffer};
///
/// fn store(records: Vec<BTreeMap<String, String>>) -> Result<usize, anyhow::Error> {
///     let mut writer = CsvWriter::new(PathBuf::from("records.csv"), 100, ';', KeyValueBuffer::new())?;
///     for record in records {
///         writer.handle_record(record)?;
///     }
///     writer.finish()
/// }
/// ```
pub struct CsvWriter<B: RecordBuffer> {
    path: PathBuf,
    buffer_size: usize,
    field_separator: char,
    buffer: B,
    header: Vec<String>,
    rows_stored: usize,
    header_changed: bool,
}

impl<B: RecordBuffer> CsvWriter<B> {
    /// Create a writer. Fails with [CsvError::Parameter] when `buffer_size` is 0 and with
    /// [CsvError::Path] when the directory of `path` does not exist.
    pub fn new(path: PathBuf, buffer_size: usize, field_separator: char, mut buffer: B) -> Result<CsvWriter<B>, anyhow::Error> {
        if buffer_size == 0 {
            return Err(CsvError::parameter("buffer size must be positive").into());
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(CsvError::path(parent.to_path_buf()).into());
            }
        }
        let header = Self::existing_header(&path, field_separator)?;
        buffer.reset();
        Ok(
            CsvWriter {
                path,
                buffer_size,
                field_separator,
                buffer,
                header,
                rows_stored: 0,
                header_changed: false,
            }
        )
    }

    fn existing_header(path: &Path, field_separator: char) -> Result<Vec<String>, anyhow::Error> {
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let mut reader = LineReader::open(path, UTF_8)?;
        Ok(
            reader.read_line()?
                .map(|line| parse_row(&line, field_separator))
                .unwrap_or_default()
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Rows written to the file so far.
    pub fn rows_stored(&self) -> usize {
        self.rows_stored
    }

    /// Buffer a record, writing the buffer out once it holds `buffer_size` rows.
    pub fn handle_record(&mut self, record: B::Record) -> Result<(), anyhow::Error> {
        self.buffer.add(record);
        if self.buffer.len() >= self.buffer_size {
            self.write_buffer()?;
        }
        Ok(())
    }

    /// Handle every record received until all senders are dropped, then [CsvWriter::finish].
    pub fn handle_receiver(&mut self, receiver: Receiver<B::Record>) -> Result<usize, anyhow::Error> {
        for record in receiver.iter() {
            self.handle_record(record)?;
        }
        self.finish()
    }

    /// Write the remaining buffered rows and bring the header line up to date. Returns the
    /// number of rows stored.
    pub fn finish(&mut self) -> Result<usize, anyhow::Error> {
        if !self.buffer.is_empty() {
            self.write_buffer()?;
        }
        if self.header_changed {
            self.rewrite_header()?;
        }
        Ok(self.rows_stored)
    }

    fn write_buffer(&mut self) -> Result<(), anyhow::Error> {
        let first_write = self.header.is_empty();
        let before = self.header.len();
        extend_union(&mut self.header, &self.buffer.columns());
        if !first_write && self.header.len() > before {
            self.header_changed = true;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("path: {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        if first_write {
            writeln!(writer, "{}", serialize_row(&self.header, self.field_separator))?;
        }
        self.buffer.write_rows(&self.header, self.field_separator, &mut writer)?;
        writer.flush()
            .with_context(|| format!("path: {}", self.path.display()))?;

        let rows = self.buffer.len();
        self.rows_stored += rows;
        log::info!("Wrote {} rows to {}, total: {}", rows, self.path.display(), self.rows_stored);
        self.buffer.reset();
        Ok(())
    }

    fn rewrite_header(&mut self) -> Result<(), anyhow::Error> {
        log::info!("Updating header of {}", self.path.display());
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut reader = BufReader::new(
            File::open(&self.path).with_context(|| format!("path: {}", self.path.display()))?
        );
        let mut old_header = Vec::new();
        reader.read_until(b'\n', &mut old_header)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            writeln!(writer, "{}", serialize_row(&self.header, self.field_separator))?;
            std::io::copy(&mut reader, &mut writer)?;
            writer.flush()?;
        }
        tmp.persist(&self.path)
            .with_context(|| format!("path: {}", self.path.display()))?;
        self.header_changed = false;
        Ok(())
    }
}

/// Buffer of key-value records.
#[derive(Default)]
pub struct KeyValueBuffer {
    records: Vec<BTreeMap<String, String>>,
}

impl KeyValueBuffer {
    pub fn new() -> KeyValueBuffer {
        KeyValueBuffer::default()
    }
}

impl RecordBuffer for KeyValueBuffer {
    type Record = BTreeMap<String, String>;

    fn reset(&mut self) {
        self.records.clear();
    }

    fn add(&mut self, record: Self::Record) {
        self.records.push(record);
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        for record in &self.records {
            for name in record.keys() {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
        }
        columns
    }

    fn write_rows<W: Write>(&self, header: &[String], field_separator: char, out: &mut W) -> Result<(), anyhow::Error> {
        for record in &self.records {
            let row: Vec<String> = header.iter()
                .map(|column| {
                    record.get(column)
                        .map(|value| clean_value(value, field_separator))
                        .unwrap_or_default()
                })
                .collect();
            writeln!(out, "{}", serialize_row(&row, field_separator))?;
        }
        Ok(())
    }
}

/// A batch of rows sharing the same columns.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table, failing with [CsvError::Format] when a row does not have one value per
    /// column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Table, anyhow::Error> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != columns.len()) {
            return Err(
                CsvError::format(
                    format!("table row {} has {} values for {} columns", i, row.len(), columns.len())
                ).into()
            );
        }
        Ok(Table { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

/// Buffer of table batches.
#[derive(Default)]
pub struct TableBuffer {
    tables: Vec<Table>,
}

impl TableBuffer {
    pub fn new() -> TableBuffer {
        TableBuffer::default()
    }
}

impl RecordBuffer for TableBuffer {
    type Record = Table;

    fn reset(&mut self) {
        self.tables.clear();
    }

    fn add(&mut self, record: Self::Record) {
        self.tables.push(record);
    }

    fn len(&self) -> usize {
        self.tables.iter().map(|table| table.rows.len()).sum()
    }

    fn columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        for table in &self.tables {
            extend_union(&mut columns, &table.columns);
        }
        columns
    }

    fn write_rows<W: Write>(&self, header: &[String], field_separator: char, out: &mut W) -> Result<(), anyhow::Error> {
        for table in &self.tables {
            let index = build_index(&table.columns, header);
            for row in &table.rows {
                let values: Vec<String> = index.iter()
                    .map(|position| match position {
                        Some(i) => clean_value(&row[*i], field_separator),
                        None => String::new(),
                    })
                    .collect();
                writeln!(out, "{}", serialize_row(&values, field_separator))?;
            }
        }
        Ok(())
    }
}
