use std::fs;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use encoding_rs::Encoding;

use crate::error::CsvError;
use crate::header::{extend_union, realign_row, reconcile, Reconciliation};
use crate::key::{natural_sort, NaturalKey};
use crate::lines::LineWriter;
use crate::row::{serialize_row, split_row};
use crate::row_source::RowSource;

/// A file staged for merging, with the parameters needed to read it.
#[derive(Clone, Debug, PartialEq)]
pub struct StagedFile {
    path: PathBuf,
    field_separator: char,
    encoding: &'static Encoding,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn field_separator(&self) -> char {
        self.field_separator
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }
}

/// Concatenate delimited text files with differing columns.
///
/// Files are staged first, possibly with different separators and encodings. The merged output
/// has the union of all staged columns, in the order they are first seen, and each staged file
/// contributes its rows aligned to that union, with empty values for the columns it lacks.
///
/// # Examples
/// ```no_run
/// use std::path::{Path, PathBuf};
/// use csv_sort_merge::merge::Merge;
///
/// fn merge_parts() -> Result<(), anyhow::Error> {
///     let mut merge = Merge::new(PathBuf::from("./target/merged"))?;
///     merge.stage(&[PathBuf::from("part-1.csv"), PathBuf::from("parts/")], ',', encoding_rs::UTF_8)?;
///     merge.merge_staged_files(Path::new("all.csv"), ';', encoding_rs::UTF_8, false, true)?;
///     Ok(())
/// }
/// ```
pub struct Merge {
    output_folder: PathBuf,
    extension: String,
    staged_files: Vec<StagedFile>,
}

impl Merge {
    /// Create a Merge writing relative output paths under `output_folder`, which is created if
    /// missing. Only files with the `csv` extension are staged by default.
    pub fn new(output_folder: PathBuf) -> Result<Merge, anyhow::Error> {
        fs::create_dir_all(&output_folder)
            .with_context(|| format!("path: {}", output_folder.display()))?;
        Ok(
            Merge {
                output_folder,
                extension: "csv".to_string(),
                staged_files: Vec::new(),
            }
        )
    }

    /// Set the extension of the files to stage. The default is "csv"
    pub fn with_extension(&mut self, extension: &str) {
        self.extension = extension.to_string();
    }

    /// Stage files for merging. A path may be a file or a directory, in which case its files
    /// are staged in natural order of their names. Files without the staging extension are
    /// skipped.
    ///
    /// Every path is checked before any is staged; an unknown path fails with
    /// [CsvError::Path]. Returns the number of files staged.
    pub fn stage(&mut self, paths: &[PathBuf], field_separator: char, encoding: &'static Encoding) -> Result<usize, anyhow::Error> {
        if let Some(missing) = paths.iter().find(|path| !path.exists()) {
            return Err(CsvError::path(missing.clone()).into());
        }

        let mut candidates = Vec::new();
        for path in paths {
            if path.is_dir() {
                let mut entries = Vec::new();
                for entry in fs::read_dir(path).with_context(|| format!("path: {}", path.display()))? {
                    let entry_path = entry?.path();
                    if entry_path.is_file() {
                        entries.push(entry_path);
                    }
                }
                natural_sort(&mut entries);
                candidates.append(&mut entries);
            } else {
                candidates.push(path.clone());
            }
        }

        let mut staged = 0;
        for path in candidates {
            if self.has_extension(&path) {
                log::info!("Staged file {}", path.display());
                self.staged_files.push(
                    StagedFile {
                        path,
                        field_separator,
                        encoding,
                    }
                );
                staged += 1;
            } else {
                log::warn!("Skipped file without .{} extension: {}", self.extension, path.display());
            }
        }
        Ok(staged)
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|extension| extension.to_string_lossy() == self.extension.as_str())
            .unwrap_or(false)
    }

    pub fn staged_files(&self) -> &[StagedFile] {
        &self.staged_files
    }

    /// The union of the staged files' columns, in the order they are first seen.
    pub fn union_header(&self) -> Result<Vec<String>, anyhow::Error> {
        let mut union = Vec::new();
        for staged in &self.staged_files {
            let source = RowSource::new(staged.path.clone(), staged.field_separator, staged.encoding, true)?;
            if let Some(header) = source.header()? {
                extend_union(&mut union, &header);
            }
        }
        Ok(union)
    }

    /// Merge all staged files into a new file at `output`, relative to the output folder.
    ///
    /// The output header is the [Merge::union_header]. When `sort_files` is set the staged files
    /// are merged in natural order of their paths, otherwise in staging order. When
    /// `remove_merged` is set each file is deleted once merged. The staged list is cleared
    /// whether or not the merge succeeds. Returns the path of the merged file.
    pub fn merge_staged_files(
        &mut self,
        output: &Path,
        field_separator: char,
        encoding: &'static Encoding,
        remove_merged: bool,
        sort_files: bool,
    ) -> Result<PathBuf, anyhow::Error> {
        let output_path = self.output_folder.join(output);
        let result = self.internal_merge_staged(&output_path, field_separator, encoding, remove_merged, sort_files);
        self.staged_files.clear();
        result.map(|_| output_path)
    }

    fn internal_merge_staged(
        &self,
        output_path: &Path,
        field_separator: char,
        encoding: &'static Encoding,
        remove_merged: bool,
        sort_files: bool,
    ) -> Result<(), anyhow::Error> {
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("path: {}", parent.display()))?;
        }
        let union = self.union_header()?;
        let mut writer = LineWriter::create(output_path, encoding)?;
        writer.write_line(&serialize_row(&union, field_separator))?;
        writer.finish()?;

        let mut staged_files = self.staged_files.clone();
        if sort_files {
            staged_files.sort_by_cached_key(|staged| NaturalKey::new(&staged.path.to_string_lossy()));
        }
        let mut rows = 0;
        for staged in &staged_files {
            rows += Self::merge_files(
                output_path,
                &staged.path,
                field_separator,
                staged.field_separator,
                encoding,
                staged.encoding,
            )?;
            if remove_merged {
                fs::remove_file(&staged.path)
                    .with_context(|| format!("path: {}", staged.path.display()))?;
            }
        }
        log::info!("Merged {} files into {}, rows: {}, columns: {}", staged_files.len(), output_path.display(), rows, union.len());
        Ok(())
    }

    /// Append the rows of `merged_file` to `main_file`.
    ///
    /// Every column of the merged file must appear in the main file's header, otherwise the
    /// call fails with [CsvError::Schema] before anything is written. With identical headers
    /// the rows are copied byte for byte. Otherwise each row is realigned to the main header,
    /// with empty values for missing columns, and written with the main separator. If anything
    /// fails after appending started, the main file is truncated back to its original length.
    /// Returns the number of rows appended.
    ///
    /// Header equality compares parsed column names only. Rows copied byte for byte keep the
    /// merged file's separator, so files with identical columns but a different separator
    /// should be merged into a main file using the same one.
    pub fn merge_files(
        main_file: &Path,
        merged_file: &Path,
        main_separator: char,
        merged_separator: char,
        main_encoding: &'static Encoding,
        merged_encoding: &'static Encoding,
    ) -> Result<usize, anyhow::Error> {
        let main = RowSource::new(main_file.to_path_buf(), main_separator, main_encoding, true)?;
        let merged = RowSource::new(merged_file.to_path_buf(), merged_separator, merged_encoding, true)?;
        let main_header = main.header()?.unwrap_or_default();
        let merged_header = match merged.header()? {
            Some(header) => header,
            None => {
                log::info!("Nothing to merge from empty file {}", merged_file.display());
                return Ok(0);
            }
        };
        let reconciliation = reconcile(&main_header, &merged_header)
            .with_context(|| format!("merging {} into {}", merged_file.display(), main_file.display()))?;

        let file = OpenOptions::new()
            .append(true)
            .open(main_file)
            .with_context(|| format!("path: {}", main_file.display()))?;
        let original_len = file.metadata()?.len();
        let rollback = file.try_clone()?;

        let result = Self::append_rows(&main, &merged, &merged_header, reconciliation, file, original_len);
        match result {
            Ok(rows) => {
                log::info!("Merged {} rows from {} into {}", rows, merged_file.display(), main_file.display());
                Ok(rows)
            }
            Err(e) => {
                rollback.set_len(original_len)
                    .with_context(|| format!("Failed to restore {} after: {:#}", main_file.display(), e))?;
                Err(e)
            }
        }
    }

    fn append_rows(
        main: &RowSource,
        merged: &RowSource,
        merged_header: &[String],
        reconciliation: Reconciliation,
        mut file: File,
        original_len: u64,
    ) -> Result<usize, anyhow::Error> {
        if original_len > 0 && !Self::ends_with_newline(main.path())? {
            file.write_all(b"\n")?;
        }
        match reconciliation {
            Reconciliation::Identical if main.encoding() == merged.encoding() => {
                Self::copy_rows(merged.path(), file)
            }
            Reconciliation::Identical => {
                let (_, reader) = merged.open_data()?;
                let mut writer = LineWriter::new(main.path(), file, main.encoding());
                for line in reader {
                    writer.write_line(&line?)?;
                }
                writer.finish()
            }
            Reconciliation::Realign(index) => {
                let (_, mut reader) = merged.open_data()?;
                let mut writer = LineWriter::new(main.path(), file, main.encoding());
                while let Some(line) = reader.read_line()? {
                    let fields = split_row(&line, merged.field_separator());
                    let row = realign_row(&fields, &index, merged_header.len())
                        .with_context(|| format!("file: {}, line: {}", merged.path().display(), reader.line_number()))?;
                    writer.write_line(&serialize_row(&row, main.field_separator()))?;
                }
                writer.finish()
            }
        }
    }

    /// Copy every byte after the header line, terminating the last row if needed.
    fn copy_rows(merged_file: &Path, file: File) -> Result<usize, anyhow::Error> {
        let mut reader = BufReader::new(
            File::open(merged_file).with_context(|| format!("path: {}", merged_file.display()))?
        );
        let mut header = Vec::new();
        reader.read_until(b'\n', &mut header)?;

        let mut writer = BufWriter::new(file);
        let mut rows = 0;
        let mut last = None;
        loop {
            let n = {
                let buf = reader.fill_buf()?;
                if buf.is_empty() {
                    break;
                }
                rows += buf.iter().filter(|b| **b == b'\n').count();
                last = buf.last().copied();
                writer.write_all(buf)?;
                buf.len()
            };
            reader.consume(n);
        }
        if matches!(last, Some(b) if b != b'\n') {
            writer.write_all(b"\n")?;
            rows += 1;
        }
        writer.flush()?;
        Ok(rows)
    }

    fn ends_with_newline(path: &Path) -> Result<bool, anyhow::Error> {
        let mut file = File::open(path)
            .with_context(|| format!("path: {}", path.display()))?;
        file.seek(SeekFrom::End(-1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        Ok(last[0] == b'\n')
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use encoding_rs::{UTF_8, WINDOWS_1252};
    use tempfile::tempdir;

    use crate::error::CsvError;
    use crate::merge::Merge;

    #[test]
    fn test_stage_directory_in_natural_order() -> Result<(), anyhow::Error> {
        let tmp = tempdir()?;
        let parts = tmp.path().join("parts");
        fs::create_dir(&parts)?;
        for name in ["part-10.csv", "part-2.csv", "part-1.csv", "notes.txt"] {
            fs::write(parts.join(name), "a\n1\n")?;
        }
        let mut merge = Merge::new(tmp.path().join("out"))?;
        let staged = merge.stage(&[parts.clone()], ',', UTF_8)?;
        assert_eq!(staged, 3);
        let names: Vec<String> = merge.staged_files().iter()
            .map(|staged| staged.path().file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["part-1.csv", "part-2.csv", "part-10.csv"]);
        Ok(())
    }

    #[test]
    fn test_stage_unknown_path_stages_nothing() -> Result<(), anyhow::Error> {
        let tmp = tempdir()?;
        let present = tmp.path().join("a.csv");
        fs::write(&present, "a\n1\n")?;
        let mut merge = Merge::new(tmp.path().join("out"))?;
        let error = merge.stage(&[present, PathBuf::from("./no/such.csv")], ',', UTF_8).unwrap_err();
        assert!(matches!(error.downcast_ref::<CsvError>(), Some(CsvError::Path { .. })));
        assert!(merge.staged_files().is_empty());
        Ok(())
    }

    #[test]
    fn test_transcode_identical_headers() -> Result<(), anyhow::Error> {
        let tmp = tempdir()?;
        let main = tmp.path().join("main.csv");
        let other = tmp.path().join("other.csv");
        fs::write(&main, "name\nabc\n")?;
        fs::write(&other, vec![b'n', b'a', b'm', b'e', b'\n', b'c', b'a', b'f', 0xe9, b'\n'])?;
        let rows = Merge::merge_files(&main, &other, ',', ',', UTF_8, WINDOWS_1252)?;
        assert_eq!(rows, 1);
        assert_eq!(fs::read_to_string(&main)?, "name\nabc\ncafé\n");
        Ok(())
    }

    #[test]
    fn test_missing_trailing_newlines() -> Result<(), anyhow::Error> {
        let tmp = tempdir()?;
        let main = tmp.path().join("main.csv");
        let other = tmp.path().join("other.csv");
        fs::write(&main, "a,b\n1,2")?;
        fs::write(&other, "a,b\n3,4")?;
        let rows = Merge::merge_files(&main, &other, ',', ',', UTF_8, UTF_8)?;
        assert_eq!(rows, 1);
        assert_eq!(fs::read_to_string(&main)?, "a,b\n1,2\n3,4\n");
        Ok(())
    }

    #[test]
    fn test_format_error_rolls_back() -> Result<(), anyhow::Error> {
        let tmp = tempdir()?;
        let main = tmp.path().join("main.csv");
        let other = tmp.path().join("other.csv");
        fs::write(&main, "a,b,c\n1,2,3\n")?;
        fs::write(&other, "c,a\n3,1\n6,4,extra\n")?;
        let error = Merge::merge_files(&main, &other, ',', ',', UTF_8, UTF_8).unwrap_err();
        assert!(matches!(error.downcast_ref::<CsvError>(), Some(CsvError::Format(_))));
        assert_eq!(fs::read_to_string(&main)?, "a,b,c\n1,2,3\n");
        Ok(())
    }

    #[test]
    fn test_unmappable_row_rolls_back() -> Result<(), anyhow::Error> {
        let tmp = tempdir()?;
        let main = tmp.path().join("main.csv");
        let other = tmp.path().join("other.csv");
        fs::write(&main, "a,b\n1,2\n")?;
        fs::write(&other, "b\n\u{3b1}\n")?;
        let error = Merge::merge_files(&main, &other, ',', ',', WINDOWS_1252, UTF_8).unwrap_err();
        assert!(matches!(error.downcast_ref::<CsvError>(), Some(CsvError::Format(_))));
        assert_eq!(fs::read_to_string(&main)?, "a,b\n1,2\n");
        Ok(())
    }

    #[test]
    fn test_extension_filter() -> Result<(), anyhow::Error> {
        let tmp = tempdir()?;
        let tsv = tmp.path().join("a.tsv");
        let csv = tmp.path().join("b.csv");
        fs::write(&tsv, "a\n1\n")?;
        fs::write(&csv, "a\n2\n")?;
        let mut merge = Merge::new(tmp.path().join("out"))?;
        merge.with_extension("tsv");
        assert_eq!(merge.stage(&[tsv.clone(), csv], '\t', UTF_8)?, 1);
        assert_eq!(merge.staged_files()[0].path(), tsv.as_path());
        Ok(())
    }

    #[test]
    fn test_empty_merged_file() -> Result<(), anyhow::Error> {
        let tmp = tempdir()?;
        let main = tmp.path().join("main.csv");
        let other = tmp.path().join("other.csv");
        fs::write(&main, "a\n1\n")?;
        fs::write(&other, "")?;
        assert_eq!(Merge::merge_files(&main, &other, ',', ',', UTF_8, UTF_8)?, 0);
        assert_eq!(fs::read_to_string(&main)?, "a\n1\n");
        Ok(())
    }
}
