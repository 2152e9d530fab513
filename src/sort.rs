use std::cmp::{max, min};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use encoding_rs::{Encoding, UTF_8};
use rlimit::{getrlimit, setrlimit, Resource};

use crate::chunk_sorter::create_initial_runs;
use crate::config::Config;
use crate::error::CsvError;
use crate::lines::{LineReader, LineWriter};
use crate::merger::merge_runs;
use crate::row_source::RowSource;
use crate::run::WorkDir;
use crate::sort_axis::SortAxis;
use crate::sort_key::SortKey;

/// Outcome of a successful [Sort::sort_file].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortSummary {
    rows: usize,
    runs_per_generation: Vec<usize>,
}

impl SortSummary {
    /// Number of data rows sorted, header excluded.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of runs in each merge generation, starting with the initial sorted chunks and
    /// ending with the single fully sorted run.
    pub fn runs_per_generation(&self) -> &[usize] {
        &self.runs_per_generation
    }
}

/// Sort a delimited text file along one of its columns, or shuffle it.
///
/// The input is read in chunks of `chunk_size` rows, each sorted in memory and written to a
/// temporary run. Runs are then merged in groups of at most `max_open` files, generation after
/// generation, until a single run remains. That run is written to the output with the original
/// header. Comparison uses natural order, so `item2` sorts before `item10`.
///
/// # Examples
/// ```no_run
/// use std::path::PathBuf;
/// use csv_sort_merge::sort::Sort;
/// use csv_sort_merge::sort_axis::SortAxis;
///
/// fn sort_by_id(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
///     let mut sort = Sort::new(input, output);
///     sort.with_sort_axis(SortAxis::column("id"));
///     sort.with_field_separator(';');
///     // keep at most 5000 rows in memory and 100 runs open at once
///     sort.with_chunk_size(5000);
///     sort.with_max_open(100);
///     // for large files it is recommended to use a dedicated directory for intermediate
///     // files, preferably on the same file system as the output
///     sort.with_tmp_dir(tmp);
///     let summary = sort.sort_file()?;
///     println!("sorted {} rows", summary.rows());
///     Ok(())
/// }
/// ```
pub struct Sort {
    input: PathBuf,
    output: PathBuf,
    tmp: PathBuf,
    sort_axis: SortAxis,
    has_header: bool,
    field_separator: char,
    encoding: &'static Encoding,
    chunk_size: usize,
    max_open: usize,
    tasks: usize,
    seed: Option<u64>,
}

impl Sort {
    /// Create a default Sort definition.
    ///
    /// * The default sort axis is [SortAxis::Random]
    /// * The input is expected to have a header
    /// * The default field separator is ','
    /// * The default encoding is UTF-8
    /// * Chunks of 2000 rows are sorted in memory
    /// * At most 200 runs are open at once
    /// * Intermediate files go to std::env::temp_dir()
    /// * Merge groups are processed sequentially
    pub fn new(input: PathBuf, output: PathBuf) -> Sort {
        Sort {
            input,
            output,
            tmp: std::env::temp_dir(),
            sort_axis: SortAxis::Random,
            has_header: true,
            field_separator: ',',
            encoding: UTF_8,
            chunk_size: 2000,
            max_open: 200,
            tasks: 1,
            seed: None,
        }
    }

    /// Set the directory for intermediate files. By default use std::env::temp_dir()
    pub fn with_tmp_dir(&mut self, tmp: PathBuf) {
        self.tmp = tmp;
    }

    /// Set the column to sort along.
    pub fn with_sort_axis(&mut self, sort_axis: SortAxis) {
        self.sort_axis = sort_axis;
    }

    /// Specify whether the first line is a header. The default is true
    pub fn with_header(&mut self, has_header: bool) {
        self.has_header = has_header;
    }

    /// Set the field separator. The default is ','
    pub fn with_field_separator(&mut self, field_separator: char) {
        self.field_separator = field_separator;
    }

    /// Set the encoding of the input, also used for the output. The default is UTF-8
    pub fn with_encoding(&mut self, encoding: &'static Encoding) {
        self.encoding = encoding;
    }

    /// Set the number of rows sorted in memory at once. The default is 2000
    pub fn with_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size;
    }

    /// Set the maximum number of runs read at once by one merge group. The default is 200
    pub fn with_max_open(&mut self, max_open: usize) {
        self.max_open = max_open;
    }

    /// Set the number of merge groups processed concurrently. Zero uses all system cores. The
    /// default is 1. Each group opens up to `max_open` runs, so the process may hold up to
    /// `tasks * max_open` runs open.
    pub fn with_tasks(&mut self, tasks: usize) {
        self.tasks = tasks;
    }

    /// Seed the random permutation used by [SortAxis::Random]
    pub fn with_seed(&mut self, seed: u64) {
        self.seed = Some(seed);
    }

    /// Sort the input file into the output file.
    ///
    /// Parameters are checked before anything is written. The working directory is removed on
    /// success and retained on failure for inspection, with its location logged.
    pub fn sort_file(&self) -> Result<SortSummary, anyhow::Error> {
        self.validate()?;
        let config = self.create_config();
        let source = RowSource::new(self.input.clone(), config.field_separator(), config.encoding(), config.has_header())?;
        let header = source.header()?;
        let sort_key = SortKey::resolve(&self.sort_axis, header.as_deref())?;

        let (current_soft, current_hard) = Self::get_rlimits()?;
        log::info!("Current rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        let required = (config.max_open() * config.tasks() + 256) as u64;
        let new_soft = min(max(required, current_soft), current_hard);
        log::info!("Set new rlimit NOFILE, soft: {}, hard: {}", new_soft, current_hard);
        Self::set_rlimits(new_soft, current_hard)?;
        let result = Self::internal_sort(&source, &sort_key, &config, &self.output);
        log::info!("Restore rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        Self::set_rlimits(current_soft, current_hard)?;
        result
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.chunk_size == 0 {
            return Err(CsvError::parameter("chunk size must be positive").into());
        }
        if self.max_open < 2 {
            return Err(CsvError::parameter(format!("max open files must be at least 2, got {}", self.max_open)).into());
        }
        if matches!(self.sort_axis, SortAxis::Column(_)) && !self.has_header {
            return Err(CsvError::parameter("Cannot infer sorting column's position without a header").into());
        }
        Ok(())
    }

    fn create_config(&self) -> Config {
        let mut tasks = self.tasks;
        if self.tasks == 0 {
            tasks = num_cpus::get();
        }

        Config::new(
            self.tmp.clone(),
            "csv-sort-".to_string(),
            tasks,
            self.field_separator,
            self.encoding,
            self.has_header,
            self.chunk_size,
            self.max_open,
            self.seed,
        )
    }

    fn get_rlimits() -> Result<(u64, u64), anyhow::Error> {
        getrlimit(Resource::NOFILE).with_context(|| "getrlimit")
    }

    fn set_rlimits(soft: u64, hard: u64) -> Result<(), anyhow::Error> {
        setrlimit(Resource::NOFILE, soft, hard)
            .with_context(|| format!("set rlimit NOFILE, soft: {}, hard: {}", soft, hard))?;
        Ok(())
    }

    fn internal_sort(source: &RowSource, sort_key: &SortKey, config: &Config, output: &Path) -> Result<SortSummary, anyhow::Error> {
        log::info!("Start sorting {}", source.path().display());
        let work_dir = WorkDir::create(config.tmp(), config.tmp_prefix())?;
        match Self::sort_in(&work_dir, source, sort_key, config, output) {
            Ok(summary) => {
                work_dir.remove()?;
                log::info!("Finish sorting {}, rows: {}", source.path().display(), summary.rows());
                Ok(summary)
            }
            Err(e) => {
                log::error!("Sort of {} failed, working directory retained at {}", source.path().display(), work_dir.root().display());
                Err(e)
            }
        }
    }

    fn sort_in(work_dir: &WorkDir, source: &RowSource, sort_key: &SortKey, config: &Config, output: &Path) -> Result<SortSummary, anyhow::Error> {
        let initial = create_initial_runs(source, sort_key, config, work_dir)?;
        log::info!("Merging {} initial runs, max open: {}, tasks: {}", initial.runs(), config.max_open(), config.tasks());
        let (last, runs_per_generation) = merge_runs(work_dir, sort_key, config)?;
        Self::write_output(&work_dir.run_path(last), initial.header(), sort_key.is_random(), config, output)?;
        Ok(
            SortSummary {
                rows: initial.rows(),
                runs_per_generation,
            }
        )
    }

    fn write_output(sorted: &Path, header: Option<&str>, remove_index: bool, config: &Config, output: &Path) -> Result<(), anyhow::Error> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("path: {}", parent.display()))?;
            }
        }
        let mut writer = LineWriter::create(output, config.encoding())?;
        if let Some(header) = header {
            writer.write_line(header)?;
        }
        for line in LineReader::open_run(sorted)? {
            let line = line?;
            if remove_index {
                writer.write_line(SortKey::strip(&line, config.field_separator()))?;
            } else {
                writer.write_line(&line)?;
            }
        }
        writer.finish()?;
        log::info!("Successfully moved the sorted file to {}", output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use crate::error::CsvError;
    use crate::sort::Sort;
    use crate::sort_axis::SortAxis;

    fn parameter_error(sort: &Sort) -> bool {
        match sort.sort_file() {
            Err(e) => matches!(e.downcast_ref::<CsvError>(), Some(CsvError::Parameter(_))),
            Ok(_) => false,
        }
    }

    #[test]
    fn test_invalid_parameters_fail_before_io() -> Result<(), anyhow::Error> {
        let tmp = tempdir()?;
        let input = tmp.path().join("input.csv");
        let output = tmp.path().join("output.csv");
        fs::write(&input, "a,b\n2,x\n1,y\n")?;

        let mut sort = Sort::new(input.clone(), output.clone());
        sort.with_tmp_dir(tmp.path().to_path_buf());
        sort.with_chunk_size(0);
        assert!(parameter_error(&sort));

        let mut sort = Sort::new(input.clone(), output.clone());
        sort.with_tmp_dir(tmp.path().to_path_buf());
        sort.with_max_open(1);
        assert!(parameter_error(&sort));

        let mut sort = Sort::new(input.clone(), output.clone());
        sort.with_tmp_dir(tmp.path().to_path_buf());
        sort.with_sort_axis(SortAxis::column("a"));
        sort.with_header(false);
        assert!(parameter_error(&sort));

        assert!(!output.exists());
        assert_eq!(fs::read_dir(tmp.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_missing_input() {
        let sort = Sort::new("./no/such/input.csv".into(), "./no/such/output.csv".into());
        let error = sort.sort_file().unwrap_err();
        assert!(matches!(error.downcast_ref::<CsvError>(), Some(CsvError::Path { .. })));
    }

    #[test]
    fn test_failure_retains_working_directory() -> Result<(), anyhow::Error> {
        let tmp = tempdir()?;
        let work = tmp.path().join("work");
        let input = tmp.path().join("input.csv");
        fs::write(&input, "a,b\n2,x\n1\n")?;

        let mut sort = Sort::new(input, tmp.path().join("output.csv"));
        sort.with_tmp_dir(work.clone());
        sort.with_sort_axis(SortAxis::Index(1));
        let error = sort.sort_file().unwrap_err();
        assert!(matches!(error.downcast_ref::<CsvError>(), Some(CsvError::Format(_))));
        assert_eq!(fs::read_dir(&work)?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_header_only() -> Result<(), anyhow::Error> {
        let tmp = tempdir()?;
        let input = tmp.path().join("input.csv");
        let output = tmp.path().join("nested").join("output.csv");
        fs::write(&input, "a,b\n")?;
        let mut sort = Sort::new(input, output.clone());
        sort.with_tmp_dir(tmp.path().to_path_buf());
        sort.with_sort_axis(SortAxis::column("b"));
        let summary = sort.sort_file()?;
        assert_eq!(summary.rows(), 0);
        assert_eq!(summary.runs_per_generation(), &[1]);
        assert_eq!(fs::read_to_string(&output)?, "a,b\n");
        Ok(())
    }
}
