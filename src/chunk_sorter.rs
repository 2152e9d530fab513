use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::chunk_iterator::ChunkIterator;
use crate::config::Config;
use crate::line_record::LineRecord;
use crate::lines::LineWriter;
use crate::row_source::RowSource;
use crate::run::{RunId, WorkDir};
use crate::sort_key::SortKey;

/// Result of splitting the input into generation 0.
#[derive(Debug)]
pub(crate) struct InitialRuns {
    header: Option<String>,
    rows: usize,
    runs: usize,
}

impl InitialRuns {
    /// The raw header line, when the input has one.
    pub(crate) fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    pub(crate) fn rows(&self) -> usize {
        self.rows
    }

    pub(crate) fn runs(&self) -> usize {
        self.runs
    }
}

/// Split the data rows of `source` into sorted runs of at most `chunk_size` rows each, written
/// to generation 0 with cardinals 0, 1, ... in input order. Input with no data rows yields a
/// single empty run.
pub(crate) fn create_initial_runs(source: &RowSource, sort_key: &SortKey, config: &Config, work_dir: &WorkDir) -> Result<InitialRuns, anyhow::Error> {
    log::info!("Start creating initial runs from {}", source.path().display());
    let field_separator = config.field_separator();
    work_dir.create_generation(0)?;

    let (header, reader) = source.open_data()?;
    let lines: Box<dyn Iterator<Item=Result<String, anyhow::Error>>> = if sort_key.is_random() {
        let mut rng = match config.seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let permutation = SortKey::permutation(source.len()?, &mut rng);
        Box::new(
            reader.zip(permutation)
                .map(move |(line, index)| line.map(|line| SortKey::prepend(index, &line, field_separator)))
        )
    } else {
        Box::new(reader)
    };

    let mut rows = 0;
    let mut runs = 0;
    for chunk in ChunkIterator::new(lines, config.chunk_size())? {
        let chunk = chunk?;
        let mut records = Vec::with_capacity(chunk.len());
        for (n, line) in chunk.into_iter().enumerate() {
            let record = LineRecord::new(line, sort_key, field_separator)
                .with_context(|| format!("file: {}, data row: {}", source.path().display(), rows + n + 1))?;
            records.push(record);
        }
        // stable, equal keys keep their input order
        records.sort();
        rows += records.len();
        write_run(work_dir, RunId::new(0, runs), &records)?;
        runs += 1;
    }

    if runs == 0 {
        write_run(work_dir, RunId::new(0, 0), &[])?;
        runs = 1;
    }
    log::info!("Done creating initial runs, rows: {}, runs: {}", rows, runs);
    Ok(
        InitialRuns {
            header,
            rows,
            runs,
        }
    )
}

fn write_run(work_dir: &WorkDir, run: RunId, records: &[LineRecord]) -> Result<(), anyhow::Error> {
    let path = work_dir.run_path(run);
    let mut writer = LineWriter::create_run(&path)?;
    for record in records {
        writer.write_line(record.line())?;
    }
    let lines = writer.finish()?;
    log::debug!("Wrote run {}/{} with {} lines", run.generation(), run.cardinal(), lines);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use encoding_rs::UTF_8;
    use tempfile::tempdir;

    use crate::chunk_sorter::create_initial_runs;
    use crate::config::Config;
    use crate::lines::LineReader;
    use crate::row_source::RowSource;
    use crate::run::{RunId, WorkDir};
    use crate::sort_key::SortKey;

    fn config(tmp: &Path, chunk_size: usize) -> Config {
        Config::new(tmp.to_path_buf(), "csv-sort-".to_string(), 1, ',', UTF_8, true, chunk_size, 3, Some(11))
    }

    fn read_run(work_dir: &WorkDir, run: RunId) -> Result<Vec<String>, anyhow::Error> {
        LineReader::open_run(&work_dir.run_path(run))?.collect()
    }

    #[test]
    fn test_chunks_sorted_stably() -> Result<(), anyhow::Error> {
        let tmp = tempdir()?;
        let input = tmp.path().join("input.csv");
        fs::write(&input, "id,v\na,3\nb,1\nc,2\nd,1\ne,10\n")?;
        let source = RowSource::new(input, ',', UTF_8, true)?;
        let work_dir = WorkDir::create(tmp.path(), "csv-sort-")?;
        let initial = create_initial_runs(&source, &SortKey::Index { index: 1 }, &config(tmp.path(), 2), &work_dir)?;

        assert_eq!(initial.header(), Some("id,v"));
        assert_eq!(initial.rows(), 5);
        assert_eq!(initial.runs(), 3);
        assert_eq!(work_dir.runs(0)?.len(), 3);
        assert_eq!(read_run(&work_dir, RunId::new(0, 0))?, vec!["b,1", "a,3"]);
        assert_eq!(read_run(&work_dir, RunId::new(0, 1))?, vec!["d,1", "c,2"]);
        assert_eq!(read_run(&work_dir, RunId::new(0, 2))?, vec!["e,10"]);
        Ok(())
    }

    #[test]
    fn test_random_key_prepends_permutation() -> Result<(), anyhow::Error> {
        let tmp = tempdir()?;
        let input = tmp.path().join("input.csv");
        let mut content = String::from("v\n");
        for i in 0..50 {
            content.push_str(&format!("row{}\n", i));
        }
        fs::write(&input, content)?;
        let source = RowSource::new(input, ',', UTF_8, true)?;
        let work_dir = WorkDir::create(tmp.path(), "csv-sort-")?;
        let initial = create_initial_runs(&source, &SortKey::Random, &config(tmp.path(), 100), &work_dir)?;
        assert_eq!(initial.runs(), 1);

        let lines = read_run(&work_dir, RunId::new(0, 0))?;
        let indices: Vec<usize> = lines.iter()
            .map(|line| line.split(',').next().unwrap().parse::<usize>().unwrap())
            .collect();
        assert_eq!(indices, (0..50).collect::<Vec<usize>>());
        Ok(())
    }

    #[test]
    fn test_empty_input_yields_one_empty_run() -> Result<(), anyhow::Error> {
        let tmp = tempdir()?;
        let input = tmp.path().join("input.csv");
        fs::write(&input, "id,v\n")?;
        let source = RowSource::new(input, ',', UTF_8, true)?;
        let work_dir = WorkDir::create(tmp.path(), "csv-sort-")?;
        let initial = create_initial_runs(&source, &SortKey::Index { index: 0 }, &config(tmp.path(), 2), &work_dir)?;
        assert_eq!(initial.rows(), 0);
        assert_eq!(initial.runs(), 1);
        assert!(read_run(&work_dir, RunId::new(0, 0))?.is_empty());
        Ok(())
    }
}
