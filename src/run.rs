use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use data_encoding::HEXLOWER;

/// Identifies a run by its merge generation and its position within that generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct RunId {
    generation: usize,
    cardinal: usize,
}

impl RunId {
    pub(crate) fn new(generation: usize, cardinal: usize) -> RunId {
        RunId {
            generation,
            cardinal,
        }
    }

    pub(crate) fn generation(&self) -> usize {
        self.generation
    }

    pub(crate) fn cardinal(&self) -> usize {
        self.cardinal
    }
}

/// Randomly named directory holding every run of one sort, laid out as
/// `<root>/<generation>/<cardinal>`.
///
/// Runs are addressed by [RunId] and files are only opened by the step that reads or writes
/// them. The directory is not removed on drop: [WorkDir::remove] is called on success, while a
/// failed sort leaves it in place.
#[derive(Debug)]
pub(crate) struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    pub(crate) fn create(tmp: &Path, prefix: &str) -> Result<WorkDir, anyhow::Error> {
        fs::create_dir_all(tmp)
            .with_context(|| format!("path: {}", tmp.display()))?;
        let name = format!("{}{}", prefix, HEXLOWER.encode(&rand::random::<[u8; 16]>()));
        let root = tmp.join(name);
        // create_dir fails if the directory already exists
        fs::create_dir(&root)
            .with_context(|| format!("Failed to create working directory: {}", root.display()))?;
        Ok(
            WorkDir {
                root
            }
        )
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn generation_path(&self, generation: usize) -> PathBuf {
        self.root.join(generation.to_string())
    }

    pub(crate) fn run_path(&self, run: RunId) -> PathBuf {
        self.generation_path(run.generation()).join(run.cardinal().to_string())
    }

    pub(crate) fn create_generation(&self, generation: usize) -> Result<(), anyhow::Error> {
        let path = self.generation_path(generation);
        fs::create_dir(&path)
            .with_context(|| format!("path: {}", path.display()))?;
        Ok(())
    }

    /// List the runs of a generation ordered by cardinal.
    pub(crate) fn runs(&self, generation: usize) -> Result<Vec<RunId>, anyhow::Error> {
        let path = self.generation_path(generation);
        let mut runs = Vec::new();
        for entry in fs::read_dir(&path).with_context(|| format!("path: {}", path.display()))? {
            let entry = entry?;
            let name = entry.file_name();
            let cardinal = name.to_string_lossy()
                .parse::<usize>()
                .map_err(|_| anyhow!("Unexpected file in working directory: {}", entry.path().display()))?;
            runs.push(RunId::new(generation, cardinal));
        }
        runs.sort();
        Ok(runs)
    }

    pub(crate) fn remove_generation(&self, generation: usize) -> Result<(), anyhow::Error> {
        let path = self.generation_path(generation);
        fs::remove_dir_all(&path)
            .with_context(|| format!("path: {}", path.display()))?;
        Ok(())
    }

    pub(crate) fn remove(self) -> Result<(), anyhow::Error> {
        fs::remove_dir_all(&self.root)
            .with_context(|| format!("path: {}", self.root.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use crate::run::{RunId, WorkDir};

    #[test]
    fn test_layout_and_listing() -> Result<(), anyhow::Error> {
        let tmp = tempdir()?;
        let work_dir = WorkDir::create(tmp.path(), "csv-sort-")?;
        work_dir.create_generation(0)?;
        for cardinal in [10, 2, 0, 1] {
            fs::write(work_dir.run_path(RunId::new(0, cardinal)), "")?;
        }
        let runs = work_dir.runs(0)?;
        let cardinals: Vec<usize> = runs.iter().map(|run| run.cardinal()).collect();
        assert_eq!(cardinals, vec![0, 1, 2, 10]);
        assert_eq!(work_dir.run_path(RunId::new(0, 2)), work_dir.root().join("0").join("2"));

        work_dir.remove_generation(0)?;
        assert!(!work_dir.generation_path(0).exists());
        let root = work_dir.root().to_path_buf();
        work_dir.remove()?;
        assert!(!root.exists());
        Ok(())
    }

    #[test]
    fn test_distinct_names() -> Result<(), anyhow::Error> {
        let tmp = tempdir()?;
        let a = WorkDir::create(tmp.path(), "csv-sort-")?;
        let b = WorkDir::create(tmp.path(), "csv-sort-")?;
        assert_ne!(a.root(), b.root());
        Ok(())
    }
}
