use std::cmp::min;
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use command_executor::shutdown_mode::ShutdownMode;
use command_executor::thread_pool_builder::ThreadPoolBuilder;

use crate::config::Config;
use crate::error::CsvError;
use crate::lines::LineWriter;
use crate::merge_command::MergeCommand;
use crate::run::{RunId, WorkDir};
use crate::run_reader::RunReader;
use crate::sort_key::SortKey;

/// Runs of one generation merged into a single run of the next generation.
#[derive(Clone, Debug)]
pub(crate) struct MergeGroup {
    inputs: Vec<PathBuf>,
    output: PathBuf,
}

impl MergeGroup {
    pub(crate) fn new(inputs: Vec<PathBuf>, output: PathBuf) -> MergeGroup {
        MergeGroup {
            inputs,
            output,
        }
    }

    pub(crate) fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub(crate) fn output(&self) -> &Path {
        &self.output
    }
}

/// Partition the runs of `generation` into contiguous groups of at most `max_open` runs. Group
/// `i` is written to run `i` of the next generation.
pub(crate) fn plan_generation(work_dir: &WorkDir, runs: &[RunId], max_open: usize) -> Vec<MergeGroup> {
    runs.chunks(max_open)
        .enumerate()
        .map(|(i, group)| {
            let generation = group[0].generation();
            MergeGroup::new(
                group.iter().map(|run| work_dir.run_path(*run)).collect(),
                work_dir.run_path(RunId::new(generation + 1, i)),
            )
        })
        .collect()
}

/// Merge generations until a single run remains. Returns that run and the number of runs in
/// every generation, starting with generation 0.
///
/// Generation `g + 1` is fully written before generation `g` is deleted.
pub(crate) fn merge_runs(work_dir: &WorkDir, sort_key: &SortKey, config: &Config) -> Result<(RunId, Vec<usize>), anyhow::Error> {
    let mut runs_per_generation = Vec::new();
    let mut generation = 0;
    loop {
        let runs = work_dir.runs(generation)?;
        runs_per_generation.push(runs.len());
        match runs.len() {
            0 => {
                return Err(anyhow!("No runs found in generation {}", generation));
            }
            1 => {
                log::info!("Converged at generation {}", generation);
                return Ok((runs[0], runs_per_generation));
            }
            _ => {}
        }

        work_dir.create_generation(generation + 1)?;
        let groups = plan_generation(work_dir, &runs, config.max_open());
        log::info!("Merging generation {}: {} runs in {} groups", generation, runs.len(), groups.len());
        if config.tasks() > 1 && groups.len() > 1 {
            merge_concurrently(groups, sort_key, config)?;
        } else {
            for group in &groups {
                merge_group(group, sort_key, config.field_separator(), config.max_open())?;
            }
        }
        work_dir.remove_generation(generation)?;
        log::info!("Done with merging generation {}", generation);
        generation += 1;
    }
}

/// K-way merge of the group's runs into its output run. Equal keys are emitted in input run
/// order, so the merge is stable. Returns the number of lines written.
pub(crate) fn merge_group(group: &MergeGroup, sort_key: &SortKey, field_separator: char, max_open: usize) -> Result<usize, anyhow::Error> {
    if group.inputs().len() > max_open {
        return Err(
            CsvError::parameter(
                format!("merge group of {} runs exceeds max open files {}", group.inputs().len(), max_open)
            ).into()
        );
    }

    let mut heap = BinaryHeap::with_capacity(group.inputs().len());
    for (source, path) in group.inputs().iter().enumerate() {
        if let Some(reader) = RunReader::open(source, path, sort_key, field_separator)? {
            heap.push(reader);
        }
    }

    let mut writer = LineWriter::create_run(group.output())?;
    while let Some(reader) = heap.pop() {
        writer.write_line(reader.head().line())?;
        if let Some(reader) = reader.advance(sort_key, field_separator)? {
            heap.push(reader);
        }
    }
    let lines = writer.finish()?;
    log::debug!("Merged {} runs into {}, {} lines", group.inputs().len(), group.output().display(), lines);
    Ok(lines)
}

fn merge_concurrently(groups: Vec<MergeGroup>, sort_key: &SortKey, config: &Config) -> Result<(), anyhow::Error> {
    let failures: Arc<Mutex<Vec<anyhow::Error>>> = Arc::new(Mutex::new(Vec::new()));
    let mut thread_pool_builder = ThreadPoolBuilder::new();
    let mut merging_pool = thread_pool_builder
        .with_name("merging".to_string())
        .with_tasks(min(config.tasks(), groups.len()))
        .with_queue_size(config.queue_size())
        .with_shutdown_mode(ShutdownMode::CompletePending)
        .with_join_error_handler(|name, message| {
            log::error!("Merging thread {} ended with an error: {}", name, message);
        })
        .build()?;

    for group in groups {
        let merge_command = Box::new(
            MergeCommand::new(
                group,
                sort_key.clone(),
                config.field_separator(),
                config.max_open(),
                failures.clone(),
            )
        );
        merging_pool.submit(merge_command);
    }
    merging_pool.shutdown();
    let joined = merging_pool.join();

    let mut failures = failures.lock()
        .map_err(|_| anyhow!("Merge failures lock poisoned"))?;
    if failures.is_empty() {
        joined
    } else {
        Err(failures.remove(0))
    }
}
