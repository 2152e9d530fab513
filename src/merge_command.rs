use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use command_executor::command::Command;

use crate::merger::{merge_group, MergeGroup};
use crate::sort_key::SortKey;

/// Merges one group of runs on a thread pool. Failures are collected for the submitting thread,
/// which only inspects them after the pool is joined, and are never returned to the pool.
pub(crate) struct MergeCommand {
    group: MergeGroup,
    sort_key: SortKey,
    field_separator: char,
    max_open: usize,
    failures: Arc<Mutex<Vec<anyhow::Error>>>,
}

impl MergeCommand {
    pub(crate) fn new(
        group: MergeGroup,
        sort_key: SortKey,
        field_separator: char,
        max_open: usize,
        failures: Arc<Mutex<Vec<anyhow::Error>>>,
    ) -> MergeCommand {
        MergeCommand {
            group,
            sort_key,
            field_separator,
            max_open,
            failures,
        }
    }
}

impl Command for MergeCommand {
    fn execute(&self) -> Result<(), anyhow::Error> {
        // errors stay out of the pool, a worker that ends with an error panics on join
        if let Err(e) = merge_group(&self.group, &self.sort_key, self.field_separator, self.max_open) {
            log::error!("Failed to merge into {}: {:#}", self.group.output().display(), e);
            self.failures
                .lock()
                .map_err(|_| anyhow!("Merge failures lock poisoned"))?
                .push(e);
        }
        Ok(())
    }
}
