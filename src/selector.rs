use chrono::{DateTime, Utc};

use crate::checkpoint::RunCheckpoint;
use crate::domain::DatasetDescriptor;

/// True when the dataset changed after the last completed run. Equal
/// timestamps count as already synchronized.
pub fn modified_since(descriptor: &DatasetDescriptor, last_run: Option<DateTime<Utc>>) -> bool {
    match last_run {
        None => true,
        Some(last_run) => descriptor.modified > last_run,
    }
}

/// A dataset needs work when it changed since the last run, or when no run
/// has ever synchronized it (a failed attempt leaves it out of the
/// checkpoint, so it stays eligible after `last_run` moves forward).
pub fn needs_sync(descriptor: &DatasetDescriptor, checkpoint: &RunCheckpoint) -> bool {
    modified_since(descriptor, checkpoint.last_run)
        || !checkpoint.is_synchronized(&descriptor.id)
}

pub fn select_work(
    descriptors: &[DatasetDescriptor],
    checkpoint: &RunCheckpoint,
) -> Vec<DatasetDescriptor> {
    plan_work(descriptors, checkpoint).selected
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkPlan {
    pub selected: Vec<DatasetDescriptor>,
    pub skipped: Vec<DatasetDescriptor>,
}

/// Splits the catalog listing into datasets to (re)download and datasets to
/// skip.
pub fn plan_work(descriptors: &[DatasetDescriptor], checkpoint: &RunCheckpoint) -> WorkPlan {
    let (selected, skipped) = descriptors
        .iter()
        .cloned()
        .partition(|descriptor| needs_sync(descriptor, checkpoint));
    WorkPlan { selected, skipped }
}
