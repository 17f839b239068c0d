use std::fs;
use std::io;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};

use crate::catalog::CatalogClient;
use crate::domain::{DatasetDescriptor, DatasetId};
use crate::error::SyncError;
use crate::normalize::rewrite_header_in_place;

/// Result of processing one dataset within a run.
#[derive(Debug)]
pub enum SyncOutcome {
    Success { id: DatasetId, path: Utf8PathBuf },
    Failure { id: DatasetId, error: SyncError },
}

impl SyncOutcome {
    pub fn id(&self) -> &DatasetId {
        match self {
            SyncOutcome::Success { id, .. } | SyncOutcome::Failure { id, .. } => id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Success { .. })
    }
}

/// Published location of a dataset: `{output_dir}/{id}.csv`.
pub fn dataset_path(output_dir: &Utf8Path, id: &DatasetId) -> Utf8PathBuf {
    output_dir.join(format!("{id}.csv"))
}

/// Staging location the download streams into before it is normalized and
/// published. Derived from the identifier so an interrupted run leaves a file
/// the next attempt overwrites.
pub fn staging_path(output_dir: &Utf8Path, id: &DatasetId) -> Utf8PathBuf {
    output_dir.join(format!("{id}.csv.part"))
}

/// Downloads one dataset and normalizes its header row.
pub struct Worker<'a, C: CatalogClient + ?Sized> {
    client: &'a C,
    output_dir: &'a Utf8Path,
}

impl<'a, C: CatalogClient + ?Sized> Worker<'a, C> {
    pub fn new(client: &'a C, output_dir: &'a Utf8Path) -> Self {
        Self { client, output_dir }
    }

    pub fn process(&self, descriptor: &DatasetDescriptor) -> SyncOutcome {
        let id = descriptor.id.clone();
        let staged = staging_path(self.output_dir, &id);
        match self.fetch_and_transform(&id, &staged) {
            Ok(path) => SyncOutcome::Success { id, path },
            Err(error) => {
                discard(&staged);
                SyncOutcome::Failure { id, error }
            }
        }
    }

    fn fetch_and_transform(
        &self,
        id: &DatasetId,
        staged: &Utf8Path,
    ) -> Result<Utf8PathBuf, SyncError> {
        fs::create_dir_all(self.output_dir.as_std_path())
            .map_err(|err| SyncError::Filesystem(format!("create {}: {err}", self.output_dir)))?;

        let start = Instant::now();
        self.client.download_dataset(id, staged.as_std_path())?;
        debug!(
            dataset = %id,
            latency_ms = start.elapsed().as_millis() as u64,
            "download complete"
        );

        let rewrite = rewrite_header_in_place(staged.as_std_path())
            .map_err(|err| SyncError::transform(id, err))?;
        debug!(dataset = %id, columns = rewrite.columns.len(), "headers normalized");

        let published = dataset_path(self.output_dir, id);
        fs::rename(staged.as_std_path(), published.as_std_path())
            .map_err(|err| SyncError::transform(id, format!("publish {published}: {err}")))?;
        Ok(published)
    }
}

fn discard(staged: &Utf8Path) {
    match fs::remove_file(staged.as_std_path()) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %staged, error = %err, "failed to remove staging file"),
    }
}
