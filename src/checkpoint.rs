use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::domain::{DatasetId, parse_timestamp};
use crate::error::SyncError;
use crate::sync::RunSummary;

/// What the last completed run synchronized, and when it started.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCheckpoint {
    #[serde(
        serialize_with = "serialize_last_run",
        deserialize_with = "deserialize_last_run"
    )]
    pub last_run: Option<DateTime<Utc>>,
    pub downloaded_datasets: BTreeSet<DatasetId>,
}

impl RunCheckpoint {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_synchronized(&self, id: &DatasetId) -> bool {
        self.downloaded_datasets.contains(id)
    }
}

fn serialize_last_run<S: Serializer>(
    value: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(at) => serializer.serialize_some(&at.to_rfc3339_opts(SecondsFormat::Micros, true)),
        None => serializer.serialize_none(),
    }
}

fn deserialize_last_run<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|value| parse_timestamp(&value).map_err(serde::de::Error::custom))
        .transpose()
}

/// Single-file JSON checkpoint, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: Utf8PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Loads the checkpoint. A missing file is the empty checkpoint; an
    /// unreadable or unparseable one is an error, never silently reset.
    pub fn load(&self) -> Result<RunCheckpoint, SyncError> {
        let content = match fs::read(self.path.as_std_path()) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path, "no checkpoint found, starting fresh");
                return Ok(RunCheckpoint::empty());
            }
            Err(err) => return Err(self.corrupt(err)),
        };
        serde_json::from_slice(&content).map_err(|err| self.corrupt(err))
    }

    /// Writes the checkpoint to a sibling temp file, syncs it, then renames it
    /// over the previous checkpoint.
    pub fn save(&self, checkpoint: &RunCheckpoint) -> Result<(), SyncError> {
        self.write_atomic(checkpoint).map_err(|err| SyncError::CheckpointWriteFailed {
            path: self.path.clone().into_std_path_buf(),
            message: err.to_string(),
            summary: Box::new(RunSummary::default()),
        })
    }

    fn write_atomic(&self, checkpoint: &RunCheckpoint) -> io::Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.as_std_path(),
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let content = serde_json::to_vec_pretty(checkpoint).map_err(io::Error::other)?;
        let mut temp = tempfile::Builder::new()
            .prefix(".checkpoint")
            .suffix(".tmp")
            .tempfile_in(parent)?;
        temp.write_all(&content)?;
        temp.as_file().sync_all()?;
        temp.persist(self.path.as_std_path())
            .map_err(|err| err.error)?;
        Ok(())
    }

    fn corrupt(&self, err: impl ToString) -> SyncError {
        SyncError::CheckpointCorrupt {
            path: self.path.clone().into_std_path_buf(),
            message: err.to_string(),
        }
    }
}
