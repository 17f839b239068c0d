use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::sync::RunSummary;

#[derive(Debug, Error, Diagnostic)]
pub enum SyncError {
    #[error("invalid dataset identifier: {0:?}")]
    InvalidDatasetId(String),

    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("catalog unavailable: {0}")]
    #[diagnostic(help("check the catalog endpoint and network connectivity, then rerun"))]
    CatalogUnavailable(String),

    #[error("download of {id} failed: {message}")]
    DownloadFailed { id: String, message: String },

    #[error("header normalization of {id} failed: {message}")]
    TransformFailed { id: String, message: String },

    #[error("checkpoint at {path} is corrupt: {message}")]
    #[diagnostic(help(
        "inspect or remove the checkpoint file; removing it forces a full re-download"
    ))]
    CheckpointCorrupt { path: PathBuf, message: String },

    #[error("failed to write checkpoint at {path}: {message}")]
    #[diagnostic(help(
        "datasets synchronized by this run were not recorded and will be downloaded again next run"
    ))]
    CheckpointWriteFailed {
        path: PathBuf,
        message: String,
        summary: Box<RunSummary>,
    },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("run cancelled before completion; checkpoint left unchanged")]
    Cancelled { summary: Box<RunSummary> },
}

impl SyncError {
    /// Stable name of the error variant, used in run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::InvalidDatasetId(_) => "invalid_dataset_id",
            SyncError::InvalidTimestamp(_) => "invalid_timestamp",
            SyncError::ConfigRead(_) => "config_read",
            SyncError::ConfigParse(_) => "config_parse",
            SyncError::InvalidConfig(_) => "invalid_config",
            SyncError::CatalogUnavailable(_) => "catalog_unavailable",
            SyncError::DownloadFailed { .. } => "download_failed",
            SyncError::TransformFailed { .. } => "transform_failed",
            SyncError::CheckpointCorrupt { .. } => "checkpoint_corrupt",
            SyncError::CheckpointWriteFailed { .. } => "checkpoint_write_failed",
            SyncError::Filesystem(_) => "filesystem",
            SyncError::Cancelled { .. } => "cancelled",
        }
    }

    /// Attaches the run summary to errors that report one.
    pub fn with_summary(self, summary: RunSummary) -> Self {
        match self {
            SyncError::CheckpointWriteFailed { path, message, .. } => {
                SyncError::CheckpointWriteFailed {
                    path,
                    message,
                    summary: Box::new(summary),
                }
            }
            SyncError::Cancelled { .. } => SyncError::Cancelled {
                summary: Box::new(summary),
            },
            other => other,
        }
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            SyncError::CheckpointWriteFailed { summary, .. } | SyncError::Cancelled { summary } => {
                Some(summary.as_ref())
            }
            _ => None,
        }
    }

    pub fn download(id: impl ToString, message: impl ToString) -> Self {
        SyncError::DownloadFailed {
            id: id.to_string(),
            message: message.to_string(),
        }
    }

    pub fn transform(id: impl ToString, message: impl ToString) -> Self {
        SyncError::TransformFailed {
            id: id.to_string(),
            message: message.to_string(),
        }
    }
}
