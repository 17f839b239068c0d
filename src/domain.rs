use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::SyncError;

/// Catalog-assigned dataset identifier. Also names the dataset's local file,
/// so it must be usable as a single path component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetId {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && trimmed != "."
            && trimmed != ".."
            && !trimmed
                .chars()
                .any(|ch| matches!(ch, '/' | '\\' | '\0') || ch.is_control());
        if !is_valid {
            return Err(SyncError::InvalidDatasetId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl<'de> Deserialize<'de> for DatasetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescriptor {
    pub id: DatasetId,
    pub modified: DateTime<Utc>,
}

impl DatasetDescriptor {
    pub fn new(id: DatasetId, modified: DateTime<Utc>) -> Self {
        Self { id, modified }
    }
}

/// Parses the timestamp forms catalogs and older checkpoints use: RFC 3339,
/// naive ISO-8601 date-times and plain dates. Naive values are taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, SyncError> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| SyncError::InvalidTimestamp(value.to_string()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn dataset_id_rejects_path_components() {
        for bad in ["", "  ", ".", "..", "a/b", "a\\b"] {
            let err = bad.parse::<DatasetId>().unwrap_err();
            assert_matches!(err, SyncError::InvalidDatasetId(_));
        }
    }

    #[test]
    fn timestamp_forms() {
        let midnight = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-03").unwrap(), midnight);
        assert_eq!(parse_timestamp("2024-01-03T00:00:00").unwrap(), midnight);
        assert_eq!(parse_timestamp("2024-01-03T01:00:00+01:00").unwrap(), midnight);
        assert_matches!(
            parse_timestamp("last tuesday"),
            Err(SyncError::InvalidTimestamp(_))
        );
    }
}
