use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};

use catalog_sync::catalog::parse_catalog_response;
use catalog_sync::error::SyncError;

#[test]
fn parses_listing_in_catalog_order() {
    let body = br#"{
        "items": [
            {"identifier": "xubh-q36u", "modified": "2024-05-01", "title": "Hospital General Information"},
            {"id": "4jcv-atw7", "modified": "2024-04-17T09:30:00"}
        ]
    }"#;

    let descriptors = parse_catalog_response(body).unwrap();
    assert_eq!(descriptors.len(), 2);
    assert_eq!(descriptors[0].id.as_str(), "xubh-q36u");
    assert_eq!(
        descriptors[0].modified,
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    );
    assert_eq!(descriptors[1].id.as_str(), "4jcv-atw7");
}

#[test]
fn duplicate_ids_keep_latest_modified() {
    let body = br#"{
        "items": [
            {"id": "dup", "modified": "2024-01-01"},
            {"id": "other", "modified": "2024-01-02"},
            {"id": "dup", "modified": "2024-03-01"},
            {"id": "dup", "modified": "2024-02-01"}
        ]
    }"#;

    let descriptors = parse_catalog_response(body).unwrap();
    assert_eq!(descriptors.len(), 2);
    assert_eq!(descriptors[0].id.as_str(), "dup");
    assert_eq!(
        descriptors[0].modified,
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    );
}

#[test]
fn bad_timestamp_is_malformed_listing() {
    let body = br#"{"items": [{"id": "xubh-q36u", "modified": "sometime in May"}]}"#;
    let err = parse_catalog_response(body).unwrap_err();
    assert_matches!(err, SyncError::CatalogUnavailable(message) if message.contains("xubh-q36u"));
}

#[test]
fn path_like_id_is_malformed_listing() {
    let body = br#"{"items": [{"id": "../escape", "modified": "2024-05-01"}]}"#;
    assert_matches!(
        parse_catalog_response(body),
        Err(SyncError::CatalogUnavailable(_))
    );
}

#[test]
fn empty_listing_is_fine() {
    assert!(parse_catalog_response(br#"{"items": []}"#).unwrap().is_empty());
}
