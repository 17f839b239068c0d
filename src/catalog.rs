use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::config::SyncConfig;
use crate::domain::{DatasetDescriptor, DatasetId, parse_timestamp};
use crate::error::SyncError;

/// Remote catalog: lists datasets for a theme and streams a dataset's data.
///
/// Implementations do not retry; the orchestrator owns retry policy.
pub trait CatalogClient: Send + Sync {
    fn list_datasets(&self, theme: &str) -> Result<Vec<DatasetDescriptor>, SyncError>;
    fn download_dataset(&self, id: &DatasetId, destination: &Path) -> Result<(), SyncError>;
}

impl<T: CatalogClient + ?Sized> CatalogClient for &T {
    fn list_datasets(&self, theme: &str) -> Result<Vec<DatasetDescriptor>, SyncError> {
        (**self).list_datasets(theme)
    }

    fn download_dataset(&self, id: &DatasetId, destination: &Path) -> Result<(), SyncError> {
        (**self).download_dataset(id, destination)
    }
}

impl<T: CatalogClient + ?Sized> CatalogClient for Arc<T> {
    fn list_datasets(&self, theme: &str) -> Result<Vec<DatasetDescriptor>, SyncError> {
        (**self).list_datasets(theme)
    }

    fn download_dataset(&self, id: &DatasetId, destination: &Path) -> Result<(), SyncError> {
        (**self).download_dataset(id, destination)
    }
}

#[derive(Clone, Debug)]
pub struct CatalogHttpClient {
    client: Client,
    endpoint: Url,
}

impl CatalogHttpClient {
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("catalog-sync/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SyncError::InvalidConfig(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| SyncError::CatalogUnavailable(err.to_string()))?;
        let endpoint = Url::parse(config.catalog_endpoint.trim()).map_err(|err| {
            SyncError::InvalidConfig(format!(
                "catalog endpoint {:?}: {err}",
                config.catalog_endpoint
            ))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(SyncError::InvalidConfig(format!(
                "catalog endpoint {:?} cannot take a path",
                config.catalog_endpoint
            )));
        }
        Ok(Self { client, endpoint })
    }

    /// `{endpoint}/{id}/data`, with the identifier percent-encoded as one
    /// path segment.
    pub fn data_url(&self, id: &DatasetId) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(id.as_str()).push("data");
        }
        url
    }
}

impl CatalogClient for CatalogHttpClient {
    fn list_datasets(&self, theme: &str) -> Result<Vec<DatasetDescriptor>, SyncError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("theme", theme)])
            .send()
            .map_err(|err| SyncError::CatalogUnavailable(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(SyncError::CatalogUnavailable(format!(
                "catalog returned status {status}"
            )));
        }
        let body = response
            .bytes()
            .map_err(|err| SyncError::CatalogUnavailable(err.to_string()))?;
        parse_catalog_response(&body)
    }

    fn download_dataset(&self, id: &DatasetId, destination: &Path) -> Result<(), SyncError> {
        let mut response = self
            .client
            .get(self.data_url(id))
            .send()
            .map_err(|err| SyncError::download(id, err))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(SyncError::download(id, format!("server returned status {status}")));
        }

        let file = File::create(destination).map_err(|err| {
            SyncError::download(id, format!("create {}: {err}", destination.display()))
        })?;
        let mut writer = BufWriter::new(file);
        std::io::copy(&mut response, &mut writer).map_err(|err| SyncError::download(id, err))?;
        writer.flush().map_err(|err| SyncError::download(id, err))?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    items: Vec<CatalogItem>,
}

#[derive(Debug, Deserialize)]
struct CatalogItem {
    #[serde(alias = "identifier")]
    id: String,
    modified: String,
}

/// Parses a catalog listing body into descriptors.
///
/// A repeated identifier keeps its first position and its latest `modified`.
pub fn parse_catalog_response(body: &[u8]) -> Result<Vec<DatasetDescriptor>, SyncError> {
    let response: CatalogResponse = serde_json::from_slice(body)
        .map_err(|err| SyncError::CatalogUnavailable(format!("malformed catalog response: {err}")))?;

    let mut descriptors: Vec<DatasetDescriptor> = Vec::with_capacity(response.items.len());
    let mut positions = HashMap::<DatasetId, usize>::new();
    for item in response.items {
        let id: DatasetId = item.id.parse().map_err(|err: SyncError| {
            SyncError::CatalogUnavailable(format!("malformed catalog response: {err}"))
        })?;
        let modified = parse_timestamp(&item.modified).map_err(|err| {
            SyncError::CatalogUnavailable(format!("malformed catalog response for {id}: {err}"))
        })?;
        match positions.get(&id) {
            Some(&index) => {
                let existing = &mut descriptors[index];
                if modified > existing.modified {
                    existing.modified = modified;
                }
            }
            None => {
                positions.insert(id.clone(), descriptors.len());
                descriptors.push(DatasetDescriptor::new(id, modified));
            }
        }
    }
    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn data_url_joins_endpoint() {
        let config = SyncConfig {
            catalog_endpoint: "https://example.test/items/".to_string(),
            ..SyncConfig::default()
        };
        let client = CatalogHttpClient::new(&config).unwrap();
        let id: DatasetId = "xubh-q36u".parse().unwrap();
        assert_eq!(
            client.data_url(&id).as_str(),
            "https://example.test/items/xubh-q36u/data"
        );
    }

    #[test]
    fn data_url_escapes_reserved_characters() {
        let client = CatalogHttpClient::new(&SyncConfig {
            catalog_endpoint: "https://example.test/items".to_string(),
            ..SyncConfig::default()
        })
        .unwrap();
        let id: DatasetId = "a?b#c%d".parse().unwrap();
        let url = client.data_url(&id);
        assert_eq!(url.as_str(), "https://example.test/items/a%3Fb%23c%25d/data");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn relative_endpoint_is_invalid_config() {
        let config = SyncConfig {
            catalog_endpoint: "data.cms.gov/items".to_string(),
            ..SyncConfig::default()
        };
        assert_matches!(
            CatalogHttpClient::new(&config),
            Err(SyncError::InvalidConfig(_))
        );
    }

    #[test]
    fn missing_items_is_malformed() {
        let err = parse_catalog_response(br#"{"results": []}"#).unwrap_err();
        assert_matches!(err, SyncError::CatalogUnavailable(_));
    }
}
