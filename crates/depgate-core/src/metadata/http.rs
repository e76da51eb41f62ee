//! Remote feed source over HTTP.

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use super::{MetadataSource, PackageMetadata, SourceCacheContext};
use crate::error::SourceError;
use crate::types::PackageIdentity;

/// Fetches `GET <base>/<id>/<version>.json`, ids lower-cased.
///
/// A 404 is a miss; any other non-success status is a transient failure.
#[derive(Debug, Clone)]
pub struct HttpSource {
    name: String,
    base_url: Url,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(name: impl Into<String>, base_url: Url) -> Self {
        Self::with_client(name, base_url, reqwest::Client::new())
    }

    pub fn with_client(name: impl Into<String>, base_url: Url, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            base_url,
            client,
        }
    }

    /// Metadata URL for `identity`, if it has a version.
    pub fn metadata_url(&self, identity: &PackageIdentity) -> Option<Url> {
        let version = identity.normalized_version()?;
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .push(&identity.id_key())
            .push(&format!("{version}.json"));
        Some(url)
    }

    fn transport_error(&self, message: impl Into<String>) -> SourceError {
        SourceError::Transport {
            source_name: self.name.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl MetadataSource for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_metadata(
        &self,
        identity: &PackageIdentity,
        cache: &SourceCacheContext,
    ) -> Result<Option<PackageMetadata>, SourceError> {
        let Some(url) = self.metadata_url(identity) else {
            return Ok(None);
        };

        let key = SourceCacheContext::key(&self.name, identity);
        if let Some(cached) = cache.get(&key) {
            return Ok(cached);
        }

        tracing::debug!(source = %self.name, %url, "fetching package metadata");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            cache.insert(key, None);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(self.transport_error(format!("HTTP {status} from {url}")));
        }

        let metadata: PackageMetadata =
            response
                .json()
                .await
                .map_err(|e| SourceError::InvalidMetadata {
                    source_name: self.name.clone(),
                    message: e.to_string(),
                })?;

        cache.insert(key, Some(metadata.clone()));
        Ok(Some(metadata))
    }
}
