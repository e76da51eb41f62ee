//! Folder-backed source: the global package cache or a fallback folder.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{MetadataSource, PackageMetadata, SourceCacheContext};
use crate::error::SourceError;
use crate::types::PackageIdentity;

/// File name suffix of the per-version metadata document.
const METADATA_SUFFIX: &str = ".metadata.json";

/// Reads `<root>/<id>/<version>/<id>.metadata.json`, ids lower-cased.
#[derive(Debug, Clone)]
pub struct LocalFolderSource {
    name: String,
    root: PathBuf,
}

impl LocalFolderSource {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the metadata document for `identity`, if it has a version.
    pub fn metadata_path(&self, identity: &PackageIdentity) -> Option<PathBuf> {
        let version = identity.normalized_version()?;
        let id = identity.id_key();
        Some(
            self.root
                .join(&id)
                .join(version)
                .join(format!("{id}{METADATA_SUFFIX}")),
        )
    }
}

#[async_trait]
impl MetadataSource for LocalFolderSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_metadata(
        &self,
        identity: &PackageIdentity,
        cache: &SourceCacheContext,
    ) -> Result<Option<PackageMetadata>, SourceError> {
        let Some(path) = self.metadata_path(identity) else {
            return Ok(None);
        };

        let key = SourceCacheContext::key(&self.name, identity);
        if let Some(cached) = cache.get(&key) {
            return Ok(cached);
        }

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                cache.insert(key, None);
                return Ok(None);
            }
            Err(error) => {
                return Err(SourceError::Io {
                    source_name: self.name.clone(),
                    error,
                });
            }
        };

        let metadata: PackageMetadata =
            serde_json::from_str(&content).map_err(|e| SourceError::InvalidMetadata {
                source_name: self.name.clone(),
                message: format!("{}: {e}", path.display()),
            })?;

        cache.insert(key, Some(metadata.clone()));
        Ok(Some(metadata))
    }
}
