//! Package metadata resolution across local and remote sources.
//!
//! Sources are queried in two tiers. The local tier (package cache, then
//! fallback folders) is tried first for every package; only packages it
//! cannot answer are looked up in the remote tier. Both tiers fan out with
//! a bounded number of lookups in flight.

mod cache;
mod http;
mod local;
mod resolver;
mod source;

pub use cache::SourceCacheContext;
pub use http::HttpSource;
pub use local::LocalFolderSource;
pub use resolver::{MetadataResolver, MetadataTiers, ResolverOptions};
pub use source::MetadataSource;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::PackageIdentity;

/// Metadata of one package version as published by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub identity: PackageIdentity,
    #[serde(default)]
    pub requires_license_acceptance: bool,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub license_links: Vec<LicenseLink>,
    #[serde(default)]
    pub project_url: Option<Url>,
    #[serde(default)]
    pub description: Option<String>,
}

impl PackageMetadata {
    pub fn new(identity: PackageIdentity) -> Self {
        Self {
            identity,
            requires_license_acceptance: false,
            authors: Vec::new(),
            license_links: Vec::new(),
            project_url: None,
            description: None,
        }
    }
}

/// A license reference: an expression term or a license document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseLink {
    pub text: String,
    #[serde(default)]
    pub url: Option<Url>,
}

/// One entry of the license acceptance prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LicenseAcceptanceItem {
    pub identity: PackageIdentity,
    pub authors: Vec<String>,
    pub license_links: Vec<LicenseLink>,
}

impl From<&PackageMetadata> for LicenseAcceptanceItem {
    fn from(metadata: &PackageMetadata) -> Self {
        Self {
            identity: metadata.identity.clone(),
            authors: metadata.authors.clone(),
            license_links: metadata.license_links.clone(),
        }
    }
}
