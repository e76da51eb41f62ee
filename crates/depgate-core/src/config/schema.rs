//! Configuration schema for depgate.toml

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::PackageFormat;

/// Default bound on simultaneous metadata lookups per tier.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Default per-source lookup timeout.
pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 30;

/// Root configuration structure for depgate.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub package_format: PackageFormatSection,

    #[serde(default)]
    pub metadata: MetadataSection,

    /// Package sources in priority order
    #[serde(default)]
    pub sources: Vec<SourceConfigEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineSection {
    /// Show the change-set preview before executing
    #[serde(default = "default_true")]
    pub show_preview: bool,

    /// Prompt when a touched project targets a deprecated framework
    #[serde(default = "default_true")]
    pub warn_deprecated_targets: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            show_preview: true,
            warn_deprecated_targets: true,
        }
    }
}

/// Standing preference for the package format of empty projects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageFormatSection {
    /// Ask before choosing; when false `default` is applied silently
    #[serde(default = "default_true")]
    pub prompt: bool,

    #[serde(default)]
    pub default: PackageFormat,
}

impl Default for PackageFormatSection {
    fn default() -> Self {
        Self {
            prompt: true,
            default: PackageFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataSection {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,

    /// Fetch every package from its source, even when repeated in one call
    #[serde(default)]
    pub no_cache: bool,
}

impl MetadataSection {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

impl Default for MetadataSection {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            lookup_timeout_secs: DEFAULT_LOOKUP_TIMEOUT_SECS,
            no_cache: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Folder on disk (package cache or fallback folder)
    Local,
    /// Remote HTTP feed
    Http,
}

/// A package source entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfigEntry {
    pub name: String,

    pub kind: SourceKind,

    /// Local: folder root
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Http: feed base URL
    #[serde(default)]
    pub url: Option<Url>,
}

fn default_true() -> bool {
    true
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_lookup_timeout_secs() -> u64 {
    DEFAULT_LOOKUP_TIMEOUT_SECS
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.metadata.max_concurrency == 0 {
            return Err(crate::Error::Config(
                "metadata.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.metadata.lookup_timeout_secs == 0 {
            return Err(crate::Error::Config(
                "metadata.lookup_timeout_secs must be at least 1".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.name.to_lowercase()) {
                return Err(crate::Error::Config(format!(
                    "Duplicate source name '{}'",
                    source.name
                )));
            }
            match source.kind {
                SourceKind::Local if source.path.is_none() => {
                    return Err(crate::Error::Config(format!(
                        "Local source '{}' requires a path",
                        source.name
                    )));
                }
                SourceKind::Http if source.url.is_none() => {
                    return Err(crate::Error::Config(format!(
                        "Http source '{}' requires a url",
                        source.name
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Default global package folder, used as the first local source when
    /// none is configured.
    pub fn default_packages_folder() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".depgate").join("packages"))
    }
}
