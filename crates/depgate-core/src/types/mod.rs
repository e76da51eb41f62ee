//! Shared core types used across resolution, preview and execution layers.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use semver::Version;
use serde::{Deserialize, Serialize};

mod action;

pub use action::{ActionType, AtomicAction, CompositeAction, ImplicitAction, PackageAction};

/// A package id plus an optional version.
///
/// Ids compare case-insensitively. Versions compare by precedence, so build
/// metadata never distinguishes two identities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub id: String,
    #[serde(default)]
    pub version: Option<Version>,
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: Option<Version>) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    /// Identity with a concrete version.
    pub fn versioned(id: impl Into<String>, version: Version) -> Self {
        Self::new(id, Some(version))
    }

    /// Identity with no version (e.g. an uninstall target).
    pub fn unversioned(id: impl Into<String>) -> Self {
        Self::new(id, None)
    }

    /// Parse `Id@1.2.3` or a bare `Id`.
    pub fn parse(spec: &str) -> crate::Result<Self> {
        let spec = spec.trim();
        match spec.split_once('@') {
            Some((id, version)) => {
                if id.is_empty() {
                    return Err(crate::Error::Config(format!(
                        "Package spec '{spec}' is missing an id"
                    )));
                }
                let version = Version::parse(version).map_err(|e| {
                    crate::Error::Config(format!("Invalid version in '{spec}': {e}"))
                })?;
                Ok(Self::versioned(id, version))
            }
            None if spec.is_empty() => {
                Err(crate::Error::Config("Package spec is empty".to_string()))
            }
            None => Ok(Self::unversioned(spec)),
        }
    }

    /// Key used for id-based maps: the lower-cased id.
    pub fn id_key(&self) -> String {
        self.id.to_lowercase()
    }

    /// Version string without build metadata, as used in source paths.
    pub fn normalized_version(&self) -> Option<String> {
        self.version.as_ref().map(|v| {
            if v.pre.is_empty() {
                format!("{}.{}.{}", v.major, v.minor, v.patch)
            } else {
                format!("{}.{}.{}-{}", v.major, v.minor, v.patch, v.pre).to_lowercase()
            }
        })
    }

    pub fn is_prerelease(&self) -> bool {
        self.version.as_ref().is_some_and(|v| !v.pre.is_empty())
    }
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        if self.id_key() != other.id_key() {
            return false;
        }
        match (&self.version, &other.version) {
            (None, None) => true,
            (Some(a), Some(b)) => a.cmp_precedence(b) == Ordering::Equal,
            _ => false,
        }
    }
}

impl Eq for PackageIdentity {}

impl Hash for PackageIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id_key().hash(state);
        if let Some(version) = &self.version {
            version.major.hash(state);
            version.minor.hash(state);
            version.patch.hash(state);
            version.pre.hash(state);
        }
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} {}", self.id, version),
            None => f.write_str(&self.id),
        }
    }
}

/// Identifier of a project as known to the project system.
///
/// Compared exactly; the project system owns any normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A package installed in a project, as reported by the project system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageReference {
    pub identity: PackageIdentity,
    /// Target framework the reference was restored for, if known.
    #[serde(default)]
    pub target_framework: Option<String>,
}

impl PackageReference {
    pub fn new(identity: PackageIdentity) -> Self {
        Self {
            identity,
            target_framework: None,
        }
    }
}

/// Final outcome of one package operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Succeeded,
    Failed,
    Cancelled,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Which public workflow started an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Install,
    Uninstall,
    Update,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::Update => "update",
        };
        f.write_str(name)
    }
}

/// How the dependency resolver should pick dependency versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyBehavior {
    Ignore,
    #[default]
    Lowest,
    HighestPatch,
    HighestMinor,
    Highest,
}

/// Options handed to the resolver for install and update requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolutionContext {
    pub dependency_behavior: DependencyBehavior,
    pub include_prerelease: bool,
}

/// Options handed to the resolver for uninstall requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UninstallationContext {
    pub remove_dependencies: bool,
    pub force_remove: bool,
    /// Installed prerelease versions must be matchable for removal.
    pub include_prerelease: bool,
}

/// On-disk format a project uses to record its package references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageFormat {
    #[default]
    PackageReference,
    Legacy,
}
