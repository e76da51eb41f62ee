//! Package actions returned by the resolver.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{PackageIdentity, ProjectId};

/// Direction of a single package change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Install,
    Uninstall,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => f.write_str("install"),
            Self::Uninstall => f.write_str("uninstall"),
        }
    }
}

/// A single add-or-remove of one package in one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicAction {
    pub project: ProjectId,
    pub package: PackageIdentity,
    pub action_type: ActionType,
}

impl AtomicAction {
    pub fn install(project: impl Into<ProjectId>, package: PackageIdentity) -> Self {
        Self {
            project: project.into(),
            package,
            action_type: ActionType::Install,
        }
    }

    pub fn uninstall(project: impl Into<ProjectId>, package: PackageIdentity) -> Self {
        Self {
            project: project.into(),
            package,
            action_type: ActionType::Uninstall,
        }
    }
}

impl fmt::Display for AtomicAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} in {}", self.action_type, self.package, self.project)
    }
}

/// One implied change carried by a composite action.
///
/// The project is inherited from the enclosing action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplicitAction {
    pub package: PackageIdentity,
    pub action_type: ActionType,
}

/// An action standing for a whole sub-resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeAction {
    pub project: ProjectId,
    pub package: PackageIdentity,
    pub action_type: ActionType,
    pub implicit: Vec<ImplicitAction>,
}

/// Resolver output: either atomic, or a composite that must be expanded
/// (see [`crate::actions::expand`]) before anything else consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PackageAction {
    Atomic(AtomicAction),
    Composite(CompositeAction),
}

impl PackageAction {
    pub fn project(&self) -> &ProjectId {
        match self {
            Self::Atomic(action) => &action.project,
            Self::Composite(action) => &action.project,
        }
    }
}

impl From<AtomicAction> for PackageAction {
    fn from(action: AtomicAction) -> Self {
        Self::Atomic(action)
    }
}

impl From<CompositeAction> for PackageAction {
    fn from(action: CompositeAction) -> Self {
        Self::Composite(action)
    }
}
