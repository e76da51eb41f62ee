//! Per-project change sets computed from atomic actions.
//!
//! Each project's actions are reduced to two id-keyed maps, one for
//! installs and one for uninstalls, then reconciled:
//! - id in both maps: updated (old = uninstalled, new = installed)
//! - id only installed: added
//! - id only uninstalled: removed
//!
//! An id therefore lands in exactly one of the three sets. A package that is
//! uninstalled and reinstalled at the same version is still reported as
//! updated.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::services::{ProjectMetadata, ProjectMetadataKey, UNKNOWN_PROJECT_NAME};
use crate::types::{ActionType, AtomicAction, PackageIdentity, ProjectId};

/// An installed package replaced by another version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatedPackage {
    pub old: PackageIdentity,
    pub new: PackageIdentity,
}

/// What one operation will change in one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectChangeSet {
    pub project: ProjectId,
    pub project_name: String,
    pub added: Vec<PackageIdentity>,
    pub removed: Vec<PackageIdentity>,
    pub updated: Vec<UpdatedPackage>,
}

impl ProjectChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }

    /// Packages present in the project once the change set is applied:
    /// every added package plus the new side of every update.
    pub fn incoming(&self) -> impl Iterator<Item = &PackageIdentity> {
        self.added.iter().chain(self.updated.iter().map(|u| &u.new))
    }
}

/// Compute change sets for already-expanded actions.
///
/// Output order follows the first appearance of each project in `actions`.
/// Display names come from the project's unique-name metadata; a missing
/// name falls back to [`UNKNOWN_PROJECT_NAME`].
pub fn diff<P>(actions: &[AtomicAction], projects: &P) -> Vec<ProjectChangeSet>
where
    P: ProjectMetadata + ?Sized,
{
    let mut order: Vec<&ProjectId> = Vec::new();
    let mut groups: HashMap<&ProjectId, Vec<&AtomicAction>> = HashMap::new();
    for action in actions {
        groups
            .entry(&action.project)
            .or_insert_with(|| {
                order.push(&action.project);
                Vec::new()
            })
            .push(action);
    }

    order
        .into_iter()
        .map(|project| {
            let name = projects
                .try_get_metadata(project, ProjectMetadataKey::UniqueName)
                .unwrap_or_else(|| UNKNOWN_PROJECT_NAME.to_string());
            let group = groups.remove(project).unwrap_or_default();
            reconcile(project.clone(), name, &group)
        })
        .collect()
}

fn reconcile(project: ProjectId, project_name: String, actions: &[&AtomicAction]) -> ProjectChangeSet {
    let mut installed: BTreeMap<String, PackageIdentity> = BTreeMap::new();
    let mut uninstalled: BTreeMap<String, PackageIdentity> = BTreeMap::new();

    for action in actions {
        let key = action.package.id_key();
        match action.action_type {
            ActionType::Install => {
                installed.insert(key, action.package.clone());
            }
            ActionType::Uninstall => {
                uninstalled.insert(key, action.package.clone());
            }
        }
    }

    let mut removed = Vec::new();
    let mut updated = Vec::new();
    for (key, old) in uninstalled {
        match installed.remove(&key) {
            Some(new) => updated.push(UpdatedPackage { old, new }),
            None => removed.push(old),
        }
    }

    ProjectChangeSet {
        project,
        project_name,
        added: installed.into_values().collect(),
        removed,
        updated,
    }
}
