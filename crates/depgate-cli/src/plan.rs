//! Plan files: a description of projects plus resolved actions.
//!
//! A plan stands in for a real project system so that the engine can be
//! driven from the command line:
//!
//! ```toml
//! [[projects]]
//! id = "Web"
//! name = "Web.csproj"
//! target_framework = "net8.0"
//! installed = ["Newtonsoft.Json@12.0.3"]
//!
//! [[actions]]
//! kind = "atomic"
//! project = "Web"
//! action_type = "install"
//! package = { id = "Serilog", version = "3.1.1" }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use depgate_core::services::{ProjectMetadata, ProjectMetadataKey, ProjectService};
use depgate_core::types::{
    ActionType, AtomicAction, PackageAction, PackageFormat, PackageIdentity, PackageReference,
    ProjectId, ResolutionContext, UninstallationContext,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub projects: Vec<PlanProject>,
    #[serde(default)]
    pub actions: Vec<PackageAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanProject {
    pub id: ProjectId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub target_framework: Option<String>,
    /// `Id@version` entries
    #[serde(default)]
    pub installed: Vec<String>,
    #[serde(default)]
    pub upgradeable: bool,
    #[serde(default)]
    pub deprecated_target: bool,
}

impl Plan {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid plan {}", path.display()))
    }

    /// Touched projects, in declaration order, then any project only named
    /// by an action.
    pub fn project_ids(&self) -> Vec<ProjectId> {
        let mut ids: Vec<ProjectId> = self.projects.iter().map(|p| p.id.clone()).collect();
        for action in &self.actions {
            if !ids.contains(action.project()) {
                ids.push(action.project().clone());
            }
        }
        ids
    }
}

/// In-memory project system backed by a plan.
///
/// Executing actions updates the installed package lists held in memory;
/// nothing is written to disk.
pub struct PlanProjectService {
    projects: HashMap<ProjectId, PlanProject>,
    actions: Vec<PackageAction>,
    installed: Mutex<HashMap<ProjectId, Vec<PackageIdentity>>>,
}

impl PlanProjectService {
    pub fn new(plan: &Plan) -> Result<Self> {
        let mut installed = HashMap::new();
        for project in &plan.projects {
            let packages = project
                .installed
                .iter()
                .map(|spec| PackageIdentity::parse(spec))
                .collect::<depgate_core::Result<Vec<_>>>()
                .with_context(|| format!("Invalid installed package in project '{}'", project.id))?;
            installed.insert(project.id.clone(), packages);
        }

        Ok(Self {
            projects: plan
                .projects
                .iter()
                .map(|p| (p.id.clone(), p.clone()))
                .collect(),
            actions: plan.actions.clone(),
            installed: Mutex::new(installed),
        })
    }

    pub fn installed(&self, project: &ProjectId) -> Vec<PackageIdentity> {
        self.installed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(project)
            .cloned()
            .unwrap_or_default()
    }

    fn actions_for(&self, project: &ProjectId) -> Vec<PackageAction> {
        self.actions
            .iter()
            .filter(|a| a.project() == project)
            .cloned()
            .collect()
    }

    fn filter_projects(
        &self,
        projects: &[ProjectId],
        keep: impl Fn(&PlanProject) -> bool,
    ) -> Vec<ProjectId> {
        projects
            .iter()
            .filter(|id| self.projects.get(*id).is_some_and(&keep))
            .cloned()
            .collect()
    }
}

impl ProjectMetadata for PlanProjectService {
    fn try_get_metadata(&self, project: &ProjectId, key: ProjectMetadataKey) -> Option<String> {
        let project = self.projects.get(project)?;
        match key {
            ProjectMetadataKey::UniqueName => project.name.clone(),
            ProjectMetadataKey::TargetFramework => project.target_framework.clone(),
        }
    }
}

#[async_trait]
impl ProjectService for PlanProjectService {
    async fn installed_packages(
        &self,
        project: &ProjectId,
        _cancel: &CancellationToken,
    ) -> depgate_core::Result<Vec<PackageReference>> {
        let framework = self
            .projects
            .get(project)
            .and_then(|p| p.target_framework.clone());
        Ok(self
            .installed(project)
            .into_iter()
            .map(|identity| PackageReference {
                identity,
                target_framework: framework.clone(),
            })
            .collect())
    }

    async fn install_actions(
        &self,
        project: &ProjectId,
        _package: &PackageIdentity,
        _context: &ResolutionContext,
        _cancel: &CancellationToken,
    ) -> depgate_core::Result<Vec<PackageAction>> {
        Ok(self.actions_for(project))
    }

    async fn uninstall_actions(
        &self,
        project: &ProjectId,
        _package_id: &str,
        _context: &UninstallationContext,
        _cancel: &CancellationToken,
    ) -> depgate_core::Result<Vec<PackageAction>> {
        Ok(self.actions_for(project))
    }

    async fn update_actions(
        &self,
        projects: &[ProjectId],
        _packages: &[PackageIdentity],
        _context: &ResolutionContext,
        _cancel: &CancellationToken,
    ) -> depgate_core::Result<Vec<PackageAction>> {
        Ok(self
            .actions
            .iter()
            .filter(|a| projects.contains(a.project()))
            .cloned()
            .collect())
    }

    async fn execute_actions(
        &self,
        actions: &[AtomicAction],
        _cancel: &CancellationToken,
    ) -> depgate_core::Result<()> {
        let mut installed = self.installed.lock().unwrap_or_else(|e| e.into_inner());
        for action in actions {
            let packages = installed.entry(action.project.clone()).or_default();
            match action.action_type {
                ActionType::Install => packages.push(action.package.clone()),
                ActionType::Uninstall => packages.retain(|p| p.id_key() != action.package.id_key()),
            }
            info!(%action, "applied");
        }
        Ok(())
    }

    async fn begin_operation(&self) -> depgate_core::Result<()> {
        Ok(())
    }

    async fn end_operation(&self) -> depgate_core::Result<()> {
        Ok(())
    }

    async fn upgradeable_projects(
        &self,
        projects: &[ProjectId],
    ) -> depgate_core::Result<Vec<ProjectId>> {
        Ok(self.filter_projects(projects, |p| p.upgradeable))
    }

    async fn upgrade_package_format(
        &self,
        projects: &[ProjectId],
        format: PackageFormat,
    ) -> depgate_core::Result<()> {
        for project in projects {
            info!(%project, ?format, "package format upgraded");
        }
        Ok(())
    }

    async fn projects_with_deprecated_target(
        &self,
        projects: &[ProjectId],
    ) -> depgate_core::Result<Vec<ProjectId>> {
        Ok(self.filter_projects(projects, |p| p.deprecated_target))
    }
}
