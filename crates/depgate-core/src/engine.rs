//! Public entry points for install, uninstall and update.
//!
//! Each workflow only differs in how it asks the resolver for actions;
//! everything after resolution goes through the same coordinator.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::coordinator::{OperationCoordinator, OperationLock, OperationOutcome};
use crate::gate::GateOptions;
use crate::metadata::MetadataResolver;
use crate::services::{Presentation, ProjectService, TelemetrySink};
use crate::types::{
    DependencyBehavior, OperationKind, PackageIdentity, ProjectId, ResolutionContext,
    UninstallationContext,
};

/// Install one package into one or more projects.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub projects: Vec<ProjectId>,
    pub package: PackageIdentity,
    pub dependency_behavior: DependencyBehavior,
}

impl InstallRequest {
    pub fn new(projects: Vec<ProjectId>, package: PackageIdentity) -> Self {
        Self {
            projects,
            package,
            dependency_behavior: DependencyBehavior::default(),
        }
    }

    pub fn with_dependency_behavior(mut self, behavior: DependencyBehavior) -> Self {
        self.dependency_behavior = behavior;
        self
    }
}

/// Remove one package from one or more projects.
#[derive(Debug, Clone)]
pub struct UninstallRequest {
    pub projects: Vec<ProjectId>,
    pub package_id: String,
    pub remove_dependencies: bool,
    pub force_remove: bool,
}

impl UninstallRequest {
    pub fn new(projects: Vec<ProjectId>, package_id: impl Into<String>) -> Self {
        Self {
            projects,
            package_id: package_id.into(),
            remove_dependencies: false,
            force_remove: false,
        }
    }

    pub fn remove_dependencies(mut self, remove: bool) -> Self {
        self.remove_dependencies = remove;
        self
    }

    pub fn force_remove(mut self, force: bool) -> Self {
        self.force_remove = force;
        self
    }
}

/// Update packages across projects in one resolution.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub projects: Vec<ProjectId>,
    pub packages: Vec<PackageIdentity>,
    pub dependency_behavior: DependencyBehavior,
}

impl UpdateRequest {
    pub fn new(projects: Vec<ProjectId>, packages: Vec<PackageIdentity>) -> Self {
        Self {
            projects,
            packages,
            dependency_behavior: DependencyBehavior::default(),
        }
    }

    pub fn with_dependency_behavior(mut self, behavior: DependencyBehavior) -> Self {
        self.dependency_behavior = behavior;
        self
    }
}

/// Facade over resolution and the operation coordinator.
pub struct ActionEngine {
    coordinator: OperationCoordinator,
}

impl ActionEngine {
    pub fn new(coordinator: OperationCoordinator) -> Self {
        Self { coordinator }
    }

    /// Build an engine whose gates and metadata sources follow `config`.
    pub fn from_config(
        config: &EngineConfig,
        lock: OperationLock,
        projects: Arc<dyn ProjectService>,
        presentation: Arc<dyn Presentation>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> crate::Result<Self> {
        let metadata = MetadataResolver::from_config(config)?;
        Ok(Self::new(OperationCoordinator::new(
            lock,
            projects,
            presentation,
            telemetry,
            metadata,
            GateOptions::from(config),
        )))
    }

    pub fn coordinator(&self) -> &OperationCoordinator {
        &self.coordinator
    }

    /// Prerelease dependencies are allowed only when the requested version
    /// is itself a prerelease.
    pub async fn install(
        &self,
        request: InstallRequest,
        cancel: &CancellationToken,
    ) -> OperationOutcome {
        let service = self.coordinator.projects().clone();
        let context = ResolutionContext {
            dependency_behavior: request.dependency_behavior,
            include_prerelease: request.package.is_prerelease(),
        };
        let targets = request.projects.clone();
        let package = request.package;

        self.coordinator
            .run(
                OperationKind::Install,
                request.projects,
                || async move {
                    let mut actions = Vec::new();
                    for project in &targets {
                        actions.extend(
                            service
                                .install_actions(project, &package, &context, cancel)
                                .await?,
                        );
                    }
                    Ok::<_, crate::Error>(actions)
                },
                cancel,
            )
            .await
    }

    pub async fn uninstall(
        &self,
        request: UninstallRequest,
        cancel: &CancellationToken,
    ) -> OperationOutcome {
        let service = self.coordinator.projects().clone();
        let context = UninstallationContext {
            remove_dependencies: request.remove_dependencies,
            force_remove: request.force_remove,
            include_prerelease: true,
        };
        let targets = request.projects.clone();
        let package_id = request.package_id;

        self.coordinator
            .run(
                OperationKind::Uninstall,
                request.projects,
                || async move {
                    let mut actions = Vec::new();
                    for project in &targets {
                        actions.extend(
                            service
                                .uninstall_actions(project, &package_id, &context, cancel)
                                .await?,
                        );
                    }
                    Ok::<_, crate::Error>(actions)
                },
                cancel,
            )
            .await
    }

    /// Prerelease versions are considered if any requested package is a
    /// prerelease.
    pub async fn update(
        &self,
        request: UpdateRequest,
        cancel: &CancellationToken,
    ) -> OperationOutcome {
        let service = self.coordinator.projects().clone();
        let context = ResolutionContext {
            dependency_behavior: request.dependency_behavior,
            include_prerelease: request.packages.iter().any(PackageIdentity::is_prerelease),
        };
        let targets = request.projects.clone();
        let packages = request.packages;

        self.coordinator
            .run(
                OperationKind::Update,
                request.projects,
                || async move {
                    service
                        .update_actions(&targets, &packages, &context, cancel)
                        .await
                },
                cancel,
            )
            .await
    }
}
