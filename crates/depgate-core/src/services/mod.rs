//! Interfaces of the collaborators the engine drives.
//!
//! The engine never mutates projects itself. It asks the project service
//! for state and resolved actions, asks the presentation layer for
//! decisions, and hands a completion record to the telemetry sink.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::metadata::LicenseAcceptanceItem;
use crate::preview::ProjectChangeSet;
use crate::telemetry::ActionTelemetryEvent;
use crate::types::{
    AtomicAction, PackageAction, PackageFormat, PackageIdentity, PackageReference, ProjectId,
    ResolutionContext, UninstallationContext,
};

/// Display name used when a project has no unique name.
pub const UNKNOWN_PROJECT_NAME: &str = "unknown project";

/// Well-known project metadata keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectMetadataKey {
    /// Name unique within the solution, used for display.
    UniqueName,
    /// Target framework moniker of the project.
    TargetFramework,
}

/// Read-only access to project metadata.
pub trait ProjectMetadata: Send + Sync {
    fn try_get_metadata(&self, project: &ProjectId, key: ProjectMetadataKey) -> Option<String>;
}

/// Project system and package manager.
///
/// Implementations are not expected to tolerate concurrent mutation; the
/// coordinator serializes every call that changes state.
#[async_trait]
pub trait ProjectService: ProjectMetadata {
    async fn installed_packages(
        &self,
        project: &ProjectId,
        cancel: &CancellationToken,
    ) -> crate::Result<Vec<PackageReference>>;

    async fn install_actions(
        &self,
        project: &ProjectId,
        package: &PackageIdentity,
        context: &ResolutionContext,
        cancel: &CancellationToken,
    ) -> crate::Result<Vec<PackageAction>>;

    async fn uninstall_actions(
        &self,
        project: &ProjectId,
        package_id: &str,
        context: &UninstallationContext,
        cancel: &CancellationToken,
    ) -> crate::Result<Vec<PackageAction>>;

    async fn update_actions(
        &self,
        projects: &[ProjectId],
        packages: &[PackageIdentity],
        context: &ResolutionContext,
        cancel: &CancellationToken,
    ) -> crate::Result<Vec<PackageAction>>;

    async fn execute_actions(
        &self,
        actions: &[AtomicAction],
        cancel: &CancellationToken,
    ) -> crate::Result<()>;

    async fn begin_operation(&self) -> crate::Result<()>;

    async fn end_operation(&self) -> crate::Result<()>;

    /// Subset of `projects` that can be moved to a newer package format.
    async fn upgradeable_projects(&self, projects: &[ProjectId]) -> crate::Result<Vec<ProjectId>>;

    async fn upgrade_package_format(
        &self,
        projects: &[ProjectId],
        format: PackageFormat,
    ) -> crate::Result<()>;

    /// Subset of `projects` targeting a deprecated framework.
    async fn projects_with_deprecated_target(
        &self,
        projects: &[ProjectId],
    ) -> crate::Result<Vec<ProjectId>>;
}

/// User-facing prompts and messages. Each prompt returns `true` to continue.
#[async_trait]
pub trait Presentation: Send + Sync {
    async fn prompt_for_preview_acceptance(&self, change_sets: &[ProjectChangeSet]) -> bool;

    async fn prompt_for_license_acceptance(&self, items: &[LicenseAcceptanceItem]) -> bool;

    async fn prompt_for_package_format(&self, format: PackageFormat) -> bool;

    async fn warn_about_deprecation(&self, projects: &[ProjectId]) -> bool;

    fn show_error(&self, error: &(dyn std::error::Error + 'static));

    fn show_message(&self, message: &str);
}

/// Receives one completion record per operation.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: ActionTelemetryEvent);
}
