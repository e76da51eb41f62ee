//! Pre-execution checks that may veto an operation.
//!
//! Stages run in a fixed order and the first veto stops the sequence:
//! 1. package format upgrade for empty projects
//! 2. preview acceptance
//! 3. license acceptance for incoming packages
//! 4. deprecated target framework warning

use std::collections::HashSet;
use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{EngineConfig, PackageFormatSection};
use crate::error::{Error, Result};
use crate::metadata::{LicenseAcceptanceItem, MetadataResolver};
use crate::preview::ProjectChangeSet;
use crate::services::{Presentation, ProjectService};
use crate::types::{PackageFormat, PackageIdentity, ProjectId};

/// Gate behaviour derived from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GateOptions {
    pub show_preview: bool,
    pub warn_deprecated_targets: bool,
    pub package_format: PackageFormatSection,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for GateOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            show_preview: config.engine.show_preview,
            warn_deprecated_targets: config.engine.warn_deprecated_targets,
            package_format: config.package_format.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateStage {
    FormatUpgrade,
    Preview,
    LicenseAcceptance,
    DeprecatedTarget,
}

impl GateStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FormatUpgrade => "format-upgrade",
            Self::Preview => "preview",
            Self::LicenseAcceptance => "license-acceptance",
            Self::DeprecatedTarget => "deprecated-target",
        }
    }
}

impl fmt::Display for GateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    Proceed,
    Vetoed(GateStage),
}

/// The gate sequence for one operation.
pub struct OperationGate<'a> {
    projects: &'a dyn ProjectService,
    presentation: &'a dyn Presentation,
    metadata: &'a MetadataResolver,
    options: &'a GateOptions,
}

impl<'a> OperationGate<'a> {
    pub fn new(
        projects: &'a dyn ProjectService,
        presentation: &'a dyn Presentation,
        metadata: &'a MetadataResolver,
        options: &'a GateOptions,
    ) -> Self {
        Self {
            projects,
            presentation,
            metadata,
            options,
        }
    }

    /// Run every stage in order, stopping at the first veto.
    pub async fn run(
        &self,
        change_sets: &[ProjectChangeSet],
        cancel: &CancellationToken,
    ) -> Result<GateVerdict> {
        let stages = [
            GateStage::FormatUpgrade,
            GateStage::Preview,
            GateStage::LicenseAcceptance,
            GateStage::DeprecatedTarget,
        ];

        for stage in stages {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let accepted = match stage {
                GateStage::FormatUpgrade => self.check_package_format(change_sets, cancel).await?,
                GateStage::Preview => self.check_preview(change_sets).await,
                GateStage::LicenseAcceptance => self.check_licenses(change_sets, cancel).await?,
                GateStage::DeprecatedTarget => self.check_deprecated_targets(change_sets).await?,
            };
            if !accepted {
                info!(%stage, "operation declined");
                return Ok(GateVerdict::Vetoed(stage));
            }
            debug!(%stage, "gate stage passed");
        }
        Ok(GateVerdict::Proceed)
    }

    /// Empty projects that could move to a newer package format need either
    /// the standing preference or the user's consent.
    async fn check_package_format(
        &self,
        change_sets: &[ProjectChangeSet],
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let mut empty_projects = Vec::new();
        for set in change_sets.iter().filter(|s| !s.added.is_empty()) {
            if self.projects.installed_packages(&set.project, cancel).await?.is_empty() {
                empty_projects.push(set.project.clone());
            }
        }
        if empty_projects.is_empty() {
            return Ok(true);
        }

        let upgradeable = self.projects.upgradeable_projects(&empty_projects).await?;
        if upgradeable.is_empty() {
            return Ok(true);
        }

        let preference = &self.options.package_format;
        if !preference.prompt {
            debug!(format = ?preference.default, "applying standing package format preference");
            return self.apply_format(&upgradeable, preference.default).await;
        }

        if !self.presentation.prompt_for_package_format(preference.default).await {
            return Ok(false);
        }
        self.apply_format(&upgradeable, preference.default).await
    }

    async fn apply_format(&self, projects: &[ProjectId], format: PackageFormat) -> Result<bool> {
        match format {
            PackageFormat::PackageReference => {
                self.projects.upgrade_package_format(projects, format).await?;
            }
            PackageFormat::Legacy => {}
        }
        Ok(true)
    }

    async fn check_preview(&self, change_sets: &[ProjectChangeSet]) -> bool {
        if !self.options.show_preview || change_sets.iter().all(ProjectChangeSet::is_empty) {
            return true;
        }
        self.presentation
            .prompt_for_preview_acceptance(change_sets)
            .await
    }

    /// Only packages present after the operation are checked; pure removals
    /// never need a license.
    async fn check_licenses(
        &self,
        change_sets: &[ProjectChangeSet],
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let incoming = incoming_packages(change_sets);
        if incoming.is_empty() {
            return Ok(true);
        }

        let metadata = self.metadata.resolve(&incoming, cancel).await?;
        let items: Vec<LicenseAcceptanceItem> = incoming
            .iter()
            .filter_map(|identity| metadata.get(identity))
            .filter(|m| m.requires_license_acceptance)
            .map(LicenseAcceptanceItem::from)
            .collect();

        if items.is_empty() {
            return Ok(true);
        }
        Ok(self.presentation.prompt_for_license_acceptance(&items).await)
    }

    async fn check_deprecated_targets(&self, change_sets: &[ProjectChangeSet]) -> Result<bool> {
        if !self.options.warn_deprecated_targets {
            return Ok(true);
        }
        let touched: Vec<ProjectId> = change_sets.iter().map(|s| s.project.clone()).collect();
        let deprecated = self.projects.projects_with_deprecated_target(&touched).await?;
        if deprecated.is_empty() {
            return Ok(true);
        }
        Ok(self.presentation.warn_about_deprecation(&deprecated).await)
    }
}

/// Distinct packages that will be present after the change sets apply,
/// in first-seen order.
pub fn incoming_packages(change_sets: &[ProjectChangeSet]) -> Vec<PackageIdentity> {
    let mut seen = HashSet::new();
    change_sets
        .iter()
        .flat_map(ProjectChangeSet::incoming)
        .filter(|identity| seen.insert(*identity))
        .cloned()
        .collect()
}
