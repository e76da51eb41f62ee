//! End-to-end coordination of one package operation.
//!
//! A run holds the operation lock from before the first gate check until
//! its completion record has been emitted. Inside the lock the project
//! service's begin/end markers bracket resolution, preview, gating and
//! execution. Failures are reported through the presentation layer and
//! never escape the run; every run emits exactly one telemetry record.

mod context;
mod lock;

pub use context::{OperationContext, OperationPhase};
pub use lock::{OperationLock, OperationLockGuard};

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::actions;
use crate::error::{Error, Result};
use crate::gate::{GateOptions, GateStage, GateVerdict, OperationGate};
use crate::metadata::MetadataResolver;
use crate::preview::{self, ProjectChangeSet};
use crate::services::{Presentation, ProjectMetadataKey, ProjectService, TelemetrySink};
use crate::telemetry::TelemetryEventBuilder;
use crate::types::{OperationKind, OperationStatus, PackageAction, PackageIdentity, ProjectId};

/// Message shown when resolution produced nothing to do.
pub const NOTHING_TO_DO_MESSAGE: &str = "No package changes are required.";

/// What a finished operation reports back to its caller.
#[derive(Debug)]
pub struct OperationOutcome {
    pub operation_id: Uuid,
    pub status: OperationStatus,
    pub change_sets: Vec<ProjectChangeSet>,
    pub gate_veto: Option<GateStage>,
    pub executed: bool,
    pub error: Option<Error>,
}

/// Drives lock, gate and execution for package operations.
pub struct OperationCoordinator {
    lock: OperationLock,
    projects: Arc<dyn ProjectService>,
    presentation: Arc<dyn Presentation>,
    telemetry: Arc<dyn TelemetrySink>,
    metadata: MetadataResolver,
    gate_options: GateOptions,
}

impl OperationCoordinator {
    pub fn new(
        lock: OperationLock,
        projects: Arc<dyn ProjectService>,
        presentation: Arc<dyn Presentation>,
        telemetry: Arc<dyn TelemetrySink>,
        metadata: MetadataResolver,
        gate_options: GateOptions,
    ) -> Self {
        Self {
            lock,
            projects,
            presentation,
            telemetry,
            metadata,
            gate_options,
        }
    }

    pub fn projects(&self) -> &Arc<dyn ProjectService> {
        &self.projects
    }

    pub fn lock(&self) -> &OperationLock {
        &self.lock
    }

    /// Run one operation whose actions come from `resolve`.
    ///
    /// `resolve` is awaited only after the lock is held and the begin
    /// marker has been sent.
    pub async fn run<F, Fut>(
        &self,
        kind: OperationKind,
        projects: Vec<ProjectId>,
        resolve: F,
        cancel: &CancellationToken,
    ) -> OperationOutcome
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Vec<PackageAction>>> + Send,
    {
        let mut ctx = OperationContext::new(kind, projects);
        info!(operation = %ctx.operation_id, %kind, projects = ctx.projects.len(), "starting package operation");

        match self.lock.acquire(cancel).await {
            Ok(guard) => {
                ctx.transition(OperationPhase::LockAcquired);
                let result = self.run_locked(&mut ctx, resolve, cancel).await;
                self.settle(&mut ctx, result);
                let outcome = self.finalize(ctx);
                drop(guard);
                outcome
            }
            Err(err) => {
                self.settle(&mut ctx, Err(err));
                self.finalize(ctx)
            }
        }
    }

    /// Bracket the pipeline with the begin/end markers.
    async fn run_locked<F, Fut>(
        &self,
        ctx: &mut OperationContext,
        resolve: F,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Vec<PackageAction>>> + Send,
    {
        self.projects.begin_operation().await?;
        let result = self.run_pipeline(ctx, resolve, cancel).await;
        if let Err(err) = self.projects.end_operation().await {
            warn!(operation = %ctx.operation_id, error = %err, "failed to end package operation");
        }
        result
    }

    async fn run_pipeline<F, Fut>(
        &self,
        ctx: &mut OperationContext,
        resolve: F,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Vec<PackageAction>>> + Send,
    {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        ctx.existing_packages = self.existing_packages(&ctx.projects, cancel).await;

        let step = Instant::now();
        let actions = actions::expand(resolve().await?);
        ctx.record_step("resolve", step);

        if actions.is_empty() {
            info!(operation = %ctx.operation_id, "nothing to do");
            self.presentation.show_message(NOTHING_TO_DO_MESSAGE);
            return Ok(());
        }

        let step = Instant::now();
        ctx.change_sets = preview::diff(&actions, self.projects.as_ref());
        ctx.package_count = ctx
            .change_sets
            .iter()
            .map(|s| s.added.len() + s.removed.len() + s.updated.len())
            .sum();
        ctx.record_step("preview", step);

        ctx.transition(OperationPhase::GateRunning);
        let gate = OperationGate::new(
            self.projects.as_ref(),
            self.presentation.as_ref(),
            &self.metadata,
            &self.gate_options,
        );
        let step = Instant::now();
        let verdict = gate.run(&ctx.change_sets, cancel).await?;
        ctx.record_step("gate", step);

        if let GateVerdict::Vetoed(stage) = verdict {
            ctx.gate_veto = Some(stage);
            ctx.transition(OperationPhase::Aborted);
            return Ok(());
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        ctx.transition(OperationPhase::Executing);
        let step = Instant::now();
        self.projects.execute_actions(&actions, cancel).await?;
        ctx.executed = true;
        ctx.record_step("execute", step);
        Ok(())
    }

    /// Fold the pipeline result into the context's status.
    fn settle(&self, ctx: &mut OperationContext, result: Result<()>) {
        match result {
            Ok(()) => {}
            Err(Error::Cancelled) => {
                info!(operation = %ctx.operation_id, "package operation cancelled");
                ctx.status = OperationStatus::Cancelled;
                ctx.transition(OperationPhase::Aborted);
            }
            Err(err) => {
                error!(operation = %ctx.operation_id, error = %err, "package operation failed");
                ctx.status = OperationStatus::Failed;
                self.presentation.show_error(err.user_facing());
                ctx.error = Some(err);
                ctx.transition(OperationPhase::Aborted);
            }
        }
    }

    /// Emit the completion record. Runs exactly once per operation.
    fn finalize(&self, mut ctx: OperationContext) -> OperationOutcome {
        ctx.normalize_status();
        let duration = ctx.elapsed();

        let frameworks: BTreeSet<String> = ctx
            .projects
            .iter()
            .filter_map(|p| {
                self.projects
                    .try_get_metadata(p, ProjectMetadataKey::TargetFramework)
            })
            .collect();

        let added = ctx.change_sets.iter().flat_map(|s| s.added.iter());
        let removed = ctx.change_sets.iter().flat_map(|s| s.removed.iter());
        let updated_old = ctx
            .change_sets
            .iter()
            .flat_map(|s| s.updated.iter().map(|u| &u.old));
        let updated_new = ctx
            .change_sets
            .iter()
            .flat_map(|s| s.updated.iter().map(|u| &u.new));

        let event = TelemetryEventBuilder::new(ctx.operation_id, ctx.kind, ctx.status)
            .timing(ctx.start_time, duration)
            .package_count(ctx.package_count)
            .projects(&ctx.projects)
            .packages("added_packages", added)
            .packages("removed_packages", removed)
            .packages("updated_packages_old", updated_old)
            .packages("updated_packages_new", updated_new)
            .packages("existing_packages", ctx.existing_packages.iter())
            .target_frameworks(frameworks.into_iter().collect())
            .step_durations(ctx.steps())
            .gate_veto(ctx.gate_veto.map(GateStage::as_str))
            .build();
        self.telemetry.emit(event);

        ctx.transition(OperationPhase::Finalized);
        info!(
            operation = %ctx.operation_id,
            status = %ctx.status,
            duration_ms = duration.as_millis() as u64,
            "package operation finished"
        );

        OperationOutcome {
            operation_id: ctx.operation_id,
            status: ctx.status,
            change_sets: ctx.change_sets,
            gate_veto: ctx.gate_veto,
            executed: ctx.executed,
            error: ctx.error,
        }
    }

    /// Installed packages across `projects` before anything is executed,
    /// for telemetry only. Lookup failures are logged and skipped.
    async fn existing_packages(
        &self,
        projects: &[ProjectId],
        cancel: &CancellationToken,
    ) -> Vec<PackageIdentity> {
        let mut existing = Vec::new();
        for project in projects {
            match self.projects.installed_packages(project, cancel).await {
                Ok(references) => existing.extend(references.into_iter().map(|r| r.identity)),
                Err(err) => {
                    warn!(%project, error = %err, "could not count installed packages");
                }
            }
        }
        existing
    }
}
