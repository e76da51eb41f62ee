//! Per-operation state owned by a single coordinator run.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::error::Error;
use crate::gate::GateStage;
use crate::preview::ProjectChangeSet;
use crate::types::{OperationKind, OperationStatus, PackageIdentity, ProjectId};

/// Coordinator state machine.
///
/// `Idle -> LockAcquired -> GateRunning -> (Executing | Aborted) -> Finalized`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationPhase {
    Idle,
    LockAcquired,
    GateRunning,
    Executing,
    Aborted,
    Finalized,
}

impl fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::LockAcquired => "lock-acquired",
            Self::GateRunning => "gate-running",
            Self::Executing => "executing",
            Self::Aborted => "aborted",
            Self::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct OperationContext {
    pub operation_id: Uuid,
    pub kind: OperationKind,
    pub projects: Vec<ProjectId>,
    pub start_time: DateTime<Utc>,
    pub package_count: usize,
    pub status: OperationStatus,
    pub change_sets: Vec<ProjectChangeSet>,
    /// Installed packages as read under the lock, before execution.
    pub existing_packages: Vec<PackageIdentity>,
    pub gate_veto: Option<GateStage>,
    pub executed: bool,
    pub error: Option<Error>,
    phase: OperationPhase,
    started: Instant,
    steps: Vec<(&'static str, Duration)>,
}

impl OperationContext {
    pub fn new(kind: OperationKind, projects: Vec<ProjectId>) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            kind,
            projects,
            start_time: Utc::now(),
            package_count: 0,
            status: OperationStatus::Succeeded,
            change_sets: Vec::new(),
            existing_packages: Vec::new(),
            gate_veto: None,
            executed: false,
            error: None,
            phase: OperationPhase::Idle,
            started: Instant::now(),
            steps: Vec::new(),
        }
    }

    pub fn phase(&self) -> OperationPhase {
        self.phase
    }

    pub fn transition(&mut self, next: OperationPhase) {
        debug!(operation = %self.operation_id, from = %self.phase, to = %next, "operation phase");
        self.phase = next;
    }

    /// Record how long a pipeline step took, measured from `started`.
    pub fn record_step(&mut self, name: &'static str, started: Instant) {
        self.steps.push((name, started.elapsed()));
    }

    pub fn steps(&self) -> &[(&'static str, Duration)] {
        &self.steps
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Reaching the end after a gate veto is a cancellation, not a success.
    pub fn normalize_status(&mut self) {
        if self.status == OperationStatus::Succeeded && self.gate_veto.is_some() {
            self.status = OperationStatus::Cancelled;
        }
    }
}
