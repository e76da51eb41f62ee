//! depgate Core Library
//!
//! Resolves, previews, gates and executes package changes across projects.
//! Resolver output is flattened into atomic actions, diffed into per-project
//! change sets, checked by the operation gate and executed under a
//! process-wide operation lock.

pub mod actions;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod gate;
pub mod metadata;
pub mod preview;
pub mod services;
pub mod telemetry;
pub mod types;

pub use error::{Error, Result, SourceError};

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigStore, EngineConfig};

    // Data model
    pub use crate::types::{
        ActionType, AtomicAction, CompositeAction, ImplicitAction, OperationKind, OperationStatus,
        PackageAction, PackageIdentity, PackageReference, ProjectId,
    };

    // Pipeline
    pub use crate::actions::expand;
    pub use crate::coordinator::{OperationCoordinator, OperationLock, OperationOutcome};
    pub use crate::engine::{ActionEngine, InstallRequest, UninstallRequest, UpdateRequest};
    pub use crate::gate::{GateOptions, GateStage, GateVerdict, OperationGate};
    pub use crate::preview::{ProjectChangeSet, UpdatedPackage, diff};

    // Metadata
    pub use crate::metadata::{
        LicenseAcceptanceItem, MetadataResolver, MetadataSource, MetadataTiers, PackageMetadata,
        ResolverOptions,
    };

    // Collaborators
    pub use crate::services::{
        Presentation, ProjectMetadata, ProjectMetadataKey, ProjectService, TelemetrySink,
    };
    pub use crate::telemetry::ActionTelemetryEvent;

    pub use crate::{Error, Result};
}
