//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use depgate_core::coordinator::{OperationCoordinator, OperationLock};
use depgate_core::error::SourceError;
use depgate_core::gate::GateOptions;
use depgate_core::metadata::{
    LicenseAcceptanceItem, MetadataResolver, MetadataSource, MetadataTiers, PackageMetadata,
    ResolverOptions, SourceCacheContext,
};
use depgate_core::preview::ProjectChangeSet;
use depgate_core::services::{
    Presentation, ProjectMetadata, ProjectMetadataKey, ProjectService, TelemetrySink,
};
use depgate_core::telemetry::ActionTelemetryEvent;
use depgate_core::types::{
    ActionType, AtomicAction, PackageAction, PackageFormat, PackageIdentity, PackageReference, ProjectId,
    ResolutionContext, UninstallationContext,
};
use depgate_core::Error;
use semver::Version;
use tokio_util::sync::CancellationToken;

pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn pkg(id: &str, version: &str) -> PackageIdentity {
    PackageIdentity::versioned(id, Version::parse(version).unwrap())
}

pub fn project(id: &str) -> ProjectId {
    ProjectId::new(id)
}

/// Scripted project system. Every call is appended to `log` with `label`.
pub struct FakeProjectService {
    pub label: String,
    pub log: EventLog,
    pub names: HashMap<ProjectId, String>,
    pub frameworks: HashMap<ProjectId, String>,
    /// Updated by `execute_actions`.
    pub installed: Mutex<HashMap<ProjectId, Vec<PackageReference>>>,
    pub installed_reads: AtomicUsize,
    pub install_actions: HashMap<ProjectId, Vec<PackageAction>>,
    pub uninstall_actions: HashMap<ProjectId, Vec<PackageAction>>,
    pub update_actions: Vec<PackageAction>,
    pub upgradeable: Vec<ProjectId>,
    pub deprecated: Vec<ProjectId>,
    pub resolve_delay: Duration,
    pub resolve_failure: Option<String>,
    pub execute_transport_failure: Option<String>,
    pub fail_installed_lookup: bool,
    pub cancel_on_resolve: Option<CancellationToken>,
    pub resolution_contexts: Mutex<Vec<ResolutionContext>>,
    pub uninstall_contexts: Mutex<Vec<UninstallationContext>>,
    pub executed: Mutex<Vec<AtomicAction>>,
}

impl FakeProjectService {
    pub fn new(label: &str, log: EventLog) -> Self {
        Self {
            label: label.to_string(),
            log,
            names: HashMap::new(),
            frameworks: HashMap::new(),
            installed: Mutex::new(HashMap::new()),
            installed_reads: AtomicUsize::new(0),
            install_actions: HashMap::new(),
            uninstall_actions: HashMap::new(),
            update_actions: Vec::new(),
            upgradeable: Vec::new(),
            deprecated: Vec::new(),
            resolve_delay: Duration::ZERO,
            resolve_failure: None,
            execute_transport_failure: None,
            fail_installed_lookup: false,
            cancel_on_resolve: None,
            resolution_contexts: Mutex::new(Vec::new()),
            uninstall_contexts: Mutex::new(Vec::new()),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_installed(mut self, project_id: &str, packages: &[PackageIdentity]) -> Self {
        self.installed.get_mut().unwrap().insert(
            project(project_id),
            packages.iter().cloned().map(PackageReference::new).collect(),
        );
        self
    }

    pub fn with_name(mut self, project_id: &str, name: &str) -> Self {
        self.names.insert(project(project_id), name.to_string());
        self
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.label, entry.into()));
    }

    pub fn installed_ids(&self, project_id: &str) -> Vec<String> {
        self.installed
            .lock()
            .unwrap()
            .get(&project(project_id))
            .map(|refs| refs.iter().map(|r| r.identity.id_key()).collect())
            .unwrap_or_default()
    }

    pub fn installed_reads(&self) -> usize {
        self.installed_reads.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<AtomicAction> {
        self.executed.lock().unwrap().clone()
    }

    async fn resolved(&self, actions: Vec<PackageAction>) -> depgate_core::Result<Vec<PackageAction>> {
        if !self.resolve_delay.is_zero() {
            tokio::time::sleep(self.resolve_delay).await;
        }
        if let Some(cancel) = &self.cancel_on_resolve {
            cancel.cancel();
        }
        if let Some(message) = &self.resolve_failure {
            return Err(Error::Other(anyhow::anyhow!(message.clone())));
        }
        Ok(actions)
    }
}

impl ProjectMetadata for FakeProjectService {
    fn try_get_metadata(&self, project: &ProjectId, key: ProjectMetadataKey) -> Option<String> {
        match key {
            ProjectMetadataKey::UniqueName => self.names.get(project).cloned(),
            ProjectMetadataKey::TargetFramework => self.frameworks.get(project).cloned(),
        }
    }
}

#[async_trait]
impl ProjectService for FakeProjectService {
    async fn installed_packages(
        &self,
        project: &ProjectId,
        _cancel: &CancellationToken,
    ) -> depgate_core::Result<Vec<PackageReference>> {
        self.installed_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_installed_lookup {
            return Err(Error::Other(anyhow::anyhow!("project system unavailable")));
        }
        Ok(self
            .installed
            .lock()
            .unwrap()
            .get(project)
            .cloned()
            .unwrap_or_default())
    }

    async fn install_actions(
        &self,
        project: &ProjectId,
        package: &PackageIdentity,
        context: &ResolutionContext,
        _cancel: &CancellationToken,
    ) -> depgate_core::Result<Vec<PackageAction>> {
        self.record(format!("resolve-install:{project}:{}", package.id));
        self.resolution_contexts.lock().unwrap().push(*context);
        let actions = self.install_actions.get(project).cloned().unwrap_or_default();
        self.resolved(actions).await
    }

    async fn uninstall_actions(
        &self,
        project: &ProjectId,
        package_id: &str,
        context: &UninstallationContext,
        _cancel: &CancellationToken,
    ) -> depgate_core::Result<Vec<PackageAction>> {
        self.record(format!("resolve-uninstall:{project}:{package_id}"));
        self.uninstall_contexts.lock().unwrap().push(*context);
        let actions = self.uninstall_actions.get(project).cloned().unwrap_or_default();
        self.resolved(actions).await
    }

    async fn update_actions(
        &self,
        projects: &[ProjectId],
        packages: &[PackageIdentity],
        context: &ResolutionContext,
        _cancel: &CancellationToken,
    ) -> depgate_core::Result<Vec<PackageAction>> {
        self.record(format!(
            "resolve-update:{}:{}",
            projects.len(),
            packages.len()
        ));
        self.resolution_contexts.lock().unwrap().push(*context);
        self.resolved(self.update_actions.clone()).await
    }

    async fn execute_actions(
        &self,
        actions: &[AtomicAction],
        _cancel: &CancellationToken,
    ) -> depgate_core::Result<()> {
        self.record(format!("execute:{}", actions.len()));
        if let Some(message) = &self.execute_transport_failure {
            let inner = std::io::Error::new(std::io::ErrorKind::ConnectionReset, message.clone());
            return Err(Error::Transport(Box::new(inner)));
        }
        let mut installed = self.installed.lock().unwrap();
        for action in actions {
            let references = installed.entry(action.project.clone()).or_default();
            match action.action_type {
                ActionType::Install => {
                    references.push(PackageReference::new(action.package.clone()))
                }
                ActionType::Uninstall => {
                    references.retain(|r| r.identity.id_key() != action.package.id_key())
                }
            }
        }
        self.executed.lock().unwrap().extend_from_slice(actions);
        Ok(())
    }

    async fn begin_operation(&self) -> depgate_core::Result<()> {
        self.record("begin");
        Ok(())
    }

    async fn end_operation(&self) -> depgate_core::Result<()> {
        self.record("end");
        Ok(())
    }

    async fn upgradeable_projects(
        &self,
        projects: &[ProjectId],
    ) -> depgate_core::Result<Vec<ProjectId>> {
        Ok(projects
            .iter()
            .filter(|p| self.upgradeable.contains(p))
            .cloned()
            .collect())
    }

    async fn upgrade_package_format(
        &self,
        projects: &[ProjectId],
        format: PackageFormat,
    ) -> depgate_core::Result<()> {
        for project in projects {
            self.record(format!("upgrade:{project}:{format:?}"));
        }
        Ok(())
    }

    async fn projects_with_deprecated_target(
        &self,
        projects: &[ProjectId],
    ) -> depgate_core::Result<Vec<ProjectId>> {
        Ok(projects
            .iter()
            .filter(|p| self.deprecated.contains(p))
            .cloned()
            .collect())
    }
}

/// Presentation layer answering prompts from fixed decisions.
pub struct ScriptedPresentation {
    pub label: String,
    pub log: EventLog,
    pub accept_preview: bool,
    pub accept_license: bool,
    pub accept_format: bool,
    pub accept_deprecation: bool,
    pub license_items: Mutex<Vec<LicenseAcceptanceItem>>,
    pub previewed: Mutex<Vec<ProjectChangeSet>>,
    pub errors: Mutex<Vec<String>>,
    pub messages: Mutex<Vec<String>>,
}

impl ScriptedPresentation {
    pub fn accepting(label: &str, log: EventLog) -> Self {
        Self {
            label: label.to_string(),
            log,
            accept_preview: true,
            accept_license: true,
            accept_format: true,
            accept_deprecation: true,
            license_items: Mutex::new(Vec::new()),
            previewed: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, entry: &str) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.label, entry));
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

#[async_trait]
impl Presentation for ScriptedPresentation {
    async fn prompt_for_preview_acceptance(&self, change_sets: &[ProjectChangeSet]) -> bool {
        self.record("prompt-preview");
        self.previewed.lock().unwrap().extend_from_slice(change_sets);
        self.accept_preview
    }

    async fn prompt_for_license_acceptance(&self, items: &[LicenseAcceptanceItem]) -> bool {
        self.record("prompt-license");
        self.license_items.lock().unwrap().extend_from_slice(items);
        self.accept_license
    }

    async fn prompt_for_package_format(&self, _format: PackageFormat) -> bool {
        self.record("prompt-format");
        self.accept_format
    }

    async fn warn_about_deprecation(&self, _projects: &[ProjectId]) -> bool {
        self.record("prompt-deprecation");
        self.accept_deprecation
    }

    fn show_error(&self, error: &(dyn std::error::Error + 'static)) {
        self.record("error");
        self.errors.lock().unwrap().push(error.to_string());
    }

    fn show_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Telemetry sink keeping every event.
pub struct RecordingTelemetry {
    pub label: String,
    pub log: EventLog,
    pub events: Mutex<Vec<ActionTelemetryEvent>>,
}

impl RecordingTelemetry {
    pub fn new(label: &str, log: EventLog) -> Self {
        Self {
            label: label.to_string(),
            log,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<ActionTelemetryEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn emit(&self, event: ActionTelemetryEvent) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:telemetry", self.label));
        self.events.lock().unwrap().push(event);
    }
}

/// Source knowing every package; only ids in the table require a license.
pub struct StaticSource {
    pub licenses: HashMap<String, bool>,
    pub calls: Mutex<Vec<String>>,
}

impl StaticSource {
    pub fn new(licenses: &[(&str, bool)]) -> Self {
        Self {
            licenses: licenses
                .iter()
                .map(|(id, requires)| (id.to_lowercase(), *requires))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MetadataSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn get_metadata(
        &self,
        identity: &PackageIdentity,
        _cache: &SourceCacheContext,
    ) -> Result<Option<PackageMetadata>, SourceError> {
        self.calls.lock().unwrap().push(identity.id.clone());
        let mut metadata = PackageMetadata::new(identity.clone());
        metadata.requires_license_acceptance =
            self.licenses.get(&identity.id_key()).copied().unwrap_or(false);
        Ok(Some(metadata))
    }
}

pub fn resolver_with(source: Arc<StaticSource>) -> MetadataResolver {
    MetadataResolver::new(
        MetadataTiers::new(vec![source as Arc<dyn MetadataSource>], Vec::new()).unwrap(),
        ResolverOptions::default(),
    )
}

pub struct Harness {
    pub log: EventLog,
    pub projects: Arc<FakeProjectService>,
    pub presentation: Arc<ScriptedPresentation>,
    pub telemetry: Arc<RecordingTelemetry>,
    pub coordinator: OperationCoordinator,
}

/// Wire fakes into a coordinator.
pub fn harness(
    log: EventLog,
    lock: OperationLock,
    projects: FakeProjectService,
    presentation: ScriptedPresentation,
    source: Arc<StaticSource>,
    options: GateOptions,
) -> Harness {
    let projects = Arc::new(projects);
    let presentation = Arc::new(presentation);
    let telemetry = Arc::new(RecordingTelemetry::new(&projects.label, log.clone()));
    let coordinator = OperationCoordinator::new(
        lock,
        projects.clone(),
        presentation.clone(),
        telemetry.clone(),
        resolver_with(source),
        options,
    );
    Harness {
        log,
        projects,
        presentation,
        telemetry,
        coordinator,
    }
}
