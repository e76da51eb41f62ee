//! Coordinator lifecycle: begin/end pairing, veto handling, failure
//! reporting and the completion record.

mod support;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use depgate_core::coordinator::{NOTHING_TO_DO_MESSAGE, OperationLock, OperationOutcome};
use depgate_core::gate::{GateOptions, GateStage};
use depgate_core::types::{
    ActionType, AtomicAction, CompositeAction, ImplicitAction, OperationKind, OperationStatus,
    PackageAction, PackageReference, ProjectId,
};
use depgate_core::Error;
use futures::future::{self, Ready};
use tokio_util::sync::CancellationToken;

use support::{
    entries, harness, new_log, pkg, project, FakeProjectService, Harness, ScriptedPresentation,
    StaticSource,
};

type Resolved = Ready<depgate_core::Result<Vec<PackageAction>>>;

fn plan(actions: Vec<PackageAction>) -> impl FnOnce() -> Resolved + Send {
    move || future::ready(Ok(actions))
}

fn failing_plan(message: &'static str) -> impl FnOnce() -> Resolved + Send {
    move || future::ready(Err(Error::Other(anyhow::anyhow!(message))))
}

fn setup(
    configure: impl FnOnce(&mut FakeProjectService, &mut ScriptedPresentation),
) -> Harness {
    let log = new_log();
    let mut projects = FakeProjectService::new("op", log.clone())
        .with_name("App", "App")
        .with_installed("App", &[pkg("Existing", "1.0.0")]);
    let mut presentation = ScriptedPresentation::accepting("op", log.clone());
    configure(&mut projects, &mut presentation);
    harness(
        log,
        OperationLock::new(),
        projects,
        presentation,
        Arc::new(StaticSource::new(&[])),
        GateOptions::default(),
    )
}

async fn run(h: &Harness, actions: Vec<PackageAction>, cancel: &CancellationToken) -> OperationOutcome {
    h.coordinator
        .run(OperationKind::Install, vec![project("App")], plan(actions), cancel)
        .await
}

fn install(id: &str, version: &str) -> PackageAction {
    AtomicAction::install("App", pkg(id, version)).into()
}

fn assert_bracketed(h: &Harness) {
    let log = entries(&h.log);
    let begins: Vec<usize> = positions(&log, "op:begin");
    let ends: Vec<usize> = positions(&log, "op:end");
    assert_eq!(begins.len(), 1, "log: {log:?}");
    assert_eq!(ends.len(), 1, "log: {log:?}");
    assert!(begins[0] < ends[0]);
}

fn positions(log: &[String], entry: &str) -> Vec<usize> {
    log.iter()
        .enumerate()
        .filter(|(_, e)| e.as_str() == entry)
        .map(|(i, _)| i)
        .collect()
}

// ===== Successful runs =====

#[tokio::test]
async fn accepted_operation_executes_expanded_actions() {
    let h = setup(|_, _| {});
    let composite = CompositeAction {
        project: ProjectId::new("App"),
        package: pkg("Meta", "1.0.0"),
        action_type: ActionType::Install,
        implicit: vec![
            ImplicitAction {
                package: pkg("Existing", "1.0.0"),
                action_type: ActionType::Uninstall,
            },
            ImplicitAction {
                package: pkg("Existing", "2.0.0"),
                action_type: ActionType::Install,
            },
        ],
    };

    let outcome = run(
        &h,
        vec![composite.into(), install("A", "1.0.0")],
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(outcome.status, OperationStatus::Succeeded);
    assert!(outcome.executed);
    assert!(outcome.error.is_none());
    assert_eq!(
        h.projects.executed(),
        vec![
            AtomicAction::uninstall("App", pkg("Existing", "1.0.0")),
            AtomicAction::install("App", pkg("Existing", "2.0.0")),
            AtomicAction::install("App", pkg("A", "1.0.0")),
        ]
    );
    assert_eq!(outcome.change_sets.len(), 1);
    assert_eq!(outcome.change_sets[0].added, vec![pkg("A", "1.0.0")]);
    assert_eq!(outcome.change_sets[0].updated.len(), 1);
    assert_bracketed(&h);
}

#[tokio::test]
async fn execution_happens_inside_begin_end() {
    let h = setup(|_, _| {});
    run(&h, vec![install("A", "1.0.0")], &CancellationToken::new()).await;

    let log = entries(&h.log);
    let begin = positions(&log, "op:begin")[0];
    let execute = positions(&log, "op:execute:1")[0];
    let end = positions(&log, "op:end")[0];
    assert!(begin < execute && execute < end);
}

#[tokio::test]
async fn empty_resolution_shows_message_and_skips_gate() {
    let h = setup(|_, _| {});
    let outcome = run(&h, Vec::new(), &CancellationToken::new()).await;

    assert_eq!(outcome.status, OperationStatus::Succeeded);
    assert!(!outcome.executed);
    assert_eq!(
        h.presentation.messages.lock().unwrap().clone(),
        vec![NOTHING_TO_DO_MESSAGE.to_string()]
    );
    assert!(!entries(&h.log).iter().any(|e| e.contains("prompt")));
    assert_bracketed(&h);
}

// ===== Vetoes =====

#[tokio::test]
async fn veto_cancels_without_executing() {
    let h = setup(|_, presentation| presentation.accept_preview = false);
    let outcome = run(&h, vec![install("A", "1.0.0")], &CancellationToken::new()).await;

    assert_eq!(outcome.status, OperationStatus::Cancelled);
    assert_eq!(outcome.gate_veto, Some(GateStage::Preview));
    assert!(!outcome.executed);
    assert!(h.projects.executed().is_empty());
    assert!(h.presentation.errors().is_empty());
    assert_bracketed(&h);
}

#[tokio::test]
async fn declined_license_means_no_execution() {
    let log = new_log();
    let projects = FakeProjectService::new("op", log.clone())
        .with_installed("App", &[pkg("Existing", "1.0.0")]);
    let mut presentation = ScriptedPresentation::accepting("op", log.clone());
    presentation.accept_license = false;
    let h = harness(
        log,
        OperationLock::new(),
        projects,
        presentation,
        Arc::new(StaticSource::new(&[("B", true)])),
        GateOptions::default(),
    );

    let outcome = run(
        &h,
        vec![install("A", "1.0.0"), install("B", "1.0.0")],
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(outcome.status, OperationStatus::Cancelled);
    assert_eq!(outcome.gate_veto, Some(GateStage::LicenseAcceptance));
    let prompted = h.presentation.license_items.lock().unwrap().clone();
    assert_eq!(prompted.len(), 1);
    assert_eq!(prompted[0].identity.id, "B");
    assert!(h.projects.executed().is_empty());
}

// ===== Failures =====

#[tokio::test]
async fn transport_failure_reports_inner_error() {
    let h = setup(|projects, _| {
        projects.execute_transport_failure = Some("connection reset by feed".to_string());
    });
    let outcome = run(&h, vec![install("A", "1.0.0")], &CancellationToken::new()).await;

    assert_eq!(outcome.status, OperationStatus::Failed);
    assert!(matches!(outcome.error, Some(Error::Transport(_))));
    assert_eq!(h.presentation.errors(), vec!["connection reset by feed".to_string()]);
    assert_bracketed(&h);
}

#[tokio::test]
async fn resolver_failure_is_shown_and_still_ends_operation() {
    let h = setup(|_, _| {});
    let outcome = h
        .coordinator
        .run(
            OperationKind::Install,
            vec![project("App")],
            failing_plan("no compatible version"),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.status, OperationStatus::Failed);
    assert_eq!(h.presentation.errors(), vec!["no compatible version".to_string()]);
    assert!(!entries(&h.log).iter().any(|e| e.starts_with("op:execute")));
    assert_bracketed(&h);
}

// ===== Cancellation =====

#[tokio::test]
async fn cancellation_after_resolution_stops_before_execution() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let h = setup(|_, _| {});

    let outcome = h
        .coordinator
        .run(
            OperationKind::Install,
            vec![project("App")],
            move || {
                trigger.cancel();
                future::ready(Ok::<_, Error>(vec![install("A", "1.0.0")]))
            },
            &cancel,
        )
        .await;

    assert_eq!(outcome.status, OperationStatus::Cancelled);
    assert!(!outcome.executed);
    assert!(outcome.error.is_none());
    assert!(h.presentation.errors().is_empty());
    assert_bracketed(&h);
}

#[tokio::test]
async fn cancelled_before_start_never_begins() {
    let h = setup(|_, _| {});
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = run(&h, vec![install("A", "1.0.0")], &cancel).await;

    assert_eq!(outcome.status, OperationStatus::Cancelled);
    assert!(!entries(&h.log).iter().any(|e| e == "op:begin"));
    assert_eq!(h.telemetry.events().len(), 1);
}

#[tokio::test]
async fn waiter_cancelled_on_lock_never_reads_installed_packages() {
    let log = new_log();
    let lock = OperationLock::new();
    let projects = FakeProjectService::new("op", log.clone())
        .with_installed("App", &[pkg("Existing", "1.0.0")]);
    let h = harness(
        log.clone(),
        lock.clone(),
        projects,
        ScriptedPresentation::accepting("op", log),
        Arc::new(StaticSource::new(&[])),
        GateOptions::default(),
    );

    let held = lock.acquire(&CancellationToken::new()).await.unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let outcome = run(&h, vec![install("A", "1.0.0")], &cancel).await;
    drop(held);

    assert_eq!(outcome.status, OperationStatus::Cancelled);
    assert_eq!(h.projects.installed_reads(), 0);
    let events = h.telemetry.events();
    assert_eq!(events.len(), 1);
    assert!(!events[0].has("existing_packages"));
}

// ===== Telemetry =====

#[tokio::test]
async fn completion_record_describes_the_operation() {
    let h = setup(|projects, _| {
        projects
            .frameworks
            .insert(project("App"), "net8.0".to_string());
    });
    let actions = vec![
        install("Alpha", "1.0.0"),
        AtomicAction::uninstall("App", pkg("Existing", "1.0.0")).into(),
    ];
    let outcome = run(&h, actions, &CancellationToken::new()).await;

    let events = h.telemetry.events();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(
        event.get("operation_id").and_then(|v| v.as_str()),
        Some(outcome.operation_id.to_string().as_str())
    );
    assert_eq!(event.get("operation_type").and_then(|v| v.as_str()), Some("install"));
    assert_eq!(event.get("status").and_then(|v| v.as_str()), Some("succeeded"));
    assert_eq!(event.get("package_count").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(event.strings("project_ids"), vec!["App".to_string()]);
    assert_eq!(event.strings("added_packages"), vec!["alpha".to_string()]);
    assert_eq!(event.strings("removed_packages"), vec!["existing".to_string()]);
    assert_eq!(event.strings("existing_packages"), vec!["existing".to_string()]);
    assert_eq!(h.projects.installed_ids("App"), vec!["alpha".to_string()]);
    assert_eq!(event.strings("target_frameworks"), vec!["net8.0".to_string()]);
    assert!(!event.has("updated_packages_old"));
    assert!(!event.has("gate_veto"));

    let steps = event.get("step_durations_ms").and_then(|v| v.as_object()).unwrap();
    for step in ["resolve", "preview", "gate", "execute"] {
        assert!(steps.contains_key(step), "missing step {step}");
    }
}

#[tokio::test]
async fn vetoed_record_names_the_stage() {
    let h = setup(|projects, presentation| {
        projects.deprecated = vec![project("App")];
        presentation.accept_deprecation = false;
    });
    run(&h, vec![install("A", "1.0.0")], &CancellationToken::new()).await;

    let events = h.telemetry.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].get("status").and_then(|v| v.as_str()), Some("cancelled"));
    assert_eq!(
        events[0].get("gate_veto").and_then(|v| v.as_str()),
        Some("deprecated-target")
    );
    let steps = events[0].get("step_durations_ms").and_then(|v| v.as_object()).unwrap();
    assert!(!steps.contains_key("execute"));
}

#[tokio::test]
async fn existing_packages_describe_projects_before_execution() {
    let h = setup(|projects, _| {
        *projects.installed.get_mut().unwrap() =
            HashMap::from([(project("App"), vec![PackageReference::new(pkg("Old", "1.0.0"))])]);
    });
    let actions = vec![
        AtomicAction::uninstall("App", pkg("Old", "1.0.0")).into(),
        install("New", "1.0.0"),
    ];
    let outcome = run(&h, actions, &CancellationToken::new()).await;

    assert!(outcome.executed);
    assert_eq!(h.projects.installed_ids("App"), vec!["new".to_string()]);
    let events = h.telemetry.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].strings("existing_packages"), vec!["old".to_string()]);
    assert_eq!(events[0].strings("removed_packages"), vec!["old".to_string()]);
    assert_eq!(events[0].strings("added_packages"), vec!["new".to_string()]);
}

#[tokio::test]
async fn installed_package_lookup_failure_only_drops_existing_count() {
    let h = setup(|projects, _| projects.fail_installed_lookup = true);
    let actions = vec![AtomicAction::uninstall("App", pkg("Existing", "1.0.0")).into()];
    let outcome = run(&h, actions, &CancellationToken::new()).await;

    assert_eq!(outcome.status, OperationStatus::Succeeded);
    let events = h.telemetry.events();
    assert_eq!(events.len(), 1);
    assert!(!events[0].has("existing_packages"));
    assert_eq!(events[0].strings("removed_packages"), vec!["existing".to_string()]);
}

#[tokio::test]
async fn failed_record_carries_failed_status() {
    let h = setup(|projects, _| {
        projects.execute_transport_failure = Some("timeout".to_string());
    });
    run(&h, vec![install("A", "1.0.0")], &CancellationToken::new()).await;

    let events = h.telemetry.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].get("status").and_then(|v| v.as_str()), Some("failed"));
}
