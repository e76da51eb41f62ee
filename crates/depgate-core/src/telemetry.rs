//! Completion record emitted once per package operation.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::types::{OperationKind, OperationStatus, PackageIdentity, ProjectId};

pub const EVENT_NAME: &str = "package-operation/completed";

/// Structured telemetry record.
///
/// Properties are only present when they carry information; empty lists
/// and zero counts are left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionTelemetryEvent {
    pub name: String,
    pub properties: BTreeMap<String, Value>,
}

impl ActionTelemetryEvent {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// String list property, e.g. `added_packages`.
    pub fn strings(&self, key: &str) -> Vec<String> {
        match self.properties.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Collects the present fields of a completion record.
#[derive(Debug, Default)]
pub struct TelemetryEventBuilder {
    properties: BTreeMap<String, Value>,
}

impl TelemetryEventBuilder {
    pub fn new(operation_id: Uuid, kind: OperationKind, status: OperationStatus) -> Self {
        let mut builder = Self::default();
        builder.set("operation_id", Value::String(operation_id.to_string()));
        builder.set("operation_type", Value::String(kind.to_string()));
        builder.set("status", Value::String(status.to_string()));
        builder
    }

    fn set(&mut self, key: &str, value: Value) {
        self.properties.insert(key.to_string(), value);
    }

    pub fn timing(mut self, start_time: DateTime<Utc>, duration: Duration) -> Self {
        self.set("start_time", Value::String(start_time.to_rfc3339()));
        self.set("duration_ms", Value::from(duration.as_millis() as u64));
        self
    }

    pub fn package_count(mut self, count: usize) -> Self {
        if count > 0 {
            self.set("package_count", Value::from(count));
        }
        self
    }

    pub fn projects(mut self, projects: &[ProjectId]) -> Self {
        if !projects.is_empty() {
            let ids = projects.iter().map(|p| p.as_str().to_string()).collect();
            self.set_strings("project_ids", ids);
        }
        self
    }

    /// Attach a package list under `key`. Ids are lower-cased.
    pub fn packages<'a, I>(mut self, key: &str, packages: I) -> Self
    where
        I: IntoIterator<Item = &'a PackageIdentity>,
    {
        let ids: Vec<String> = packages.into_iter().map(PackageIdentity::id_key).collect();
        if !ids.is_empty() {
            self.set_strings(key, ids);
        }
        self
    }

    pub fn target_frameworks(mut self, frameworks: Vec<String>) -> Self {
        if !frameworks.is_empty() {
            self.set_strings("target_frameworks", frameworks);
        }
        self
    }

    pub fn step_durations(mut self, steps: &[(&'static str, Duration)]) -> Self {
        if !steps.is_empty() {
            let map = steps
                .iter()
                .map(|(name, d)| (name.to_string(), Value::from(d.as_millis() as u64)))
                .collect();
            self.set("step_durations_ms", Value::Object(map));
        }
        self
    }

    pub fn gate_veto(mut self, stage: Option<&str>) -> Self {
        if let Some(stage) = stage {
            self.set("gate_veto", Value::String(stage.to_string()));
        }
        self
    }

    fn set_strings(&mut self, key: &str, values: Vec<String>) {
        self.set(key, Value::Array(values.into_iter().map(Value::String).collect()));
    }

    pub fn build(self) -> ActionTelemetryEvent {
        ActionTelemetryEvent {
            name: EVENT_NAME.to_string(),
            properties: self.properties,
        }
    }
}
