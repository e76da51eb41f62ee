//! Terminal presentation for `depgate apply`.
//!
//! Uses dialoguer for confirmations. Prompts block, so each one runs on the
//! blocking pool.

use std::error::Error as StdError;

use async_trait::async_trait;
use console::style;
use dialoguer::{Confirm, theme::ColorfulTheme};
use tracing::{debug, warn};

use depgate_core::metadata::LicenseAcceptanceItem;
use depgate_core::preview::ProjectChangeSet;
use depgate_core::services::{Presentation, TelemetrySink};
use depgate_core::telemetry::ActionTelemetryEvent;
use depgate_core::types::{PackageFormat, ProjectId};

use crate::render;

pub struct ConsolePresentation {
    /// Answer every prompt with yes
    assume_yes: bool,
}

impl ConsolePresentation {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    async fn confirm(&self, prompt: String, default: bool) -> bool {
        if self.assume_yes {
            println!("{prompt} {}", style("yes").green());
            return true;
        }
        let answer = tokio::task::spawn_blocking(move || {
            Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .default(default)
                .interact()
        })
        .await;

        match answer {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(err)) => {
                warn!(error = %err, "prompt failed; treating as declined");
                false
            }
            Err(err) => {
                warn!(error = %err, "prompt task failed; treating as declined");
                false
            }
        }
    }
}

#[async_trait]
impl Presentation for ConsolePresentation {
    async fn prompt_for_preview_acceptance(&self, change_sets: &[ProjectChangeSet]) -> bool {
        render::print_change_sets(change_sets);
        self.confirm("Apply these changes?".to_string(), true).await
    }

    async fn prompt_for_license_acceptance(&self, items: &[LicenseAcceptanceItem]) -> bool {
        println!("The following packages require license acceptance:");
        for item in items {
            println!("  {}", style(&item.identity).bold());
            if !item.authors.is_empty() {
                println!("    by {}", item.authors.join(", "));
            }
            for link in &item.license_links {
                match &link.url {
                    Some(url) => println!("    {} <{url}>", link.text),
                    None => println!("    {}", link.text),
                }
            }
        }
        self.confirm("Do you accept these licenses?".to_string(), false)
            .await
    }

    async fn prompt_for_package_format(&self, format: PackageFormat) -> bool {
        let name = match format {
            PackageFormat::PackageReference => "PackageReference",
            PackageFormat::Legacy => "packages.config",
        };
        self.confirm(format!("Use the {name} format for empty projects?"), true)
            .await
    }

    async fn warn_about_deprecation(&self, projects: &[ProjectId]) -> bool {
        println!(
            "{} these projects target a deprecated framework:",
            style("warning:").yellow().bold()
        );
        for project in projects {
            println!("  {project}");
        }
        self.confirm("Continue anyway?".to_string(), false).await
    }

    fn show_error(&self, error: &(dyn StdError + 'static)) {
        eprintln!("{} {error}", style("error:").red().bold());
    }

    fn show_message(&self, message: &str) {
        println!("{message}");
    }
}

/// Writes completion records to the debug log.
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn emit(&self, event: ActionTelemetryEvent) {
        match serde_json::to_string(&event.properties) {
            Ok(properties) => debug!(event = %event.name, %properties, "telemetry"),
            Err(err) => warn!(error = %err, "failed to serialize telemetry"),
        }
    }
}
