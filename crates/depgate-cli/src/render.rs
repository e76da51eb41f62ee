//! Table output shared by the subcommands.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use depgate_core::metadata::PackageMetadata;
use depgate_core::preview::ProjectChangeSet;
use depgate_core::types::PackageIdentity;

/// One requested package and whatever the resolver returned for it.
#[derive(Debug, Serialize)]
pub struct MetadataRow<'a> {
    pub requested: &'a PackageIdentity,
    pub metadata: Option<&'a PackageMetadata>,
}

/// Rows in request order, one per distinct requested package. Lookups go
/// by the requested identity, never by the identity a source reported.
pub fn metadata_rows<'a>(
    requested: &'a [PackageIdentity],
    resolved: &'a HashMap<PackageIdentity, PackageMetadata>,
) -> Vec<MetadataRow<'a>> {
    let mut seen = HashSet::new();
    requested
        .iter()
        .filter(|identity| seen.insert(*identity))
        .map(|identity| MetadataRow {
            requested: identity,
            metadata: resolved.get(identity),
        })
        .collect()
}

pub fn print_change_sets(change_sets: &[ProjectChangeSet]) {
    if change_sets.iter().all(ProjectChangeSet::is_empty) {
        println!("No changes.");
        return;
    }

    for set in change_sets {
        println!("{} ({})", set.project_name, set.project);
        for package in &set.added {
            println!("  + {package}");
        }
        for package in &set.removed {
            println!("  - {package}");
        }
        for update in &set.updated {
            println!(
                "  ~ {} {} -> {}",
                update.new.id,
                version(&update.old),
                version(&update.new)
            );
        }
    }
}

pub fn print_metadata(rows: &[MetadataRow<'_>]) {
    println!("{:<40} {:<16} {}", "PACKAGE", "VERSION", "LICENSE");
    for row in rows {
        println!(
            "{:<40} {:<16} {}",
            row.requested.id,
            version(row.requested),
            license_column(row.metadata)
        );
    }
}

fn license_column(metadata: Option<&PackageMetadata>) -> &'static str {
    match metadata {
        Some(found) if found.requires_license_acceptance => "acceptance required",
        Some(_) => "-",
        None => "not found",
    }
}

fn version(identity: &PackageIdentity) -> String {
    identity
        .version
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "*".to_string())
}
