//! Flattening of composite resolver actions into atomic ones.

use crate::types::{AtomicAction, PackageAction};

/// Expand composite actions into their implicit atomic actions.
///
/// A composite with implicit entries is replaced by one atomic action per
/// entry, in entry order, each inheriting the composite's project. A
/// composite without entries becomes a plain atomic action. Atomic input is
/// passed through. Relative order is preserved throughout.
pub fn expand<I>(actions: I) -> Vec<AtomicAction>
where
    I: IntoIterator<Item = PackageAction>,
{
    let mut expanded = Vec::new();
    for action in actions {
        match action {
            PackageAction::Atomic(atomic) => expanded.push(atomic),
            PackageAction::Composite(composite) if composite.implicit.is_empty() => {
                expanded.push(AtomicAction {
                    project: composite.project,
                    package: composite.package,
                    action_type: composite.action_type,
                });
            }
            PackageAction::Composite(composite) => {
                let project = composite.project;
                expanded.extend(composite.implicit.into_iter().map(|implicit| AtomicAction {
                    project: project.clone(),
                    package: implicit.package,
                    action_type: implicit.action_type,
                }));
            }
        }
    }
    expanded
}
