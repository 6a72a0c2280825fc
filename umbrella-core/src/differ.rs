//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the "desired state" declared in configuration with the "current
//! state" fetched from the Provider, and generates the list of required
//! Effects (Plan).

use std::collections::HashMap;

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::ResourceSchema;

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// A force-new attribute differs -> delete and create again
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State, schema: Option<&ResourceSchema>) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let mut changed = find_changed_attributes(&desired.attributes, &current.attributes);
    changed.extend(removed_attributes(&desired.attributes, current, schema));
    changed.sort();

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let replace = schema.is_some_and(|s| changed.iter().any(|name| s.is_force_new(name)));
    if replace {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
///
/// Only attributes present in configuration are compared; computed
/// attributes returned by the API never cause a diff. Attributes removed
/// from configuration are found by `removed_attributes`. A desired value that
/// still holds a reference is unknown until apply and counts as changed.
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        if desired_value.contains_ref() {
            changed.push(key.clone());
            continue;
        }
        match current.get(key) {
            Some(current_value) if current_value == desired_value => {}
            _ => changed.push(key.clone()),
        }
    }

    changed
}

/// Attributes that were configured when the state was recorded and have
/// since been dropped from configuration; the update clears them
fn removed_attributes(
    desired: &HashMap<String, Value>,
    current: &State,
    schema: Option<&ResourceSchema>,
) -> Vec<String> {
    current
        .removed_from(desired)
        .filter(|name| {
            schema.is_none_or(|s| {
                s.attributes
                    .get(*name)
                    .is_some_and(|attr| !attr.computed && !attr.write_only)
            })
        })
        .cloned()
        .collect()
}

/// Compute Diffs for all resources and generate a Plan
///
/// `desired` must already be in dependency order. `orphans` are resources
/// recorded in state but no longer configured; they are deleted first.
/// Data sources whose state is absent from `current_states` could not be read
/// at plan time and are deferred to apply as Read effects.
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
    orphans: &[(ResourceId, String)],
    schemas: &HashMap<String, ResourceSchema>,
) -> Plan {
    let mut plan = Plan::new();

    for (id, identifier) in orphans {
        plan.add(Effect::Delete {
            id: id.clone(),
            identifier: identifier.clone(),
        });
    }

    for resource in desired {
        if resource.is_data_source() {
            if !current_states.contains_key(&resource.id) {
                plan.add(Effect::Read(resource.clone()));
            }
            continue;
        }

        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        let schema = schemas.get(&resource.id.resource_type);

        match diff(resource, &current, schema) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Update {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::Replace {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Replace {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::NoChange(_) => {}
        }
    }

    plan
}
