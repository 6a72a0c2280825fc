//! Reading current state from the API and planning against it

use std::collections::{HashMap, HashSet};

use colored::Colorize;
use log::{debug, warn};
use umbrella_core::differ::create_plan;
use umbrella_core::effect::Effect;
use umbrella_core::graph::{BindingMap, resolve_resource, sort_by_dependencies};
use umbrella_core::plan::Plan;
use umbrella_core::provider::Provider;
use umbrella_core::resource::{Resource, ResourceId, State};
use umbrella_state::{ResourceState, StateFile};

use crate::load::SchemaSet;

/// Result of refreshing the configuration against the API
pub struct Refreshed {
    /// Configured resources in dependency order
    pub resources: Vec<Resource>,
    /// Current state of managed resources and of data sources read so far
    pub current_states: HashMap<ResourceId, State>,
    /// Known attributes per binding
    pub bindings: BindingMap,
    /// Recorded resources no longer in configuration, with their identifiers
    pub orphans: Vec<(ResourceId, String)>,
}

impl Refreshed {
    /// Record the refreshed managed resources into the state file
    pub fn update_state_file(&self, state_file: &mut StateFile, provider: &str) {
        for resource in self.resources.iter().filter(|r| !r.is_data_source()) {
            match self.current_states.get(&resource.id) {
                Some(state) if state.exists => {
                    state_file.upsert_resource(ResourceState::from_state(state, provider));
                }
                _ => {
                    state_file.remove_resource(&resource.id);
                }
            }
        }
    }
}

/// Read the current state of every configured resource
///
/// Managed resources are read by the identifier recorded in state; attributes
/// the API does not return (write-only values) are carried over from the
/// recorded state. Data sources are read as soon as their references are
/// known; the others are left for apply.
pub async fn refresh<P: Provider>(
    provider: &P,
    resources: &[Resource],
    state_file: &StateFile,
) -> Result<Refreshed, String> {
    let sorted = sort_by_dependencies(resources).map_err(|e| e.to_string())?;

    let mut current_states: HashMap<ResourceId, State> = HashMap::new();
    let mut bindings: BindingMap = HashMap::new();

    for resource in &sorted {
        if resource.is_data_source() {
            let resolved = resolve_resource(resource, &bindings);
            if resolved.attributes.values().any(|v| v.contains_ref()) {
                debug!("{}: deferred until apply", resource.binding());
                continue;
            }
            let state = provider
                .read_data_source(&resolved)
                .await
                .map_err(|e| format!("Failed to read {}: {}", resource.binding(), e))?;
            bindings.insert(resource.binding(), state.attributes.clone());
            current_states.insert(resource.id.clone(), state);
            continue;
        }

        let recorded = state_file.find_resource(&resource.id);
        let identifier = recorded.and_then(|r| r.identifier.as_deref());
        let mut state = provider
            .read(&resource.id, identifier)
            .await
            .map_err(|e| format!("Failed to read {}: {}", resource.id, e))?;

        if let Some(recorded) = recorded {
            if state.exists {
                for (k, v) in recorded.values() {
                    state.attributes.entry(k).or_insert(v);
                }
                state.configured = recorded.configured.clone();
            } else if identifier.is_some() {
                warn!("{} was deleted outside of this tool", resource.id);
            }
        }

        if state.exists {
            bindings.insert(resource.binding(), state.attributes.clone());
        }
        current_states.insert(resource.id.clone(), state);
    }

    let configured: HashSet<&ResourceId> = resources
        .iter()
        .filter(|r| !r.is_data_source())
        .map(|r| &r.id)
        .collect();
    let orphans = state_file
        .resources
        .iter()
        .rev()
        .filter_map(|r| {
            let id = r.resource_id();
            if configured.contains(&id) {
                return None;
            }
            match &r.identifier {
                Some(identifier) => Some((id, identifier.clone())),
                None => {
                    warn!("{} has no identifier in state; skipping", id);
                    None
                }
            }
        })
        .collect();

    Ok(Refreshed {
        resources: sorted,
        current_states,
        bindings,
        orphans,
    })
}

/// Compute the plan for refreshed resources
///
/// References are resolved against current values, except references to
/// bindings that the plan creates or replaces: those stay unknown so that
/// their dependents are planned as changed.
pub fn plan(refreshed: &Refreshed, schemas: &SchemaSet) -> Plan {
    let mut pending: HashSet<String> = HashSet::new();

    loop {
        let bindings: BindingMap = refreshed
            .bindings
            .iter()
            .filter(|(binding, _)| !pending.contains(*binding))
            .map(|(binding, attrs)| (binding.clone(), attrs.clone()))
            .collect();
        let desired: Vec<Resource> = refreshed
            .resources
            .iter()
            .map(|r| resolve_resource(r, &bindings))
            .collect();

        let plan = create_plan(
            &desired,
            &refreshed.current_states,
            &refreshed.orphans,
            schemas.resources(),
        );

        let recreated: HashSet<String> = plan
            .effects()
            .iter()
            .filter_map(|effect| match effect {
                Effect::Create(r) | Effect::Replace { to: r, .. } => Some(r.binding()),
                _ => None,
            })
            .collect();
        if recreated.is_subset(&pending) {
            return plan;
        }
        pending.extend(recreated);
    }
}

/// Print the warning for a plan that deletes resources no longer configured
pub fn warn_orphans(refreshed: &Refreshed) {
    for (id, identifier) in &refreshed.orphans {
        println!(
            "{} {} ({}) is no longer configured and will be deleted",
            "Note:".yellow().bold(),
            id,
            identifier
        );
    }
}
