//! Graph - Dependencies between resources through references
//!
//! A reference `umbrella_site.hq.site_id` makes the referring resource depend
//! on the binding `umbrella_site.hq`. Resources are ordered so that every
//! binding is created (or read) before anything that refers to it.

use std::collections::{HashMap, HashSet};

use crate::resource::{Resource, Value};

/// Attributes known for each binding, used to resolve references
pub type BindingMap = HashMap<String, HashMap<String, Value>>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("{from} references undeclared resource '{reference}'")]
    UnknownBinding { from: String, reference: String },
}

/// Extract binding names that a resource depends on
pub fn dependencies(resource: &Resource) -> HashSet<String> {
    let mut deps = HashSet::new();
    for value in resource.attributes.values() {
        collect_dependencies(value, &mut deps);
    }
    deps
}

fn collect_dependencies(value: &Value, deps: &mut HashSet<String>) {
    match value {
        Value::ResourceRef(binding_name, _) => {
            deps.insert(binding_name.clone());
        }
        Value::List(items) => {
            for item in items {
                collect_dependencies(item, deps);
            }
        }
        Value::Map(map) => {
            for v in map.values() {
                collect_dependencies(v, deps);
            }
        }
        _ => {}
    }
}

/// Sort resources topologically based on dependencies
///
/// Declaration order is kept wherever dependencies allow it.
pub fn sort_by_dependencies(resources: &[Resource]) -> Result<Vec<Resource>, GraphError> {
    let by_binding: HashMap<String, &Resource> =
        resources.iter().map(|r| (r.binding(), r)).collect();

    let mut sorted = Vec::with_capacity(resources.len());
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack: Vec<String> = Vec::new();

    fn visit<'a>(
        resource: &'a Resource,
        by_binding: &HashMap<String, &'a Resource>,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
        sorted: &mut Vec<Resource>,
    ) -> Result<(), GraphError> {
        let binding = resource.binding();
        if visited.contains(&binding) {
            return Ok(());
        }
        if let Some(pos) = stack.iter().position(|b| *b == binding) {
            let mut cycle = stack[pos..].to_vec();
            cycle.push(binding);
            return Err(GraphError::Cycle(cycle));
        }

        stack.push(binding.clone());

        let mut deps: Vec<String> = dependencies(resource).into_iter().collect();
        deps.sort();
        for dep in deps {
            let Some(dep_resource) = by_binding.get(&dep).copied() else {
                return Err(GraphError::UnknownBinding {
                    from: binding.clone(),
                    reference: dep,
                });
            };
            visit(dep_resource, by_binding, visited, stack, sorted)?;
        }

        stack.pop();
        visited.insert(binding);
        sorted.push(resource.clone());
        Ok(())
    }

    for resource in resources {
        visit(resource, &by_binding, &mut visited, &mut stack, &mut sorted)?;
    }

    Ok(sorted)
}

/// Look up a dotted attribute path inside a binding's attributes
fn lookup<'a>(attrs: &'a HashMap<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = attrs.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Map(map) => map.get(part)?,
            Value::List(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Replace references with known values; unknown references are kept as-is
pub fn resolve_value(value: &Value, bindings: &BindingMap) -> Value {
    match value {
        Value::ResourceRef(binding_name, attr_path) => {
            if let Some(attrs) = bindings.get(binding_name)
                && let Some(attr_value) = lookup(attrs, attr_path)
            {
                return resolve_value(attr_value, bindings);
            }
            value.clone()
        }
        Value::List(items) => Value::List(
            items
                .iter()
                .map(|v| resolve_value(v, bindings))
                .collect(),
        ),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, bindings)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// Resolve all references of a resource against the binding map
pub fn resolve_resource(resource: &Resource, bindings: &BindingMap) -> Resource {
    let mut resolved = resource.clone();
    resolved.attributes = resource
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), resolve_value(v, bindings)))
        .collect();
    resolved
}

/// Names of attributes that still hold unresolved references
pub fn unresolved_attributes(resource: &Resource) -> Vec<String> {
    let mut names: Vec<String> = resource
        .attributes
        .iter()
        .filter(|(_, v)| v.contains_ref())
        .map(|(k, _)| k.clone())
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(binding: &str, attr: &str) -> Value {
        Value::ResourceRef(binding.to_string(), attr.to_string())
    }

    #[test]
    fn sort_puts_dependencies_first() {
        let resources = vec![
            Resource::new("umbrella_internal_network", "lan")
                .with_attribute("site_id", reference("umbrella_site.hq", "site_id")),
            Resource::new("umbrella_site", "hq"),
        ];

        let sorted = sort_by_dependencies(&resources).unwrap();
        let order: Vec<String> = sorted.iter().map(|r| r.binding()).collect();
        assert_eq!(order, vec!["umbrella_site.hq", "umbrella_internal_network.lan"]);
    }

    #[test]
    fn sort_detects_cycles() {
        let resources = vec![
            Resource::new("umbrella_tag", "a").with_attribute("name", reference("umbrella_tag.b", "name")),
            Resource::new("umbrella_tag", "b").with_attribute("name", reference("umbrella_tag.a", "name")),
        ];

        let err = sort_by_dependencies(&resources).unwrap_err();
        assert_eq!(
            err,
            GraphError::Cycle(vec![
                "umbrella_tag.a".to_string(),
                "umbrella_tag.b".to_string(),
                "umbrella_tag.a".to_string()
            ])
        );
    }

    #[test]
    fn sort_rejects_unknown_binding() {
        let resources = vec![Resource::new("umbrella_tag", "a")
            .with_attribute("name", reference("umbrella_tag.missing", "name"))];
        assert!(matches!(
            sort_by_dependencies(&resources),
            Err(GraphError::UnknownBinding { .. })
        ));
    }

    #[test]
    fn resolve_walks_nested_paths() {
        let mut bindings = BindingMap::new();
        let mut client = HashMap::new();
        client.insert(
            "authentication".to_string(),
            Value::Map(
                [("id".to_string(), Value::String("tunnel-1@umbrella".to_string()))]
                    .into_iter()
                    .collect(),
            ),
        );
        bindings.insert(
            "umbrella_tunnel.branch".to_string(),
            [("client".to_string(), Value::Map(client))].into_iter().collect(),
        );

        let value = resolve_value(
            &reference("umbrella_tunnel.branch", "client.authentication.id"),
            &bindings,
        );
        assert_eq!(value, Value::String("tunnel-1@umbrella".to_string()));
    }

    #[test]
    fn resolve_indexes_lists() {
        let mut bindings = BindingMap::new();
        bindings.insert(
            "data.umbrella_sites.all".to_string(),
            [(
                "items".to_string(),
                Value::List(vec![Value::Map(
                    [("site_id".to_string(), Value::Int(3))].into_iter().collect(),
                )]),
            )]
            .into_iter()
            .collect(),
        );

        let value = resolve_value(&reference("data.umbrella_sites.all", "items.0.site_id"), &bindings);
        assert_eq!(value, Value::Int(3));
    }

    #[test]
    fn unknown_reference_is_kept() {
        let resource = Resource::new("umbrella_internal_network", "lan")
            .with_attribute("site_id", reference("umbrella_site.hq", "site_id"));
        let resolved = resolve_resource(&resource, &BindingMap::new());
        assert_eq!(unresolved_attributes(&resolved), vec!["site_id".to_string()]);
    }
}
