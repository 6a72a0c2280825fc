//! Loading and validating configuration

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use umbrella_core::parser::{self, ParsedFile};
use umbrella_core::resource::{Resource, ResourceId};
use umbrella_core::schema::{ResourceSchema, SchemaKind};

/// Extension of configuration files
const CONFIG_EXTENSION: &str = "tf";

/// Schemas of one provider, split by kind
///
/// A resource and its single-object data source share a type name.
pub struct SchemaSet {
    resources: HashMap<String, ResourceSchema>,
    data_sources: HashMap<String, ResourceSchema>,
}

impl SchemaSet {
    pub fn new(schemas: Vec<ResourceSchema>) -> Self {
        let mut resources = HashMap::new();
        let mut data_sources = HashMap::new();
        for schema in schemas {
            let target = match schema.kind {
                SchemaKind::Resource => &mut resources,
                SchemaKind::DataSource => &mut data_sources,
            };
            target.insert(schema.resource_type.clone(), schema);
        }
        Self {
            resources,
            data_sources,
        }
    }

    /// Managed resource schemas by type, as used by the differ
    pub fn resources(&self) -> &HashMap<String, ResourceSchema> {
        &self.resources
    }

    pub fn resource(&self, resource_type: &str) -> Option<&ResourceSchema> {
        self.resources.get(resource_type)
    }

    pub fn for_resource(&self, resource: &Resource) -> Option<&ResourceSchema> {
        if resource.is_data_source() {
            self.data_sources.get(&resource.id.resource_type)
        } else {
            self.resources.get(&resource.id.resource_type)
        }
    }

    /// Every schema, resources first, each group sorted by type
    pub fn sorted(&self) -> Vec<&ResourceSchema> {
        let mut resources: Vec<&ResourceSchema> = self.resources.values().collect();
        resources.sort_by(|a, b| a.resource_type.cmp(&b.resource_type));
        let mut data_sources: Vec<&ResourceSchema> = self.data_sources.values().collect();
        data_sources.sort_by(|a, b| a.resource_type.cmp(&b.resource_type));
        resources.extend(data_sources);
        resources
    }
}

/// Configuration files at `path`: the file itself, or every `*.tf` file of a
/// directory in name order
fn config_files(path: &Path) -> Result<Vec<PathBuf>, String> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let entries = fs::read_dir(path)
        .map_err(|e| format!("Failed to read directory {}: {}", path.display(), e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| e.to_string())?;
        let file = entry.path();
        if file.is_file() && file.extension().is_some_and(|ext| ext == CONFIG_EXTENSION) {
            files.push(file);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(format!(
            "No .{} files found in {}",
            CONFIG_EXTENSION,
            path.display()
        ));
    }
    Ok(files)
}

/// Parse the configuration at `path` and check its references
pub fn load_config(path: &Path) -> Result<ParsedFile, String> {
    let mut merged = ParsedFile::default();

    for file in config_files(path)? {
        debug!("Parsing {}", file.display());
        let content = fs::read_to_string(&file)
            .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
        let parsed = parser::parse(&content)
            .map_err(|e| format!("Failed to parse {}: {}", file.display(), e))?;
        merged
            .merge(parsed)
            .map_err(|e| format!("{}: {}", file.display(), e))?;
    }

    merged
        .check_references()
        .map_err(|e| format!("Configuration error: {}", e))?;
    check_ambiguous_ids(&merged.resources)?;
    Ok(merged)
}

/// A data source may not share type and name with a managed resource
fn check_ambiguous_ids(resources: &[Resource]) -> Result<(), String> {
    let managed: HashSet<&ResourceId> = resources
        .iter()
        .filter(|r| !r.is_data_source())
        .map(|r| &r.id)
        .collect();
    match resources
        .iter()
        .find(|r| r.is_data_source() && managed.contains(&r.id))
    {
        Some(r) => Err(format!(
            "data.{} and {} must have different names",
            r.id, r.id
        )),
        None => Ok(()),
    }
}

/// Normalize blocks, fill defaults and validate every resource against its schema
///
/// All validation errors are collected before failing.
pub fn prepare_resources(resources: &mut [Resource], schemas: &SchemaSet) -> Result<(), String> {
    let mut all_errors = Vec::new();

    for resource in resources.iter_mut() {
        let Some(schema) = schemas.for_resource(resource) else {
            let kind = if resource.is_data_source() {
                "data source"
            } else {
                "resource type"
            };
            all_errors.push(format!(
                "{}: unknown {} '{}'",
                resource.binding(),
                kind,
                resource.id.resource_type
            ));
            continue;
        };

        schema.normalize_blocks(&mut resource.attributes);
        schema.apply_defaults(&mut resource.attributes);
        if let Err(errors) = schema.validate(&resource.attributes) {
            for error in errors {
                all_errors.push(format!("{}: {}", resource.binding(), error));
            }
        }
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(all_errors.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use umbrella_core::resource::Value;
    use umbrella_provider::schemas::all_schemas;

    #[test]
    fn loads_every_tf_file_of_a_directory() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("sites.tf"),
            r#"resource "umbrella_site" "hq" { name = "HQ" }"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("networks.tf"),
            r#"
            resource "umbrella_internal_network" "lan" {
              name          = "LAN"
              ip_address    = "10.0.0.0"
              prefix_length = 24
              site_id       = umbrella_site.hq.site_id
            }
            "#,
        )
        .unwrap();
        fs::write(dir.path().join("README.md"), "not configuration").unwrap();

        let parsed = load_config(dir.path()).unwrap();
        assert_eq!(parsed.resources.len(), 2);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(err.contains("No .tf files"));
    }

    #[test]
    fn undefined_reference_is_reported() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("main.tf");
        fs::write(
            &file,
            r#"resource "umbrella_tag" "t" { name = umbrella_site.missing.name }"#,
        )
        .unwrap();

        let err = load_config(&file).unwrap_err();
        assert!(err.contains("umbrella_site.missing"));
    }

    #[test]
    fn data_source_and_resource_names_must_differ() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("main.tf");
        fs::write(
            &file,
            r#"
            resource "umbrella_site" "hq" { name = "HQ" }
            data "umbrella_site" "hq" { id = "7" }
            "#,
        )
        .unwrap();

        assert!(load_config(&file).is_err());
    }

    #[test]
    fn prepare_applies_defaults_and_collects_errors() {
        let schemas = SchemaSet::new(all_schemas());
        let mut resources = vec![
            Resource::new("umbrella_network", "branch")
                .with_attribute("name", Value::String("Branch".to_string()))
                .with_attribute("ip_address", Value::String("203.0.113.8".to_string()))
                .with_attribute("prefix_length", Value::Int(29)),
            Resource::new("umbrella_network", "bad")
                .with_attribute("name", Value::String("Bad".to_string()))
                .with_attribute("ip_address", Value::String("203.0.113.8".to_string()))
                .with_attribute("prefix_length", Value::Int(8)),
            Resource::new("umbrella_unknown", "x"),
        ];

        let err = prepare_resources(&mut resources, &schemas).unwrap_err();
        assert_eq!(
            resources[0].attributes.get("is_dynamic"),
            Some(&Value::Bool(false))
        );
        assert!(err.contains("umbrella_network.bad"));
        assert!(err.contains("unknown resource type 'umbrella_unknown'"));
        assert!(!err.contains("umbrella_network.branch"));
    }

    #[test]
    fn data_sources_use_their_own_schema() {
        let schemas = SchemaSet::new(all_schemas());
        let mut resources = vec![
            Resource::data_source("umbrella_site", "hq")
                .with_attribute("id", Value::String("7".to_string())),
        ];
        prepare_resources(&mut resources, &schemas).unwrap();
    }
}
