//! Umbrella resource and data source schema definitions
//!
//! Every schema is paired with the description of the REST endpoint that
//! backs it. The generic CRUD handlers in `provider` are driven entirely by
//! these descriptions.

pub mod admin;
pub mod data_sources;
pub mod deployments;
pub mod policies;

use umbrella_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

/// How an existing object is changed in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMethod {
    /// Full object sent with PUT
    Put,
    /// Changed attributes sent with PATCH
    Patch,
    /// No update endpoint: every configurable attribute forces replacement
    Replace,
}

/// How the current state of an object is fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// GET {collection}/{id}
    Item,
    /// List the collection and pick the object by id
    List,
    /// No read endpoint; the identifier is built from `key_attributes`
    Identifier,
    /// Data source returning the whole collection as `items`
    Collection,
}

/// Umbrella schema configuration
///
/// Combines a ResourceSchema with the endpoint metadata needed to map it
/// onto the REST API.
#[derive(Debug, Clone)]
pub struct UmbrellaSchemaConfig {
    pub schema: ResourceSchema,
    /// Collection path; `{attr}` placeholders are filled from attributes
    pub path: &'static str,
    /// JSON field holding the remote id
    pub id_field: &'static str,
    pub update: UpdateMethod,
    pub read: ReadMode,
    /// Key wrapping the payload in responses (e.g., "data")
    pub envelope: Option<&'static str>,
    /// Whether list requests take `page`/`limit`
    pub paginated: bool,
    /// Attributes forming the identifier when `read` is `Identifier`
    pub key_attributes: &'static [&'static str],
    /// Optional attributes sent as query parameters when listing
    pub query_attributes: &'static [&'static str],
}

impl UmbrellaSchemaConfig {
    /// A managed resource created with POST on `path`
    pub fn resource(schema: ResourceSchema, path: &'static str, id_field: &'static str) -> Self {
        Self {
            schema,
            path,
            id_field,
            update: UpdateMethod::Put,
            read: ReadMode::Item,
            envelope: None,
            paginated: false,
            key_attributes: &[],
            query_attributes: &[],
        }
    }

    /// A list data source returning every object of `path`
    pub fn collection(schema: ResourceSchema, path: &'static str) -> Self {
        Self {
            read: ReadMode::Collection,
            ..Self::resource(with_list_outputs(schema), path, "id")
        }
    }

    pub fn patch(mut self) -> Self {
        self.update = UpdateMethod::Patch;
        self
    }

    /// The API has no update: mark every configurable attribute force-new
    pub fn replace_only(mut self) -> Self {
        self.update = UpdateMethod::Replace;
        for attr in self.schema.attributes.values_mut() {
            if !attr.computed {
                attr.force_new = true;
            }
        }
        self
    }

    pub fn read_via_list(mut self) -> Self {
        self.read = ReadMode::List;
        self
    }

    /// Objects without their own id, addressed by the attributes in the path
    pub fn keyed_by(mut self, key_attributes: &'static [&'static str]) -> Self {
        self.read = ReadMode::Identifier;
        self.key_attributes = key_attributes;
        self
    }

    pub fn with_envelope(mut self, key: &'static str) -> Self {
        self.envelope = Some(key);
        self
    }

    pub fn paginated(mut self) -> Self {
        self.paginated = true;
        self
    }

    pub fn with_query(mut self, attributes: &'static [&'static str]) -> Self {
        self.query_attributes = attributes;
        self
    }

    pub fn resource_type(&self) -> &str {
        &self.schema.resource_type
    }

    /// Singular data source looking up one object of this resource by `id`
    pub fn item_data_source(&self) -> Option<UmbrellaSchemaConfig> {
        if self.schema.is_data_source() || self.read == ReadMode::Identifier {
            return None;
        }

        let mut schema = ResourceSchema::data_source(self.schema.resource_type.clone());
        schema.description = self.schema.description.clone();
        for attr in self.schema.attributes.values() {
            if attr.write_only {
                continue;
            }
            let mut computed = AttributeSchema::new(attr.name.clone(), attr.attr_type.clone())
                .computed();
            computed.sensitive = attr.sensitive;
            computed.provider_name = attr.provider_name.clone();
            computed.description = attr.description.clone();
            schema = schema.attribute(computed);
        }
        schema = schema.attribute(
            AttributeSchema::new("id", AttributeType::String)
                .required()
                .with_description("Remote id of the object to look up"),
        );

        Some(Self {
            schema,
            update: UpdateMethod::Replace,
            ..self.clone()
        })
    }
}

/// Attributes every list data source exposes
fn with_list_outputs(schema: ResourceSchema) -> ResourceSchema {
    schema
        .attribute(
            AttributeSchema::new("items", AttributeType::list_of(AttributeType::Object))
                .computed()
                .with_description("Objects returned by the API, keys in snake_case"),
        )
        .attribute(
            AttributeSchema::new("count", AttributeType::Int)
                .computed()
                .with_description("Number of items"),
        )
}

/// Returns every managed resource configuration
pub fn resource_configs() -> Vec<UmbrellaSchemaConfig> {
    let mut configs = deployments::configs();
    configs.extend(policies::configs());
    configs.extend(admin::configs());
    configs
}

/// Returns every data source configuration (singular and list)
pub fn data_source_configs() -> Vec<UmbrellaSchemaConfig> {
    let mut configs: Vec<UmbrellaSchemaConfig> = resource_configs()
        .iter()
        .filter_map(UmbrellaSchemaConfig::item_data_source)
        .collect();
    configs.extend(data_sources::configs());
    configs
}

/// Returns all configurations
pub fn configs() -> Vec<UmbrellaSchemaConfig> {
    let mut configs = resource_configs();
    configs.extend(data_source_configs());
    configs
}

/// Returns all Umbrella schemas
pub fn all_schemas() -> Vec<ResourceSchema> {
    configs().into_iter().map(|c| c.schema).collect()
}
