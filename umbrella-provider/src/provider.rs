//! Umbrella Provider implementation
//!
//! Generic CRUD handlers driven by `UmbrellaSchemaConfig`: attributes are
//! mapped to JSON fields, sent to the collection or item endpoint, and the
//! response is mapped back into state.

use std::collections::HashMap;

use log::{debug, info, warn};
use serde_json::{Map, Value as JsonValue};
use umbrella_core::provider::{ProviderError, ProviderErrorKind, ProviderResult};
use umbrella_core::resource::{Resource, ResourceId, State, Value};
use umbrella_core::schema::{AttributeSchema, AttributeType};
use url::Url;

use crate::case_convert::{keys_to_camel_case, keys_to_snake_case, to_camel_case};
use crate::client::{UmbrellaClient, unwrap_envelope};
use crate::config::UmbrellaConfig;
use crate::schemas::{self, ReadMode, UmbrellaSchemaConfig, UpdateMethod};

/// Separator between key attribute values in composite identifiers
const KEY_SEPARATOR: &str = ":";

/// Cisco Umbrella Provider
pub struct UmbrellaProvider {
    client: UmbrellaClient,
    resources: HashMap<String, UmbrellaSchemaConfig>,
    data_sources: HashMap<String, UmbrellaSchemaConfig>,
}

impl UmbrellaProvider {
    pub fn new(client: UmbrellaClient) -> Self {
        let resources = schemas::resource_configs()
            .into_iter()
            .map(|c| (c.schema.resource_type.clone(), c))
            .collect();
        let data_sources = schemas::data_source_configs()
            .into_iter()
            .map(|c| (c.schema.resource_type.clone(), c))
            .collect();
        Self {
            client,
            resources,
            data_sources,
        }
    }

    /// Build the client from provider block settings
    pub fn from_config(config: &UmbrellaConfig) -> ProviderResult<Self> {
        Ok(Self::new(UmbrellaClient::new(config)?))
    }

    pub fn client(&self) -> &UmbrellaClient {
        &self.client
    }

    fn resource_config(&self, id: &ResourceId) -> ProviderResult<&UmbrellaSchemaConfig> {
        self.resources.get(&id.resource_type).ok_or_else(|| {
            ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
                .with_kind(ProviderErrorKind::Validation)
                .for_resource(id.clone())
        })
    }

    fn data_source_config(&self, id: &ResourceId) -> ProviderResult<&UmbrellaSchemaConfig> {
        self.data_sources.get(&id.resource_type).ok_or_else(|| {
            ProviderError::new(format!("Unknown data source: {}", id.resource_type))
                .with_kind(ProviderErrorKind::Validation)
                .for_resource(id.clone())
        })
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Read a managed resource by its remote identifier
    pub async fn read_resource(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        let config = self.resource_config(id)?;

        let Some(identifier) = identifier else {
            return Ok(State::not_found(id.clone()));
        };

        if config.read == ReadMode::Identifier {
            let attributes = parse_composite_identifier(config, identifier)
                .map_err(|e| e.for_resource(id.clone()))?;
            return Ok(State::existing(id.clone(), attributes).with_identifier(identifier));
        }

        match self
            .fetch(config, identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
        {
            Some(body) => Ok(State::existing(id.clone(), from_response(config, &body))
                .with_identifier(identifier)),
            None => {
                debug!("{id}: {identifier} no longer exists");
                Ok(State::not_found(id.clone()))
            }
        }
    }

    /// Create a resource, then read it back
    pub async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let config = self.resource_config(id)?;
        let for_resource = |e: ProviderError| e.for_resource(id.clone());

        if config.read == ReadMode::Identifier {
            let path = render_path(config.path, &resource.attributes).map_err(for_resource)?;
            self.client
                .put(&path, None)
                .await
                .map_err(|e| for_resource(e.into()))?;

            let identifier = composite_identifier(config, &resource.attributes).map_err(for_resource)?;
            info!("{id}: created {identifier}");
            let attributes = parse_composite_identifier(config, &identifier).map_err(for_resource)?;
            return Ok(State::existing(id.clone(), attributes).with_identifier(identifier));
        }

        let path = render_path(config.path, &resource.attributes).map_err(for_resource)?;
        let body = to_request_body(config, &resource.attributes, None);
        let response = self
            .client
            .post(&path, &body)
            .await
            .map_err(|e| for_resource(e.into()))?;
        let created = unwrap_envelope(response, config.envelope);

        let identifier = identifier_of(config, &created).ok_or_else(|| {
            for_resource(ProviderError::new(format!(
                "Created but the response has no '{}'",
                config.id_field
            )))
        })?;
        info!("{id}: created {identifier}");

        // Fields such as API key secrets are only present in the create response
        let mut attributes = from_response(config, &created);
        match self.read_resource(id, Some(&identifier)).await {
            Ok(state) if state.exists => attributes.extend(state.attributes),
            Ok(_) => warn!("{id}: {identifier} is not readable yet, using the create response"),
            // The object exists remotely; losing its identifier would orphan it
            Err(e) => warn!("{id}: read after create failed ({e}), using the create response"),
        }

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    /// Update a resource in place, then read it back
    pub async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let config = self.resource_config(id)?;
        let for_resource = |e: ProviderError| e.for_resource(id.clone());

        let item = item_path(config, identifier, &to.attributes).map_err(for_resource)?;
        match config.update {
            UpdateMethod::Replace => {
                return Err(for_resource(
                    ProviderError::new(format!(
                        "{} cannot be updated in place, it must be replaced",
                        id.resource_type
                    ))
                    .with_kind(ProviderErrorKind::Validation),
                ));
            }
            UpdateMethod::Put => {
                let body = to_request_body(config, &to.attributes, None);
                self.client
                    .put(&item, Some(&body))
                    .await
                    .map_err(|e| for_resource(e.into()))?;
            }
            UpdateMethod::Patch => {
                let changed: Vec<String> = to
                    .attributes
                    .iter()
                    .filter(|(k, v)| from.attributes.get(*k) != Some(*v))
                    .map(|(k, _)| k.clone())
                    .collect();
                let mut body = to_request_body(config, &to.attributes, Some(changed.as_slice()));
                if let JsonValue::Object(fields) = &mut body {
                    for attr in cleared_attributes(config, from, &to.attributes) {
                        fields.insert(wire_name(attr), JsonValue::Null);
                    }
                }
                if body.as_object().is_some_and(Map::is_empty) {
                    debug!("{id}: nothing to patch");
                } else {
                    self.client
                        .patch(&item, &body)
                        .await
                        .map_err(|e| for_resource(e.into()))?;
                }
            }
        }
        info!("{id}: updated {identifier}");

        let state = self.read_resource(id, Some(identifier)).await?;
        if !state.exists {
            return Err(for_resource(ProviderError::not_found(format!(
                "{} disappeared after update",
                identifier
            ))));
        }
        Ok(state)
    }

    /// Delete a resource; an object that is already gone counts as deleted
    pub async fn delete_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        let config = self.resource_config(id)?;

        let key_attributes = if config.read == ReadMode::Identifier {
            parse_composite_identifier(config, identifier).map_err(|e| e.for_resource(id.clone()))?
        } else {
            HashMap::new()
        };
        let item = item_path(config, identifier, &key_attributes)
            .map_err(|e| e.for_resource(id.clone()))?;

        match self.client.delete(&item).await {
            Ok(()) => {
                info!("{id}: deleted {identifier}");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!("{id}: {identifier} was already deleted");
                Ok(())
            }
            Err(e) => Err(ProviderError::from(e).for_resource(id.clone())),
        }
    }

    /// Read a data source using its resolved query attributes
    pub async fn query_data_source(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let config = self.data_source_config(id)?;
        let for_resource = |e: ProviderError| e.for_resource(id.clone());

        if config.read == ReadMode::Collection {
            let path = render_path(config.path, &resource.attributes).map_err(for_resource)?;
            let params = query_params(config, &resource.attributes);
            let params: Vec<(&str, String)> =
                params.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();

            let items = self
                .client
                .list_all(&path, &params, config.envelope, config.paginated)
                .await
                .map_err(|e| for_resource(e.into()))?;

            let values: Vec<Value> = items
                .iter()
                .filter_map(|item| Value::from_json(&keys_to_snake_case(item)))
                .collect();
            debug!("{id}: {} items", values.len());

            let mut attributes = resource.attributes.clone();
            attributes.insert("count".to_string(), Value::Int(values.len() as i64));
            attributes.insert("items".to_string(), Value::List(values));
            return Ok(State::existing(id.clone(), attributes));
        }

        let lookup = resource
            .attributes
            .get("id")
            .and_then(Value::to_path_segment)
            .ok_or_else(|| {
                for_resource(
                    ProviderError::new("'id' must be set to look up the object")
                        .with_kind(ProviderErrorKind::Validation),
                )
            })?;

        let body = self
            .fetch(config, &lookup)
            .await
            .map_err(for_resource)?
            .ok_or_else(|| {
                for_resource(ProviderError::not_found(format!(
                    "No {} with id {}",
                    id.resource_type, lookup
                )))
            })?;

        let mut attributes = from_response(config, &body);
        attributes.insert("id".to_string(), Value::String(lookup.clone()));
        Ok(State::existing(id.clone(), attributes).with_identifier(lookup))
    }

    /// Fetch one object; `None` when it does not exist
    async fn fetch(
        &self,
        config: &UmbrellaSchemaConfig,
        identifier: &str,
    ) -> ProviderResult<Option<JsonValue>> {
        match config.read {
            ReadMode::List => {
                let path = render_path(config.path, &HashMap::new())?;
                let items = self
                    .client
                    .list_all(&path, &[], config.envelope, config.paginated)
                    .await?;
                Ok(items
                    .into_iter()
                    .find(|item| identifier_of(config, item).as_deref() == Some(identifier)))
            }
            _ => {
                let path = item_path(config, identifier, &HashMap::new())?;
                match self.client.get(&path).await {
                    Ok(body) => Ok(Some(unwrap_envelope(body, config.envelope))),
                    Err(e) if e.is_not_found() => Ok(None),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

// =============================================================================
// Attribute <-> JSON mapping
// =============================================================================

/// JSON field name of an attribute
pub fn wire_name(attr: &AttributeSchema) -> String {
    attr.provider_name
        .clone()
        .unwrap_or_else(|| to_camel_case(&attr.name))
}

/// Nested objects carry their own keys, converted between cases
fn has_nested_keys(attr_type: &AttributeType) -> bool {
    match attr_type {
        AttributeType::Object => true,
        AttributeType::List(inner) => has_nested_keys(inner),
        _ => false,
    }
}

/// Build the JSON body for a create or update
///
/// Computed attributes and path parameters are never sent. With `only`,
/// just the named attributes are included.
pub fn to_request_body(
    config: &UmbrellaSchemaConfig,
    attributes: &HashMap<String, Value>,
    only: Option<&[String]>,
) -> JsonValue {
    let path_params = placeholders(config.path);
    let mut body = Map::new();

    for (name, value) in attributes {
        let Some(attr) = config.schema.attributes.get(name) else {
            continue;
        };
        if attr.computed || path_params.contains(&name.as_str()) {
            continue;
        }
        if only.is_some_and(|names| !names.contains(name)) {
            continue;
        }
        let Some(json) = value.to_json() else {
            continue;
        };
        let json = if has_nested_keys(&attr.attr_type) {
            keys_to_camel_case(&json)
        } else {
            json
        };
        body.insert(wire_name(attr), json);
    }

    JsonValue::Object(body)
}

/// Attributes configured before and dropped since, which a PATCH clears
/// by sending `null`
fn cleared_attributes<'a>(
    config: &'a UmbrellaSchemaConfig,
    from: &'a State,
    desired: &'a HashMap<String, Value>,
) -> Vec<&'a AttributeSchema> {
    let path_params = placeholders(config.path);
    from.removed_from(desired)
        .filter_map(|name| config.schema.attributes.get(name))
        .filter(|attr| {
            !attr.computed && !attr.write_only && !path_params.contains(&attr.name.as_str())
        })
        .collect()
}

/// Map an API object back onto schema attributes
///
/// Write-only attributes are never returned by the API and are skipped.
pub fn from_response(config: &UmbrellaSchemaConfig, body: &JsonValue) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    let Some(obj) = body.as_object() else {
        return attributes;
    };

    for attr in config.schema.attributes.values() {
        if attr.write_only {
            continue;
        }
        let Some(json) = obj.get(&wire_name(attr)) else {
            continue;
        };
        let json = if has_nested_keys(&attr.attr_type) {
            keys_to_snake_case(json)
        } else {
            json.clone()
        };
        if let Some(value) = Value::from_json(&json) {
            attributes.insert(attr.name.clone(), value);
        }
    }

    attributes
}

/// Remote id of an API object as a string
pub fn identifier_of(config: &UmbrellaSchemaConfig, body: &JsonValue) -> Option<String> {
    match body.get(config.id_field)? {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn query_params(
    config: &UmbrellaSchemaConfig,
    attributes: &HashMap<String, Value>,
) -> Vec<(String, String)> {
    config
        .query_attributes
        .iter()
        .filter_map(|name| {
            let value = attributes.get(*name)?.to_path_segment()?;
            Some((to_camel_case(name), value))
        })
        .collect()
}

// =============================================================================
// Paths and identifiers
// =============================================================================

/// Names of the `{attr}` placeholders in a path template
fn placeholders(template: &str) -> Vec<&str> {
    template
        .split('{')
        .skip(1)
        .filter_map(|rest| rest.split_once('}').map(|(name, _)| name))
        .collect()
}

/// Fill `{attr}` placeholders from attribute values
pub fn render_path(template: &str, attributes: &HashMap<String, Value>) -> ProviderResult<String> {
    let mut path = template.to_string();
    for name in placeholders(template) {
        let segment = attributes
            .get(name)
            .and_then(Value::to_path_segment)
            .ok_or_else(|| {
                ProviderError::new(format!("'{}' is required to build the request path", name))
                    .with_kind(ProviderErrorKind::Validation)
            })?;
        path = path.replace(&format!("{{{}}}", name), &encode_segment(&segment)?);
    }
    Ok(path)
}

/// Percent-encode a value for use as a single path segment
fn encode_segment(value: &str) -> ProviderResult<String> {
    let invalid = || {
        ProviderError::new(format!("'{}' cannot be used as a path segment", value))
            .with_kind(ProviderErrorKind::Validation)
    };
    let mut url = Url::parse("http://segment/").map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .clear()
        .push(value);
    match url.path().strip_prefix('/') {
        Some(encoded) if !encoded.is_empty() => Ok(encoded.to_string()),
        _ => Err(invalid()),
    }
}

/// Path of a single object
fn item_path(
    config: &UmbrellaSchemaConfig,
    identifier: &str,
    attributes: &HashMap<String, Value>,
) -> ProviderResult<String> {
    if config.read == ReadMode::Identifier {
        return render_path(config.path, attributes);
    }
    Ok(format!(
        "{}/{}",
        render_path(config.path, attributes)?,
        encode_segment(identifier)?
    ))
}

fn composite_identifier(
    config: &UmbrellaSchemaConfig,
    attributes: &HashMap<String, Value>,
) -> ProviderResult<String> {
    let parts = config
        .key_attributes
        .iter()
        .map(|name| {
            attributes
                .get(*name)
                .and_then(Value::to_path_segment)
                .ok_or_else(|| ProviderError::new(format!("'{}' is required", name)))
        })
        .collect::<ProviderResult<Vec<_>>>()?;
    Ok(parts.join(KEY_SEPARATOR))
}

/// Split a composite identifier (e.g., "12:34") back into key attributes
pub fn parse_composite_identifier(
    config: &UmbrellaSchemaConfig,
    identifier: &str,
) -> ProviderResult<HashMap<String, Value>> {
    let parts: Vec<&str> = identifier.split(KEY_SEPARATOR).collect();
    if parts.len() != config.key_attributes.len() || parts.iter().any(|p| p.is_empty()) {
        return Err(ProviderError::new(format!(
            "Invalid identifier '{}', expected {}",
            identifier,
            config.key_attributes.join(KEY_SEPARATOR)
        ))
        .with_kind(ProviderErrorKind::Validation));
    }

    Ok(config
        .key_attributes
        .iter()
        .zip(parts)
        .map(|(name, part)| {
            let value = part
                .parse::<i64>()
                .map(Value::Int)
                .unwrap_or_else(|_| Value::String(part.to_string()));
            (name.to_string(), value)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{deployments, policies};
    use serde_json::json;

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    #[test]
    fn request_body_uses_wire_names() {
        let config = deployments::network();
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), s("Branch"));
        attrs.insert("ip_address".to_string(), s("203.0.113.8"));
        attrs.insert("prefix_length".to_string(), Value::Int(29));
        attrs.insert("is_dynamic".to_string(), Value::Bool(false));

        let body = to_request_body(&config, &attrs, None);
        assert_eq!(
            body,
            json!({
                "name": "Branch",
                "ipAddress": "203.0.113.8",
                "prefixLength": 29,
                "isDynamic": false
            })
        );
    }

    #[test]
    fn request_body_converts_nested_keys() {
        let config = deployments::tunnel();
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), s("branch"));
        attrs.insert(
            "authentication".to_string(),
            Value::Map(
                [
                    ("type".to_string(), s("PSK")),
                    (
                        "parameters".to_string(),
                        Value::Map(
                            [
                                ("id_prefix".to_string(), s("branch")),
                                ("secret".to_string(), s("Sup3rSecretKey!")),
                            ]
                            .into_iter()
                            .collect(),
                        ),
                    ),
                ]
                .into_iter()
                .collect(),
            ),
        );
        attrs.insert(
            "network_cidrs".to_string(),
            Value::List(vec![s("10.10.0.0/16")]),
        );

        let body = to_request_body(&config, &attrs, None);
        assert_eq!(body["authentication"]["parameters"]["idPrefix"], "branch");
        assert_eq!(body["networkCIDRs"], json!(["10.10.0.0/16"]));
    }

    #[test]
    fn nested_keys_read_back_are_written_unchanged() {
        let config = deployments::tunnel();
        let transport = json!({
            "protocol": "IPSec",
            "externalFQDNPrefix": "branch",
            "allowedIPs": ["10.1.0.0/16"],
            "idPrefix": "hq"
        });
        let attrs = from_response(&config, &json!({"id": 12, "transport": transport}));

        let Some(Value::Map(read)) = attrs.get("transport") else {
            panic!("expected transport map");
        };
        assert!(read.contains_key("id_prefix"));
        assert!(read.contains_key("externalFQDNPrefix"));

        let body = to_request_body(&config, &attrs, Some(&["transport".to_string()][..]));
        assert_eq!(body, json!({"transport": transport}));
    }

    #[test]
    fn request_body_skips_computed_and_unlisted() {
        let config = deployments::tunnel();
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), s("renamed"));
        attrs.insert("id".to_string(), Value::Int(5));
        attrs.insert("site_origin_id".to_string(), Value::Int(9));

        let body = to_request_body(&config, &attrs, Some(&["name".to_string(), "id".to_string()][..]));
        assert_eq!(body, json!({"name": "renamed"}));
    }

    #[test]
    fn response_maps_back_to_attributes() {
        let config = deployments::site();
        let body = json!({
            "siteId": 7,
            "originId": 1007,
            "name": "HQ",
            "isDefault": false,
            "type": "site",
            "createdAt": "2024-05-01T10:00:00Z",
            "unrelated": "ignored"
        });

        let attrs = from_response(&config, &body);
        assert_eq!(attrs.get("site_id"), Some(&Value::Int(7)));
        assert_eq!(attrs.get("name"), Some(&s("HQ")));
        assert_eq!(attrs.get("is_default"), Some(&Value::Bool(false)));
        assert!(!attrs.contains_key("unrelated"));
        assert_eq!(identifier_of(&config, &body), Some("7".to_string()));
    }

    #[test]
    fn response_skips_nulls_and_write_only() {
        let config = deployments::network_tunnel_group();
        let body = json!({"id": 3, "name": "dc1", "passphrase": "leaked", "status": null});
        let attrs = from_response(&config, &body);
        assert!(!attrs.contains_key("passphrase"));
        assert!(!attrs.contains_key("status"));
    }

    #[test]
    fn render_path_fills_placeholders() {
        let mut attrs = HashMap::new();
        attrs.insert("destination_list_id".to_string(), Value::Int(15));
        assert_eq!(
            render_path("/policies/v2/destinationlists/{destination_list_id}/destinations", &attrs)
                .unwrap(),
            "/policies/v2/destinationlists/15/destinations"
        );
        assert!(render_path("/x/{missing}", &attrs).is_err());
    }

    #[test]
    fn path_values_are_percent_encoded() {
        let config = policies::destination_list();
        assert_eq!(
            item_path(&config, "a/b?c d", &HashMap::new()).unwrap(),
            "/policies/v2/destinationlists/a%2Fb%3Fc%20d"
        );

        let mut attrs = HashMap::new();
        attrs.insert("destination_list_id".to_string(), Value::String("../15".to_string()));
        assert_eq!(
            render_path("/policies/v2/destinationlists/{destination_list_id}/destinations", &attrs)
                .unwrap(),
            "/policies/v2/destinationlists/..%2F15/destinations"
        );

        attrs.insert("destination_list_id".to_string(), Value::String("..".to_string()));
        assert!(render_path("/x/{destination_list_id}", &attrs).is_err());
    }

    #[test]
    fn composite_identifier_round_trip() {
        let config = deployments::policy_identity();
        let mut attrs = HashMap::new();
        attrs.insert("policy_id".to_string(), Value::Int(12));
        attrs.insert("identity_id".to_string(), Value::Int(34));

        let identifier = composite_identifier(&config, &attrs).unwrap();
        assert_eq!(identifier, "12:34");
        assert_eq!(parse_composite_identifier(&config, &identifier).unwrap(), attrs);
        assert_eq!(
            item_path(&config, &identifier, &attrs).unwrap(),
            "/deployments/v2/policies/12/identities/34"
        );
        assert!(parse_composite_identifier(&config, "12").is_err());
    }

    #[test]
    fn destination_list_ids_from_envelope() {
        let config = policies::destination_list();
        let body = unwrap_envelope(
            json!({"status": {"code": 200}, "data": {"id": 15, "name": "Blocked", "access": "block"}}),
            config.envelope,
        );
        assert_eq!(identifier_of(&config, &body), Some("15".to_string()));
    }
}
