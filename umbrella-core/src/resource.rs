//! Resource - Representing resources and their state

use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    /// Resource type (e.g., "umbrella_network", "umbrella_site")
    pub resource_type: String,
    /// Resource name (second label of the block in configuration)
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Configuration address of a managed resource (e.g., "umbrella_site.hq")
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }

    /// Parse an address of the form `type.name`
    pub fn parse_address(address: &str) -> Option<Self> {
        let (resource_type, name) = address.split_once('.')?;
        if resource_type.is_empty() || name.is_empty() || name.contains('.') {
            return None;
        }
        Some(Self::new(resource_type, name))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    /// Reference to another resource's attribute (binding, attribute path)
    ///
    /// The binding is `type.name` for managed resources and `data.type.name`
    /// for data sources. The attribute path may walk into nested maps
    /// (e.g., "client.device_id").
    ResourceRef(String, String),
}

impl Value {
    /// Convert a JSON value coming back from the API into a Value.
    ///
    /// Returns `None` for `null`. Numbers that do not fit an `i64` keep
    /// their JSON text as a string.
    pub fn from_json(value: &serde_json::Value) -> Option<Value> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => Some(
                n.as_i64()
                    .map(Value::Int)
                    .unwrap_or_else(|| Value::String(n.to_string())),
            ),
            serde_json::Value::Array(arr) => {
                Some(Value::List(arr.iter().filter_map(Value::from_json).collect()))
            }
            serde_json::Value::Object(obj) => Some(Value::Map(
                obj.iter()
                    .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }

    /// Convert into JSON.
    ///
    /// Unresolved references have no JSON form and yield `None`.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Value::String(s) => Some(serde_json::Value::String(s.clone())),
            Value::Int(i) => Some(serde_json::Value::from(*i)),
            Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
            Value::List(items) => Some(serde_json::Value::Array(
                items.iter().filter_map(Value::to_json).collect(),
            )),
            Value::Map(map) => Some(serde_json::Value::Object(
                map.iter()
                    .filter_map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                    .collect(),
            )),
            Value::ResourceRef(_, _) => None,
        }
    }

    /// True if this value, or anything nested in it, is still a reference
    pub fn contains_ref(&self) -> bool {
        match self {
            Value::ResourceRef(_, _) => true,
            Value::List(items) => items.iter().any(Value::contains_ref),
            Value::Map(map) => map.values().any(Value::contains_ref),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Render as a plain string for use in URL paths
    pub fn to_path_segment(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {} = {}", key, map[*key])?;
                }
                write!(f, " }}")
            }
            Value::ResourceRef(binding, attr) => write!(f, "{}.{}", binding, attr),
        }
    }
}

/// Desired state declared in configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: HashMap<String, Value>,
    /// If true, this is a data source (read-only) that won't be modified
    pub read_only: bool,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: HashMap::new(),
            read_only: false,
        }
    }

    pub fn data_source(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(resource_type, name).with_read_only(true)
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Returns true if this resource is a data source (read-only)
    pub fn is_data_source(&self) -> bool {
        self.read_only
    }

    /// Name other blocks use to reference this one
    pub fn binding(&self) -> String {
        if self.read_only {
            format!("data.{}", self.id.address())
        } else {
            self.id.address()
        }
    }
}

/// Current state fetched from the remote API
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    /// Remote identifier used in item URLs (e.g., a network's originId)
    pub identifier: Option<String>,
    pub attributes: HashMap<String, Value>,
    /// Attribute names set in configuration when this state was recorded
    pub configured: BTreeSet<String>,
    /// Whether this state exists
    pub exists: bool,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            attributes: HashMap::new(),
            configured: BTreeSet::new(),
            exists: false,
        }
    }

    pub fn existing(id: ResourceId, attributes: HashMap<String, Value>) -> Self {
        Self {
            id,
            identifier: None,
            attributes,
            configured: BTreeSet::new(),
            exists: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_configured<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.configured = names.into_iter().map(Into::into).collect();
        self
    }

    /// Attributes configured before but absent from `desired`
    pub fn removed_from<'a>(
        &'a self,
        desired: &'a HashMap<String, Value>,
    ) -> impl Iterator<Item = &'a String> + 'a {
        self.configured
            .iter()
            .filter(move |name| !desired.contains_key(*name) && self.attributes.contains_key(*name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn address_round_trips() {
        let id = ResourceId::parse_address("umbrella_site.hq").unwrap();
        assert_eq!(id.resource_type, "umbrella_site");
        assert_eq!(id.name, "hq");
        assert_eq!(id.address(), "umbrella_site.hq");
        assert!(ResourceId::parse_address("umbrella_site").is_none());
        assert!(ResourceId::parse_address("a.b.c").is_none());
    }

    #[test]
    fn json_conversion_drops_nulls() {
        let value = Value::from_json(&json!({
            "name": "office",
            "prefixLength": 32,
            "isDynamic": false,
            "siteId": null,
            "cidrs": ["10.0.0.0/8"]
        }))
        .unwrap();

        let Value::Map(map) = &value else {
            panic!("expected map");
        };
        assert_eq!(map.get("prefixLength"), Some(&Value::Int(32)));
        assert!(!map.contains_key("siteId"));
        assert_eq!(
            map.get("cidrs"),
            Some(&Value::List(vec![Value::String("10.0.0.0/8".to_string())]))
        );

        let back = value.to_json().unwrap();
        assert_eq!(back["name"], json!("office"));
        assert_eq!(back["isDynamic"], json!(false));
    }

    #[test]
    fn fractional_numbers_are_not_truncated() {
        assert_eq!(
            Value::from_json(&json!(2.75)),
            Some(Value::String("2.75".to_string()))
        );
        assert_eq!(
            Value::from_json(&json!(u64::MAX)),
            Some(Value::String(u64::MAX.to_string()))
        );
        assert_eq!(Value::from_json(&json!(-7)), Some(Value::Int(-7)));
    }

    #[test]
    fn references_have_no_json_form() {
        let value = Value::List(vec![
            Value::String("a".to_string()),
            Value::ResourceRef("umbrella_site.hq".to_string(), "site_id".to_string()),
        ]);
        assert!(value.contains_ref());
        assert_eq!(value.to_json(), Some(json!(["a"])));
    }

    #[test]
    fn data_source_binding_is_prefixed() {
        let ds = Resource::data_source("umbrella_sites", "all");
        assert_eq!(ds.binding(), "data.umbrella_sites.all");
        let r = Resource::new("umbrella_site", "hq");
        assert_eq!(r.binding(), "umbrella_site.hq");
    }
}
