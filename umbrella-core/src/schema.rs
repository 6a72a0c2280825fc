//! Schema - Define type schemas for resources and data sources
//!
//! Providers define a schema for each resource type so that configuration
//! is validated before any API call is made.

use std::collections::HashMap;
use std::fmt;

use crate::resource::Value;

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// List
    List(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
    /// Nested object passed through to the API without inspection
    Object,
}

impl AttributeType {
    /// Build an enum type from string literals
    pub fn enumeration(variants: &[&str]) -> Self {
        AttributeType::Enum(variants.iter().map(|v| v.to_string()).collect())
    }

    pub fn list_of(inner: AttributeType) -> Self {
        AttributeType::List(Box::new(inner))
    }

    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            // References resolve at apply time and are checked by the API
            (_, Value::ResourceRef(_, _)) => Ok(()),
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),
            (AttributeType::Object, Value::Map(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { validate, base, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Object => "Object".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed by the API and cannot be set")]
    ComputedAttribute { name: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },

    #[error("{name}: {inner}")]
    Attribute { name: String, inner: Box<TypeError> },
}

impl TypeError {
    /// Name of the attribute this error refers to, if known
    pub fn attribute(&self) -> Option<&str> {
        match self {
            TypeError::MissingRequired { name }
            | TypeError::UnknownAttribute { name }
            | TypeError::ComputedAttribute { name }
            | TypeError::Attribute { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
            Value::ResourceRef(binding, attr) => format!("ResourceRef({}.{})", binding, attr),
        }
    }
}

/// Declarative value constraint checked after the type check.
///
/// On list attributes the constraint applies to every item.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// String must not be empty (or whitespace only)
    NotEmpty,
    /// String must not contain whitespace
    NoWhitespace,
    /// String length in characters
    Length { min: usize, max: usize },
    /// Inclusive integer range
    Range { min: i64, max: i64 },
    /// Value must be one of a fixed set (compared as strings)
    OneOf(Vec<String>),
    /// Dotted-quad IPv4 address
    Ipv4,
    /// IPv4 CIDR block
    Cidr,
}

impl Constraint {
    pub fn one_of(values: &[&str]) -> Self {
        Constraint::OneOf(values.iter().map(|v| v.to_string()).collect())
    }

    /// Check a single (non-list) value
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (_, Value::ResourceRef(_, _)) => Ok(()),
            (Constraint::NotEmpty, Value::String(s)) => {
                if s.trim().is_empty() {
                    Err("must not be empty".to_string())
                } else {
                    Ok(())
                }
            }
            (Constraint::NoWhitespace, Value::String(s)) => {
                if s.chars().any(char::is_whitespace) {
                    Err(format!("'{}' must not contain spaces", s))
                } else {
                    Ok(())
                }
            }
            (Constraint::Length { min, max }, Value::String(s)) => {
                let len = s.chars().count();
                if len < *min || len > *max {
                    Err(format!(
                        "length must be between {} and {} characters, got {}",
                        min, max, len
                    ))
                } else {
                    Ok(())
                }
            }
            (Constraint::Range { min, max }, Value::Int(n)) => {
                if n < min || n > max {
                    Err(format!("must be between {} and {}, got {}", min, max, n))
                } else {
                    Ok(())
                }
            }
            (Constraint::OneOf(allowed), v) => {
                let Some(s) = v.to_path_segment() else {
                    return Err("expected a scalar value".to_string());
                };
                if allowed.iter().any(|a| *a == s) {
                    Ok(())
                } else {
                    Err(format!(
                        "'{}' is not one of: {}",
                        s,
                        allowed.join(", ")
                    ))
                }
            }
            (Constraint::Ipv4, Value::String(s)) => validate_ipv4(s),
            (Constraint::Cidr, Value::String(s)) => validate_cidr(s),
            (Constraint::Range { .. }, _) => Err("expected integer".to_string()),
            (_, _) => Err("expected string".to_string()),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Set by the API; may not appear in configuration
    pub computed: bool,
    /// Masked in plan and state output
    pub sensitive: bool,
    /// Never returned by the API; the last applied value is kept in state
    pub write_only: bool,
    /// Changing the value requires replacing the remote object
    pub force_new: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    /// JSON field name on the wire (e.g., "prefixLength")
    pub provider_name: Option<String>,
    pub constraints: Vec<Constraint>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            sensitive: false,
            write_only: false,
            force_new: false,
            default: None,
            description: None,
            provider_name: None,
            constraints: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self.sensitive = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    fn check_constraints(&self, value: &Value) -> Result<(), TypeError> {
        for constraint in &self.constraints {
            match value {
                Value::List(items) => {
                    for (index, item) in items.iter().enumerate() {
                        constraint
                            .check(item)
                            .map_err(|message| TypeError::ListItemError {
                                index,
                                inner: Box::new(TypeError::ValidationFailed { message }),
                            })?;
                    }
                }
                v => constraint
                    .check(v)
                    .map_err(|message| TypeError::ValidationFailed { message })?,
            }
        }
        Ok(())
    }

    /// Type check followed by constraint checks
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        self.attr_type
            .validate(value)
            .and_then(|_| self.check_constraints(value))
            .map_err(|e| TypeError::Attribute {
                name: self.name.clone(),
                inner: Box::new(e),
            })
    }
}

/// Whether a schema describes a managed resource or a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    Resource,
    DataSource,
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub kind: SchemaKind,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            kind: SchemaKind::Resource,
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn data_source(resource_type: impl Into<String>) -> Self {
        Self {
            kind: SchemaKind::DataSource,
            ..Self::new(resource_type)
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn is_data_source(&self) -> bool {
        self.kind == SchemaKind::DataSource
    }

    /// Attribute names in stable (sorted) order
    pub fn attribute_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.attributes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|a| a.sensitive)
    }

    pub fn is_force_new(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|a| a.force_new)
    }

    pub fn write_only_attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .values()
            .filter(|a| a.write_only)
            .map(|a| a.name.as_str())
    }

    /// Fill in declared defaults for attributes absent from configuration
    pub fn apply_defaults(&self, attributes: &mut HashMap<String, Value>) {
        for (name, schema) in &self.attributes {
            if let Some(default) = &schema.default {
                attributes
                    .entry(name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
    }

    /// Wrap a single nested block into a one-item list where the attribute
    /// is list-typed
    pub fn normalize_blocks(&self, attributes: &mut HashMap<String, Value>) {
        for (name, value) in attributes.iter_mut() {
            let is_list = self
                .attributes
                .get(name)
                .is_some_and(|a| matches!(a.attr_type, AttributeType::List(_)));
            if is_list && matches!(value, Value::Map(_)) {
                let single = std::mem::replace(value, Value::List(Vec::new()));
                *value = Value::List(vec![single]);
            }
        }
    }

    /// Validate resource attributes, collecting every error
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        for name in self.attribute_names() {
            let schema = &self.attributes[name];
            if schema.required && !attributes.contains_key(name) && schema.default.is_none() {
                errors.push(TypeError::MissingRequired {
                    name: name.to_string(),
                });
            }
        }

        let mut names: Vec<&String> = attributes.keys().collect();
        names.sort();
        for name in names {
            let value = &attributes[name];
            match self.attributes.get(name) {
                None => errors.push(TypeError::UnknownAttribute { name: name.clone() }),
                Some(schema) if schema.computed && !schema.required => {
                    errors.push(TypeError::ComputedAttribute { name: name.clone() })
                }
                Some(schema) => {
                    if let Err(e) = schema.validate(value) {
                        errors.push(e);
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// Positive integer type
    pub fn positive_int() -> AttributeType {
        AttributeType::Custom {
            name: "PositiveInt".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| {
                if let Value::Int(n) = value {
                    if *n > 0 {
                        Ok(())
                    } else {
                        Err("Value must be positive".to_string())
                    }
                } else {
                    Ok(())
                }
            },
        }
    }

    /// CIDR block type (e.g., "10.0.0.0/16")
    pub fn cidr() -> AttributeType {
        AttributeType::Custom {
            name: "Cidr".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) => validate_cidr(s),
                _ => Ok(()),
            },
        }
    }

    /// IPv4 address type (e.g., "192.0.2.10")
    pub fn ipv4() -> AttributeType {
        AttributeType::Custom {
            name: "Ipv4".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) => validate_ipv4(s),
                _ => Ok(()),
            },
        }
    }
}

/// Validate a dotted-quad IPv4 address
pub fn validate_ipv4(ip: &str) -> Result<(), String> {
    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() != 4 {
        return Err(format!("Invalid IP address '{}': expected 4 octets", ip));
    }

    for octet in &octets {
        if octet.is_empty() || octet.parse::<u8>().is_err() {
            return Err(format!(
                "Invalid octet '{}' in IP address: must be 0-255",
                octet
            ));
        }
    }

    Ok(())
}

/// Validate CIDR block format (e.g., "10.0.0.0/16")
pub fn validate_cidr(cidr: &str) -> Result<(), String> {
    let Some((ip, prefix)) = cidr.split_once('/') else {
        return Err(format!("Invalid CIDR format '{}': expected IP/prefix", cidr));
    };

    validate_ipv4(ip)?;

    match prefix.parse::<u8>() {
        Ok(p) if p <= 32 => Ok(()),
        Ok(p) => Err(format!("Invalid prefix length '{}': must be 0-32", p)),
        Err(_) => Err(format!(
            "Invalid prefix length '{}': must be a number",
            prefix
        )),
    }
}
