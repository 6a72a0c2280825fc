//! Parser - Parse configuration files
//!
//! Convert the HCL-style configuration language to resources using pest

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use std::collections::{HashMap, HashSet};
use std::env;

use crate::resource::{Resource, Value};

#[derive(Parser)]
#[grammar = "parser/config.pest"]
struct ConfigParser;

/// Parse error
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] Box<pest::error::Error<Rule>>),

    #[error("Invalid expression at line {line}: {message}")]
    InvalidExpression { line: usize, message: String },

    #[error("Undefined local value: {0}")]
    UndefinedVariable(String),

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("Duplicate resource definition: {0}")]
    DuplicateResource(String),

    #[error("Duplicate backend block")]
    DuplicateBackend,

    #[error("{from} references undeclared resource '{reference}'")]
    UndefinedReference { from: String, reference: String },
}

/// Provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub attributes: HashMap<String, Value>,
}

/// Backend configuration for state storage
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Backend type (e.g., "local")
    pub backend_type: String,
    /// Backend-specific attributes
    pub attributes: HashMap<String, Value>,
}

impl BackendConfig {
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// Parse result
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub providers: Vec<ProviderConfig>,
    pub resources: Vec<Resource>,
    pub locals: HashMap<String, Value>,
    /// Backend configuration for state storage
    pub backend: Option<BackendConfig>,
}

impl ParsedFile {
    /// Find the configuration block of a provider by name
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Merge another file into this one (used when loading a directory)
    pub fn merge(&mut self, other: ParsedFile) -> Result<(), ParseError> {
        if other.backend.is_some() {
            if self.backend.is_some() {
                return Err(ParseError::DuplicateBackend);
            }
            self.backend = other.backend;
        }
        self.providers.extend(other.providers);
        self.locals.extend(other.locals);
        self.resources.extend(other.resources);
        check_duplicates(&self.resources)
    }

    /// Check that every reference points to a declared resource
    pub fn check_references(&self) -> Result<(), ParseError> {
        let bindings: HashSet<String> = self.resources.iter().map(Resource::binding).collect();
        for resource in &self.resources {
            let mut refs = Vec::new();
            for value in resource.attributes.values() {
                collect_refs(value, &mut refs);
            }
            refs.sort();
            if let Some(missing) = refs.into_iter().find(|r| !bindings.contains(r)) {
                return Err(ParseError::UndefinedReference {
                    from: resource.binding(),
                    reference: missing,
                });
            }
        }
        Ok(())
    }
}

fn collect_refs(value: &Value, refs: &mut Vec<String>) {
    match value {
        Value::ResourceRef(binding, _) => refs.push(binding.clone()),
        Value::List(items) => items.iter().for_each(|v| collect_refs(v, refs)),
        Value::Map(map) => map.values().for_each(|v| collect_refs(v, refs)),
        _ => {}
    }
}

fn check_duplicates(resources: &[Resource]) -> Result<(), ParseError> {
    let mut seen = HashSet::new();
    for resource in resources {
        let binding = resource.binding();
        if !seen.insert(binding.clone()) {
            return Err(ParseError::DuplicateResource(binding));
        }
    }
    Ok(())
}

/// Parse context (local value scope)
struct ParseContext {
    locals: HashMap<String, Value>,
}

/// Parse a configuration file
///
/// Locals are evaluated first, in declaration order, so that resources may
/// use them regardless of where the `locals` block appears.
pub fn parse(input: &str) -> Result<ParsedFile, ParseError> {
    let file = ConfigParser::parse(Rule::file, input)
        .map_err(Box::new)?
        .next()
        .map(Pair::into_inner)
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

    let mut ctx = ParseContext {
        locals: HashMap::new(),
    };

    for stmt in file.iter().filter(|p| p.as_rule() == Rule::locals_block) {
        for (name, value) in parse_block_body(first_inner(stmt.clone())?, &ctx)? {
            ctx.locals.insert(name, value);
        }
    }

    let mut parsed = ParsedFile::default();

    for stmt in file {
        match stmt.as_rule() {
            Rule::provider_block => {
                let mut inner = stmt.into_inner();
                let name = parse_string(next_pair(&mut inner)?);
                let attributes = parse_block_body(next_pair(&mut inner)?, &ctx)?;
                parsed.providers.push(ProviderConfig { name, attributes });
            }
            Rule::backend_block => {
                if parsed.backend.is_some() {
                    return Err(ParseError::DuplicateBackend);
                }
                let mut inner = stmt.into_inner();
                let backend_type = parse_string(next_pair(&mut inner)?);
                let attributes = parse_block_body(next_pair(&mut inner)?, &ctx)?;
                parsed.backend = Some(BackendConfig {
                    backend_type,
                    attributes,
                });
            }
            Rule::resource_block | Rule::data_block => {
                let is_data = stmt.as_rule() == Rule::data_block;
                let mut inner = stmt.into_inner();
                let resource_type = parse_string(next_pair(&mut inner)?);
                let name = parse_string(next_pair(&mut inner)?);
                let attributes = parse_block_body(next_pair(&mut inner)?, &ctx)?;

                let mut resource = if is_data {
                    Resource::data_source(resource_type, name)
                } else {
                    Resource::new(resource_type, name)
                };
                resource.attributes = attributes;
                parsed.resources.push(resource);
            }
            _ => {}
        }
    }

    parsed.locals = ctx.locals;
    check_duplicates(&parsed.resources)?;
    Ok(parsed)
}

/// Parse a file and check its references
pub fn parse_and_resolve(input: &str) -> Result<ParsedFile, ParseError> {
    let parsed = parse(input)?;
    parsed.check_references()?;
    Ok(parsed)
}

fn next_pair<'a>(
    inner: &mut pest::iterators::Pairs<'a, Rule>,
) -> Result<Pair<'a, Rule>, ParseError> {
    inner.next().ok_or_else(|| ParseError::InvalidExpression {
        line: 0,
        message: "unexpected end of block".to_string(),
    })
}

fn first_inner(pair: Pair<'_, Rule>) -> Result<Pair<'_, Rule>, ParseError> {
    let line = pair.line_col().0;
    pair.into_inner()
        .next()
        .ok_or_else(|| ParseError::InvalidExpression {
            line,
            message: "empty expression".to_string(),
        })
}

/// Parse a block body into attributes
///
/// A nested block appearing once becomes a map; repeated nested blocks of
/// the same name become a list of maps.
fn parse_block_body(
    pair: Pair<'_, Rule>,
    ctx: &ParseContext,
) -> Result<HashMap<String, Value>, ParseError> {
    let mut attributes = HashMap::new();
    let mut blocks: Vec<(String, usize, Value)> = Vec::new();

    for item in pair.into_inner() {
        match item.as_rule() {
            Rule::attribute => {
                let line = item.line_col().0;
                let mut inner = item.into_inner();
                let key = next_pair(&mut inner)?.as_str().to_string();
                let value = parse_expression(next_pair(&mut inner)?, ctx)?;
                if attributes.insert(key.clone(), value).is_some() {
                    return Err(ParseError::InvalidExpression {
                        line,
                        message: format!("attribute '{}' is set more than once", key),
                    });
                }
            }
            Rule::nested_block => {
                let line = item.line_col().0;
                let mut inner = item.into_inner();
                let key = next_pair(&mut inner)?.as_str().to_string();
                let body = parse_block_body(next_pair(&mut inner)?, ctx)?;
                blocks.push((key, line, Value::Map(body)));
            }
            _ => {}
        }
    }

    let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
    for (key, line, value) in blocks {
        if attributes.contains_key(&key) {
            return Err(ParseError::InvalidExpression {
                line,
                message: format!("attribute '{}' is set more than once", key),
            });
        }
        grouped.entry(key).or_default().push(value);
    }
    for (key, mut values) in grouped {
        let value = if values.len() == 1 {
            values.remove(0)
        } else {
            Value::List(values)
        };
        attributes.insert(key, value);
    }

    Ok(attributes)
}

fn parse_expression(pair: Pair<'_, Rule>, ctx: &ParseContext) -> Result<Value, ParseError> {
    let pair = if pair.as_rule() == Rule::expression {
        first_inner(pair)?
    } else {
        pair
    };
    let line = pair.line_col().0;

    match pair.as_rule() {
        Rule::string => Ok(Value::String(parse_string(pair))),
        Rule::number => {
            let text = pair.as_str();
            text.parse::<i64>()
                .map(Value::Int)
                .map_err(|e| ParseError::InvalidExpression {
                    line,
                    message: format!("invalid number '{}': {}", text, e),
                })
        }
        Rule::boolean => Ok(Value::Bool(pair.as_str() == "true")),
        Rule::list => {
            let items = pair
                .into_inner()
                .map(|p| parse_expression(p, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(items))
        }
        Rule::map => {
            let mut map = HashMap::new();
            for entry in pair.into_inner() {
                let mut inner = entry.into_inner();
                let key_pair = next_pair(&mut inner)?;
                let key = match key_pair.as_rule() {
                    Rule::string => parse_string(key_pair),
                    _ => key_pair.as_str().to_string(),
                };
                let value = parse_expression(next_pair(&mut inner)?, ctx)?;
                map.insert(key, value);
            }
            Ok(Value::Map(map))
        }
        Rule::env_call => {
            let name = parse_string(first_inner(pair)?);
            env::var(&name)
                .map(Value::String)
                .map_err(|_| ParseError::EnvVarNotSet(name))
        }
        Rule::reference => parse_reference(pair.as_str(), line, ctx),
        rule => Err(ParseError::InvalidExpression {
            line,
            message: format!("unexpected {:?}", rule),
        }),
    }
}

/// Resolve `local.x`, or turn `type.name.attr` / `data.type.name.attr` into a
/// resource reference
fn parse_reference(text: &str, line: usize, ctx: &ParseContext) -> Result<Value, ParseError> {
    let parts: Vec<&str> = text.split('.').collect();

    match parts.as_slice() {
        ["local", name, path @ ..] => {
            let mut value = ctx
                .locals
                .get(*name)
                .ok_or_else(|| ParseError::UndefinedVariable(name.to_string()))?;
            for segment in path {
                value = match value {
                    Value::Map(map) => map.get(*segment),
                    Value::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                    _ => None,
                }
                .ok_or_else(|| ParseError::UndefinedVariable(text.to_string()))?;
            }
            Ok(value.clone())
        }
        ["data", resource_type, name, attr @ ..] if !attr.is_empty() => Ok(Value::ResourceRef(
            format!("data.{}.{}", resource_type, name),
            attr.join("."),
        )),
        [resource_type, name, attr @ ..] if !attr.is_empty() && *resource_type != "data" => Ok(
            Value::ResourceRef(format!("{}.{}", resource_type, name), attr.join(".")),
        ),
        _ => Err(ParseError::InvalidExpression {
            line,
            message: format!("'{}' is not a valid reference", text),
        }),
    }
}

/// Unquote a string literal, processing escape sequences
fn parse_string(pair: Pair<'_, Rule>) -> String {
    let raw = pair
        .into_inner()
        .next()
        .map(|inner| inner.as_str())
        .unwrap_or_default();

    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}
