//! Terminal rendering of plans and values

use std::cmp::Ordering;
use std::collections::HashMap;

use colored::Colorize;
use umbrella_core::effect::Effect;
use umbrella_core::plan::Plan;
use umbrella_core::resource::Value;
use umbrella_core::schema::ResourceSchema;

use crate::load::SchemaSet;

const SENSITIVE: &str = "(sensitive)";
const ATTR_INDENT: &str = "      ";

pub fn print_plan(plan: &Plan, schemas: &SchemaSet) {
    if plan.is_empty() {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    for effect in plan.effects() {
        print_effect(effect, schemas);
    }

    println!();
    print_summary(plan);
}

fn print_summary(plan: &Plan) {
    let summary = plan.summary();
    println!(
        "Plan: {} to add, {} to change, {} to replace, {} to destroy.",
        summary.create.to_string().green(),
        summary.update.to_string().yellow(),
        summary.replace.to_string().magenta(),
        summary.delete.to_string().red()
    );
    if summary.read > 0 {
        println!(
            "{} data source(s) will be read during apply.",
            summary.read.to_string().cyan()
        );
    }
}

fn colored_symbol(effect: &Effect) -> colored::ColoredString {
    let symbol = effect.symbol();
    match effect {
        Effect::Read(_) => symbol.cyan().bold(),
        Effect::Create(_) => symbol.green().bold(),
        Effect::Update { .. } => symbol.yellow().bold(),
        Effect::Replace { .. } => symbol.magenta().bold(),
        Effect::Delete { .. } => symbol.red().bold(),
    }
}

fn print_effect(effect: &Effect, schemas: &SchemaSet) {
    let symbol = colored_symbol(effect);

    match effect {
        Effect::Read(r) => {
            println!("  {} data.{}", symbol, r.id.to_string().cyan().bold());
            let schema = schemas.for_resource(r);
            for key in sorted_keys(&r.attributes) {
                println!(
                    "{}{}: {}",
                    ATTR_INDENT,
                    key,
                    display_value(&r.attributes[key], key, schema)
                );
            }
        }
        Effect::Create(r) => {
            println!("  {} {}", symbol, r.id.to_string().cyan().bold());
            let schema = schemas.resource(&r.id.resource_type);
            for key in sorted_keys(&r.attributes) {
                let value = display_value(&r.attributes[key], key, schema);
                if key == "name" {
                    println!("{}{}: {}", ATTR_INDENT, key.bold(), value.white().bold());
                } else {
                    println!("{}{}: {}", ATTR_INDENT, key, value.green());
                }
            }
        }
        Effect::Update {
            id,
            from,
            to,
            changed_attributes,
        }
        | Effect::Replace {
            id,
            from,
            to,
            changed_attributes,
        } => {
            println!("  {} {}", symbol, id.to_string().cyan().bold());
            let schema = schemas.resource(&id.resource_type);
            let replace = matches!(effect, Effect::Replace { .. });
            for key in changed_attributes {
                let old = from
                    .attributes
                    .get(key)
                    .map(|v| display_value(v, key, schema))
                    .unwrap_or_else(|| "(none)".to_string());
                let new = to
                    .attributes
                    .get(key)
                    .map(|v| display_value(v, key, schema))
                    .unwrap_or_else(|| "(removed)".to_string());
                let forces = replace && schema.is_some_and(|s| s.is_force_new(key));
                println!(
                    "{}{}: {} → {}{}",
                    ATTR_INDENT,
                    key,
                    old.red(),
                    new.green(),
                    if forces {
                        " (forces replacement)".magenta().to_string()
                    } else {
                        String::new()
                    }
                );
            }
        }
        Effect::Delete { id, identifier } => {
            println!("  {} {}", symbol, id.to_string().cyan().bold());
            println!("{}{}: {}", ATTR_INDENT, "id".bold(), identifier.red().bold());
        }
    }
}

/// Attribute keys with `name` first, then alphabetical
fn sorted_keys(attributes: &HashMap<String, Value>) -> Vec<&String> {
    let mut keys: Vec<&String> = attributes.keys().collect();
    keys.sort_by(|a, b| match (a.as_str(), b.as_str()) {
        ("name", "name") => Ordering::Equal,
        ("name", _) => Ordering::Less,
        (_, "name") => Ordering::Greater,
        _ => a.cmp(b),
    });
    keys
}

/// Format a value, masking sensitive attributes
pub fn display_value(value: &Value, key: &str, schema: Option<&ResourceSchema>) -> String {
    if schema.is_some_and(|s| s.is_sensitive(key)) {
        return SENSITIVE.to_string();
    }
    format_value(value)
}

pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let strs: Vec<_> = keys
                .into_iter()
                .map(|k| format!("{}: {}", k, format_value(&map[k])))
                .collect();
            format!("{{{}}}", strs.join(", "))
        }
        Value::ResourceRef(binding, attr) => format!("(known after apply: {}.{})", binding, attr),
    }
}

/// Print the attributes of a recorded resource, masking sensitive ones
pub fn print_attributes(attributes: &HashMap<String, Value>, schema: Option<&ResourceSchema>) {
    let width = attributes.keys().map(String::len).max().unwrap_or(0);
    for key in sorted_keys(attributes) {
        println!(
            "  {:width$} = {}",
            key,
            display_value(&attributes[key], key, schema),
            width = width
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbrella_core::schema::{AttributeSchema, AttributeType};

    #[test]
    fn name_sorts_first() {
        let attrs: HashMap<String, Value> = ["access", "name", "bundle_type_id"]
            .iter()
            .map(|k| (k.to_string(), Value::Int(1)))
            .collect();
        let keys: Vec<&str> = sorted_keys(&attrs).into_iter().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "access", "bundle_type_id"]);
    }

    #[test]
    fn sensitive_values_are_masked() {
        let schema = ResourceSchema::new("umbrella_user")
            .attribute(AttributeSchema::new("password", AttributeType::String).sensitive());
        let value = Value::String("hunter2".to_string());

        assert_eq!(display_value(&value, "password", Some(&schema)), "(sensitive)");
        assert_eq!(display_value(&value, "email", Some(&schema)), "\"hunter2\"");
        assert_eq!(display_value(&value, "password", None), "\"hunter2\"");
    }

    #[test]
    fn format_nested_values() {
        let mut map = HashMap::new();
        map.insert("b".to_string(), Value::Bool(true));
        map.insert("a".to_string(), Value::List(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(format_value(&Value::Map(map)), "{a: [1, 2], b: true}");

        let pending = Value::ResourceRef("umbrella_site.hq".to_string(), "site_id".to_string());
        assert_eq!(
            format_value(&pending),
            "(known after apply: umbrella_site.hq.site_id)"
        );
    }
}
