//! Case conversion between configuration and Umbrella API field names
//!
//! Configuration uses snake_case (e.g., `prefix_length`, `site_origin_id`)
//! The Umbrella API uses camelCase (e.g., `prefixLength`, `siteOriginId`)

use serde_json::{Map, Value as JsonValue};

/// Convert snake_case to camelCase
/// e.g., "prefix_length" -> "prefixLength"
pub fn to_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for (i, part) in s.split('_').enumerate() {
        if i == 0 {
            result.push_str(part);
            continue;
        }
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            result.extend(first.to_uppercase());
            result.push_str(chars.as_str());
        }
    }
    result
}

/// Convert camelCase to snake_case, keeping runs of capitals together
/// e.g., "siteOriginId" -> "site_origin_id", "allowedIPs" -> "allowed_ips"
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let starts_word = match prev {
                None => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                // "CIDRList": the L starts a new word
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase() && n != 's'),
                _ => false,
            };
            if starts_word && !result.ends_with('_') {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Recursively convert object keys to camelCase
pub fn keys_to_camel_case(value: &JsonValue) -> JsonValue {
    convert_keys(value, &to_camel_case)
}

/// Recursively convert object keys to snake_case
///
/// A key whose snake_case form does not convert back to the same wire name
/// (e.g., "allowedIPs") is kept as is, so `keys_to_camel_case` restores
/// every key the API sent.
pub fn keys_to_snake_case(value: &JsonValue) -> JsonValue {
    convert_keys(value, &reversible_snake_case)
}

fn reversible_snake_case(wire: &str) -> String {
    let snake = to_snake_case(wire);
    if to_camel_case(&snake) == wire {
        snake
    } else {
        wire.to_string()
    }
}

fn convert_keys(value: &JsonValue, convert: &dyn Fn(&str) -> String) -> JsonValue {
    match value {
        JsonValue::Object(obj) => JsonValue::Object(
            obj.iter()
                .map(|(k, v)| (convert(k), convert_keys(v, convert)))
                .collect::<Map<String, JsonValue>>(),
        ),
        JsonValue::Array(items) => {
            JsonValue::Array(items.iter().map(|v| convert_keys(v, convert)).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_camel_case() {
        assert_eq!(to_camel_case("prefix_length"), "prefixLength");
        assert_eq!(to_camel_case("site_origin_id"), "siteOriginId");
        assert_eq!(to_camel_case("name"), "name");
        assert_eq!(to_camel_case("include_all_vas"), "includeAllVas");
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("prefixLength"), "prefix_length");
        assert_eq!(to_snake_case("siteOriginId"), "site_origin_id");
        assert_eq!(to_snake_case("name"), "name");
        assert_eq!(to_snake_case("networkCIDRs"), "network_cidrs");
        assert_eq!(to_snake_case("allowedIPs"), "allowed_ips");
        assert_eq!(to_snake_case("CIDRList"), "cidr_list");
        assert_eq!(to_snake_case("ipv4Address"), "ipv4_address");
    }

    #[test]
    fn converts_nested_keys() {
        let wire = json!({
            "authentication": {
                "type": "PSK",
                "parameters": {"idPrefix": "branch", "secret": "s3cret"}
            },
            "networkCIDRs": ["10.0.0.0/8"]
        });

        let snake = keys_to_snake_case(&wire);
        assert_eq!(snake["authentication"]["parameters"]["id_prefix"], "branch");
        assert_eq!(snake["networkCIDRs"][0], "10.0.0.0/8");

        let camel = keys_to_camel_case(&snake["authentication"]);
        assert_eq!(camel["parameters"]["idPrefix"], "branch");
    }

    #[test]
    fn nested_acronym_keys_survive_a_round_trip() {
        let wire = json!({
            "tunnel": {
                "externalFQDNPrefix": "branch",
                "allowedIPs": ["10.1.0.0/16"],
                "idPrefix": "hq",
                "siteOriginId": 7
            },
            "items": [{"networkCIDRs": ["10.0.0.0/8"], "ipv4Address": "10.0.0.1"}]
        });

        let snake = keys_to_snake_case(&wire);
        assert_eq!(snake["tunnel"]["id_prefix"], "hq");
        assert_eq!(snake["tunnel"]["site_origin_id"], 7);
        assert_eq!(snake["items"][0]["ipv4_address"], "10.0.0.1");
        assert_eq!(snake["tunnel"]["externalFQDNPrefix"], "branch");

        assert_eq!(keys_to_camel_case(&snake), wire);
    }
}
