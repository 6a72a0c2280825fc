//! List data sources
//!
//! Each returns the whole collection of an endpoint as `items` together with
//! `count`.

use umbrella_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::UmbrellaSchemaConfig;

fn list(resource_type: &str, description: &str) -> ResourceSchema {
    ResourceSchema::data_source(resource_type).with_description(description)
}

pub fn configs() -> Vec<UmbrellaSchemaConfig> {
    vec![
        UmbrellaSchemaConfig::collection(
            list("umbrella_networks", "Egress networks"),
            "/deployments/v2/networks",
        )
        .paginated(),
        UmbrellaSchemaConfig::collection(list("umbrella_sites", "Sites"), "/deployments/v2/sites")
            .paginated(),
        UmbrellaSchemaConfig::collection(
            list("umbrella_tunnels", "IPsec network tunnels"),
            "/deployments/v2/tunnels",
        ),
        UmbrellaSchemaConfig::collection(
            list("umbrella_roaming_computers", "Roaming computers")
                .attribute(AttributeSchema::new("name", AttributeType::String))
                .attribute(
                    AttributeSchema::new(
                        "status",
                        AttributeType::enumeration(&["Off", "Protected", "Unprotected", "Uninstalled"]),
                    ),
                ),
            "/deployments/v2/roamingcomputers",
        )
        .paginated()
        .with_query(&["name", "status"]),
        UmbrellaSchemaConfig::collection(
            list("umbrella_virtual_appliances", "Virtual appliances"),
            "/deployments/v2/virtualappliances",
        )
        .paginated(),
        UmbrellaSchemaConfig::collection(
            list("umbrella_policies", "DNS or web policies").attribute(
                AttributeSchema::new("type", AttributeType::enumeration(&["dns", "web"]))
                    .with_description("Policy type filter"),
            ),
            "/deployments/v2/policies",
        )
        .paginated()
        .with_query(&["type"]),
        UmbrellaSchemaConfig::collection(
            list("umbrella_destination_lists", "Destination lists"),
            "/policies/v2/destinationlists",
        )
        .with_envelope("data")
        .paginated(),
        UmbrellaSchemaConfig::collection(
            list("umbrella_destinations", "Destinations of one destination list").attribute(
                AttributeSchema::new("destination_list_id", types::positive_int()).required(),
            ),
            "/policies/v2/destinationlists/{destination_list_id}/destinations",
        )
        .with_envelope("data")
        .paginated(),
        UmbrellaSchemaConfig::collection(list("umbrella_users", "Dashboard users"), "/admin/v2/users"),
        UmbrellaSchemaConfig::collection(list("umbrella_roles", "User roles"), "/admin/v2/roles"),
        UmbrellaSchemaConfig::collection(list("umbrella_api_keys", "API keys"), "/admin/v2/apiKeys")
            .paginated(),
        UmbrellaSchemaConfig::collection(
            list("umbrella_network_devices", "Network devices"),
            "/deployments/v2/networkdevices",
        )
        .paginated(),
        UmbrellaSchemaConfig::collection(list("umbrella_tags", "Tags"), "/deployments/v2/tags")
            .paginated(),
        UmbrellaSchemaConfig::collection(
            list("umbrella_internal_domains", "Internal domains"),
            "/deployments/v2/internaldomains",
        )
        .paginated(),
        UmbrellaSchemaConfig::collection(
            list("umbrella_internal_networks", "Internal networks"),
            "/deployments/v2/internalnetworks",
        )
        .paginated(),
        UmbrellaSchemaConfig::collection(
            list("umbrella_categories", "Content and security categories used in reports"),
            "/reports/v2/categories",
        )
        .with_envelope("data"),
        UmbrellaSchemaConfig::collection(
            list("umbrella_identities", "Identities known to reporting"),
            "/reports/v2/identities",
        )
        .with_envelope("data")
        .paginated(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::ReadMode;

    #[test]
    fn every_list_exposes_items_and_count() {
        for config in configs() {
            assert_eq!(config.read, ReadMode::Collection);
            assert!(config.schema.is_data_source());
            assert!(config.schema.attributes["items"].computed);
            assert!(config.schema.attributes["count"].computed);
        }
    }

    #[test]
    fn query_attributes_are_declared() {
        for config in configs() {
            for name in config.query_attributes {
                assert!(
                    config.schema.attributes.contains_key(*name),
                    "{} does not declare {}",
                    config.resource_type(),
                    name
                );
            }
        }
    }
}
