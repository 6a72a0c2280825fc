//! Policies API: destination lists and private resources

use umbrella_core::schema::{AttributeSchema, AttributeType, Constraint, ResourceSchema};

use super::UmbrellaSchemaConfig;

pub fn destination_list() -> UmbrellaSchemaConfig {
    let schema = ResourceSchema::new("umbrella_destination_list")
        .with_description("List of domains, URLs or IPs allowed or blocked by policies")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .with_constraint(Constraint::NotEmpty)
                .with_constraint(Constraint::Length { min: 1, max: 255 }),
        )
        .attribute(
            AttributeSchema::new("access", AttributeType::enumeration(&["allow", "block"]))
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("is_global", AttributeType::Bool)
                .with_default(umbrella_core::resource::Value::Bool(false))
                .force_new()
                .with_provider_name("isGlobal"),
        )
        .attribute(
            AttributeSchema::new("bundle_type_id", AttributeType::Int)
                .with_constraint(Constraint::one_of(&["1", "2"]))
                .force_new()
                .with_provider_name("bundleTypeId")
                .with_description("1 for DNS policies, 2 for web policies"),
        )
        .attribute(
            AttributeSchema::new("destinations", AttributeType::list_of(AttributeType::Object))
                .force_new()
                .with_description("Initial destinations: { destination, type, comment }"),
        )
        .attribute(AttributeSchema::new("id", AttributeType::Int).computed())
        .attribute(
            AttributeSchema::new("organization_id", AttributeType::Int)
                .computed()
                .with_provider_name("organizationId"),
        )
        .attribute(
            AttributeSchema::new("is_msp_default", AttributeType::Bool)
                .computed()
                .with_provider_name("isMspDefault"),
        )
        .attribute(
            AttributeSchema::new("marked_for_deletion", AttributeType::Bool)
                .computed()
                .with_provider_name("markedForDeletion"),
        )
        .attribute(
            AttributeSchema::new("meta", AttributeType::Object)
                .computed()
                .with_description("Destination counts by type"),
        )
        .attribute(
            AttributeSchema::new("created_at", AttributeType::Int)
                .computed()
                .with_provider_name("createdAt"),
        )
        .attribute(
            AttributeSchema::new("modified_at", AttributeType::Int)
                .computed()
                .with_provider_name("modifiedAt"),
        );

    UmbrellaSchemaConfig::resource(schema, "/policies/v2/destinationlists", "id")
        .patch()
        .with_envelope("data")
        .paginated()
}

pub fn private_resource() -> UmbrellaSchemaConfig {
    let schema = ResourceSchema::new("umbrella_private_resource")
        .with_description("Private application reachable through ZTNA or VPN")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .with_constraint(Constraint::NotEmpty),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(
            AttributeSchema::new(
                "resource_addresses",
                AttributeType::list_of(AttributeType::Object),
            )
            .required()
            .with_provider_name("resourceAddresses")
            .with_description("Destination addresses and protocol/port ranges"),
        )
        .attribute(
            AttributeSchema::new("access_types", AttributeType::list_of(AttributeType::Object))
                .required()
                .with_provider_name("accessTypes")
                .with_description("Access methods: client, browser or network"),
        )
        .attribute(
            AttributeSchema::new("certificate_id", AttributeType::Int)
                .with_provider_name("certificateId"),
        )
        .attribute(
            AttributeSchema::new("resource_group_ids", AttributeType::list_of(AttributeType::Int))
                .with_provider_name("resourceGroupIds"),
        )
        .attribute(
            AttributeSchema::new("resource_id", AttributeType::Int)
                .computed()
                .with_provider_name("resourceId"),
        )
        .attribute(
            AttributeSchema::new("created_at", AttributeType::String)
                .computed()
                .with_provider_name("createdAt"),
        )
        .attribute(
            AttributeSchema::new("modified_at", AttributeType::String)
                .computed()
                .with_provider_name("modifiedAt"),
        );

    UmbrellaSchemaConfig::resource(schema, "/policies/v2/privateResources", "resourceId")
        .paginated()
}

pub fn private_resource_group() -> UmbrellaSchemaConfig {
    let schema = ResourceSchema::new("umbrella_private_resource_group")
        .with_description("Group of private resources addressed together by rules")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .with_constraint(Constraint::NotEmpty),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(
            AttributeSchema::new("resource_ids", AttributeType::list_of(AttributeType::Int))
                .required()
                .with_provider_name("resourceIds"),
        )
        .attribute(AttributeSchema::new("id", AttributeType::Int).computed())
        .attribute(
            AttributeSchema::new("created_at", AttributeType::String)
                .computed()
                .with_provider_name("createdAt"),
        )
        .attribute(
            AttributeSchema::new("modified_at", AttributeType::String)
                .computed()
                .with_provider_name("modifiedAt"),
        );

    UmbrellaSchemaConfig::resource(schema, "/policies/v2/privateResourceGroups", "id")
        .paginated()
}

pub fn configs() -> Vec<UmbrellaSchemaConfig> {
    vec![
        destination_list(),
        private_resource(),
        private_resource_group(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use umbrella_core::resource::Value;

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    #[test]
    fn destination_list_access_must_be_allow_or_block() {
        let schema = destination_list().schema;
        let mut attrs: HashMap<String, Value> = HashMap::new();
        attrs.insert("name".to_string(), s("Blocked"));
        attrs.insert("access".to_string(), s("block"));
        assert!(schema.validate(&attrs).is_ok());

        attrs.insert("access".to_string(), s("deny"));
        let errors = schema.validate(&attrs).unwrap_err();
        assert_eq!(errors[0].attribute(), Some("access"));
        assert!(errors[0].to_string().contains("allow, block"));
    }

    #[test]
    fn destination_list_bundle_type() {
        let schema = destination_list().schema;
        let mut attrs: HashMap<String, Value> = HashMap::new();
        attrs.insert("name".to_string(), s("Web allow"));
        attrs.insert("access".to_string(), s("allow"));
        attrs.insert("bundle_type_id".to_string(), Value::Int(2));
        assert!(schema.validate(&attrs).is_ok());

        attrs.insert("bundle_type_id".to_string(), Value::Int(3));
        assert!(schema.validate(&attrs).is_err());
    }

    #[test]
    fn private_resource_group_requires_members() {
        let schema = private_resource_group().schema;
        let mut attrs: HashMap<String, Value> = HashMap::new();
        attrs.insert("name".to_string(), s("Finance apps"));

        let errors = schema.validate(&attrs).unwrap_err();
        assert_eq!(errors[0].attribute(), Some("resource_ids"));
    }
}
