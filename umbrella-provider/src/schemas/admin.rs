//! Admin API: users, API keys and managed customers

use umbrella_core::schema::{AttributeSchema, AttributeType, Constraint, ResourceSchema, types};

use super::UmbrellaSchemaConfig;

pub fn user() -> UmbrellaSchemaConfig {
    let schema = ResourceSchema::new("umbrella_user")
        .with_description("Dashboard user of the organization")
        .attribute(
            AttributeSchema::new("email", AttributeType::String)
                .required()
                .with_constraint(Constraint::NotEmpty)
                .with_constraint(Constraint::NoWhitespace),
        )
        .attribute(
            AttributeSchema::new("first_name", AttributeType::String)
                .required()
                .with_constraint(Constraint::NotEmpty)
                .with_provider_name("firstname"),
        )
        .attribute(
            AttributeSchema::new("last_name", AttributeType::String)
                .required()
                .with_constraint(Constraint::NotEmpty)
                .with_provider_name("lastname"),
        )
        .attribute(
            AttributeSchema::new("role_id", types::positive_int())
                .required()
                .with_provider_name("roleId"),
        )
        .attribute(
            AttributeSchema::new("timezone", AttributeType::String)
                .required()
                .with_constraint(Constraint::NotEmpty),
        )
        .attribute(
            AttributeSchema::new("password", AttributeType::String)
                .required()
                .write_only()
                .with_constraint(Constraint::Length { min: 8, max: 256 }),
        )
        .attribute(AttributeSchema::new("id", AttributeType::Int).computed())
        .attribute(AttributeSchema::new("role", AttributeType::String).computed())
        .attribute(AttributeSchema::new("status", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("two_factor_enable", AttributeType::Bool)
                .computed()
                .with_provider_name("twoFactorEnable"),
        )
        .attribute(
            AttributeSchema::new("last_login_time", AttributeType::String)
                .computed()
                .with_provider_name("lastLoginTime"),
        );

    UmbrellaSchemaConfig::resource(schema, "/admin/v2/users", "id").replace_only()
}

pub fn api_key() -> UmbrellaSchemaConfig {
    let schema = ResourceSchema::new("umbrella_api_key")
        .with_description("API key with a fixed set of scopes")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .with_constraint(Constraint::NotEmpty),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(
            AttributeSchema::new("scopes", AttributeType::list_of(AttributeType::String))
                .required()
                .with_constraint(Constraint::NoWhitespace)
                .with_description("Scopes such as \"deployments.networks:read\""),
        )
        .attribute(
            AttributeSchema::new("expire_at", AttributeType::String)
                .with_provider_name("expireAt")
                .with_description("Expiry as an RFC 3339 timestamp"),
        )
        .attribute(
            AttributeSchema::new("allowed_ips", AttributeType::list_of(types::ipv4()))
                .with_provider_name("allowedIPs"),
        )
        .attribute(
            AttributeSchema::new("allowed_ip_ranges", AttributeType::list_of(types::cidr()))
                .with_provider_name("allowedIPRanges"),
        )
        .attribute(AttributeSchema::new("id", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("key", AttributeType::String)
                .computed()
                .with_description("Client id of the key"),
        )
        .attribute(
            AttributeSchema::new("secret", AttributeType::String)
                .computed()
                .sensitive()
                .with_description("Client secret, only returned on creation"),
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

    UmbrellaSchemaConfig::resource(schema, "/admin/v2/apiKeys", "id")
        .patch()
        .paginated()
}

pub fn customer() -> UmbrellaSchemaConfig {
    let schema = ResourceSchema::new("umbrella_customer")
        .with_description("Customer organization managed by a provider console")
        .attribute(
            AttributeSchema::new("customer_name", AttributeType::String)
                .required()
                .with_constraint(Constraint::NotEmpty)
                .with_provider_name("customerName"),
        )
        .attribute(
            AttributeSchema::new("seats", AttributeType::Int)
                .required()
                .with_constraint(Constraint::Range {
                    min: 1,
                    max: i64::MAX,
                }),
        )
        .attribute(
            AttributeSchema::new("country_code", AttributeType::String)
                .required()
                .with_constraint(Constraint::Length { min: 2, max: 2 })
                .with_provider_name("countryCode")
                .with_description("ISO 3166-1 alpha-2 country code"),
        )
        .attribute(
            AttributeSchema::new("package_id", AttributeType::Int)
                .with_provider_name("packageId"),
        )
        .attribute(
            AttributeSchema::new("street_address", AttributeType::String)
                .with_provider_name("streetAddress"),
        )
        .attribute(AttributeSchema::new("city", AttributeType::String))
        .attribute(AttributeSchema::new("state", AttributeType::String))
        .attribute(
            AttributeSchema::new("zip_code", AttributeType::String).with_provider_name("zipCode"),
        )
        .attribute(
            AttributeSchema::new("customer_id", AttributeType::Int)
                .computed()
                .with_provider_name("customerId"),
        )
        .attribute(
            AttributeSchema::new("is_trial", AttributeType::Bool)
                .computed()
                .with_provider_name("isTrial"),
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

    UmbrellaSchemaConfig::resource(schema, "/admin/v2/managed/customers", "customerId")
}

pub fn configs() -> Vec<UmbrellaSchemaConfig> {
    vec![user(), api_key(), customer()]
}
