//! Deployments API: networks, sites, tunnels, devices, internal domains,
//! tags and policy assignments

use umbrella_core::resource::Value;
use umbrella_core::schema::{AttributeSchema, AttributeType, Constraint, ResourceSchema, types};

use super::UmbrellaSchemaConfig;

/// Device types accepted for IPsec tunnels
pub const TUNNEL_DEVICE_TYPES: &[&str] = &[
    "ASA",
    "FTD",
    "ISR",
    "Meraki MX",
    "Viptela cEdge",
    "other",
];

fn name(description: &str) -> AttributeSchema {
    AttributeSchema::new("name", AttributeType::String)
        .required()
        .with_constraint(Constraint::NotEmpty)
        .with_description(description)
}

fn timestamp(name: &str, provider_name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String)
        .computed()
        .with_provider_name(provider_name)
}

pub fn network() -> UmbrellaSchemaConfig {
    let schema = ResourceSchema::new("umbrella_network")
        .with_description("Egress network (public IP range) registered with Umbrella")
        .attribute(name("Network name"))
        .attribute(
            AttributeSchema::new("ip_address", types::ipv4())
                .required()
                .with_provider_name("ipAddress"),
        )
        .attribute(
            AttributeSchema::new("prefix_length", AttributeType::Int)
                .required()
                .with_constraint(Constraint::Range { min: 29, max: 32 })
                .with_provider_name("prefixLength"),
        )
        .attribute(
            AttributeSchema::new("is_dynamic", AttributeType::Bool)
                .with_default(Value::Bool(false))
                .with_provider_name("isDynamic"),
        )
        .attribute(AttributeSchema::new(
            "status",
            AttributeType::enumeration(&["OPEN", "CLOSED"]),
        ))
        .attribute(
            AttributeSchema::new("origin_id", AttributeType::Int)
                .computed()
                .with_provider_name("originId"),
        )
        .attribute(
            AttributeSchema::new("is_verified", AttributeType::Bool)
                .computed()
                .with_provider_name("isVerified"),
        )
        .attribute(timestamp("created_at", "createdAt"));

    UmbrellaSchemaConfig::resource(schema, "/deployments/v2/networks", "originId").paginated()
}

pub fn internal_network() -> UmbrellaSchemaConfig {
    let schema = ResourceSchema::new("umbrella_internal_network")
        .with_description("Internal (RFC 1918) network attached to a site, network or tunnel")
        .attribute(name("Internal network name"))
        .attribute(
            AttributeSchema::new("ip_address", types::ipv4())
                .required()
                .with_provider_name("ipAddress"),
        )
        .attribute(
            AttributeSchema::new("prefix_length", AttributeType::Int)
                .required()
                .with_constraint(Constraint::Range { min: 8, max: 32 })
                .with_provider_name("prefixLength"),
        )
        .attribute(
            AttributeSchema::new("site_id", AttributeType::Int)
                .with_provider_name("siteId")
                .with_description("Site the network belongs to"),
        )
        .attribute(
            AttributeSchema::new("network_id", AttributeType::Int).with_provider_name("networkId"),
        )
        .attribute(
            AttributeSchema::new("tunnel_id", AttributeType::Int).with_provider_name("tunnelId"),
        )
        .attribute(
            AttributeSchema::new("origin_id", AttributeType::Int)
                .computed()
                .with_provider_name("originId"),
        )
        .attribute(
            AttributeSchema::new("site_name", AttributeType::String)
                .computed()
                .with_provider_name("siteName"),
        )
        .attribute(timestamp("created_at", "createdAt"))
        .attribute(timestamp("modified_at", "modifiedAt"));

    UmbrellaSchemaConfig::resource(schema, "/deployments/v2/internalnetworks", "originId")
        .paginated()
}

pub fn site() -> UmbrellaSchemaConfig {
    let schema = ResourceSchema::new("umbrella_site")
        .with_description("Site grouping internal networks and virtual appliances")
        .attribute(name("Site name"))
        .attribute(
            AttributeSchema::new("site_id", AttributeType::Int)
                .computed()
                .with_provider_name("siteId"),
        )
        .attribute(
            AttributeSchema::new("origin_id", AttributeType::Int)
                .computed()
                .with_provider_name("originId"),
        )
        .attribute(
            AttributeSchema::new("is_default", AttributeType::Bool)
                .computed()
                .with_provider_name("isDefault"),
        )
        .attribute(AttributeSchema::new("type", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("internal_network_count", AttributeType::Int)
                .computed()
                .with_provider_name("internalNetworkCount"),
        )
        .attribute(
            AttributeSchema::new("va_count", AttributeType::Int)
                .computed()
                .with_provider_name("vaCount"),
        )
        .attribute(timestamp("created_at", "createdAt"))
        .attribute(timestamp("modified_at", "modifiedAt"));

    UmbrellaSchemaConfig::resource(schema, "/deployments/v2/sites", "siteId").paginated()
}

pub fn tunnel() -> UmbrellaSchemaConfig {
    let schema = ResourceSchema::new("umbrella_tunnel")
        .with_description("IPsec network tunnel to Umbrella")
        .attribute(name("Tunnel name"))
        .attribute(
            AttributeSchema::new("site_origin_id", AttributeType::Int)
                .with_provider_name("siteOriginId"),
        )
        .attribute(
            AttributeSchema::new("device_type", AttributeType::enumeration(TUNNEL_DEVICE_TYPES))
                .with_provider_name("deviceType")
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("transport", AttributeType::Object)
                .with_description("Transport settings, e.g. { protocol = \"IPSec\" }")
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("authentication", AttributeType::Object)
                .required()
                .write_only()
                .force_new()
                .with_description("Authentication type and parameters (id prefix, pre-shared key)"),
        )
        .attribute(
            AttributeSchema::new("network_cidrs", AttributeType::list_of(types::cidr()))
                .with_provider_name("networkCIDRs"),
        )
        .attribute(AttributeSchema::new("id", AttributeType::Int).computed())
        .attribute(AttributeSchema::new("uri", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("client", AttributeType::Object)
                .computed()
                .with_description("Client-side settings reported by Umbrella"),
        )
        .attribute(
            AttributeSchema::new("service_type", AttributeType::String)
                .computed()
                .with_provider_name("serviceType"),
        )
        .attribute(timestamp("created_at", "createdAt"))
        .attribute(timestamp("modified_at", "modifiedAt"));

    UmbrellaSchemaConfig::resource(schema, "/deployments/v2/tunnels", "id").patch()
}

pub fn network_tunnel_group() -> UmbrellaSchemaConfig {
    let schema = ResourceSchema::new("umbrella_network_tunnel_group")
        .with_description("Network tunnel group with redundant hubs in one data center region")
        .attribute(name("Tunnel group name"))
        .attribute(
            AttributeSchema::new("region", AttributeType::String)
                .required()
                .force_new()
                .with_constraint(Constraint::NotEmpty),
        )
        .attribute(
            AttributeSchema::new("device_type", AttributeType::enumeration(TUNNEL_DEVICE_TYPES))
                .with_provider_name("deviceType")
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("auth_id_prefix", AttributeType::String)
                .required()
                .force_new()
                .with_constraint(Constraint::NoWhitespace)
                .with_provider_name("authIdPrefix"),
        )
        .attribute(
            AttributeSchema::new("passphrase", AttributeType::String)
                .required()
                .write_only()
                .force_new()
                .with_constraint(Constraint::Length { min: 16, max: 64 }),
        )
        .attribute(
            AttributeSchema::new("network_cidrs", AttributeType::list_of(types::cidr()))
                .with_provider_name("networkCIDRs"),
        )
        .attribute(AttributeSchema::new("id", AttributeType::Int).computed())
        .attribute(AttributeSchema::new("status", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("organization_id", AttributeType::Int)
                .computed()
                .with_provider_name("organizationId"),
        )
        .attribute(
            AttributeSchema::new("hubs", AttributeType::list_of(AttributeType::Object)).computed(),
        )
        .attribute(timestamp("created_at", "createdAt"))
        .attribute(timestamp("modified_at", "modifiedAt"));

    UmbrellaSchemaConfig::resource(schema, "/deployments/v2/networktunnelgroups", "id")
        .patch()
        .paginated()
}

pub fn network_device() -> UmbrellaSchemaConfig {
    let schema = ResourceSchema::new("umbrella_network_device")
        .with_description("Network device (e.g. ISR, Meraki MR) registered with Umbrella")
        .attribute(name("Device name"))
        .attribute(
            AttributeSchema::new("model", AttributeType::String)
                .required()
                .force_new()
                .with_constraint(Constraint::NotEmpty),
        )
        .attribute(
            AttributeSchema::new("mac_address", AttributeType::String)
                .required()
                .force_new()
                .with_constraint(Constraint::NoWhitespace)
                .with_provider_name("macAddress"),
        )
        .attribute(
            AttributeSchema::new("serial_number", AttributeType::String)
                .required()
                .force_new()
                .with_provider_name("serialNumber"),
        )
        .attribute(AttributeSchema::new("tag", AttributeType::String))
        .attribute(
            AttributeSchema::new("origin_id", AttributeType::Int)
                .computed()
                .with_provider_name("originId"),
        )
        .attribute(
            AttributeSchema::new("device_id", AttributeType::String)
                .computed()
                .with_provider_name("deviceId"),
        )
        .attribute(
            AttributeSchema::new("device_key", AttributeType::String)
                .computed()
                .sensitive()
                .with_provider_name("deviceKey"),
        )
        .attribute(
            AttributeSchema::new("organization_id", AttributeType::Int)
                .computed()
                .with_provider_name("organizationId"),
        )
        .attribute(timestamp("created_at", "createdAt"));

    UmbrellaSchemaConfig::resource(schema, "/deployments/v2/networkdevices", "originId")
        .patch()
        .paginated()
}

pub fn internal_domain() -> UmbrellaSchemaConfig {
    let schema = ResourceSchema::new("umbrella_internal_domain")
        .with_description("Domain resolved by internal DNS servers instead of Umbrella")
        .attribute(
            AttributeSchema::new("domain", AttributeType::String)
                .required()
                .with_constraint(Constraint::NotEmpty)
                .with_constraint(Constraint::NoWhitespace),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(
            AttributeSchema::new("include_all_vas", AttributeType::Bool)
                .with_provider_name("includeAllVAs"),
        )
        .attribute(AttributeSchema::new(
            "include_all_mobile_devices",
            AttributeType::Bool,
        ))
        .attribute(
            AttributeSchema::new("site_ids", AttributeType::list_of(AttributeType::Int))
                .with_provider_name("siteIds"),
        )
        .attribute(AttributeSchema::new("id", AttributeType::Int).computed())
        .attribute(timestamp("created_at", "createdAt"))
        .attribute(timestamp("modified_at", "modifiedAt"));

    UmbrellaSchemaConfig::resource(schema, "/deployments/v2/internaldomains", "id").paginated()
}

pub fn tag() -> UmbrellaSchemaConfig {
    let schema = ResourceSchema::new("umbrella_tag")
        .with_description("Tag applied to roaming computers")
        .attribute(
            name("Tag name")
                .with_constraint(Constraint::NoWhitespace)
                .with_constraint(Constraint::Length { min: 1, max: 255 }),
        )
        .attribute(AttributeSchema::new("id", AttributeType::Int).computed())
        .attribute(
            AttributeSchema::new("origin_ids", AttributeType::list_of(AttributeType::Int))
                .computed()
                .with_provider_name("originIds"),
        )
        .attribute(timestamp("created_at", "createdAt"));

    UmbrellaSchemaConfig::resource(schema, "/deployments/v2/tags", "id")
        .replace_only()
        .read_via_list()
        .paginated()
}

pub fn policy_identity() -> UmbrellaSchemaConfig {
    let schema = ResourceSchema::new("umbrella_policy_identity")
        .with_description("Assignment of an identity to a DNS or web policy")
        .attribute(
            AttributeSchema::new("policy_id", types::positive_int())
                .required()
                .with_provider_name("policyId"),
        )
        .attribute(
            AttributeSchema::new("identity_id", types::positive_int())
                .required()
                .with_provider_name("identityId"),
        );

    UmbrellaSchemaConfig::resource(
        schema,
        "/deployments/v2/policies/{policy_id}/identities/{identity_id}",
        "",
    )
    .replace_only()
    .keyed_by(&["policy_id", "identity_id"])
}

pub fn configs() -> Vec<UmbrellaSchemaConfig> {
    vec![
        network(),
        internal_network(),
        site(),
        tunnel(),
        network_tunnel_group(),
        network_device(),
        internal_domain(),
        tag(),
        policy_identity(),
    ]
}
