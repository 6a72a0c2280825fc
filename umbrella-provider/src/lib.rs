//! Umbrella Provider
//!
//! Cisco Umbrella v2 API provider implementation.
//!
//! ## Module Structure
//!
//! - `client` - REST client (token exchange, organization header, pagination)
//! - `config` - Provider block settings with environment fallbacks
//! - `schemas` - Resource and data source schemas with their endpoints
//! - `provider` - UmbrellaProvider and the generic CRUD handlers
//! - `case_convert` - snake_case / camelCase field name conversion

pub mod case_convert;
pub mod client;
pub mod config;
pub mod error;
pub mod provider;
pub mod schemas;

// Re-export main types
pub use client::UmbrellaClient;
pub use config::UmbrellaConfig;
pub use error::Error;
pub use provider::UmbrellaProvider;

use umbrella_core::provider::{BoxFuture, Provider, ProviderResult};
use umbrella_core::resource::{Resource, ResourceId, State};
use umbrella_core::schema::ResourceSchema;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for UmbrellaProvider {
    fn name(&self) -> &'static str {
        "umbrella"
    }

    fn schemas(&self) -> Vec<ResourceSchema> {
        schemas::all_schemas()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(|s| s.to_string());
        Box::pin(async move { self.read_resource(&id, identifier.as_deref()).await })
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.query_data_source(&resource).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(&resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(&id, &identifier, &from, &to).await })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.delete_resource(&id, &identifier).await })
    }
}
