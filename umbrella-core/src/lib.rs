//! Umbrella Core
//!
//! Schemas, configuration parser and plan engine shared by the Umbrella
//! provider, state backends and CLI

pub mod differ;
pub mod effect;
pub mod graph;
pub mod interpreter;
pub mod parser;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod schema;
