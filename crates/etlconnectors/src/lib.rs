//! Built-in connector library
//!
//! Source, transformation, and destination connectors for common systems,
//! plus a helper to register the whole set.

mod console;
mod gcs;
mod gmail;
mod http;
mod inline;
mod snowflake;
mod transform;

pub use console::ConsoleDestination;
pub use gcs::GcsSource;
pub use gmail::GmailSource;
pub use inline::InlineSource;
pub use snowflake::SnowflakeDestination;
pub use transform::{IdentityTransform, SelectColumnsTransform, UnionTransform};

use etlruntime::ConnectorRegistry;
use std::sync::Arc;

/// Register every built-in connector with a registry
pub fn register_all(registry: &mut ConnectorRegistry) {
    registry.register_source("inline", Arc::new(InlineSource));
    registry.register_source("google_cloud_storage", Arc::new(GcsSource::new()));
    registry.register_source("gmail", Arc::new(GmailSource::new()));
    registry.register_transformation("identity", Arc::new(IdentityTransform));
    registry.register_transformation("select_columns", Arc::new(SelectColumnsTransform));
    registry.register_transformation("union", Arc::new(UnionTransform));
    registry.register_destination("snowflake", Arc::new(SnowflakeDestination::new()));
    registry.register_destination("console", Arc::new(ConsoleDestination));
}
