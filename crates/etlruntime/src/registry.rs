use etlcore::{
    Connector, LoadConnector, NodeKind, RegistryError, SourceConnector, TransformConnector,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available connectors, keyed by capability and subtype
///
/// The validator and engine depend only on this lookup plus the connector
/// traits, never on concrete connector types.
pub struct ConnectorRegistry {
    connectors: HashMap<(NodeKind, String), Connector>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self {
            connectors: HashMap::new(),
        }
    }

    /// Register a connector under a subtype key. Re-registering a key
    /// replaces the previous connector.
    pub fn register(&mut self, key: impl Into<String>, connector: Connector) {
        let key = key.into();
        let kind = connector.kind();
        tracing::info!("registering {} connector: {}", kind, key);
        if self
            .connectors
            .insert((kind, key.clone()), connector)
            .is_some()
        {
            tracing::warn!("replaced previously registered {} connector: {}", kind, key);
        }
    }

    pub fn register_source(&mut self, key: impl Into<String>, connector: Arc<dyn SourceConnector>) {
        self.register(key, Connector::Source(connector));
    }

    pub fn register_transformation(
        &mut self,
        key: impl Into<String>,
        connector: Arc<dyn TransformConnector>,
    ) {
        self.register(key, Connector::Transformation(connector));
    }

    pub fn register_destination(
        &mut self,
        key: impl Into<String>,
        connector: Arc<dyn LoadConnector>,
    ) {
        self.register(key, Connector::Destination(connector));
    }

    pub fn resolve(&self, kind: NodeKind, key: &str) -> Result<Connector, RegistryError> {
        self.connectors
            .get(&(kind, key.to_string()))
            .cloned()
            .ok_or_else(|| RegistryError::UnknownConnector {
                kind,
                key: key.to_string(),
            })
    }

    /// Registered (kind, key) pairs, sorted for stable listing
    pub fn connector_keys(&self) -> Vec<(NodeKind, String)> {
        let mut keys: Vec<_> = self.connectors.keys().cloned().collect();
        keys.sort_by(|a, b| {
            a.0.as_str()
                .cmp(b.0.as_str())
                .then_with(|| a.1.cmp(&b.1))
        });
        keys
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
