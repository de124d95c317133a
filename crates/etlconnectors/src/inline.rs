use async_trait::async_trait;
use etlcore::{
    typed_config, ConnectorContext, ConnectorError, NodeConfig, Scalar, SourceConnector,
    TabularResult,
};
use serde::Deserialize;

/// Source whose table is embedded directly in the node configuration
///
/// No external system involved; used by example workflows and for wiring
/// up pipelines in tests.
pub struct InlineSource;

#[derive(Deserialize)]
struct InlineConfig {
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<Scalar>>,
}

impl InlineConfig {
    fn table(self) -> Result<TabularResult, ConnectorError> {
        TabularResult::new(self.columns, self.rows)
            .map_err(|e| ConnectorError::Configuration(e.to_string()))
    }
}

#[async_trait]
impl SourceConnector for InlineSource {
    fn validate_config(&self, config: &NodeConfig) -> Result<(), ConnectorError> {
        let config: InlineConfig = typed_config(config)?;
        if config.columns.is_empty() {
            return Err(ConnectorError::Configuration(
                "columns must not be empty".to_string(),
            ));
        }
        config.table().map(|_| ())
    }

    async fn extract(&self, ctx: &ConnectorContext) -> Result<TabularResult, ConnectorError> {
        let config: InlineConfig = ctx.typed_config()?;
        let table = config.table()?;
        ctx.events
            .info(format!("inline source produced {} row(s)", table.row_count()));
        Ok(table)
    }
}
