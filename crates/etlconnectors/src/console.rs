use async_trait::async_trait;
use etlcore::{
    ConnectorContext, ConnectorError, LoadConnector, LoadSummary, NodeConfig, TabularResult,
};

/// Destination that logs rows instead of writing anywhere
///
/// Useful as the sink of example workflows and when debugging a pipeline
/// without credentials for a real warehouse.
pub struct ConsoleDestination;

#[async_trait]
impl LoadConnector for ConsoleDestination {
    fn validate_config(&self, _config: &NodeConfig) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn load(
        &self,
        ctx: &ConnectorContext,
        input: TabularResult,
    ) -> Result<LoadSummary, ConnectorError> {
        ctx.events
            .info(format!("columns: {}", input.columns().join(", ")));
        for row in input.rows() {
            ctx.events.info(format!("{:?}", row));
        }
        let rows_written = input.row_count() as u64;
        tracing::info!(node = %ctx.node_id, rows_written, "console destination received table");
        Ok(LoadSummary { rows_written })
    }
}
