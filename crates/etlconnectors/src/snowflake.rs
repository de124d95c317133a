use crate::http::{status_error, transport_error};
use async_trait::async_trait;
use etlcore::{
    typed_config, ConnectorContext, ConnectorError, LoadConnector, LoadSummary, NodeConfig,
    Scalar, TabularResult,
};
use serde::Deserialize;

/// Snowflake destination
///
/// Writes rows through the SQL API (`POST /api/v2/statements`) as batched
/// multi-row INSERT statements.
pub struct SnowflakeDestination {
    client: reqwest::Client,
}

impl SnowflakeDestination {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for SnowflakeDestination {
    fn default() -> Self {
        Self::new()
    }
}

fn default_batch_rows() -> usize {
    500
}

#[derive(Deserialize)]
struct SnowflakeConfig {
    /// Account locator, e.g. "myorg-account1"
    account: String,
    database: String,
    schema: String,
    table: String,
    #[serde(default)]
    warehouse: Option<String>,
    access_token: String,
    #[serde(default = "default_batch_rows")]
    batch_rows: usize,
}

impl SnowflakeConfig {
    fn check(&self) -> Result<(), ConnectorError> {
        if self.account.is_empty() {
            return Err(ConnectorError::Configuration(
                "account must not be empty".to_string(),
            ));
        }
        for (field, value) in [
            ("database", &self.database),
            ("schema", &self.schema),
            ("table", &self.table),
        ] {
            if !is_identifier(value) {
                return Err(ConnectorError::Configuration(format!(
                    "{} is not a valid identifier: {}",
                    field, value
                )));
            }
        }
        if self.batch_rows == 0 {
            return Err(ConnectorError::Configuration(
                "batch_rows must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Identifiers are interpolated into statements, so they are restricted to
/// the unquoted-identifier character set.
fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn sql_literal(cell: &Scalar) -> String {
    match cell {
        Scalar::Bool(b) => b.to_string(),
        Scalar::Number(n) => n.to_string(),
        Scalar::String(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

#[async_trait]
impl LoadConnector for SnowflakeDestination {
    fn validate_config(&self, config: &NodeConfig) -> Result<(), ConnectorError> {
        let config: SnowflakeConfig = typed_config(config)?;
        config.check()
    }

    async fn load(
        &self,
        ctx: &ConnectorContext,
        input: TabularResult,
    ) -> Result<LoadSummary, ConnectorError> {
        let config: SnowflakeConfig = ctx.typed_config()?;
        config.check()?;

        if input.is_empty() {
            return Ok(LoadSummary { rows_written: 0 });
        }
        for column in input.columns() {
            if !is_identifier(column) {
                return Err(ConnectorError::Data(format!(
                    "column name is not a valid identifier: {}",
                    column
                )));
            }
        }

        let url = format!(
            "https://{}.snowflakecomputing.com/api/v2/statements",
            config.account
        );
        let qualified = format!("{}.{}.{}", config.database, config.schema, config.table);
        let column_list = input.columns().join(", ");

        let total = input.row_count();
        let mut written = 0u64;
        for batch in input.rows().chunks(config.batch_rows) {
            if ctx.cancellation.is_cancelled() {
                return Err(ConnectorError::Cancelled);
            }

            let values: Vec<String> = batch
                .iter()
                .map(|row| {
                    let cells: Vec<String> = row.iter().map(sql_literal).collect();
                    format!("({})", cells.join(", "))
                })
                .collect();
            let statement = format!(
                "INSERT INTO {} ({}) VALUES {}",
                qualified,
                column_list,
                values.join(", ")
            );

            let body = serde_json::json!({
                "statement": statement,
                "database": config.database,
                "schema": config.schema,
                "warehouse": config.warehouse,
                "timeout": 60,
            });
            let response = self
                .client
                .post(&url)
                .bearer_auth(&config.access_token)
                .header("X-Snowflake-Authorization-Token-Type", "OAUTH")
                .json(&body)
                .send()
                .await
                .map_err(|e| transport_error("Snowflake", e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(status_error("Snowflake", status));
            }

            written += batch.len() as u64;
            ctx.events
                .progress(written as f64 / total as f64 * 100.0, None);
        }

        tracing::info!(node = %ctx.node_id, rows_written = written, table = %qualified, "load finished");
        Ok(LoadSummary {
            rows_written: written,
        })
    }
}
