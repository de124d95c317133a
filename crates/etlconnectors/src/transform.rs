use async_trait::async_trait;
use etlcore::{
    typed_config, ConnectorContext, ConnectorError, NodeConfig, NodeId, TabularResult,
    TransformConnector,
};
use serde::Deserialize;
use std::collections::HashMap;

fn single_input(
    inputs: HashMap<NodeId, TabularResult>,
) -> Result<TabularResult, ConnectorError> {
    let mut tables: Vec<_> = inputs.into_values().collect();
    match tables.len() {
        1 => Ok(tables.remove(0)),
        n => Err(ConnectorError::Data(format!(
            "expected exactly one input table, got {}",
            n
        ))),
    }
}

/// Pass a single upstream table through unchanged
pub struct IdentityTransform;

#[async_trait]
impl TransformConnector for IdentityTransform {
    fn validate_config(&self, _config: &NodeConfig) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn transform(
        &self,
        _ctx: &ConnectorContext,
        inputs: HashMap<NodeId, TabularResult>,
    ) -> Result<TabularResult, ConnectorError> {
        single_input(inputs)
    }
}

/// Project and reorder columns by name
pub struct SelectColumnsTransform;

#[derive(Deserialize)]
struct SelectConfig {
    columns: Vec<String>,
}

#[async_trait]
impl TransformConnector for SelectColumnsTransform {
    fn validate_config(&self, config: &NodeConfig) -> Result<(), ConnectorError> {
        let config: SelectConfig = typed_config(config)?;
        if config.columns.is_empty() {
            return Err(ConnectorError::Configuration(
                "columns must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    async fn transform(
        &self,
        ctx: &ConnectorContext,
        inputs: HashMap<NodeId, TabularResult>,
    ) -> Result<TabularResult, ConnectorError> {
        let config: SelectConfig = ctx.typed_config()?;
        let input = single_input(inputs)?;

        let indices = config
            .columns
            .iter()
            .map(|name| {
                input
                    .column_index(name)
                    .ok_or_else(|| ConnectorError::Data(format!("unknown column: {}", name)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = TabularResult::empty(config.columns);
        for row in input.rows() {
            let cells = indices.iter().map(|&i| row[i].clone()).collect();
            out.push_row(cells)
                .map_err(|e| ConnectorError::Data(e.to_string()))?;
        }
        Ok(out)
    }
}

/// Concatenate rows from every input table
///
/// Inputs must share an identical column list. Rows are appended in
/// ascending predecessor-id order, so re-runs produce identical output.
pub struct UnionTransform;

#[async_trait]
impl TransformConnector for UnionTransform {
    fn validate_config(&self, _config: &NodeConfig) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn transform(
        &self,
        _ctx: &ConnectorContext,
        inputs: HashMap<NodeId, TabularResult>,
    ) -> Result<TabularResult, ConnectorError> {
        if inputs.is_empty() {
            return Err(ConnectorError::Data(
                "union requires at least one input table".to_string(),
            ));
        }

        let mut tables: Vec<_> = inputs.into_iter().collect();
        tables.sort_by(|a, b| a.0.cmp(&b.0));

        let columns = tables[0].1.columns().to_vec();
        let mut out = TabularResult::empty(columns.clone());
        for (id, table) in tables {
            if table.columns() != columns.as_slice() {
                return Err(ConnectorError::Data(format!(
                    "input {} has columns [{}], expected [{}]",
                    id,
                    table.columns().join(", "),
                    columns.join(", ")
                )));
            }
            for row in table.into_rows() {
                out.push_row(row)
                    .map_err(|e| ConnectorError::Data(e.to_string()))?;
            }
        }
        Ok(out)
    }
}
