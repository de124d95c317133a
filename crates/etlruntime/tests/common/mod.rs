#![allow(dead_code)]

//! Stub connectors shared by the runtime integration tests

use async_trait::async_trait;
use etlcore::{
    ConnectorContext, ConnectorError, LoadConnector, LoadSummary, NodeConfig, NodeId, Scalar,
    SourceConnector, TabularResult, TransformConnector,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub fn table(rows: &[&str]) -> TabularResult {
    TabularResult::new(
        vec!["value".to_string()],
        rows.iter().map(|r| vec![Scalar::from(*r)]).collect(),
    )
    .unwrap()
}

/// Source producing a fixed single-column table
pub struct StaticSource {
    pub rows: Vec<&'static str>,
}

#[async_trait]
impl SourceConnector for StaticSource {
    fn validate_config(&self, _config: &NodeConfig) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn extract(&self, _ctx: &ConnectorContext) -> Result<TabularResult, ConnectorError> {
        Ok(table(&self.rows))
    }
}

/// Source that fails every attempt, counting them
pub struct FailingSource {
    pub error: ConnectorError,
    pub attempts: Arc<AtomicU32>,
}

#[async_trait]
impl SourceConnector for FailingSource {
    fn validate_config(&self, _config: &NodeConfig) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn extract(&self, _ctx: &ConnectorContext) -> Result<TabularResult, ConnectorError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Source that fails with a transient error a set number of times, then
/// succeeds
pub struct FlakySource {
    pub failures_before_success: u32,
    pub attempts: Arc<AtomicU32>,
}

#[async_trait]
impl SourceConnector for FlakySource {
    fn validate_config(&self, _config: &NodeConfig) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn extract(&self, _ctx: &ConnectorContext) -> Result<TabularResult, ConnectorError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures_before_success {
            Err(ConnectorError::Connection("transient".to_string()))
        } else {
            Ok(table(&["recovered"]))
        }
    }
}

/// Source that sleeps before producing, for timeout tests
pub struct SlowSource {
    pub delay_ms: u64,
}

#[async_trait]
impl SourceConnector for SlowSource {
    fn validate_config(&self, _config: &NodeConfig) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn extract(&self, _ctx: &ConnectorContext) -> Result<TabularResult, ConnectorError> {
        tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        Ok(table(&["slow"]))
    }
}

/// Source that succeeds and then cancels the run it belongs to
pub struct CancellingSource {
    pub token: CancellationToken,
}

#[async_trait]
impl SourceConnector for CancellingSource {
    fn validate_config(&self, _config: &NodeConfig) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn extract(&self, _ctx: &ConnectorContext) -> Result<TabularResult, ConnectorError> {
        self.token.cancel();
        Ok(table(&["last"]))
    }
}

/// Source tracking how many of its instances run at once
pub struct ProbeSource {
    pub current: Arc<AtomicU32>,
    pub max_seen: Arc<AtomicU32>,
    pub delay_ms: u64,
}

#[async_trait]
impl SourceConnector for ProbeSource {
    fn validate_config(&self, _config: &NodeConfig) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn extract(&self, _ctx: &ConnectorContext) -> Result<TabularResult, ConnectorError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(table(&["probe"]))
    }
}

/// Pass-through transformation requiring exactly one input
pub struct PassThrough;

#[async_trait]
impl TransformConnector for PassThrough {
    fn validate_config(&self, _config: &NodeConfig) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn transform(
        &self,
        _ctx: &ConnectorContext,
        inputs: HashMap<NodeId, TabularResult>,
    ) -> Result<TabularResult, ConnectorError> {
        let mut tables: Vec<_> = inputs.into_values().collect();
        if tables.len() != 1 {
            return Err(ConnectorError::Data(format!(
                "expected one input, got {}",
                tables.len()
            )));
        }
        Ok(tables.remove(0))
    }
}

/// Destination that records every table it receives
#[derive(Default)]
pub struct CapturingDestination {
    pub received: Arc<Mutex<Vec<TabularResult>>>,
}

#[async_trait]
impl LoadConnector for CapturingDestination {
    fn validate_config(&self, _config: &NodeConfig) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn load(
        &self,
        _ctx: &ConnectorContext,
        input: TabularResult,
    ) -> Result<LoadSummary, ConnectorError> {
        let rows_written = input.row_count() as u64;
        self.received.lock().unwrap().push(input);
        Ok(LoadSummary { rows_written })
    }
}

/// Source whose configuration requires a `bucket` key
pub struct PickySource;

#[async_trait]
impl SourceConnector for PickySource {
    fn validate_config(&self, config: &NodeConfig) -> Result<(), ConnectorError> {
        if !config.contains_key("bucket") {
            return Err(ConnectorError::Configuration(
                "missing config key: bucket".to_string(),
            ));
        }
        Ok(())
    }

    async fn extract(&self, _ctx: &ConnectorContext) -> Result<TabularResult, ConnectorError> {
        Ok(table(&[]))
    }
}
