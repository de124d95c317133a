use crate::http::{status_error, transport_error};
use async_trait::async_trait;
use etlcore::{
    typed_config, ConnectorContext, ConnectorError, NodeConfig, Scalar, SourceConnector,
    TabularResult,
};
use serde::Deserialize;

/// Google Cloud Storage source
///
/// Fetches a single object through the JSON API (`alt=media`) and parses it
/// as CSV with a header row, or as a JSON array of flat objects.
pub struct GcsSource {
    client: reqwest::Client,
}

impl GcsSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for GcsSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum ObjectFormat {
    Csv,
    Json,
}

fn default_format() -> ObjectFormat {
    ObjectFormat::Csv
}

#[derive(Deserialize)]
struct GcsConfig {
    bucket: String,
    object: String,
    access_token: String,
    #[serde(default = "default_format")]
    format: ObjectFormat,
}

impl GcsConfig {
    fn check(&self) -> Result<(), ConnectorError> {
        if self.bucket.is_empty() {
            return Err(ConnectorError::Configuration(
                "bucket must not be empty".to_string(),
            ));
        }
        if self.object.is_empty() {
            return Err(ConnectorError::Configuration(
                "object must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SourceConnector for GcsSource {
    fn validate_config(&self, config: &NodeConfig) -> Result<(), ConnectorError> {
        let config: GcsConfig = typed_config(config)?;
        config.check()
    }

    async fn extract(&self, ctx: &ConnectorContext) -> Result<TabularResult, ConnectorError> {
        let config: GcsConfig = ctx.typed_config()?;
        config.check()?;

        // Object names may contain slashes; the JSON API wants them encoded
        // in the path segment.
        let url = format!(
            "https://storage.googleapis.com/storage/v1/b/{}/o/{}?alt=media",
            config.bucket,
            config.object.replace('/', "%2F")
        );
        ctx.events
            .info(format!("fetching gs://{}/{}", config.bucket, config.object));

        let response = self
            .client
            .get(&url)
            .bearer_auth(&config.access_token)
            .send()
            .await
            .map_err(|e| transport_error("GCS", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error("GCS", status));
        }
        let body = response
            .text()
            .await
            .map_err(|e| transport_error("GCS", e))?;

        match config.format {
            ObjectFormat::Csv => parse_csv(&body),
            ObjectFormat::Json => parse_json_rows(&body),
        }
    }
}

fn parse_csv(body: &str) -> Result<TabularResult, ConnectorError> {
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| ConnectorError::Data(format!("bad CSV header: {}", e)))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut table = TabularResult::empty(columns);
    for record in reader.records() {
        let record = record.map_err(|e| ConnectorError::Data(format!("bad CSV record: {}", e)))?;
        let row = record.iter().map(parse_cell).collect();
        table
            .push_row(row)
            .map_err(|e| ConnectorError::Data(e.to_string()))?;
    }
    Ok(table)
}

/// CSV cells carry no types; recover booleans and numbers, keep the rest
/// as strings.
fn parse_cell(raw: &str) -> Scalar {
    match raw {
        "true" => Scalar::Bool(true),
        "false" => Scalar::Bool(false),
        _ => raw
            .parse::<f64>()
            .map(Scalar::Number)
            .unwrap_or_else(|_| Scalar::String(raw.to_string())),
    }
}

fn parse_json_rows(body: &str) -> Result<TabularResult, ConnectorError> {
    let objects: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(body)
        .map_err(|e| ConnectorError::Data(format!("expected a JSON array of objects: {}", e)))?;

    let Some(first) = objects.first() else {
        return Ok(TabularResult::empty(Vec::new()));
    };
    let columns: Vec<String> = first.keys().cloned().collect();

    let mut table = TabularResult::empty(columns.clone());
    for (i, object) in objects.iter().enumerate() {
        let mut row = Vec::with_capacity(columns.len());
        for column in &columns {
            let value = object.get(column).ok_or_else(|| {
                ConnectorError::Data(format!("row {} is missing column {}", i, column))
            })?;
            let cell = serde_json::from_value::<Scalar>(value.clone()).map_err(|_| {
                ConnectorError::Data(format!("row {}: column {} is not a scalar", i, column))
            })?;
            row.push(cell);
        }
        table
            .push_row(row)
            .map_err(|e| ConnectorError::Data(e.to_string()))?;
    }
    Ok(table)
}
