use crate::http::{status_error, transport_error};
use async_trait::async_trait;
use chrono::Utc;
use etlcore::{
    typed_config, ConnectorContext, ConnectorError, NodeConfig, Scalar, SourceConnector,
    TabularResult,
};
use serde::Deserialize;

const GMAIL_API: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages";

/// Gmail source
///
/// Lists message ids newer than a configurable window, fetches each
/// message's metadata, and emits one row per message with sender,
/// recipients, subject, and timestamp. A message that fails to fetch is
/// skipped, not fatal.
pub struct GmailSource {
    client: reqwest::Client,
}

impl GmailSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for GmailSource {
    fn default() -> Self {
        Self::new()
    }
}

fn default_window_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_messages() -> usize {
    500
}

#[derive(Deserialize)]
struct GmailConfig {
    access_token: String,
    /// Only messages newer than this many seconds are listed
    #[serde(default = "default_window_secs")]
    window_secs: u64,
    #[serde(default = "default_max_messages")]
    max_messages: usize,
}

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Deserialize)]
struct Message {
    id: String,
    #[serde(rename = "internalDate")]
    internal_date: Option<String>,
    payload: Option<Payload>,
}

#[derive(Deserialize)]
struct Payload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[async_trait]
impl SourceConnector for GmailSource {
    fn validate_config(&self, config: &NodeConfig) -> Result<(), ConnectorError> {
        let config: GmailConfig = typed_config(config)?;
        if config.access_token.is_empty() {
            return Err(ConnectorError::Configuration(
                "access_token must not be empty".to_string(),
            ));
        }
        if config.max_messages == 0 {
            return Err(ConnectorError::Configuration(
                "max_messages must be positive".to_string(),
            ));
        }
        Ok(())
    }

    async fn extract(&self, ctx: &ConnectorContext) -> Result<TabularResult, ConnectorError> {
        let config: GmailConfig = ctx.typed_config()?;
        let oldest = Utc::now().timestamp() - config.window_secs as i64;

        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let list = self.list_page(&config, oldest, page_token.as_deref()).await?;
            ids.extend(list.messages.into_iter().map(|m| m.id));
            page_token = list.next_page_token;
            if page_token.is_none() || ids.len() >= config.max_messages {
                break;
            }
        }
        ids.truncate(config.max_messages);
        ctx.events.info(format!("listed {} message(s)", ids.len()));

        let columns = ["id", "sender", "recipients", "subject", "timestamp"]
            .into_iter()
            .map(String::from)
            .collect();
        let mut table = TabularResult::empty(columns);
        let total = ids.len();
        for (i, id) in ids.into_iter().enumerate() {
            if ctx.cancellation.is_cancelled() {
                return Err(ConnectorError::Cancelled);
            }
            match self.fetch_message(&config, &id).await {
                Ok(Some(row)) => table
                    .push_row(row)
                    .map_err(|e| ConnectorError::Data(e.to_string()))?,
                Ok(None) => {}
                Err(e) => {
                    ctx.events.warn(format!("skipping message {}: {}", id, e));
                }
            }
            if total > 0 && (i + 1) % 50 == 0 {
                ctx.events
                    .progress((i + 1) as f64 / total as f64 * 100.0, None);
            }
        }
        Ok(table)
    }
}

impl GmailSource {
    async fn list_page(
        &self,
        config: &GmailConfig,
        oldest: i64,
        page_token: Option<&str>,
    ) -> Result<MessageList, ConnectorError> {
        let mut request = self
            .client
            .get(GMAIL_API)
            .bearer_auth(&config.access_token)
            .query(&[
                ("maxResults", "100".to_string()),
                ("q", format!("after:{}", oldest)),
            ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error("Gmail", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error("Gmail", status));
        }
        response
            .json::<MessageList>()
            .await
            .map_err(|e| ConnectorError::Data(format!("bad Gmail list response: {}", e)))
    }

    async fn fetch_message(
        &self,
        config: &GmailConfig,
        id: &str,
    ) -> Result<Option<Vec<Scalar>>, ConnectorError> {
        let response = self
            .client
            .get(format!("{}/{}", GMAIL_API, id))
            .bearer_auth(&config.access_token)
            .query(&[("format", "metadata")])
            .send()
            .await
            .map_err(|e| transport_error("Gmail", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error("Gmail", status));
        }
        let message: Message = response
            .json()
            .await
            .map_err(|e| ConnectorError::Data(format!("bad Gmail message response: {}", e)))?;

        let Some(payload) = message.payload else {
            return Ok(None);
        };

        let mut sender = String::new();
        let mut recipients = String::new();
        let mut subject = String::new();
        for header in payload.headers {
            match header.name.to_ascii_lowercase().as_str() {
                "from" => sender = header.value,
                "to" => recipients = header.value,
                "subject" => subject = header.value,
                _ => {}
            }
        }
        let timestamp = message
            .internal_date
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        Ok(Some(vec![
            Scalar::String(message.id),
            Scalar::String(sender),
            Scalar::String(recipients),
            Scalar::String(subject),
            Scalar::Number(timestamp),
        ]))
    }
}
