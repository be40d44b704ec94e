use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::Sha256;
use time::OffsetDateTime;
use tracing::debug;

use super::NotificationSink;
use crate::error::NotificationError;
use crate::types::NotificationRecord;

type HmacSha256 = Hmac<Sha256>;

/// Webhook sink configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,

    /// HMAC-SHA256 key; adds `X-Signature-256` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    5_000
}

/// Forwards notifications to an HTTP endpoint as signed JSON events
pub struct WebhookSink {
    http_client: Client,
    config: WebhookConfig,
}

impl WebhookSink {
    pub fn new(config: WebhookConfig) -> Result<Self, NotificationError> {
        if config.url.is_empty() {
            return Err(NotificationError::InvalidConfig(
                "Missing webhook url".into(),
            ));
        }
        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| NotificationError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            http_client,
            config,
        })
    }

    fn sign_payload(&self, payload: &str, secret: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        let result = mac.finalize();
        hex::encode(result.into_bytes())
    }

    async fn deliver(&self, mut payload: Value) -> Result<(), NotificationError> {
        let timestamp = OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        payload["timestamp"] = Value::String(timestamp);

        let payload_str = serde_json::to_string(&payload)
            .map_err(|e| NotificationError::DeliveryFailed(e.to_string()))?;

        let mut request = self
            .http_client
            .post(&self.config.url)
            .header("Content-Type", "application/json");

        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        if let Some(secret) = &self.config.secret {
            let signature = self.sign_payload(&payload_str, secret);
            request = request.header("X-Signature-256", format!("sha256={}", signature));
        }

        let response = request
            .body(payload_str)
            .send()
            .await
            .map_err(|e| NotificationError::DeliveryFailed(e.to_string()))?;

        if response.status().is_success() {
            debug!(event = %payload["event"], "Webhook delivered");
            Ok(())
        } else {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            Err(NotificationError::DeliveryFailed(format!(
                "Webhook failed ({status}): {error}"
            )))
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn post(&self, record: &NotificationRecord) -> Result<(), NotificationError> {
        let mut payload = serde_json::to_value(record)
            .map_err(|e| NotificationError::DeliveryFailed(e.to_string()))?;
        payload["event"] = json!("posted");
        self.deliver(payload).await
    }

    async fn cancel(&self, notify_id: u32) -> Result<(), NotificationError> {
        self.deliver(json!({ "event": "cancelled", "notifyId": notify_id }))
            .await
    }

    async fn cancel_all(&self) -> Result<(), NotificationError> {
        self.deliver(json!({ "event": "cancelled_all" })).await
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
