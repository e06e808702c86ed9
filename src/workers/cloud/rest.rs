//! Adafruit IO REST client.
//!
//! Used for reads the MQTT session cannot serve: a feed's last value and the
//! cloud's notion of local time.

use serde::Deserialize;
use tracing::debug;

use crate::config::CloudConfig;
use crate::workers::WorkerError;

const KEY_HEADER: &str = "X-AIO-Key";
const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

#[derive(Debug, Deserialize)]
struct DataPoint {
    value: Option<serde_json::Value>,
}

/// Thin wrapper over the `/api/v2` endpoints.
#[derive(Debug, Clone)]
pub struct AdafruitRest {
    http: reqwest::Client,
    base_url: String,
    username: String,
    key: String,
}

impl AdafruitRest {
    pub fn new(config: &CloudConfig) -> Result<Self, WorkerError> {
        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.rest_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            key: config.key.clone(),
        })
    }

    pub fn feed_url(&self, feed_id: &str) -> String {
        format!("{}/{}/feeds/{}", self.base_url, self.username, feed_id)
    }

    pub fn last_value_url(&self, feed_id: &str) -> String {
        format!("{}/data/last", self.feed_url(feed_id))
    }

    pub fn local_time_url(&self) -> String {
        format!(
            "{}/{}/integrations/time/strftime",
            self.base_url, self.username
        )
    }

    /// Succeeds when the feed exists on the account.
    pub async fn feed_exists(&self, feed_id: &str) -> Result<(), WorkerError> {
        self.http
            .get(self.feed_url(feed_id))
            .header(KEY_HEADER, &self.key)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Last value stored in a feed, as text. An empty feed yields "".
    pub async fn last_value(&self, feed_id: &str) -> Result<String, WorkerError> {
        let point: DataPoint = self
            .http
            .get(self.last_value_url(feed_id))
            .header(KEY_HEADER, &self.key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let value = point.value.map(value_text).unwrap_or_default();
        debug!(feed_id = %feed_id, value = %value, "Fetched feed value");
        Ok(value)
    }

    pub async fn local_time(&self) -> Result<String, WorkerError> {
        let text = self
            .http
            .get(self.local_time_url())
            .header(KEY_HEADER, &self.key)
            .query(&[("fmt", LOCAL_TIME_FORMAT)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(text.trim().trim_matches('"').to_string())
    }
}

fn value_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
