//! OpenWeatherMap current-weather source.

use async_trait::async_trait;

use super::PollSource;
use crate::config::WeatherConfig;
use crate::events::{ClientId, Event};
use crate::workers::WorkerError;

pub struct WeatherSource {
    http: reqwest::Client,
    url: String,
    api_key: String,
    city_id: String,
}

impl WeatherSource {
    /// `None` when the source is not configured.
    pub fn new(config: &WeatherConfig) -> Result<Option<Self>, WorkerError> {
        let (Some(api_key), Some(city_id)) = (&config.api_key, &config.city_id) else {
            return Ok(None);
        };
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Some(Self {
            http,
            url: config.url.clone(),
            api_key: api_key.clone(),
            city_id: city_id.clone(),
        }))
    }
}

#[async_trait]
impl PollSource for WeatherSource {
    fn client_id(&self) -> ClientId {
        ClientId::Weather
    }

    async fn fetch(&mut self, _force: bool) -> Result<Vec<Event>, WorkerError> {
        let payload: serde_json::Value = self
            .http
            .get(&self.url)
            .query(&[
                ("id", self.city_id.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "imperial"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if !payload.is_object() {
            return Err(WorkerError::Source(
                "weather response is not an object".to_string(),
            ));
        }
        Ok(vec![Event::Weather { payload }])
    }
}
