use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::PrimitiveDateTime;
use tracing::{debug, warn};
use wattlog_client::domain::WeatherSample;

use super::{ProviderError, WeatherProvider, WeatherRequest};
use crate::config::WeatherConfig;

const HOUR_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]T[hour]:[minute]");
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    hourly: Option<HourlyBlock>,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<String>,
    #[serde(flatten)]
    values: HashMap<String, Vec<Option<f64>>>,
}

/// Client for the Open-Meteo historical archive.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
    timezone: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl OpenMeteoClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            timezone: config.timezone.clone(),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    fn query(&self, request: &WeatherRequest) -> Result<Vec<(&'static str, String)>, ProviderError> {
        let date = |d: time::Date| {
            d.format(DATE_FORMAT)
                .map_err(|e| ProviderError::Malformed(format!("unformattable date {d}: {e}")))
        };
        Ok(vec![
            ("latitude", request.latitude.to_string()),
            ("longitude", request.longitude.to_string()),
            ("hourly", request.variables.join(",")),
            ("timezone", self.timezone.clone()),
            ("start_date", date(request.start_date)?),
            ("end_date", date(request.end_date)?),
        ])
    }

    /// Send with retries on transport errors and 5xx, waiting `retry_backoff * attempt`.
    async fn send_with_retry(&self, query: &[(&'static str, String)]) -> Result<Response, ProviderError> {
        let mut attempt = 0;
        loop {
            let failure = match self.client.get(&self.base_url).query(query).send().await {
                Ok(resp) if resp.status().is_server_error() => format!("HTTP {}", resp.status()),
                Ok(resp) if !resp.status().is_success() => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(ProviderError::Unavailable(format!("HTTP {status}: {body}")));
                }
                Ok(resp) => return Ok(resp),
                Err(e) => e.to_string(),
            };

            if attempt >= self.max_retries {
                return Err(ProviderError::Unavailable(format!(
                    "{failure} after {} attempts",
                    attempt + 1
                )));
            }
            attempt += 1;
            let delay = self.retry_backoff * attempt;
            warn!(attempt, max_retries = self.max_retries, error = %failure, ?delay, "weather request failed, retrying");
            metrics::counter!("weather_provider_retries_total").increment(1);
            tokio::time::sleep(delay).await;
        }
    }
}

fn into_samples(block: HourlyBlock, variables: &[String]) -> Result<Vec<WeatherSample>, ProviderError> {
    let mut samples = block
        .time
        .iter()
        .map(|t| {
            PrimitiveDateTime::parse(t, HOUR_FORMAT)
                .map(WeatherSample::empty)
                .map_err(|e| ProviderError::Malformed(format!("bad time '{t}': {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    for var in variables {
        let Some(series) = block.values.get(var) else {
            debug!(variable = %var, "variable absent from response");
            continue;
        };
        if series.len() != samples.len() {
            return Err(ProviderError::Malformed(format!(
                "{var} has {} values for {} timestamps",
                series.len(),
                samples.len()
            )));
        }
        for (sample, value) in samples.iter_mut().zip(series) {
            sample.set(var, *value);
        }
    }
    Ok(samples)
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    async fn hourly(&self, request: &WeatherRequest) -> Result<Vec<WeatherSample>, ProviderError> {
        let query = self.query(request)?;
        let response = self.send_with_retry(&query).await?;
        let body: ArchiveResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        match body.hourly {
            Some(block) => into_samples(block, &request.variables),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use time::macros::{date, datetime};

    fn client_for(server: &Server, max_retries: u32) -> OpenMeteoClient {
        let config = WeatherConfig {
            base_url: format!("{}/v1/archive", server.url()),
            max_retries,
            retry_backoff_ms: 1,
            ..WeatherConfig::default()
        };
        OpenMeteoClient::new(&config).unwrap()
    }

    fn request() -> WeatherRequest {
        WeatherRequest {
            latitude: 48.68,
            longitude: 3.22,
            start_date: date!(2024-03-01),
            end_date: date!(2024-03-01),
            variables: vec!["temperature_2m".into(), "shortwave_radiation".into()],
        }
    }

    #[tokio::test]
    async fn parses_hourly_arrays_with_nulls() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/archive")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("start_date".into(), "2024-03-01".into()),
                Matcher::UrlEncoded("end_date".into(), "2024-03-01".into()),
                Matcher::UrlEncoded("hourly".into(), "temperature_2m,shortwave_radiation".into()),
                Matcher::UrlEncoded("timezone".into(), "Europe/Paris".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "latitude": 48.7,
                    "longitude": 3.2,
                    "hourly_units": {"time": "iso8601"},
                    "hourly": {
                        "time": ["2024-03-01T00:00", "2024-03-01T01:00"],
                        "temperature_2m": [4.5, null],
                        "shortwave_radiation": [0.0, 12.0]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let samples = client_for(&server, 0).hourly(&request()).await.unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].time, datetime!(2024-03-01 00:00:00));
        assert_eq!(samples[0].temperature_2m, Some(4.5));
        assert_eq!(samples[1].temperature_2m, None);
        assert_eq!(samples[1].shortwave_radiation, Some(12.0));
        assert_eq!(samples[1].cloud_cover, None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_hourly_block_is_empty() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/archive")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"latitude": 48.7}).to_string())
            .create_async()
            .await;

        let samples = client_for(&server, 0).hourly(&request()).await.unwrap();
        assert!(samples.is_empty());
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_reported() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/archive")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let err = client_for(&server, 2).hourly(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/archive")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":true,"reason":"bad date"}"#)
            .expect(1)
            .create_async()
            .await;

        let err = client_for(&server, 3).hourly(&request()).await.unwrap_err();
        assert!(err.to_string().contains("bad date"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn mismatched_lengths_are_malformed() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/archive")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"hourly": {"time": ["2024-03-01T00:00"], "temperature_2m": [1.0, 2.0]}})
                    .to_string(),
            )
            .create_async()
            .await;

        let err = client_for(&server, 0).hourly(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }
}
