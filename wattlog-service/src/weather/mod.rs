//! Weather history: the provider seam, the Open-Meteo client and the gap filler that keeps
//! the `weather` table aligned with the days that have consumption.

use async_trait::async_trait;
use time::Date;
use wattlog_client::domain::{WeatherSample, WEATHER_VARIABLES};

pub mod gap_filler;
pub mod open_meteo;
pub mod resample;

pub use gap_filler::{fill_weather_gaps, missing_days, GapFillReport};
pub use open_meteo::OpenMeteoClient;
pub use resample::to_half_hourly;

/// Hourly history for one location and an inclusive date range.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub start_date: Date,
    pub end_date: Date,
    pub variables: Vec<String>,
}

impl WeatherRequest {
    /// All stored variables for a single day.
    pub fn for_day(latitude: f64, longitude: f64, day: Date) -> Self {
        Self {
            latitude,
            longitude,
            start_date: day,
            end_date: day,
            variables: WEATHER_VARIABLES.iter().map(|v| v.to_string()).collect(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Source of hourly weather samples. Timestamps are local to the provider's configured timezone.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn hourly(&self, request: &WeatherRequest) -> Result<Vec<WeatherSample>, ProviderError>;
}
