use std::collections::BTreeSet;

use anyhow::Context;
use serde::Serialize;
use sqlx::SqlitePool;
use time::Date;
use tracing::{info, warn};
use wattlog_client::db::{consumption_days, insert_weather_samples, weather_days};

use super::resample::to_half_hourly;
use super::{WeatherProvider, WeatherRequest};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GapFillReport {
    /// Days with consumption but no weather.
    pub requested: usize,
    pub filled: usize,
    pub skipped: usize,
    pub samples_saved: u64,
}

/// Days that have consumption but no weather, ascending.
pub fn missing_days(consumption: &BTreeSet<Date>, weather: &BTreeSet<Date>) -> Vec<Date> {
    consumption.difference(weather).copied().collect()
}

/// Fetch, resample and store weather for every day that has readings but no weather.
///
/// A day the provider cannot serve is logged and skipped. Store failures abort.
pub async fn fill_weather_gaps<P>(
    pool: &SqlitePool,
    provider: &P,
    latitude: f64,
    longitude: f64,
) -> anyhow::Result<GapFillReport>
where
    P: WeatherProvider + ?Sized,
{
    let consumption = consumption_days(pool).await.context("listing consumption days")?;
    let weather = weather_days(pool).await.context("listing weather days")?;
    let days = missing_days(&consumption, &weather);

    let mut report = GapFillReport {
        requested: days.len(),
        ..GapFillReport::default()
    };
    info!(days = days.len(), "filling weather gaps");

    for day in days {
        let request = WeatherRequest::for_day(latitude, longitude, day);
        let hourly = match provider.hourly(&request).await {
            Ok(hourly) => hourly,
            Err(err) => {
                warn!(%day, error = %err, "weather provider failed, skipping day");
                metrics::counter!("weather_days_skipped_total").increment(1);
                report.skipped += 1;
                continue;
            }
        };

        let samples = to_half_hourly(&hourly);
        if samples.is_empty() {
            warn!(%day, "no weather data returned, skipping day");
            metrics::counter!("weather_days_skipped_total").increment(1);
            report.skipped += 1;
            continue;
        }

        let saved = insert_weather_samples(pool, &samples)
            .await
            .with_context(|| format!("saving weather for {day}"))?;
        metrics::counter!("weather_samples_saved_total").increment(saved);
        info!(%day, saved, "weather saved");

        report.filled += 1;
        report.samples_saved += saved;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::ProviderError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::macros::{date, datetime};
    use time::{Duration, PrimitiveDateTime};
    use wattlog_client::db::{connect, insert_reading, weather_in_range};
    use wattlog_client::domain::{Reading, WeatherSample};

    /// Serves 24 hourly samples per day, except for days listed as failing or empty.
    #[derive(Default)]
    struct FakeProvider {
        failing: Vec<Date>,
        empty: Vec<Date>,
        calls: Mutex<Vec<Date>>,
    }

    #[async_trait]
    impl WeatherProvider for FakeProvider {
        async fn hourly(&self, request: &WeatherRequest) -> Result<Vec<WeatherSample>, ProviderError> {
            let day = request.start_date;
            self.calls.lock().unwrap().push(day);
            if self.failing.contains(&day) {
                return Err(ProviderError::Unavailable("connection refused".into()));
            }
            if self.empty.contains(&day) {
                return Ok(Vec::new());
            }
            Ok((0..24)
                .map(|h| {
                    let mut s = WeatherSample::empty(day.midnight() + Duration::hours(h));
                    s.temperature_2m = Some(h as f64);
                    s
                })
                .collect())
        }
    }

    async fn pool_with_days(days: &[Date]) -> SqlitePool {
        let pool = connect("sqlite::memory:", 1).await.unwrap();
        for day in days {
            let start: PrimitiveDateTime = day.with_hms(12, 0, 0).unwrap();
            insert_reading(&pool, &Reading::new(start, start + Duration::minutes(30), 0.4))
                .await
                .unwrap();
        }
        pool
    }

    #[test]
    fn missing_days_is_set_difference() {
        let consumption = BTreeSet::from([date!(2024-03-01), date!(2024-03-02), date!(2024-03-03)]);
        let weather = BTreeSet::from([date!(2024-03-02), date!(2024-04-01)]);
        assert_eq!(
            missing_days(&consumption, &weather),
            vec![date!(2024-03-01), date!(2024-03-03)]
        );
    }

    #[tokio::test]
    async fn fills_each_missing_day_once() {
        let pool = pool_with_days(&[date!(2024-03-01), date!(2024-03-02)]).await;
        let provider = FakeProvider::default();

        let report = fill_weather_gaps(&pool, &provider, 48.68, 3.22).await.unwrap();
        assert_eq!(report.requested, 2);
        assert_eq!(report.filled, 2);
        assert_eq!(report.samples_saved, 2 * 46);

        let stored = weather_in_range(&pool, datetime!(2024-03-01 00:00:00), datetime!(2024-03-02 00:00:00))
            .await
            .unwrap();
        assert_eq!(stored.len(), 46);
        assert_eq!(stored[1].temperature_2m, Some(0.5));

        // Second run has nothing left to fetch.
        let again = fill_weather_gaps(&pool, &provider, 48.68, 3.22).await.unwrap();
        assert_eq!(again, GapFillReport::default());
        assert_eq!(provider.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn provider_failure_skips_only_that_day() {
        let pool = pool_with_days(&[date!(2024-03-01), date!(2024-03-02), date!(2024-03-03)]).await;
        let provider = FakeProvider {
            failing: vec![date!(2024-03-01)],
            empty: vec![date!(2024-03-02)],
            ..FakeProvider::default()
        };

        let report = fill_weather_gaps(&pool, &provider, 48.68, 3.22).await.unwrap();
        assert_eq!(report.requested, 3);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.filled, 1);

        let days = weather_days(&pool).await.unwrap();
        assert_eq!(days, BTreeSet::from([date!(2024-03-03)]));
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let pool = pool_with_days(&[date!(2024-03-01)]).await;
        sqlx::query("DROP TABLE weather").execute(&pool).await.unwrap();

        let result = fill_weather_gaps(&pool, &FakeProvider::default(), 48.68, 3.22).await;
        assert!(result.is_err());
    }
}
