use serde::Serialize;
use sqlx::SqlitePool;
use time::{Date, PrimitiveDateTime};
use wattlog_client::db::{current_settings, readings_in_range, weather_in_range};
use wattlog_client::domain::Reading;

use crate::analytics::{
    join_weather, resample, solar_report, summarize, Granularity, SeriesSummary, SolarArray, SolarReport,
    Tariff,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PeriodError {
    #[error("period starts after it ends ({from} > {to})")]
    Reversed { from: Date, to: Date },
    #[error("period end {0} is out of range")]
    OutOfRange(Date),
}

/// Calendar days `from..=to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    pub from: Date,
    pub to: Date,
}

impl Period {
    pub fn new(from: Date, to: Date) -> Result<Self, PeriodError> {
        if from > to {
            return Err(PeriodError::Reversed { from, to });
        }
        to.next_day().ok_or(PeriodError::OutOfRange(to))?;
        Ok(Self { from, to })
    }

    /// Half-open timestamp bounds covering both days entirely.
    pub fn bounds(&self) -> (PrimitiveDateTime, PrimitiveDateTime) {
        let end = self.to.next_day().unwrap_or(self.to);
        (self.from.midnight(), end.midnight())
    }
}

/// Everything the dashboards show for one period.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodReport {
    pub period: Period,
    pub granularity: Granularity,
    pub summary: SeriesSummary,
    pub series: Vec<Reading>,
    /// Present when an installation is configured (`solar_wc > 0`).
    pub solar: Option<SolarReport>,
}

pub async fn period_report(
    pool: &SqlitePool,
    period: Period,
    granularity: Granularity,
) -> anyhow::Result<PeriodReport> {
    let (start, end) = period.bounds();
    let settings = current_settings(pool).await?;
    let tariff = Tariff::from_settings(&settings);
    let readings = readings_in_range(pool, start, end).await?;

    let series = resample(&readings, granularity);
    let summary = summarize(&series, &tariff);

    let solar = if settings.solar_wc > 0.0 {
        let weather = weather_in_range(pool, start, end).await?;
        let joined = join_weather(&readings, &weather);
        Some(solar_report(
            &joined,
            &tariff,
            &SolarArray::from_settings(&settings),
            settings.solar_cost,
        ))
    } else {
        None
    };

    Ok(PeriodReport {
        period,
        granularity,
        summary,
        series,
        solar,
    })
}
