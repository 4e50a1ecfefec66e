use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::{Duration, Month, PrimitiveDateTime, Time};
use wattlog_client::domain::Reading;

use super::tariff::{peak_offpeak_cost, CostSplit, Tariff};

/// Share of the sorted series below the baseline index.
const BASELINE_QUANTILE: f64 = 0.05;

/// Sum of consumption for readings starting in `[from, to)`.
pub fn total_consumption(series: &[Reading], from: PrimitiveDateTime, to: PrimitiveDateTime) -> f64 {
    series
        .iter()
        .filter(|r| r.start_time >= from && r.start_time < to)
        .map(|r| r.consumption_kwh)
        .sum()
}

/// Order statistic at `floor(0.05 * n)` of the sorted values, without interpolation.
pub fn baseline_of<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut sorted: Vec<f64> = values.into_iter().collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);
    let index = (sorted.len() as f64 * BASELINE_QUANTILE) as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Baseline load ("talon"): the sustained consumption floor.
pub fn baseline_load(series: &[Reading]) -> f64 {
    baseline_of(series.iter().map(|r| r.consumption_kwh))
}

pub fn mean(series: &[Reading]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    series.iter().map(|r| r.consumption_kwh).sum::<f64>() / series.len() as f64
}

/// Sample standard deviation (n - 1 denominator); 0 below two samples.
pub fn std_dev(series: &[Reading]) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }
    let m = mean(series);
    let sum_sq: f64 = series.iter().map(|r| (r.consumption_kwh - m).powi(2)).sum();
    (sum_sq / (series.len() - 1) as f64).sqrt()
}

/// Largest value and when it first occurred.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Peak {
    pub at: Option<PrimitiveDateTime>,
    pub value: f64,
}

pub fn peak_of<I>(items: I) -> Peak
where
    I: IntoIterator<Item = (PrimitiveDateTime, f64)>,
{
    items.into_iter().fold(Peak::default(), |best, (ts, value)| {
        if best.at.is_none() || value > best.value {
            Peak { at: Some(ts), value }
        } else {
            best
        }
    })
}

pub fn consumption_peak(series: &[Reading]) -> Peak {
    peak_of(series.iter().map(|r| (r.start_time, r.consumption_kwh)))
}

/// Bucket width for re-aggregating a series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Stored half-hourly readings, untouched.
    #[default]
    Raw,
    Hour,
    Day,
    /// Weeks start on Monday.
    Week,
    Month,
}

fn bucket_start(ts: PrimitiveDateTime, granularity: Granularity) -> PrimitiveDateTime {
    let date = ts.date();
    match granularity {
        Granularity::Raw => ts,
        Granularity::Hour => date.with_time(Time::MIDNIGHT) + Duration::hours(ts.hour().into()),
        Granularity::Day => date.midnight(),
        Granularity::Week => {
            (date - Duration::days(date.weekday().number_days_from_monday().into())).midnight()
        }
        Granularity::Month => date.replace_day(1).unwrap_or(date).midnight(),
    }
}

/// Start of the following bucket, `None` past the last representable date.
fn next_bucket(start: PrimitiveDateTime, granularity: Granularity) -> Option<PrimitiveDateTime> {
    match granularity {
        Granularity::Raw => Some(start),
        Granularity::Hour => start.checked_add(Duration::hours(1)),
        Granularity::Day => start.checked_add(Duration::days(1)),
        Granularity::Week => start.checked_add(Duration::weeks(1)),
        Granularity::Month => {
            let date = start.date();
            let (year, month) = match date.month() {
                Month::December => (date.year() + 1, Month::January),
                m => (date.year(), m.next()),
            };
            time::Date::from_calendar_date(year, month, 1).ok().map(|d| d.midnight())
        }
    }
}

/// Sum readings into contiguous buckets, zero-filling buckets without data.
///
/// Each bucket comes back as a `Reading` spanning the bucket, so every other metric
/// applies to it unchanged. `Raw` returns the series as is.
pub fn resample(series: &[Reading], granularity: Granularity) -> Vec<Reading> {
    if granularity == Granularity::Raw {
        return series.to_vec();
    }

    let mut sums: BTreeMap<PrimitiveDateTime, f64> = BTreeMap::new();
    for r in series {
        *sums.entry(bucket_start(r.start_time, granularity)).or_default() += r.consumption_kwh;
    }

    let (Some(first), Some(last)) = (sums.keys().next().copied(), sums.keys().next_back().copied()) else {
        return Vec::new();
    };

    let mut buckets = Vec::new();
    let mut start = first;
    loop {
        // The final bucket of the calendar ends at the last representable instant.
        let end = next_bucket(start, granularity).unwrap_or(PrimitiveDateTime::MAX);
        buckets.push(Reading::new(start, end, sums.get(&start).copied().unwrap_or(0.0)));
        if end <= start || end > last {
            break;
        }
        start = end;
    }
    buckets
}

/// Headline figures for one consumption series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub samples: usize,
    pub baseline_kwh: f64,
    pub total_kwh: f64,
    pub mean_kwh: f64,
    pub std_dev_kwh: f64,
    pub cost: CostSplit,
    pub peak: Peak,
}

pub fn summarize(series: &[Reading], tariff: &Tariff) -> SeriesSummary {
    SeriesSummary {
        samples: series.len(),
        baseline_kwh: baseline_load(series),
        total_kwh: series.iter().map(|r| r.consumption_kwh).sum(),
        mean_kwh: mean(series),
        std_dev_kwh: std_dev(series),
        cost: peak_offpeak_cost(series, tariff),
        peak: consumption_peak(series),
    }
}
