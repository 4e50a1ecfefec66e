//! Consumption analytics: totals, baseline, tariff costs and solar estimates.

pub mod series;
pub mod solar;
pub mod tariff;

pub use series::{
    baseline_load, mean, resample, std_dev, summarize, total_consumption, Granularity, Peak,
    SeriesSummary,
};
pub use solar::{join_weather, solar_report, EnergySample, SolarArray, SolarReport};
pub use tariff::{peak_offpeak_cost, CostSplit, EnergySplit, HpWindow, Tariff};
