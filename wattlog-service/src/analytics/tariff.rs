use serde::Serialize;
use time::{PrimitiveDateTime, Time};
use wattlog_client::domain::{Reading, TariffSettings};

/// Daily peak-hours window `[start, end)`. Wraps midnight when `start >= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HpWindow {
    pub start: Time,
    pub end: Time,
}

impl HpWindow {
    pub fn new(start: Time, end: Time) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: Time) -> bool {
        if self.start < self.end {
            self.start <= t && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }

    /// Only the bucket's start timestamp decides its rate.
    pub fn is_peak(&self, start_time: PrimitiveDateTime) -> bool {
        self.contains(start_time.time())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tariff {
    pub hp_cost: f64,
    pub hc_cost: f64,
    pub window: HpWindow,
}

impl Tariff {
    pub fn from_settings(settings: &TariffSettings) -> Self {
        Self {
            hp_cost: settings.hp_cost,
            hc_cost: settings.hc_cost,
            window: HpWindow::new(settings.hp_start, settings.hp_end),
        }
    }

    pub fn rate_at(&self, start_time: PrimitiveDateTime) -> f64 {
        if self.window.is_peak(start_time) {
            self.hp_cost
        } else {
            self.hc_cost
        }
    }
}

/// Energy split between peak and off-peak hours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnergySplit {
    pub hp_kwh: f64,
    pub hc_kwh: f64,
}

impl EnergySplit {
    pub fn total_kwh(&self) -> f64 {
        self.hp_kwh + self.hc_kwh
    }
}

/// Energy and cost split between peak and off-peak hours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostSplit {
    pub hp_kwh: f64,
    pub hc_kwh: f64,
    pub hp_cost: f64,
    pub hc_cost: f64,
}

impl CostSplit {
    pub fn total_kwh(&self) -> f64 {
        self.hp_kwh + self.hc_kwh
    }

    pub fn total_cost(&self) -> f64 {
        self.hp_cost + self.hc_cost
    }
}

/// Classify `(start_time, kwh)` pairs by the peak window.
pub fn split_energy<I>(items: I, window: &HpWindow) -> EnergySplit
where
    I: IntoIterator<Item = (PrimitiveDateTime, f64)>,
{
    items.into_iter().fold(EnergySplit::default(), |mut acc, (ts, kwh)| {
        if window.is_peak(ts) {
            acc.hp_kwh += kwh;
        } else {
            acc.hc_kwh += kwh;
        }
        acc
    })
}

/// Price `(start_time, kwh)` pairs, one rate per pair.
pub fn cost_of<I>(items: I, tariff: &Tariff) -> CostSplit
where
    I: IntoIterator<Item = (PrimitiveDateTime, f64)>,
{
    items.into_iter().fold(CostSplit::default(), |mut acc, (ts, kwh)| {
        if tariff.window.is_peak(ts) {
            acc.hp_kwh += kwh;
            acc.hp_cost += kwh * tariff.hp_cost;
        } else {
            acc.hc_kwh += kwh;
            acc.hc_cost += kwh * tariff.hc_cost;
        }
        acc
    })
}

pub fn peak_offpeak_cost(series: &[Reading], tariff: &Tariff) -> CostSplit {
    cost_of(series.iter().map(|r| (r.start_time, r.consumption_kwh)), tariff)
}
