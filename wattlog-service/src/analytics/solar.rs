use std::collections::HashMap;

use serde::Serialize;
use time::PrimitiveDateTime;
use wattlog_client::domain::{Reading, TariffSettings, WeatherSample};

use super::series::{peak_of, Peak};
use super::tariff::{cost_of, split_energy, CostSplit, EnergySplit, Tariff};

const DAYS_PER_YEAR: f64 = 365.25;

/// Photovoltaic installation, described either by rated power or by panel area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SolarArray {
    PeakPower {
        peak_kw: f64,
        /// Fraction in `[0, 1]`.
        efficiency: f64,
    },
    Area {
        area_m2: f64,
        efficiency: f64,
        loss: f64,
    },
}

impl SolarArray {
    /// Rated-power array from the stored settings (watts-crest and percentages).
    pub fn from_settings(settings: &TariffSettings) -> Self {
        SolarArray::PeakPower {
            peak_kw: settings.solar_wc / 1000.0,
            efficiency: settings.solar_efficiency / 100.0,
        }
    }

    pub fn efficiency(&self) -> f64 {
        match *self {
            SolarArray::PeakPower { efficiency, .. } | SolarArray::Area { efficiency, .. } => efficiency,
        }
    }

    pub fn peak_kw(&self) -> f64 {
        match *self {
            SolarArray::PeakPower { peak_kw, .. } => peak_kw,
            SolarArray::Area {
                area_m2,
                efficiency,
                loss,
            } => area_m2 * efficiency * (1.0 - loss),
        }
    }

    /// Energy produced for one sample's irradiance (W/m²).
    pub fn production_kwh(&self, irradiance: Option<f64>) -> f64 {
        irradiance.map_or(0.0, |w| w * self.peak_kw() * self.efficiency() / 1000.0)
    }
}

/// A reading joined with the irradiance observed at its start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnergySample {
    pub start_time: PrimitiveDateTime,
    pub end_time: PrimitiveDateTime,
    pub consumption_kwh: f64,
    pub irradiance: Option<f64>,
}

/// Left join of readings with weather on `start_time == time`.
pub fn join_weather(readings: &[Reading], weather: &[WeatherSample]) -> Vec<EnergySample> {
    let by_time: HashMap<PrimitiveDateTime, Option<f64>> =
        weather.iter().map(|w| (w.time, w.shortwave_radiation)).collect();

    readings
        .iter()
        .map(|r| EnergySample {
            start_time: r.start_time,
            end_time: r.end_time,
            consumption_kwh: r.consumption_kwh,
            irradiance: by_time.get(&r.start_time).copied().flatten(),
        })
        .collect()
}

/// Consumption and solar production for the same interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SolarSample {
    pub start_time: PrimitiveDateTime,
    pub consumption_kwh: f64,
    pub solar_kwh: f64,
}

impl SolarSample {
    fn self_consumed(&self) -> f64 {
        self.consumption_kwh.min(self.solar_kwh)
    }
}

pub fn with_production(samples: &[EnergySample], array: &SolarArray) -> Vec<SolarSample> {
    samples
        .iter()
        .map(|s| SolarSample {
            start_time: s.start_time,
            consumption_kwh: s.consumption_kwh,
            solar_kwh: array.production_kwh(s.irradiance),
        })
        .collect()
}

/// Total production over the samples. Missing irradiance contributes nothing.
pub fn solar_production(samples: &[EnergySample], array: &SolarArray) -> f64 {
    samples.iter().map(|s| array.production_kwh(s.irradiance)).sum()
}

/// Cost of the energy still drawn from the grid. Surplus production is not credited.
pub fn net_cost_with_solar(samples: &[SolarSample], tariff: &Tariff) -> CostSplit {
    cost_of(
        samples
            .iter()
            .map(|s| (s.start_time, (s.consumption_kwh - s.solar_kwh).max(0.0))),
        tariff,
    )
}

/// Production exceeding consumption, split by tariff period.
pub fn solar_loss(samples: &[SolarSample], tariff: &Tariff) -> EnergySplit {
    split_energy(
        samples
            .iter()
            .map(|s| (s.start_time, (s.solar_kwh - s.consumption_kwh).max(0.0))),
        &tariff.window,
    )
}

fn percent_of(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        0.0
    } else {
        (part / whole * 100.0).clamp(0.0, 100.0)
    }
}

/// Share of production consumed on site, in percent.
pub fn self_consumption_ratio(samples: &[SolarSample]) -> f64 {
    let used: f64 = samples.iter().map(SolarSample::self_consumed).sum();
    let produced: f64 = samples.iter().map(|s| s.solar_kwh).sum();
    percent_of(used, produced)
}

/// Share of consumption covered by production, in percent.
pub fn coverage_ratio(samples: &[SolarSample]) -> f64 {
    let used: f64 = samples.iter().map(SolarSample::self_consumed).sum();
    let consumed: f64 = samples.iter().map(|s| s.consumption_kwh).sum();
    percent_of(used, consumed)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SolarReport {
    pub array: SolarArray,
    pub production_kwh: f64,
    pub cost_without_solar: CostSplit,
    pub net_cost_with_solar: CostSplit,
    pub savings: f64,
    pub lost_energy: EnergySplit,
    pub self_consumption_ratio: f64,
    pub coverage_ratio: f64,
    pub consumption_peak: Peak,
    pub solar_peak: Peak,
    /// Years for the savings rate over the covered period to repay `solar_cost`.
    pub payback_years: Option<f64>,
}

pub fn solar_report(
    joined: &[EnergySample],
    tariff: &Tariff,
    array: &SolarArray,
    solar_cost: f64,
) -> SolarReport {
    let samples = with_production(joined, array);

    let cost_without_solar = cost_of(joined.iter().map(|s| (s.start_time, s.consumption_kwh)), tariff);
    let net_cost = net_cost_with_solar(&samples, tariff);
    let savings = cost_without_solar.total_cost() - net_cost.total_cost();

    let payback_years = match (joined.first(), joined.last()) {
        (Some(first), Some(last)) if solar_cost > 0.0 && savings > 0.0 => {
            let years = (last.end_time - first.start_time).as_seconds_f64() / 86_400.0 / DAYS_PER_YEAR;
            (years > 0.0).then(|| solar_cost / (savings / years))
        }
        _ => None,
    };

    SolarReport {
        array: *array,
        production_kwh: samples.iter().map(|s| s.solar_kwh).sum(),
        cost_without_solar,
        net_cost_with_solar: net_cost,
        savings,
        lost_energy: solar_loss(&samples, tariff),
        self_consumption_ratio: self_consumption_ratio(&samples),
        coverage_ratio: coverage_ratio(&samples),
        consumption_peak: peak_of(samples.iter().map(|s| (s.start_time, s.consumption_kwh))),
        solar_peak: peak_of(samples.iter().map(|s| (s.start_time, s.solar_kwh))),
        payback_years,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, time};
    use time::Duration;

    fn tariff() -> Tariff {
        let settings = TariffSettings {
            hp_cost: 0.27,
            hc_cost: 0.20,
            hp_start: time!(07:00),
            hp_end: time!(23:00),
            ..TariffSettings::default()
        };
        Tariff::from_settings(&settings)
    }

    fn sample(start: PrimitiveDateTime, consumption_kwh: f64, solar_kwh: f64) -> SolarSample {
        SolarSample {
            start_time: start,
            consumption_kwh,
            solar_kwh,
        }
    }

    #[test]
    fn production_from_rated_power() {
        let settings = TariffSettings {
            solar_wc: 3000.0,
            solar_efficiency: 20.0,
            ..TariffSettings::default()
        };
        let array = SolarArray::from_settings(&settings);
        assert_eq!(array.peak_kw(), 3.0);
        assert!((array.production_kwh(Some(500.0)) - 0.3).abs() < 1e-12);
        assert_eq!(array.production_kwh(None), 0.0);
    }

    #[test]
    fn area_array_applies_losses() {
        let array = SolarArray::Area {
            area_m2: 10.0,
            efficiency: 0.2,
            loss: 0.14,
        };
        assert!((array.peak_kw() - 1.72).abs() < 1e-12);
    }

    #[test]
    fn join_keeps_readings_without_weather() {
        let t0 = datetime!(2024-06-01 12:00:00);
        let readings = vec![
            Reading::new(t0, t0 + Duration::minutes(30), 1.0),
            Reading::new(t0 + Duration::minutes(30), t0 + Duration::hours(1), 2.0),
        ];
        let mut weather = WeatherSample::empty(t0);
        weather.shortwave_radiation = Some(640.0);

        let joined = join_weather(&readings, &[weather]);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].irradiance, Some(640.0));
        assert_eq!(joined[1].irradiance, None);
    }

    #[test]
    fn net_cost_discards_surplus_and_loss_counts_it() {
        let samples = vec![
            sample(datetime!(2024-06-01 12:00:00), 1.0, 0.4),
            sample(datetime!(2024-06-01 12:30:00), 0.5, 2.0),
            sample(datetime!(2024-06-01 02:00:00), 1.0, 0.0),
        ];
        let tariff = tariff();

        let net = net_cost_with_solar(&samples, &tariff);
        assert!((net.hp_kwh - 0.6).abs() < 1e-12);
        assert!((net.hc_cost - 0.20).abs() < 1e-12);

        let lost = solar_loss(&samples, &tariff);
        assert!((lost.hp_kwh - 1.5).abs() < 1e-12);
        assert_eq!(lost.hc_kwh, 0.0);
    }

    #[test]
    fn ratios_are_percentages() {
        let samples = vec![
            sample(datetime!(2024-06-01 12:00:00), 1.0, 0.5),
            sample(datetime!(2024-06-01 12:30:00), 1.0, 1.5),
        ];
        // used = 0.5 + 1.0, produced = 2.0, consumed = 2.0
        assert!((self_consumption_ratio(&samples) - 75.0).abs() < 1e-9);
        assert!((coverage_ratio(&samples) - 75.0).abs() < 1e-9);

        for s in [
            vec![sample(datetime!(2024-06-01 12:00:00), 0.0, 3.0)],
            vec![sample(datetime!(2024-06-01 12:00:00), 3.0, 0.0)],
            vec![sample(datetime!(2024-06-01 12:00:00), 0.1, 0.1)],
        ] {
            for ratio in [self_consumption_ratio(&s), coverage_ratio(&s)] {
                assert!((0.0..=100.0).contains(&ratio));
            }
        }
    }

    #[test]
    fn ratios_are_zero_without_denominator() {
        let no_sun = vec![sample(datetime!(2024-06-01 02:00:00), 1.0, 0.0)];
        assert_eq!(self_consumption_ratio(&no_sun), 0.0);
        let no_load = vec![sample(datetime!(2024-06-01 12:00:00), 0.0, 1.0)];
        assert_eq!(coverage_ratio(&no_load), 0.0);
        assert_eq!(self_consumption_ratio(&[]), 0.0);
        assert_eq!(coverage_ratio(&[]), 0.0);
    }

    #[test]
    fn report_over_empty_input_is_zero() {
        let array = SolarArray::PeakPower {
            peak_kw: 3.0,
            efficiency: 0.2,
        };
        let report = solar_report(&[], &tariff(), &array, 5000.0);
        assert_eq!(report.production_kwh, 0.0);
        assert_eq!(report.savings, 0.0);
        assert_eq!(report.consumption_peak, Peak::default());
        assert_eq!(report.solar_peak, Peak::default());
        assert_eq!(report.payback_years, None);
    }

    #[test]
    fn report_computes_savings_and_payback() {
        let t0 = datetime!(2024-06-01 12:00:00);
        let joined = vec![EnergySample {
            start_time: t0,
            end_time: t0 + Duration::days(1),
            consumption_kwh: 2.0,
            irradiance: Some(1000.0),
        }];
        let array = SolarArray::PeakPower {
            peak_kw: 5.0,
            efficiency: 0.2,
        };
        // production = 1000 * 5 * 0.2 / 1000 = 1 kWh, all self-consumed at 0.27
        let report = solar_report(&joined, &tariff(), &array, 0.27 * DAYS_PER_YEAR);
        assert!((report.production_kwh - 1.0).abs() < 1e-12);
        assert!((report.savings - 0.27).abs() < 1e-12);
        assert!((report.coverage_ratio - 50.0).abs() < 1e-9);
        assert!((report.self_consumption_ratio - 100.0).abs() < 1e-9);
        let payback = report.payback_years.unwrap();
        assert!((payback - 1.0).abs() < 1e-9);
        assert_eq!(report.solar_peak.at, Some(t0));
    }
}
