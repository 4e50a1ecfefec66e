use time::{macros::time, Time};

#[cfg(feature = "serde")]
time::serde::format_description!(hour_minute, Time, "[hour]:[minute]");

/// Tariff and photovoltaic parameters, stored as a single row.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TariffSettings {
    /// Peak-hours price, currency per kWh.
    pub hp_cost: f64,
    /// Off-peak price, currency per kWh.
    pub hc_cost: f64,
    #[cfg_attr(feature = "serde", serde(with = "hour_minute"))]
    pub hp_start: Time,
    #[cfg_attr(feature = "serde", serde(with = "hour_minute"))]
    pub hp_end: Time,
    pub latitude: f64,
    pub longitude: f64,
    /// Installed peak power in watts-crest.
    pub solar_wc: f64,
    /// Panel efficiency in percent.
    pub solar_efficiency: f64,
    /// System losses in percent.
    pub solar_loss: f64,
    /// Installation cost, currency.
    pub solar_cost: f64,
}

impl Default for TariffSettings {
    fn default() -> Self {
        Self {
            hp_cost: 0.20,
            hc_cost: 0.15,
            hp_start: time!(07:00),
            hp_end: time!(23:00),
            latitude: 48.68,
            longitude: 3.22,
            solar_wc: 0.0,
            solar_efficiency: 20.0,
            solar_loss: 14.0,
            solar_cost: 0.0,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be a finite non-negative number, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::Negative { field, value })
    }
}

fn within(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange { field, value, min, max })
    }
}

impl TariffSettings {
    /// Checks every range constraint, reporting the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_negative("hp_cost", self.hp_cost)?;
        non_negative("hc_cost", self.hc_cost)?;
        non_negative("solar_wc", self.solar_wc)?;
        non_negative("solar_cost", self.solar_cost)?;
        within("solar_efficiency", self.solar_efficiency, 0.0, 100.0)?;
        within("solar_loss", self.solar_loss, 0.0, 100.0)?;
        within("latitude", self.latitude, -90.0, 90.0)?;
        within("longitude", self.longitude, -180.0, 180.0)?;
        Ok(())
    }
}
