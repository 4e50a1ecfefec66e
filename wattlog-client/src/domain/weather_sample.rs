use time::PrimitiveDateTime;

/// Hourly variables requested from the weather provider, in storage column order.
pub const WEATHER_VARIABLES: [&str; 8] = [
    "temperature_2m",
    "precipitation",
    "cloud_cover",
    "shortwave_radiation",
    "direct_radiation",
    "direct_normal_irradiance",
    "diffuse_radiation",
    "wind_speed_10m",
];

/// Weather observation on the same 30-minute grid as `Reading`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeatherSample {
    pub time: PrimitiveDateTime,
    pub temperature_2m: Option<f64>,
    pub precipitation: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub shortwave_radiation: Option<f64>,
    pub direct_radiation: Option<f64>,
    pub direct_normal_irradiance: Option<f64>,
    pub diffuse_radiation: Option<f64>,
    pub wind_speed_10m: Option<f64>,
}

impl WeatherSample {
    pub fn empty(time: PrimitiveDateTime) -> Self {
        Self {
            time,
            temperature_2m: None,
            precipitation: None,
            cloud_cover: None,
            shortwave_radiation: None,
            direct_radiation: None,
            direct_normal_irradiance: None,
            diffuse_radiation: None,
            wind_speed_10m: None,
        }
    }

    /// Value of a variable by its provider name.
    pub fn get(&self, variable: &str) -> Option<f64> {
        match variable {
            "temperature_2m" => self.temperature_2m,
            "precipitation" => self.precipitation,
            "cloud_cover" => self.cloud_cover,
            "shortwave_radiation" => self.shortwave_radiation,
            "direct_radiation" => self.direct_radiation,
            "direct_normal_irradiance" => self.direct_normal_irradiance,
            "diffuse_radiation" => self.diffuse_radiation,
            "wind_speed_10m" => self.wind_speed_10m,
            _ => None,
        }
    }

    /// Sets a variable by its provider name. Unknown names are ignored.
    pub fn set(&mut self, variable: &str, value: Option<f64>) {
        let slot = match variable {
            "temperature_2m" => &mut self.temperature_2m,
            "precipitation" => &mut self.precipitation,
            "cloud_cover" => &mut self.cloud_cover,
            "shortwave_radiation" => &mut self.shortwave_radiation,
            "direct_radiation" => &mut self.direct_radiation,
            "direct_normal_irradiance" => &mut self.direct_normal_irradiance,
            "diffuse_radiation" => &mut self.diffuse_radiation,
            "wind_speed_10m" => &mut self.wind_speed_10m,
            _ => return,
        };
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn get_and_set_cover_every_variable() {
        let mut sample = WeatherSample::empty(datetime!(2024-06-01 12:00:00));
        for (idx, variable) in WEATHER_VARIABLES.iter().enumerate() {
            sample.set(variable, Some(idx as f64));
        }
        for (idx, variable) in WEATHER_VARIABLES.iter().enumerate() {
            assert_eq!(sample.get(variable), Some(idx as f64));
        }
        assert_eq!(sample.get("snowfall"), None);
    }
}
