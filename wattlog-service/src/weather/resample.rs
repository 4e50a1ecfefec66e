use time::{Duration, PrimitiveDateTime};
use wattlog_client::domain::{WeatherSample, WEATHER_VARIABLES};

pub const GRID_STEP: Duration = Duration::minutes(30);

fn lerp(a: Option<f64>, b: Option<f64>, fraction: f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + (b - a) * fraction),
        _ => None,
    }
}

fn interpolate(before: &WeatherSample, after: &WeatherSample, at: PrimitiveDateTime) -> WeatherSample {
    let span = (after.time - before.time).as_seconds_f64();
    let fraction = (at - before.time).as_seconds_f64() / span;

    let mut sample = WeatherSample::empty(at);
    for var in WEATHER_VARIABLES {
        sample.set(var, lerp(before.get(var), after.get(var), fraction));
    }
    sample
}

/// Resample hourly samples onto the 30-minute grid `[first, last)`.
///
/// Grid points that coincide with a knot keep its values; the others are interpolated
/// linearly between the surrounding knots. A variable missing at either knot stays missing.
pub fn to_half_hourly(hourly: &[WeatherSample]) -> Vec<WeatherSample> {
    let mut knots: Vec<&WeatherSample> = hourly.iter().collect();
    knots.sort_by_key(|s| s.time);
    knots.dedup_by_key(|s| s.time);

    let (Some(first), Some(last)) = (knots.first(), knots.last()) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut at = first.time;
    let mut i = 0;
    while at < last.time {
        while knots[i + 1].time <= at {
            i += 1;
        }
        let before = knots[i];
        if before.time == at {
            out.push(before.clone());
        } else {
            out.push(interpolate(before, knots[i + 1], at));
        }
        at += GRID_STEP;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn hour(time: PrimitiveDateTime, temperature: Option<f64>, radiation: Option<f64>) -> WeatherSample {
        let mut s = WeatherSample::empty(time);
        s.temperature_2m = temperature;
        s.shortwave_radiation = radiation;
        s
    }

    #[test]
    fn grid_is_contiguous_and_excludes_last_knot() {
        let hourly = vec![
            hour(datetime!(2024-03-01 00:00:00), Some(10.0), Some(0.0)),
            hour(datetime!(2024-03-01 01:00:00), Some(12.0), Some(100.0)),
            hour(datetime!(2024-03-01 02:00:00), Some(11.0), Some(50.0)),
        ];
        let grid = to_half_hourly(&hourly);

        let times: Vec<_> = grid.iter().map(|s| s.time).collect();
        assert_eq!(
            times,
            vec![
                datetime!(2024-03-01 00:00:00),
                datetime!(2024-03-01 00:30:00),
                datetime!(2024-03-01 01:00:00),
                datetime!(2024-03-01 01:30:00),
            ]
        );
        assert_eq!(grid[1].temperature_2m, Some(11.0));
        assert_eq!(grid[1].shortwave_radiation, Some(50.0));
        assert_eq!(grid[2].temperature_2m, Some(12.0));
        assert_eq!(grid[3].shortwave_radiation, Some(75.0));
    }

    #[test]
    fn missing_neighbour_yields_missing_midpoint() {
        let hourly = vec![
            hour(datetime!(2024-03-01 00:00:00), Some(10.0), None),
            hour(datetime!(2024-03-01 01:00:00), None, Some(100.0)),
        ];
        let grid = to_half_hourly(&hourly);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[1].temperature_2m, None);
        assert_eq!(grid[1].shortwave_radiation, None);
        assert_eq!(grid[1].precipitation, None);
    }

    #[test]
    fn unsorted_input_and_degenerate_sizes() {
        let hourly = vec![
            hour(datetime!(2024-03-01 01:00:00), Some(4.0), None),
            hour(datetime!(2024-03-01 00:00:00), Some(2.0), None),
        ];
        let grid = to_half_hourly(&hourly);
        assert_eq!(grid[1].temperature_2m, Some(3.0));

        assert!(to_half_hourly(&[]).is_empty());
        assert!(to_half_hourly(&hourly[..1]).is_empty());
    }
}
