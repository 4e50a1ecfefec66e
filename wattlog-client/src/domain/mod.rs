pub mod reading;
pub mod settings;
pub mod weather_sample;

pub use reading::Reading;
pub use settings::{TariffSettings, ValidationError};
pub use weather_sample::{WeatherSample, WEATHER_VARIABLES};
