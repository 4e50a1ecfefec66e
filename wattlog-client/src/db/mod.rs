pub mod reading_queries;
pub mod schema;
pub mod settings_queries;
pub mod weather_queries;

pub use reading_queries::{
    all_readings, consumption_days, find_reading, insert_reading, readings_in_range, update_reading_value,
};
pub use schema::{connect, create_tables};
pub use settings_queries::{current_settings, update_settings, UpdateSettingsError};
pub use weather_queries::{insert_weather_samples, weather_days, weather_in_range};
