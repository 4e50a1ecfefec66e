use serde::Deserialize;
use std::{fs, io::ErrorKind};

pub const CONFIG_ENV: &str = "WATTLOG_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "wattlog.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://wattlog.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Layout of meter exports.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Zero-based worksheet index.
    pub sheet_index: usize,
    /// Rows above the header row.
    pub skip_rows: usize,
    pub csv_delimiter: char,
}

impl ImportConfig {
    /// The CSV delimiter as a single byte. Only ASCII delimiters are supported.
    pub fn delimiter_byte(&self) -> anyhow::Result<u8> {
        anyhow::ensure!(
            self.csv_delimiter.is_ascii(),
            "import.csv_delimiter must be an ASCII character, got '{}'",
            self.csv_delimiter
        );
        Ok(self.csv_delimiter as u8)
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            sheet_index: 1,
            skip_rows: 15,
            csv_delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    pub timezone: String,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://archive-api.open-meteo.com/v1/archive".to_string(),
            timezone: "Europe/Paris".to_string(),
            max_retries: 3,
            retry_backoff_ms: 500,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub import: ImportConfig,
    pub weather: WeatherConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load from `$WATTLOG_CONFIG`, or `wattlog.toml` when unset.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_path(&path)
    }

    /// A missing file yields the defaults; an unreadable or invalid one is an error.
    pub fn from_path(path: &str) -> anyhow::Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(path, "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(anyhow::Error::new(e).context(format!("reading config {path}"))),
        };
        Self::from_toml(&contents).map_err(|e| e.context(format!("parsing config {path}")))
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.import.delimiter_byte()?;
        Ok(cfg)
    }
}
