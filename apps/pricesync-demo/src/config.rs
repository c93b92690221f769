//! Demo configuration.
//!
//! Configuration is loaded from environment variables and the command line.
//!
//! | Variable                 | Meaning                                   |
//! |--------------------------|-------------------------------------------|
//! | `PRICESYNC_DEFAULTS`     | TOML file with page-wide widget defaults  |
//! | `PRICESYNC_PRICE_TYPE`   | `tax` or `notax`, kind of the main input  |
//! | `PRICESYNC_TAX_RATE`     | Fallback tax rate                         |
//! | `PRICESYNC_URL`          | Remote calculation endpoint               |
//! | `PRICESYNC_PAGE_URL`     | Page address relative endpoints use       |
//!
//! Every command-line argument is an edit typed into the main input.

use std::env;
use std::path::PathBuf;

use pricesync_core::{ConfigOverrides, CoreError, PriceKind};
use thiserror::Error;
use url::Url;

/// Demo configuration.
#[derive(Debug, Clone, Default)]
pub struct DemoConfig {
    /// Page-wide defaults file
    pub defaults_path: Option<PathBuf>,

    /// Address of the simulated page
    pub page_url: Option<Url>,

    /// Options given through the environment
    pub overrides: ConfigOverrides,

    /// Values typed into the main input, in order
    pub edits: Vec<String>,
}

impl DemoConfig {
    /// Load configuration from environment variables and arguments.
    pub fn load() -> Result<Self, ConfigError> {
        let price_type = match env::var("PRICESYNC_PRICE_TYPE") {
            Ok(raw) => Some(
                raw.parse::<PriceKind>()
                    .map_err(|_| ConfigError::InvalidValue("PRICESYNC_PRICE_TYPE".to_string()))?,
            ),
            Err(_) => None,
        };

        let tax_rate = match env::var("PRICESYNC_TAX_RATE") {
            Ok(raw) => Some(
                raw.trim()
                    .parse::<f64>()
                    .map_err(|_| ConfigError::InvalidValue("PRICESYNC_TAX_RATE".to_string()))?,
            ),
            Err(_) => None,
        };

        let page_url = match env::var("PRICESYNC_PAGE_URL") {
            Ok(raw) => Some(
                Url::parse(raw.trim())
                    .map_err(|_| ConfigError::InvalidValue("PRICESYNC_PAGE_URL".to_string()))?,
            ),
            Err(_) => None,
        };

        Ok(DemoConfig {
            page_url,
            defaults_path: env::var("PRICESYNC_DEFAULTS").ok().map(PathBuf::from),
            overrides: ConfigOverrides {
                price_type,
                tax_rate,
                url_calculate: env::var("PRICESYNC_URL").ok(),
                ..Default::default()
            },
            edits: env::args().skip(1).collect(),
        })
    }

    /// Reads the defaults file, if one is configured.
    pub fn page_defaults(&self) -> Result<ConfigOverrides, ConfigError> {
        let Some(path) = &self.defaults_path else {
            return Ok(ConfigOverrides::new());
        };
        let src = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e.to_string()))?;
        Ok(ConfigOverrides::from_toml_str(&src)?)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Cannot read {0}: {1}")]
    Read(String, String),

    #[error(transparent)]
    Defaults(#[from] CoreError),
}
