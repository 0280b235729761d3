use crate::analytics::{Criteria, DEFAULT_THRESHOLD};
use crate::error::{AcadexError, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;

/// Runtime configuration, read from an optional `config.toml` and `ACADEX_*` environment
/// variables. `DATABASE_URL` (also read from `.env`) takes precedence over `database_url`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    /// The institute every command operates on.
    pub institute: String,
    /// The department every command operates on.
    pub department: String,
    /// The minimum attendance percentage for years without explicit criteria.
    pub default_threshold: u8,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = Config::builder()
            .set_default("database_url", "acadex.db")?
            .set_default("default_threshold", i64::from(DEFAULT_THRESHOLD))?
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("ACADEX"))
            .set_override_option("database_url", env::var("DATABASE_URL").ok())?
            .build()?;

        settings.try_deserialize::<Self>()?.validated()
    }

    /// Rejects settings the rest of the crate cannot work with.
    fn validated(self) -> Result<Self> {
        if self.default_threshold > 100 {
            return Err(AcadexError::InvalidThreshold(self.default_threshold.into()));
        }

        Ok(self)
    }

    /// The criteria to start from before any per-year overrides are applied.
    pub fn base_criteria(&self) -> Criteria {
        Criteria::new(self.default_threshold)
    }
}
