//! Store configuration

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

pub const DEFAULT_MAX_AGE_SECS: u64 = 3600;
pub const DEFAULT_SWEEP_INTERVAL: u64 = 100;
pub const DEFAULT_MAX_ID_ATTEMPTS: u32 = 1000;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Sessions untouched for this long are evicted on the next sweep.
    pub max_age_secs: u64,
    /// A sweep runs on every n-th `select` call.
    pub sweep_interval: u64,
    /// Upper bound on identifier generation attempts per `create`.
    pub max_id_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_age_secs: DEFAULT_MAX_AGE_SECS,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_id_attempts: DEFAULT_MAX_ID_ATTEMPTS,
        }
    }
}

impl StoreConfig {
    /// Load from defaults, optional `config/session` file and `SESSION__*` env vars.
    pub fn load() -> Result<Self, SessionError> {
        let config = Config::builder()
            .set_default("max_age_secs", DEFAULT_MAX_AGE_SECS as i64)?
            .set_default("sweep_interval", DEFAULT_SWEEP_INTERVAL as i64)?
            .set_default("max_id_attempts", DEFAULT_MAX_ID_ATTEMPTS as i64)?
            .add_source(File::with_name("config/session").required(false))
            .add_source(
                Environment::with_prefix("SESSION")
                    .prefix_separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let cfg: StoreConfig = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.max_age_secs == 0 {
            return Err(config::ConfigError::Message("max_age_secs must be greater than 0".into()).into());
        }
        if self.sweep_interval == 0 {
            return Err(config::ConfigError::Message("sweep_interval must be greater than 0".into()).into());
        }
        if self.max_id_attempts == 0 {
            return Err(config::ConfigError::Message("max_id_attempts must be greater than 0".into()).into());
        }
        Ok(())
    }

    pub fn max_age_ms(&self) -> u64 {
        self.max_age_secs.saturating_mul(1000)
    }

    pub fn with_max_age_secs(mut self, secs: u64) -> Self {
        self.max_age_secs = secs;
        self
    }

    pub fn with_sweep_interval(mut self, interval: u64) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_max_id_attempts(mut self, attempts: u32) -> Self {
        self.max_id_attempts = attempts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.max_age_secs, 3600);
        assert_eq!(cfg.sweep_interval, 100);
        assert_eq!(cfg.max_id_attempts, 1000);
        assert_eq!(cfg.max_age_ms(), 3_600_000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(StoreConfig::default().with_sweep_interval(0).validate().is_err());
        assert!(StoreConfig::default().with_max_age_secs(0).validate().is_err());
        assert!(StoreConfig::default().with_max_id_attempts(0).validate().is_err());
    }

    #[test]
    fn test_load_uses_defaults_without_sources() {
        let cfg = StoreConfig::load().unwrap();
        assert!(cfg.sweep_interval > 0);
        assert!(cfg.max_age_secs > 0);
    }
}
