use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::optimizer::{SolverOptions, DEFAULT_INSTALLED_CAPACITY_MW, DEFAULT_PROBABILITY_TOLERANCE};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub market: MarketConfig,
    #[validate(nested)]
    pub solver: SolverOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MarketConfig {
    /// Installed wind capacity (MW)
    #[validate(range(exclusive_min = 0.0))]
    pub installed_capacity_mw: f64,
    /// Allowed deviation of the scenario probability sum from 1
    #[validate(range(min = 0.0, max = 0.01))]
    pub probability_tolerance: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            installed_capacity_mw: DEFAULT_INSTALLED_CAPACITY_MW,
            probability_tolerance: DEFAULT_PROBABILITY_TOLERANCE,
        }
    }
}

impl Config {
    /// Built-in defaults, overridden by `config/default.toml`, overridden by
    /// `WINDBID__`-prefixed environment variables (`WINDBID__MARKET__INSTALLED_CAPACITY_MW`).
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("WINDBID__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().context("failed to read configuration")?;
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::SolverBackend;

    fn defaults() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_figment(defaults()).unwrap();
        assert_eq!(config.market.installed_capacity_mw, 25.0);
        assert_eq!(config.market.probability_tolerance, 1e-6);
        assert_eq!(config.solver.backend, SolverBackend::Minilp);
        assert_eq!(config.solver.mip_gap, 0.0);
        assert_eq!(config.solver.threads, 0);
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let toml = r#"
            [market]
            installed_capacity_mw = 40.0

            [solver]
            backend = "cbc"
            threads = 4
            time_limit_seconds = 60
        "#;
        let config = Config::from_figment(defaults().merge(Toml::string(toml))).unwrap();
        assert_eq!(config.market.installed_capacity_mw, 40.0);
        assert_eq!(config.market.probability_tolerance, 1e-6);
        assert_eq!(config.solver.backend, SolverBackend::Cbc);
        assert_eq!(config.solver.threads, 4);
        assert_eq!(config.solver.time_limit_seconds, Some(60));
    }

    #[test]
    fn test_rejects_non_positive_capacity() {
        let toml = "[market]\ninstalled_capacity_mw = -10.0\n";
        assert!(Config::from_figment(defaults().merge(Toml::string(toml))).is_err());
    }

    #[test]
    fn test_rejects_gap_out_of_range() {
        let toml = "[solver]\nmip_gap = 2.0\n";
        assert!(Config::from_figment(defaults().merge(Toml::string(toml))).is_err());
    }
}
