use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::OptimizationError;

/// Risk attitude of one optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskParameters {
    /// CVaR confidence level, in (0, 1). The tail averaged by CVaR has mass `1 - alpha`.
    pub alpha: f64,
    /// Weight of CVaR against expected profit, in [0, 1]
    pub beta: f64,
}

impl RiskParameters {
    pub fn new(alpha: f64, beta: f64) -> Result<Self, OptimizationError> {
        let params = Self { alpha, beta };
        params.validate()?;
        Ok(params)
    }

    /// Pure expected-profit maximization
    pub fn risk_neutral(alpha: f64) -> Result<Self, OptimizationError> {
        Self::new(alpha, 0.0)
    }

    pub fn validate(&self) -> Result<(), OptimizationError> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 || self.alpha >= 1.0 {
            return Err(OptimizationError::invalid(format!(
                "alpha must lie strictly between 0 and 1, got {}",
                self.alpha
            )));
        }
        if !self.beta.is_finite() || !(0.0..=1.0).contains(&self.beta) {
            return Err(OptimizationError::invalid(format!(
                "beta must lie in [0, 1], got {}",
                self.beta
            )));
        }
        Ok(())
    }

    /// Probability mass of the averaged profit tail
    pub fn tail_mass(&self) -> f64 {
        1.0 - self.alpha
    }
}

/// Parameters behind a solve, attached to solver-side failures for diagnosis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub alpha: f64,
    pub beta: f64,
    pub installed_capacity_mw: f64,
    pub periods: usize,
    pub scenarios: usize,
}

impl fmt::Display for ParameterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "alpha={}, beta={}, capacity={} MW, {} periods x {} scenarios",
            self.alpha, self.beta, self.installed_capacity_mw, self.periods, self.scenarios
        )
    }
}
