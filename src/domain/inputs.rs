use itertools::Itertools;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::OptimizationError;

/// Slack allowed when comparing scenario wind against installed capacity
const CAPACITY_SLACK_MW: f64 = 1e-9;

/// Scenario tables for one bidding day.
///
/// Tables indexed by period and scenario are stored `[t, s]`: row = period,
/// column = scenario. All tables share the same period set T and scenario
/// set S.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiddingInputs {
    /// Period labels (T), in bidding order
    pub periods: Vec<String>,

    /// Scenario labels (S)
    pub scenarios: Vec<String>,

    /// Day-ahead price forecast per period (EUR/MWh)
    pub day_ahead_price: Vec<f64>,

    /// Wind production per period and scenario (MW)
    pub wind: Array2<f64>,

    /// Price modifier applied to positive imbalance (surplus)
    pub imbalance_plus_factor: Array2<f64>,

    /// Price modifier applied to negative imbalance (shortfall)
    pub imbalance_minus_factor: Array2<f64>,

    /// Scenario probabilities
    pub probability: Vec<f64>,
}

impl BiddingInputs {
    /// Create inputs from tables already laid out `[t, s]`.
    ///
    /// Only table shapes are checked here; value checks happen in [`BiddingInputs::validate`].
    pub fn new(
        periods: Vec<String>,
        scenarios: Vec<String>,
        day_ahead_price: Vec<f64>,
        wind: Array2<f64>,
        imbalance_plus_factor: Array2<f64>,
        imbalance_minus_factor: Array2<f64>,
        probability: Vec<f64>,
    ) -> Result<Self, OptimizationError> {
        let inputs = Self {
            periods,
            scenarios,
            day_ahead_price,
            wind,
            imbalance_plus_factor,
            imbalance_minus_factor,
            probability,
        };
        inputs.check_shapes()?;
        Ok(inputs)
    }

    /// Create inputs from scenario-major rows (one row per scenario, one column per period),
    /// the layout scenario trees are usually delivered in.
    #[allow(clippy::too_many_arguments)]
    pub fn from_scenario_rows(
        periods: Vec<String>,
        scenarios: Vec<String>,
        day_ahead_price: Vec<f64>,
        wind: &[Vec<f64>],
        imbalance_plus_factor: &[Vec<f64>],
        imbalance_minus_factor: &[Vec<f64>],
        probability: Vec<f64>,
    ) -> Result<Self, OptimizationError> {
        let n_t = periods.len();
        let n_s = scenarios.len();
        let wind = transpose_rows("wind", wind, n_t, n_s)?;
        let plus = transpose_rows("imbalance_plus_factor", imbalance_plus_factor, n_t, n_s)?;
        let minus = transpose_rows("imbalance_minus_factor", imbalance_minus_factor, n_t, n_s)?;

        Self::new(periods, scenarios, day_ahead_price, wind, plus, minus, probability)
    }

    pub fn num_periods(&self) -> usize {
        self.periods.len()
    }

    pub fn num_scenarios(&self) -> usize {
        self.scenarios.len()
    }

    /// Probability-weighted wind production per period (MW)
    pub fn expected_wind(&self) -> Vec<f64> {
        let probability = Array1::from(self.probability.clone());
        self.wind.dot(&probability).to_vec()
    }

    /// Validate every precondition of the bidding model.
    ///
    /// `tolerance` bounds the allowed deviation of the probability sum from 1.
    pub fn validate(&self, installed_capacity_mw: f64, tolerance: f64) -> Result<(), OptimizationError> {
        if !installed_capacity_mw.is_finite() || installed_capacity_mw <= 0.0 {
            return Err(OptimizationError::invalid(format!(
                "installed capacity must be positive and finite, got {installed_capacity_mw}"
            )));
        }

        self.check_shapes()?;

        if let Some(label) = self.periods.iter().duplicates().next() {
            return Err(OptimizationError::invalid(format!("duplicate period label '{label}'")));
        }
        if let Some(label) = self.scenarios.iter().duplicates().next() {
            return Err(OptimizationError::invalid(format!("duplicate scenario label '{label}'")));
        }

        ensure_finite("day_ahead_price", self.day_ahead_price.iter())?;
        ensure_finite("wind", self.wind.iter())?;
        ensure_finite("imbalance_plus_factor", self.imbalance_plus_factor.iter())?;
        ensure_finite("imbalance_minus_factor", self.imbalance_minus_factor.iter())?;
        ensure_finite("probability", self.probability.iter())?;

        if let Some((t, price)) = self.day_ahead_price.iter().find_position(|p| **p < 0.0) {
            return Err(OptimizationError::invalid(format!(
                "day-ahead price for period '{}' is negative: {price}",
                self.periods[t]
            )));
        }

        for ((t, s), &w) in self.wind.indexed_iter() {
            if w < 0.0 || w > installed_capacity_mw + CAPACITY_SLACK_MW {
                return Err(OptimizationError::invalid(format!(
                    "wind for period '{}' scenario '{}' is {w} MW, outside [0, {installed_capacity_mw}]",
                    self.periods[t], self.scenarios[s]
                )));
            }
        }

        if let Some((s, p)) = self.probability.iter().find_position(|p| **p < 0.0) {
            return Err(OptimizationError::invalid(format!(
                "probability of scenario '{}' is negative: {p}",
                self.scenarios[s]
            )));
        }

        let total: f64 = self.probability.iter().sum();
        if (total - 1.0).abs() > tolerance {
            return Err(OptimizationError::invalid(format!(
                "scenario probabilities sum to {total}, expected 1 (tolerance {tolerance})"
            )));
        }

        Ok(())
    }

    fn check_shapes(&self) -> Result<(), OptimizationError> {
        let n_t = self.periods.len();
        let n_s = self.scenarios.len();

        if n_t == 0 {
            return Err(OptimizationError::invalid("period set is empty"));
        }
        if n_s == 0 {
            return Err(OptimizationError::invalid("scenario set is empty"));
        }
        if self.day_ahead_price.len() != n_t {
            return Err(OptimizationError::invalid(format!(
                "day_ahead_price has {} entries for {n_t} periods",
                self.day_ahead_price.len()
            )));
        }
        if self.probability.len() != n_s {
            return Err(OptimizationError::invalid(format!(
                "probability has {} entries for {n_s} scenarios",
                self.probability.len()
            )));
        }

        for (name, table) in [
            ("wind", &self.wind),
            ("imbalance_plus_factor", &self.imbalance_plus_factor),
            ("imbalance_minus_factor", &self.imbalance_minus_factor),
        ] {
            if table.dim() != (n_t, n_s) {
                return Err(OptimizationError::invalid(format!(
                    "{name} table is {:?}, expected ({n_t}, {n_s}) periods x scenarios",
                    table.dim()
                )));
            }
        }

        Ok(())
    }
}

fn transpose_rows(
    name: &str,
    rows: &[Vec<f64>],
    n_t: usize,
    n_s: usize,
) -> Result<Array2<f64>, OptimizationError> {
    if rows.len() != n_s {
        return Err(OptimizationError::invalid(format!(
            "{name} has {} scenario rows for {n_s} scenarios",
            rows.len()
        )));
    }
    if let Some((s, row)) = rows.iter().find_position(|row| row.len() != n_t) {
        return Err(OptimizationError::invalid(format!(
            "{name} row {s} has {} periods, expected {n_t}",
            row.len()
        )));
    }
    Ok(Array2::from_shape_fn((n_t, n_s), |(t, s)| rows[s][t]))
}

fn ensure_finite<'a>(
    name: &str,
    mut values: impl Iterator<Item = &'a f64>,
) -> Result<(), OptimizationError> {
    match values.find(|v| !v.is_finite()) {
        Some(v) => Err(OptimizationError::invalid(format!("{name} contains non-finite value {v}"))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn labels(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{prefix}{i}")).collect()
    }

    fn two_by_two() -> BiddingInputs {
        BiddingInputs::from_scenario_rows(
            labels("t", 2),
            labels("s", 2),
            vec![10.0, 12.0],
            &[vec![8.0, 6.0], vec![2.0, 4.0]],
            &[vec![0.9, 0.9], vec![1.0, 1.0]],
            &[vec![1.2, 1.2], vec![1.0, 1.0]],
            vec![0.5, 0.5],
        )
        .unwrap()
    }

    #[test]
    fn test_scenario_rows_are_transposed() {
        let inputs = two_by_two();
        assert_eq!(inputs.wind, array![[8.0, 2.0], [6.0, 4.0]]);
        assert_eq!(inputs.imbalance_plus_factor[[0, 0]], 0.9);
        assert_eq!(inputs.imbalance_minus_factor[[1, 1]], 1.0);
    }

    #[test]
    fn test_expected_wind() {
        let inputs = two_by_two();
        let expected = inputs.expected_wind();
        assert!((expected[0] - 5.0).abs() < 1e-12);
        assert!((expected[1] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_valid_inputs_pass() {
        assert!(two_by_two().validate(10.0, 1e-6).is_ok());
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let result = BiddingInputs::from_scenario_rows(
            labels("t", 2),
            labels("s", 2),
            vec![10.0, 12.0],
            &[vec![8.0, 6.0, 1.0], vec![2.0, 4.0, 1.0]],
            &[vec![1.0, 1.0], vec![1.0, 1.0]],
            &[vec![1.0, 1.0], vec![1.0, 1.0]],
            vec![0.5, 0.5],
        );
        assert!(matches!(result, Err(OptimizationError::InvalidInput(_))));

        let result = BiddingInputs::new(
            labels("t", 2),
            labels("s", 2),
            vec![10.0],
            Array2::zeros((2, 2)),
            Array2::ones((2, 2)),
            Array2::ones((2, 2)),
            vec![0.5, 0.5],
        );
        assert!(matches!(result, Err(OptimizationError::InvalidInput(_))));
    }

    #[test]
    fn test_probability_sum_checked() {
        let mut inputs = two_by_two();
        inputs.probability = vec![0.5, 0.4];
        let err = inputs.validate(10.0, 1e-6).unwrap_err();
        assert!(err.to_string().contains("sum to"), "{err}");

        inputs.probability = vec![0.5, 0.5 + 1e-8];
        assert!(inputs.validate(10.0, 1e-6).is_ok());
    }

    #[test]
    fn test_negative_values_rejected() {
        let mut inputs = two_by_two();
        inputs.day_ahead_price[1] = -1.0;
        assert!(inputs.validate(10.0, 1e-6).is_err());

        let mut inputs = two_by_two();
        inputs.probability = vec![1.5, -0.5];
        assert!(inputs.validate(10.0, 1e-6).is_err());
    }

    #[test]
    fn test_wind_above_capacity_rejected() {
        let inputs = two_by_two();
        assert!(inputs.validate(7.0, 1e-6).is_err());
        assert!(inputs.validate(8.0, 1e-6).is_ok());
    }

    #[test]
    fn test_non_positive_capacity_rejected() {
        let inputs = two_by_two();
        assert!(inputs.validate(-5.0, 1e-6).is_err());
        assert!(inputs.validate(0.0, 1e-6).is_err());
        assert!(inputs.validate(f64::NAN, 1e-6).is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut inputs = two_by_two();
        inputs.imbalance_plus_factor[[0, 1]] = f64::INFINITY;
        let err = inputs.validate(10.0, 1e-6).unwrap_err();
        assert!(err.to_string().contains("imbalance_plus_factor"), "{err}");
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let mut inputs = two_by_two();
        inputs.scenarios = vec!["s1".to_string(), "s1".to_string()];
        let err = inputs.validate(10.0, 1e-6).unwrap_err();
        assert!(err.to_string().contains("duplicate scenario"), "{err}");
    }
}
