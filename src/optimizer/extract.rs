//! Result extraction
//!
//! Turns the primal values of an optimal solve into the result bundle handed to
//! reporting: summary, bid, profit distribution, imbalance volumes and hourly
//! expected imbalance.

use chrono::{DateTime, Utc};
use ndarray::Array2;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{BiddingModel, SolveResult, SolveStatus};
use crate::domain::BiddingInputs;
use crate::error::OptimizationError;
use crate::lp::VarId;

/// Slack used when locating the tail boundary on the cumulative curve
const CUMULATIVE_SLACK: f64 = 1e-9;

/// Relative tolerance on bounds and rows of a returned solution
const SOLUTION_TOLERANCE: f64 = 1e-7;

/// Headline numbers of a solve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub alpha: f64,
    pub beta: f64,
    pub expected_profit: f64,
    pub cvar: f64,
    pub value_at_risk: f64,
    /// `(1 - beta) * expected_profit + beta * cvar`
    pub objective: f64,
}

impl fmt::Display for RiskSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Solution report")?;
        writeln!(f, "alpha            {:>14.4}", self.alpha)?;
        writeln!(f, "beta             {:>14.4}", self.beta)?;
        writeln!(f, "expected_profit  {:>14.2}", self.expected_profit)?;
        writeln!(f, "CVaR             {:>14.2}", self.cvar)?;
        writeln!(f, "VaR              {:>14.2}", self.value_at_risk)?;
        write!(f, "objective        {:>14.2}", self.objective)
    }
}

/// One scenario on the empirical profit curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitOutcome {
    pub scenario: String,
    pub profit: f64,
    pub probability: f64,
    pub cumulative_probability: f64,
}

/// Scenario profits sorted ascending, with cumulative probability.
///
/// Ties keep the original scenario order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitDistribution {
    outcomes: Vec<ProfitOutcome>,
}

impl ProfitDistribution {
    /// Build the curve from `(scenario, profit, probability)` triples in scenario order
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = (String, f64, f64)>) -> Self {
        let mut sorted: Vec<(String, f64, f64)> = outcomes.into_iter().collect();
        // sort_by_key is stable
        sorted.sort_by_key(|(_, profit, _)| OrderedFloat(*profit));

        let outcomes = sorted
            .into_iter()
            .scan(0.0, |cumulative, (scenario, profit, probability)| {
                *cumulative += probability;
                Some(ProfitOutcome {
                    scenario,
                    profit,
                    probability,
                    cumulative_probability: *cumulative,
                })
            })
            .collect();

        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[ProfitOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn expected_profit(&self) -> f64 {
        self.outcomes.iter().map(|o| o.probability * o.profit).sum()
    }

    /// Lowest profit whose cumulative probability reaches the tail mass `1 - alpha`
    pub fn value_at_risk(&self, alpha: f64) -> Option<f64> {
        let tail = 1.0 - alpha;
        self.outcomes
            .iter()
            .find(|o| o.cumulative_probability >= tail - CUMULATIVE_SLACK)
            .map(|o| o.profit)
    }

    /// Probability-weighted mean of the worst `1 - alpha` of the distribution.
    ///
    /// `None` when the tail is empty or carries no probability.
    pub fn conditional_value_at_risk(&self, alpha: f64) -> Option<f64> {
        let tail = 1.0 - alpha;
        if self.outcomes.is_empty() || tail <= 0.0 {
            return None;
        }

        let mut remaining = tail;
        let mut weighted = 0.0;
        for outcome in &self.outcomes {
            let taken = outcome.probability.min(remaining);
            weighted += taken * outcome.profit;
            remaining -= taken;
            if remaining <= CUMULATIVE_SLACK {
                break;
            }
        }

        let covered = tail - remaining.max(0.0);
        (covered > 0.0).then(|| weighted / covered)
    }
}

/// Everything a single optimization run produces. Read-only once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiddingResult {
    pub run_id: Uuid,
    pub solved_at: DateTime<Utc>,
    pub summary: RiskSummary,
    pub periods: Vec<String>,
    pub scenarios: Vec<String>,
    /// Day-ahead bid per period (MW)
    pub bid: Vec<f64>,
    pub profit_distribution: ProfitDistribution,
    /// Signed imbalance `[t, s]` (MW)
    pub imbalance_volume: Array2<f64>,
    /// Positive imbalance part `[t, s]` (MW)
    pub surplus_volume: Array2<f64>,
    /// Negative imbalance part `[t, s]` (MW)
    pub shortfall_volume: Array2<f64>,
    pub hourly_expected_imbalance: Vec<f64>,
    /// Scenario probabilities, in scenario order
    pub probability: Vec<f64>,
}

impl BiddingResult {
    /// Bid for a period label
    pub fn bid_for(&self, period: &str) -> Option<f64> {
        self.periods
            .iter()
            .position(|p| p == period)
            .map(|t| self.bid[t])
    }

    /// Profit realized in a scenario
    pub fn scenario_profit(&self, scenario: &str) -> Option<f64> {
        self.profit_distribution
            .outcomes()
            .iter()
            .find(|o| o.scenario == scenario)
            .map(|o| o.profit)
    }
}

/// Read an optimal solve back into a [`BiddingResult`].
///
/// Any status other than optimal is a caller error: there is nothing to extract
/// and no defaults are substituted. The solution itself is checked too: every
/// reported value must be finite and every bound and row must hold.
///
/// With `beta = 0` the VaR, shortfall and CVaR variables carry no objective
/// weight and the solver may leave them anywhere. They are then settled from
/// the realized scenario profits before the check, so the summary always
/// reports the risk measures of the chosen bid.
pub fn extract(
    model: &BiddingModel,
    inputs: &BiddingInputs,
    result: &SolveResult,
) -> Result<BiddingResult, OptimizationError> {
    let values = match (&result.status, &result.values) {
        (SolveStatus::Optimal, Some(values)) => values,
        (SolveStatus::Optimal, None) => {
            return Err(OptimizationError::Extraction {
                status: result.status,
                reason: "optimal status without primal values".to_string(),
            })
        }
        (status, _) => {
            return Err(OptimizationError::Extraction {
                status: *status,
                reason: result
                    .message
                    .clone()
                    .unwrap_or_else(|| "solve was not optimal".to_string()),
            })
        }
    };

    if values.len() != model.lp.num_variables() {
        return Err(OptimizationError::Extraction {
            status: result.status,
            reason: format!(
                "solution has {} values for {} variables",
                values.len(),
                model.lp.num_variables()
            ),
        });
    }

    let vars = &model.variables;
    let risk_weighted = model.risk.beta > 0.0;

    let checked: Vec<VarId> = if risk_weighted {
        vars.reported().chain(vars.risk_measures()).collect()
    } else {
        vars.reported().collect()
    };
    if let Some(id) = checked.into_iter().find(|id| !values[id.index()].is_finite()) {
        return Err(OptimizationError::Extraction {
            status: result.status,
            reason: format!(
                "{} is not finite ({})",
                model.lp.variable(id).name,
                values[id.index()]
            ),
        });
    }

    let profit_distribution = ProfitDistribution::from_outcomes(
        inputs
            .scenarios
            .iter()
            .zip(&vars.scenario_profit)
            .zip(&inputs.probability)
            .map(|((scenario, &profit), &p)| (scenario.clone(), values[profit.index()], p)),
    );

    let mut values = values.clone();
    if !risk_weighted {
        settle_risk_measures(model, inputs, &profit_distribution, &mut values).ok_or_else(|| {
            OptimizationError::Extraction {
                status: result.status,
                reason: "profit distribution has no value at risk".to_string(),
            }
        })?;
    }

    let broken = model.lp.violations(&values, solution_tolerance(&values));
    if let Some(first) = broken.first() {
        return Err(OptimizationError::Extraction {
            status: result.status,
            reason: format!("solution breaks {} bounds or rows, first {first}", broken.len()),
        });
    }

    let value = |id: VarId| values[id.index()];
    let grid = |ids: &Array2<VarId>| ids.mapv(value);

    let (expected_profit, cvar) = (value(vars.expected_profit), value(vars.cvar));
    let summary = RiskSummary {
        alpha: model.risk.alpha,
        beta: model.risk.beta,
        expected_profit,
        cvar,
        value_at_risk: value(vars.value_at_risk),
        objective: (1.0 - model.risk.beta) * expected_profit + model.risk.beta * cvar,
    };

    Ok(BiddingResult {
        run_id: Uuid::new_v4(),
        solved_at: Utc::now(),
        summary,
        periods: inputs.periods.clone(),
        scenarios: inputs.scenarios.clone(),
        bid: vars.bid.iter().map(|&id| value(id)).collect(),
        profit_distribution,
        imbalance_volume: grid(&vars.imbalance),
        surplus_volume: grid(&vars.imbalance_plus),
        shortfall_volume: grid(&vars.imbalance_minus),
        hourly_expected_imbalance: vars
            .hourly_expected_imbalance
            .iter()
            .map(|&id| value(id))
            .collect(),
        probability: inputs.probability.clone(),
    })
}

/// Set VaR, shortfalls and CVaR to their optimal values for the realized profits:
/// threshold at the `1 - alpha` quantile, `eta[s] = max(0, VaR - profit[s])`.
fn settle_risk_measures(
    model: &BiddingModel,
    inputs: &BiddingInputs,
    distribution: &ProfitDistribution,
    values: &mut [f64],
) -> Option<()> {
    let vars = &model.variables;
    let threshold = distribution.value_at_risk(model.risk.alpha)?;

    let mut expected_shortfall = 0.0;
    for ((&eta, &profit), &p) in vars.eta.iter().zip(&vars.scenario_profit).zip(&inputs.probability) {
        let shortfall = (threshold - values[profit.index()]).max(0.0);
        values[eta.index()] = shortfall;
        expected_shortfall += p * shortfall;
    }

    values[vars.value_at_risk.index()] = threshold;
    values[vars.cvar.index()] = threshold - expected_shortfall / model.risk.tail_mass();
    Some(())
}

/// Absolute tolerance for the solution check, scaled to the largest magnitude present
fn solution_tolerance(values: &[f64]) -> f64 {
    let scale = values
        .iter()
        .filter(|v| v.is_finite())
        .fold(1.0_f64, |acc, v| acc.max(v.abs()));
    SOLUTION_TOLERANCE * scale
}
