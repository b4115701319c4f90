use ndarray::Array2;

use crate::domain::BiddingInputs;
use crate::lp::{LinearProgram, VarId, VariableDef};

/// Handles to every decision variable of the bidding model.
///
/// Per-(period, scenario) variables are stored `[t, s]` like the input tables.
#[derive(Debug, Clone)]
pub struct BiddingVariables {
    /// Day-ahead bid per period (MW)
    pub bid: Vec<VarId>,
    /// Signed imbalance `wind - bid`
    pub imbalance: Array2<VarId>,
    /// Positive part of the imbalance (surplus)
    pub imbalance_plus: Array2<VarId>,
    /// Negative part of the imbalance (shortfall)
    pub imbalance_minus: Array2<VarId>,
    /// Realized profit per scenario
    pub scenario_profit: Vec<VarId>,
    /// Auxiliary threshold; equals VaR at optimality
    pub value_at_risk: VarId,
    /// Shortfall of each scenario's profit below the threshold
    pub eta: Vec<VarId>,
    pub cvar: VarId,
    pub expected_profit: VarId,
    pub hourly_expected_imbalance: Vec<VarId>,
}

impl BiddingVariables {
    /// Declare all variables in `lp`, with their domains.
    ///
    /// Only sign restrictions are set here; capacity and wind limits are explicit rows
    /// (see [`super::constraints`]).
    pub fn declare(lp: &mut LinearProgram, inputs: &BiddingInputs) -> Self {
        let periods = &inputs.periods;
        let scenarios = &inputs.scenarios;
        let shape = (periods.len(), scenarios.len());

        let bid = periods
            .iter()
            .map(|t| lp.add_variable(VariableDef::non_negative(format!("bid[{t}]"))))
            .collect();

        let imbalance = declare_grid(lp, inputs, shape, |t, s| {
            VariableDef::free(format!("imbalance[{t},{s}]"))
        });
        let imbalance_plus = declare_grid(lp, inputs, shape, |t, s| {
            VariableDef::non_negative(format!("imbalance_plus[{t},{s}]"))
        });
        let imbalance_minus = declare_grid(lp, inputs, shape, |t, s| {
            VariableDef::non_negative(format!("imbalance_minus[{t},{s}]"))
        });

        let scenario_profit = scenarios
            .iter()
            .map(|s| lp.add_variable(VariableDef::free(format!("scenario_profit[{s}]"))))
            .collect();

        let value_at_risk = lp.add_variable(VariableDef::free("value_at_risk"));
        let eta = scenarios
            .iter()
            .map(|s| lp.add_variable(VariableDef::non_negative(format!("eta[{s}]"))))
            .collect();
        let cvar = lp.add_variable(VariableDef::free("cvar"));
        let expected_profit = lp.add_variable(VariableDef::free("expected_profit"));

        let hourly_expected_imbalance = periods
            .iter()
            .map(|t| lp.add_variable(VariableDef::free(format!("hourly_expected_imbalance[{t}]"))))
            .collect();

        Self {
            bid,
            imbalance,
            imbalance_plus,
            imbalance_minus,
            scenario_profit,
            value_at_risk,
            eta,
            cvar,
            expected_profit,
            hourly_expected_imbalance,
        }
    }

    /// Variables whose values end up in the result bundle
    pub fn reported(&self) -> impl Iterator<Item = VarId> + '_ {
        self.bid
            .iter()
            .chain(self.imbalance.iter())
            .chain(self.imbalance_plus.iter())
            .chain(self.imbalance_minus.iter())
            .chain(&self.scenario_profit)
            .chain(&self.hourly_expected_imbalance)
            .chain(std::iter::once(&self.expected_profit))
            .copied()
    }

    /// Rockafellar-Uryasev auxiliaries: threshold, shortfalls and CVaR
    pub fn risk_measures(&self) -> impl Iterator<Item = VarId> + '_ {
        std::iter::once(&self.value_at_risk)
            .chain(&self.eta)
            .chain(std::iter::once(&self.cvar))
            .copied()
    }
}

fn declare_grid(
    lp: &mut LinearProgram,
    inputs: &BiddingInputs,
    shape: (usize, usize),
    def: impl Fn(&str, &str) -> VariableDef,
) -> Array2<VarId> {
    Array2::from_shape_fn(shape, |(t, s)| {
        lp.add_variable(def(&inputs.periods[t], &inputs.scenarios[s]))
    })
}
