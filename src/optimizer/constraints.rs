//! Constraint families of the bidding model
//!
//! Each family is a pure function from the variable handles and input tables to
//! the rows it contributes. Defining rows (scenario profit, expected profit,
//! CVaR, hourly expected imbalance) only name derived quantities; the
//! operational rows bound the bid and the imbalance split.

use itertools::iproduct;

use super::BiddingVariables;
use crate::domain::{BiddingInputs, RiskParameters};
use crate::lp::{LinearConstraint, LinearExpr, Relation};

pub const BID_CAPACITY: &str = "bid_capacity";
pub const IMBALANCE_DEFINITION: &str = "imbalance_definition";
pub const IMBALANCE_SPLIT: &str = "imbalance_split";
pub const SURPLUS_LIMIT: &str = "surplus_limit";
pub const SHORTFALL_LIMIT: &str = "shortfall_limit";
pub const SCENARIO_PROFIT: &str = "scenario_profit";
pub const EXPECTED_PROFIT: &str = "expected_profit";
pub const CVAR_SHORTFALL: &str = "cvar_shortfall";
pub const CVAR_DEFINITION: &str = "cvar_definition";
pub const HOURLY_EXPECTED_IMBALANCE: &str = "hourly_expected_imbalance";

/// `bid[t] <= capacity` for every period
pub fn bid_capacity(
    vars: &BiddingVariables,
    inputs: &BiddingInputs,
    installed_capacity_mw: f64,
) -> Vec<LinearConstraint> {
    inputs
        .periods
        .iter()
        .zip(&vars.bid)
        .map(|(t, &bid)| {
            LinearConstraint::new(
                BID_CAPACITY,
                format!("bid_capacity[{t}]"),
                LinearExpr::term(bid, 1.0),
                Relation::LessEq,
                installed_capacity_mw,
            )
        })
        .collect()
}

/// `imbalance[t,s] = wind[t,s] - bid[t]`
pub fn imbalance_definition(vars: &BiddingVariables, inputs: &BiddingInputs) -> Vec<LinearConstraint> {
    grid(inputs)
        .map(|(t, s)| {
            LinearConstraint::new(
                IMBALANCE_DEFINITION,
                format!("imbalance_definition[{},{}]", inputs.periods[t], inputs.scenarios[s]),
                LinearExpr::term(vars.imbalance[[t, s]], 1.0).with_term(vars.bid[t], 1.0),
                Relation::Equal,
                inputs.wind[[t, s]],
            )
        })
        .collect()
}

/// `imbalance[t,s] = imbalance_plus[t,s] - imbalance_minus[t,s]`
pub fn imbalance_split(vars: &BiddingVariables, inputs: &BiddingInputs) -> Vec<LinearConstraint> {
    grid(inputs)
        .map(|(t, s)| {
            LinearConstraint::new(
                IMBALANCE_SPLIT,
                format!("imbalance_split[{},{}]", inputs.periods[t], inputs.scenarios[s]),
                LinearExpr::term(vars.imbalance[[t, s]], 1.0)
                    .with_term(vars.imbalance_plus[[t, s]], -1.0)
                    .with_term(vars.imbalance_minus[[t, s]], 1.0),
                Relation::Equal,
                0.0,
            )
        })
        .collect()
}

/// `imbalance_plus[t,s] <= wind[t,s]`
pub fn surplus_limit(vars: &BiddingVariables, inputs: &BiddingInputs) -> Vec<LinearConstraint> {
    grid(inputs)
        .map(|(t, s)| {
            LinearConstraint::new(
                SURPLUS_LIMIT,
                format!("surplus_limit[{},{}]", inputs.periods[t], inputs.scenarios[s]),
                LinearExpr::term(vars.imbalance_plus[[t, s]], 1.0),
                Relation::LessEq,
                inputs.wind[[t, s]],
            )
        })
        .collect()
}

/// `imbalance_minus[t,s] <= capacity`
pub fn shortfall_limit(
    vars: &BiddingVariables,
    inputs: &BiddingInputs,
    installed_capacity_mw: f64,
) -> Vec<LinearConstraint> {
    grid(inputs)
        .map(|(t, s)| {
            LinearConstraint::new(
                SHORTFALL_LIMIT,
                format!("shortfall_limit[{},{}]", inputs.periods[t], inputs.scenarios[s]),
                LinearExpr::term(vars.imbalance_minus[[t, s]], 1.0),
                Relation::LessEq,
                installed_capacity_mw,
            )
        })
        .collect()
}

/// Profit of scenario `s` as an expression over the bid and imbalance variables:
///
/// `sum_t price[t] * (bid[t] + plus_factor[t,s] * plus[t,s] - minus_factor[t,s] * minus[t,s])`
pub fn scenario_revenue(vars: &BiddingVariables, inputs: &BiddingInputs, s: usize) -> LinearExpr {
    let mut expr = LinearExpr::new();
    for (t, &price) in inputs.day_ahead_price.iter().enumerate() {
        expr.add_term(vars.bid[t], price);
        expr.add_term(
            vars.imbalance_plus[[t, s]],
            price * inputs.imbalance_plus_factor[[t, s]],
        );
        expr.add_term(
            vars.imbalance_minus[[t, s]],
            -price * inputs.imbalance_minus_factor[[t, s]],
        );
    }
    expr
}

/// `scenario_profit[s] = scenario_revenue(s)`
pub fn scenario_profit_definition(
    vars: &BiddingVariables,
    inputs: &BiddingInputs,
) -> Vec<LinearConstraint> {
    inputs
        .scenarios
        .iter()
        .enumerate()
        .map(|(s, label)| {
            let mut expr = LinearExpr::term(vars.scenario_profit[s], 1.0);
            expr.add_scaled(&scenario_revenue(vars, inputs, s), -1.0);
            LinearConstraint::new(
                SCENARIO_PROFIT,
                format!("scenario_profit[{label}]"),
                expr,
                Relation::Equal,
                0.0,
            )
        })
        .collect()
}

/// `expected_profit = sum_s probability[s] * scenario_profit[s]`
///
/// Written over the scenario profit variables, so the identity with the
/// distribution holds by construction.
pub fn expected_profit_definition(vars: &BiddingVariables, inputs: &BiddingInputs) -> LinearConstraint {
    let mut expr = LinearExpr::term(vars.expected_profit, 1.0);
    for (&profit, &p) in vars.scenario_profit.iter().zip(&inputs.probability) {
        expr.add_term(profit, -p);
    }
    LinearConstraint::new(EXPECTED_PROFIT, "expected_profit", expr, Relation::Equal, 0.0)
}

/// `value_at_risk - scenario_profit[s] - eta[s] <= 0` (Rockafellar-Uryasev)
pub fn cvar_shortfall(vars: &BiddingVariables, inputs: &BiddingInputs) -> Vec<LinearConstraint> {
    inputs
        .scenarios
        .iter()
        .enumerate()
        .map(|(s, label)| {
            LinearConstraint::new(
                CVAR_SHORTFALL,
                format!("cvar_shortfall[{label}]"),
                LinearExpr::term(vars.scenario_profit[s], -1.0)
                    .with_term(vars.value_at_risk, 1.0)
                    .with_term(vars.eta[s], -1.0),
                Relation::LessEq,
                0.0,
            )
        })
        .collect()
}

/// `cvar = value_at_risk - 1/(1-alpha) * sum_s probability[s] * eta[s]`
pub fn cvar_definition(
    vars: &BiddingVariables,
    inputs: &BiddingInputs,
    risk: &RiskParameters,
) -> LinearConstraint {
    let scale = 1.0 / risk.tail_mass();
    let mut expr = LinearExpr::term(vars.cvar, 1.0).with_term(vars.value_at_risk, -1.0);
    for (&eta, &p) in vars.eta.iter().zip(&inputs.probability) {
        expr.add_term(eta, scale * p);
    }
    LinearConstraint::new(CVAR_DEFINITION, "cvar_definition", expr, Relation::Equal, 0.0)
}

/// `hourly_expected_imbalance[t] = sum_s probability[s] * imbalance[t,s]`
pub fn hourly_expected_imbalance_definition(
    vars: &BiddingVariables,
    inputs: &BiddingInputs,
) -> Vec<LinearConstraint> {
    inputs
        .periods
        .iter()
        .enumerate()
        .map(|(t, label)| {
            let mut expr = LinearExpr::term(vars.hourly_expected_imbalance[t], 1.0);
            for (s, &p) in inputs.probability.iter().enumerate() {
                expr.add_term(vars.imbalance[[t, s]], -p);
            }
            LinearConstraint::new(
                HOURLY_EXPECTED_IMBALANCE,
                format!("hourly_expected_imbalance[{label}]"),
                expr,
                Relation::Equal,
                0.0,
            )
        })
        .collect()
}

fn grid(inputs: &BiddingInputs) -> impl Iterator<Item = (usize, usize)> {
    iproduct!(0..inputs.num_periods(), 0..inputs.num_scenarios())
}
