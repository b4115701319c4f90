use tracing::debug;

use super::constraints;
use super::BiddingVariables;
use crate::domain::{BiddingInputs, ParameterSnapshot, RiskParameters};
use crate::error::OptimizationError;
use crate::lp::{LinearExpr, LinearProgram, Sense};

/// LP instance for one bidding run, together with the handles needed to read
/// its solution back.
#[derive(Debug, Clone)]
pub struct BiddingModel {
    pub lp: LinearProgram,
    pub variables: BiddingVariables,
    pub risk: RiskParameters,
    pub snapshot: ParameterSnapshot,
}

/// Build the risk-averse bidding LP.
///
/// Inputs and risk parameters are validated first; nothing is allocated for an
/// invalid call. The objective is `(1 - beta) * expected_profit + beta * cvar`,
/// maximized.
///
/// The plus/minus imbalance split is only tight when over-supply is paid less
/// than under-supply costs (`imbalance_plus_factor < imbalance_minus_factor`,
/// positive price and probability). Under that market rule the optimum never
/// carries surplus and shortfall at once; the LP itself does not forbid it.
pub fn build_model(
    inputs: &BiddingInputs,
    risk: &RiskParameters,
    installed_capacity_mw: f64,
    probability_tolerance: f64,
) -> Result<BiddingModel, OptimizationError> {
    risk.validate()?;
    inputs.validate(installed_capacity_mw, probability_tolerance)?;

    let mut lp = LinearProgram::new(Sense::Maximize);
    let vars = BiddingVariables::declare(&mut lp, inputs);

    lp.extend_constraints(constraints::bid_capacity(&vars, inputs, installed_capacity_mw));
    lp.extend_constraints(constraints::imbalance_definition(&vars, inputs));
    lp.extend_constraints(constraints::imbalance_split(&vars, inputs));
    lp.extend_constraints(constraints::surplus_limit(&vars, inputs));
    lp.extend_constraints(constraints::shortfall_limit(&vars, inputs, installed_capacity_mw));

    lp.extend_constraints(constraints::scenario_profit_definition(&vars, inputs));
    lp.add_constraint(constraints::expected_profit_definition(&vars, inputs));
    lp.extend_constraints(constraints::cvar_shortfall(&vars, inputs));
    lp.add_constraint(constraints::cvar_definition(&vars, inputs, risk));
    lp.extend_constraints(constraints::hourly_expected_imbalance_definition(&vars, inputs));

    lp.set_objective(risk_objective(&vars, risk));

    debug!(
        periods = inputs.num_periods(),
        scenarios = inputs.num_scenarios(),
        variables = lp.num_variables(),
        constraints = lp.num_constraints(),
        "built bidding model"
    );

    Ok(BiddingModel {
        lp,
        variables: vars,
        risk: *risk,
        snapshot: ParameterSnapshot {
            alpha: risk.alpha,
            beta: risk.beta,
            installed_capacity_mw,
            periods: inputs.num_periods(),
            scenarios: inputs.num_scenarios(),
        },
    })
}

/// `(1 - beta) * expected_profit + beta * cvar`
pub fn risk_objective(vars: &BiddingVariables, risk: &RiskParameters) -> LinearExpr {
    LinearExpr::term(vars.expected_profit, 1.0 - risk.beta).with_term(vars.cvar, risk.beta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::constraints::*;

    fn inputs() -> BiddingInputs {
        BiddingInputs::from_scenario_rows(
            vec!["t1".into(), "t2".into(), "t3".into()],
            vec!["s1".into(), "s2".into()],
            vec![40.0, 50.0, 60.0],
            &[vec![10.0, 12.0, 14.0], vec![3.0, 2.0, 1.0]],
            &[vec![0.8; 3], vec![0.9; 3]],
            &[vec![1.2; 3], vec![1.1; 3]],
            vec![0.4, 0.6],
        )
        .unwrap()
    }

    #[test]
    fn test_all_families_present() {
        let risk = RiskParameters::new(0.9, 0.3).unwrap();
        let model = build_model(&inputs(), &risk, 25.0, 1e-6).unwrap();
        let lp = &model.lp;

        assert_eq!(lp.sense(), Sense::Maximize);
        assert_eq!(lp.constraints_in(BID_CAPACITY).count(), 3);
        for family in [IMBALANCE_DEFINITION, IMBALANCE_SPLIT, SURPLUS_LIMIT, SHORTFALL_LIMIT] {
            assert_eq!(lp.constraints_in(family).count(), 6, "{family}");
        }
        assert_eq!(lp.constraints_in(SCENARIO_PROFIT).count(), 2);
        assert_eq!(lp.constraints_in(EXPECTED_PROFIT).count(), 1);
        assert_eq!(lp.constraints_in(CVAR_SHORTFALL).count(), 2);
        assert_eq!(lp.constraints_in(CVAR_DEFINITION).count(), 1);
        assert_eq!(lp.constraints_in(HOURLY_EXPECTED_IMBALANCE).count(), 3);
        assert_eq!(lp.num_constraints(), 3 + 4 * 6 + 2 + 1 + 2 + 1 + 3);
    }

    #[test]
    fn test_objective_weights() {
        let risk = RiskParameters::new(0.95, 0.25).unwrap();
        let model = build_model(&inputs(), &risk, 25.0, 1e-6).unwrap();
        let objective = model.lp.objective();

        assert_eq!(objective.coefficient(model.variables.expected_profit), 0.75);
        assert_eq!(objective.coefficient(model.variables.cvar), 0.25);
        assert_eq!(objective.coefficient(model.variables.bid[0]), 0.0);
    }

    #[test]
    fn test_snapshot_records_parameters() {
        let risk = RiskParameters::new(0.95, 0.9).unwrap();
        let model = build_model(&inputs(), &risk, 25.0, 1e-6).unwrap();
        assert_eq!(model.snapshot.alpha, 0.95);
        assert_eq!(model.snapshot.beta, 0.9);
        assert_eq!(model.snapshot.installed_capacity_mw, 25.0);
        assert_eq!(model.snapshot.periods, 3);
        assert_eq!(model.snapshot.scenarios, 2);
    }

    #[test]
    fn test_invalid_inputs_fail_before_building() {
        let risk = RiskParameters { alpha: 1.5, beta: 0.5 };
        assert!(matches!(
            build_model(&inputs(), &risk, 25.0, 1e-6),
            Err(OptimizationError::InvalidInput(_))
        ));

        let risk = RiskParameters::new(0.9, 0.5).unwrap();
        assert!(matches!(
            build_model(&inputs(), &risk, -10.0, 1e-6),
            Err(OptimizationError::InvalidInput(_))
        ));

        let mut bad = inputs();
        bad.probability = vec![0.3, 0.3];
        assert!(matches!(
            build_model(&bad, &risk, 25.0, 1e-6),
            Err(OptimizationError::InvalidInput(_))
        ));
    }
}
