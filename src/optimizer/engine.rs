use tracing::{info, info_span, warn};
use uuid::Uuid;

use super::{build_model, extract, BiddingResult, GoodLpSolver, LpSolver, SolveStatus, SolverOptions};
use crate::config::Config;
use crate::domain::{BiddingInputs, RiskParameters};
use crate::error::OptimizationError;

/// Default installed wind capacity (MW)
pub const DEFAULT_INSTALLED_CAPACITY_MW: f64 = 25.0;

/// Default tolerance on the scenario probability sum
pub const DEFAULT_PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Risk-averse day-ahead bid optimizer.
///
/// Owns the market configuration and the solver backend. Each call to
/// [`BidOptimizer::optimize`] is independent; nothing is cached between runs.
pub struct BidOptimizer {
    solver: Box<dyn LpSolver>,
    options: SolverOptions,
    installed_capacity_mw: f64,
    probability_tolerance: f64,
}

impl BidOptimizer {
    pub fn new(installed_capacity_mw: f64) -> Self {
        Self {
            solver: Box::new(GoodLpSolver),
            options: SolverOptions::default(),
            installed_capacity_mw,
            probability_tolerance: DEFAULT_PROBABILITY_TOLERANCE,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.market.installed_capacity_mw)
            .with_probability_tolerance(config.market.probability_tolerance)
            .with_options(config.solver.clone())
    }

    pub fn with_solver(mut self, solver: Box<dyn LpSolver>) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_probability_tolerance(mut self, tolerance: f64) -> Self {
        self.probability_tolerance = tolerance;
        self
    }

    pub fn installed_capacity_mw(&self) -> f64 {
        self.installed_capacity_mw
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Build, solve and extract one bidding problem.
    ///
    /// Invalid input is rejected before the solver is invoked. Infeasible,
    /// unbounded and faulted solves are returned as errors carrying the
    /// parameters of the run; no partial result is produced.
    pub fn optimize(
        &self,
        inputs: &BiddingInputs,
        risk: &RiskParameters,
    ) -> Result<BiddingResult, OptimizationError> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "bid_optimization",
            %run_id,
            alpha = risk.alpha,
            beta = risk.beta,
            periods = inputs.num_periods(),
            scenarios = inputs.num_scenarios(),
        );
        let _guard = span.enter();

        let model = build_model(
            inputs,
            risk,
            self.installed_capacity_mw,
            self.probability_tolerance,
        )
        .inspect_err(|e| warn!(error = %e, "rejected bidding inputs"))?;

        let solved = self.solver.solve(&model.lp, &self.options);
        let detail = solved.message.clone().unwrap_or_default();
        match solved.status {
            SolveStatus::Optimal => {}
            SolveStatus::Infeasible => {
                warn!(%detail, "bidding problem infeasible");
                return Err(OptimizationError::Infeasible {
                    snapshot: model.snapshot,
                });
            }
            SolveStatus::Unbounded => {
                warn!(%detail, "bidding problem unbounded");
                return Err(OptimizationError::Unbounded {
                    snapshot: model.snapshot,
                });
            }
            SolveStatus::SolverError => {
                warn!(%detail, "solver fault");
                return Err(OptimizationError::SolverFault {
                    message: detail,
                    snapshot: model.snapshot,
                });
            }
        }

        let mut result = extract(&model, inputs, &solved)
            .inspect_err(|e| warn!(error = %e, "rejected solver output"))?;
        result.run_id = run_id;

        info!(
            expected_profit = result.summary.expected_profit,
            cvar = result.summary.cvar,
            value_at_risk = result.summary.value_at_risk,
            objective = result.summary.objective,
            "bid optimized"
        );
        Ok(result)
    }

    /// Solve once per `beta` at a fixed `alpha`, in the order given.
    ///
    /// Traces the efficient frontier between expected profit and CVaR. Stops at
    /// the first failed run.
    pub fn sweep_beta(
        &self,
        inputs: &BiddingInputs,
        alpha: f64,
        betas: &[f64],
    ) -> Result<Vec<BiddingResult>, OptimizationError> {
        betas
            .iter()
            .map(|&beta| {
                let risk = RiskParameters::new(alpha, beta)?;
                self.optimize(inputs, &risk)
            })
            .collect()
    }
}

impl Default for BidOptimizer {
    fn default() -> Self {
        Self::new(DEFAULT_INSTALLED_CAPACITY_MW)
    }
}

impl std::fmt::Debug for BidOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BidOptimizer")
            .field("options", &self.options)
            .field("installed_capacity_mw", &self.installed_capacity_mw)
            .field("probability_tolerance", &self.probability_tolerance)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::{MockLpSolver, SolveResult};

    fn inputs() -> BiddingInputs {
        BiddingInputs::from_scenario_rows(
            vec!["t1".into(), "t2".into()],
            vec!["s1".into(), "s2".into()],
            vec![10.0, 10.0],
            &[vec![8.0, 8.0], vec![2.0, 2.0]],
            &[vec![1.0; 2], vec![1.0; 2]],
            &[vec![1.0; 2], vec![1.0; 2]],
            vec![0.5, 0.5],
        )
        .unwrap()
    }

    fn risk() -> RiskParameters {
        RiskParameters::new(0.95, 0.5).unwrap()
    }

    fn failing(status: SolveStatus, message: &'static str) -> Box<MockLpSolver> {
        let mut solver = MockLpSolver::new();
        solver
            .expect_solve()
            .times(1)
            .returning(move |_, _| SolveResult::failed(status, message));
        Box::new(solver)
    }

    #[test]
    fn test_infeasible_is_reported_with_snapshot() {
        let optimizer = BidOptimizer::default().with_solver(failing(SolveStatus::Infeasible, "no point"));
        let err = optimizer.optimize(&inputs(), &risk()).unwrap_err();
        match err {
            OptimizationError::Infeasible { snapshot } => {
                assert_eq!(snapshot.alpha, 0.95);
                assert_eq!(snapshot.beta, 0.5);
                assert_eq!(snapshot.installed_capacity_mw, 25.0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unbounded_is_reported() {
        let optimizer = BidOptimizer::default().with_solver(failing(SolveStatus::Unbounded, "ray"));
        assert!(matches!(
            optimizer.optimize(&inputs(), &risk()),
            Err(OptimizationError::Unbounded { .. })
        ));
    }

    #[test]
    fn test_solver_fault_is_retriable() {
        let optimizer = BidOptimizer::default().with_solver(failing(SolveStatus::SolverError, "license expired"));
        let err = optimizer.optimize(&inputs(), &risk()).unwrap_err();
        assert!(err.is_retriable());
        assert!(err.to_string().contains("license expired"));
    }

    #[test]
    fn test_invalid_input_never_reaches_solver() {
        let mut solver = MockLpSolver::new();
        solver.expect_solve().times(0);
        let optimizer = BidOptimizer::new(-10.0).with_solver(Box::new(solver));
        assert!(matches!(
            optimizer.optimize(&inputs(), &risk()),
            Err(OptimizationError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_truncated_solution_is_an_extraction_error() {
        let mut solver = MockLpSolver::new();
        solver
            .expect_solve()
            .returning(|_, _| SolveResult::optimal(vec![0.0; 3]));
        let optimizer = BidOptimizer::default().with_solver(Box::new(solver));
        assert!(matches!(
            optimizer.optimize(&inputs(), &risk()),
            Err(OptimizationError::Extraction { .. })
        ));
    }

    #[test]
    fn test_non_finite_bid_is_an_extraction_error() {
        let mut solver = MockLpSolver::new();
        solver.expect_solve().times(1).returning(|lp, _| {
            let mut values = vec![0.0; lp.num_variables()];
            values[0] = f64::NEG_INFINITY;
            SolveResult::optimal(values)
        });
        let optimizer = BidOptimizer::default().with_solver(Box::new(solver));
        let err = optimizer.optimize(&inputs(), &risk()).unwrap_err();
        assert!(matches!(err, OptimizationError::Extraction { .. }));
        assert!(err.to_string().contains("bid[t1]"), "{err}");
    }

    #[test]
    fn test_infeasible_point_is_an_extraction_error() {
        let mut solver = MockLpSolver::new();
        solver
            .expect_solve()
            .returning(|lp, _| SolveResult::optimal(vec![0.0; lp.num_variables()]));
        let optimizer = BidOptimizer::default().with_solver(Box::new(solver));
        let err = optimizer.optimize(&inputs(), &risk()).unwrap_err();
        assert!(err.to_string().contains("imbalance_definition"), "{err}");
    }

    #[test]
    fn test_risk_neutral_summary_is_finite() {
        let risk = RiskParameters::risk_neutral(0.5).unwrap();
        let result = BidOptimizer::default().optimize(&inputs(), &risk).unwrap();
        let summary = &result.summary;
        assert_eq!(summary.beta, 0.0);
        assert!(summary.objective.is_finite() && summary.cvar.is_finite() && summary.value_at_risk.is_finite());
        assert!((summary.value_at_risk - 40.0).abs() < 1e-6);
        assert!((summary.cvar - 40.0).abs() < 1e-6);
        assert!((summary.objective - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_options_are_passed_to_solver() {
        let options = SolverOptions {
            threads: 4,
            ..SolverOptions::default()
        };
        let mut solver = MockLpSolver::new();
        solver
            .expect_solve()
            .withf(|lp, options| options.threads == 4 && lp.num_variables() > 0)
            .times(1)
            .returning(|_, _| SolveResult::failed(SolveStatus::Infeasible, "stub"));
        let optimizer = BidOptimizer::default()
            .with_options(options)
            .with_solver(Box::new(solver));
        let _ = optimizer.optimize(&inputs(), &risk());
    }

    #[test]
    fn test_solved_instance_through_default_backend() {
        let result = BidOptimizer::default().optimize(&inputs(), &risk()).unwrap();
        // Unit imbalance factors make profit = price * wind regardless of the bid
        assert!((result.summary.expected_profit - 100.0).abs() < 1e-6);
        assert_eq!(result.profit_distribution.len(), 2);
        assert!((result.scenario_profit("s1").unwrap() - 160.0).abs() < 1e-6);
        assert!((result.scenario_profit("s2").unwrap() - 40.0).abs() < 1e-6);
        for (t, bid) in result.bid.iter().enumerate() {
            assert!(*bid >= -1e-6 && *bid <= 25.0 + 1e-6);
            assert!((result.hourly_expected_imbalance[t] - (5.0 - bid)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_sweep_rejects_bad_beta_before_solving() {
        let mut solver = MockLpSolver::new();
        solver.expect_solve().times(0);
        let optimizer = BidOptimizer::default().with_solver(Box::new(solver));
        assert!(matches!(
            optimizer.sweep_beta(&inputs(), 0.9, &[1.5]),
            Err(OptimizationError::InvalidInput(_))
        ));
    }
}
