//! Solver adapter
//!
//! Hands an explicit [`LinearProgram`] to an LP solver and reports a status
//! plus primal values. The default implementation goes through `good_lp`:
//! - minilp: pure-Rust simplex, always available (default)
//! - CBC: COIN-OR branch-and-cut, behind the `cbc` feature; receives the gap,
//!   thread and time-limit options

use good_lp::solvers::ResolutionError;
use good_lp::{
    constraint, variable, Constraint, Expression, ProblemVariables, Solution, SolverModel, Variable,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use strum::Display;
use tracing::{debug, warn};
use validator::Validate;

use crate::lp::{LinearConstraint, LinearExpr, LinearProgram, Relation, Sense, VariableDef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SolverBackend {
    /// Pure-Rust simplex (default)
    Minilp,
    /// COIN-OR CBC, requires the `cbc` feature
    Cbc,
}

/// Pass-through solver tuning. Backends ignore options they do not support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SolverOptions {
    pub backend: SolverBackend,
    /// Relative optimality gap
    #[validate(range(min = 0.0, max = 1.0))]
    pub mip_gap: f64,
    /// Worker threads, 0 lets the solver decide
    #[validate(range(max = 256))]
    pub threads: u32,
    pub time_limit_seconds: Option<u64>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            backend: SolverBackend::Minilp,
            mip_gap: 0.0,
            threads: 0,
            time_limit_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    /// Crash, licensing problem, timeout or missing backend
    SolverError,
}

/// Outcome of one solve. `values` is indexed by [`crate::lp::VarId`] and only
/// present when the status is [`SolveStatus::Optimal`].
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    pub status: SolveStatus,
    pub values: Option<Vec<f64>>,
    pub message: Option<String>,
}

impl SolveResult {
    pub fn optimal(values: Vec<f64>) -> Self {
        Self {
            status: SolveStatus::Optimal,
            values: Some(values),
            message: None,
        }
    }

    pub fn failed(status: SolveStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            values: None,
            message: Some(message.into()),
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }
}

/// External LP solver boundary. One call is one blocking, atomic solve.
#[cfg_attr(test, mockall::automock)]
pub trait LpSolver: Send + Sync {
    fn solve(&self, lp: &LinearProgram, options: &SolverOptions) -> SolveResult;
}

/// [`LpSolver`] backed by `good_lp`
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpSolver;

impl LpSolver for GoodLpSolver {
    fn solve(&self, lp: &LinearProgram, options: &SolverOptions) -> SolveResult {
        let started = Instant::now();
        let translated = Translated::from_program(lp);

        let result = match options.backend {
            SolverBackend::Minilp => solve_minilp(translated, options),
            SolverBackend::Cbc => solve_cbc(translated, options),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result.message {
            None => debug!(backend = %options.backend, status = %result.status, elapsed_ms, "LP solved"),
            Some(message) => warn!(
                backend = %options.backend,
                status = %result.status,
                elapsed_ms,
                detail = %message,
                "LP solve did not reach optimality"
            ),
        }
        result
    }
}

/// The LP rebuilt in `good_lp` terms
struct Translated {
    problem: ProblemVariables,
    vars: Vec<Variable>,
    sense: Sense,
    objective: Expression,
    rows: Vec<Constraint>,
}

impl Translated {
    fn from_program(lp: &LinearProgram) -> Self {
        let mut problem = ProblemVariables::new();
        let vars: Vec<Variable> = lp
            .variables()
            .iter()
            .map(|def| problem.add(definition(def)))
            .collect();

        // A constant objective offset does not move the optimum
        let objective = to_expression(lp.objective(), &vars);
        let rows = lp.constraints().iter().map(|c| to_constraint(c, &vars)).collect();

        Self {
            problem,
            vars,
            sense: lp.sense(),
            objective,
            rows,
        }
    }
}

fn definition(def: &VariableDef) -> good_lp::VariableDefinition {
    let mut definition = variable();
    if let Some(lower) = def.lower {
        definition = definition.min(lower);
    }
    if let Some(upper) = def.upper {
        definition = definition.max(upper);
    }
    definition
}

fn to_expression(expr: &LinearExpr, vars: &[Variable]) -> Expression {
    expr.terms()
        .iter()
        .map(|&(var, coef)| vars[var.index()] * coef)
        .sum::<Expression>()
}

fn to_constraint(row: &LinearConstraint, vars: &[Variable]) -> Constraint {
    let lhs = to_expression(&row.expr, vars);
    let rhs = row.rhs - row.expr.constant();
    match row.relation {
        Relation::LessEq => constraint!(lhs <= rhs),
        Relation::Equal => constraint!(lhs == rhs),
        Relation::GreaterEq => constraint!(lhs >= rhs),
    }
}

fn collect_solution<S: Solution>(
    outcome: Result<S, ResolutionError>,
    vars: &[Variable],
) -> SolveResult {
    match outcome {
        Ok(solution) => SolveResult::optimal(vars.iter().map(|&v| solution.value(v)).collect()),
        Err(ResolutionError::Infeasible) => {
            SolveResult::failed(SolveStatus::Infeasible, "problem is infeasible")
        }
        Err(ResolutionError::Unbounded) => {
            SolveResult::failed(SolveStatus::Unbounded, "problem is unbounded")
        }
        Err(other) => SolveResult::failed(SolveStatus::SolverError, other.to_string()),
    }
}

fn solve_minilp(translated: Translated, options: &SolverOptions) -> SolveResult {
    use good_lp::solvers::minilp::minilp;

    if options.threads > 0 || options.time_limit_seconds.is_some() {
        debug!("minilp ignores thread count and time limit");
    }

    let Translated {
        problem,
        vars,
        sense,
        objective,
        rows,
    } = translated;

    let unsolved = match sense {
        Sense::Maximize => problem.maximise(objective),
        Sense::Minimize => problem.minimise(objective),
    };
    let mut model = unsolved.using(minilp);
    for row in rows {
        model = model.with(row);
    }
    collect_solution(model.solve(), &vars)
}

#[cfg(feature = "cbc")]
fn solve_cbc(translated: Translated, options: &SolverOptions) -> SolveResult {
    use good_lp::solvers::coin_cbc::coin_cbc;

    let Translated {
        problem,
        vars,
        sense,
        objective,
        rows,
    } = translated;

    let unsolved = match sense {
        Sense::Maximize => problem.maximise(objective),
        Sense::Minimize => problem.minimise(objective),
    };
    let mut model = unsolved.using(coin_cbc);
    model.set_parameter("log", "0");
    model.set_parameter("ratioGap", &options.mip_gap.to_string());
    if options.threads > 0 {
        model.set_parameter("threads", &options.threads.to_string());
    }
    if let Some(limit) = options.time_limit_seconds {
        model.set_parameter("seconds", &limit.to_string());
    }
    for row in rows {
        model = model.with(row);
    }
    collect_solution(model.solve(), &vars)
}

#[cfg(not(feature = "cbc"))]
fn solve_cbc(_translated: Translated, _options: &SolverOptions) -> SolveResult {
    SolveResult::failed(
        SolveStatus::SolverError,
        "CBC backend requires the 'cbc' feature to be enabled",
    )
}
