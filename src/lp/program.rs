use serde::{Deserialize, Serialize};
use strum::Display;

use super::{LinearExpr, VarId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Sense {
    #[strum(serialize = "maximize")]
    Maximize,
    #[strum(serialize = "minimize")]
    Minimize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Relation {
    #[strum(serialize = "<=")]
    LessEq,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = ">=")]
    GreaterEq,
}

/// Decision variable with optional bounds (`None` = unbounded on that side)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    pub name: String,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl VariableDef {
    pub fn free(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lower: None,
            upper: None,
        }
    }

    pub fn non_negative(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lower: Some(0.0),
            upper: None,
        }
    }

    pub fn with_upper(mut self, upper: f64) -> Self {
        self.upper = Some(upper);
        self
    }

    fn contains(&self, value: f64, tolerance: f64) -> bool {
        self.lower.map_or(true, |lo| value >= lo - tolerance)
            && self.upper.map_or(true, |hi| value <= hi + tolerance)
    }
}

/// Row `expr (<= | == | >=) rhs`, tagged with the family it belongs to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearConstraint {
    pub family: &'static str,
    pub name: String,
    pub expr: LinearExpr,
    pub relation: Relation,
    pub rhs: f64,
}

impl LinearConstraint {
    pub fn new(
        family: &'static str,
        name: impl Into<String>,
        expr: LinearExpr,
        relation: Relation,
        rhs: f64,
    ) -> Self {
        Self {
            family,
            name: name.into(),
            expr,
            relation,
            rhs,
        }
    }

    /// Signed violation: positive when the row is broken
    pub fn violation(&self, values: &[f64]) -> f64 {
        let lhs = self.expr.evaluate(values);
        match self.relation {
            Relation::LessEq => lhs - self.rhs,
            Relation::GreaterEq => self.rhs - lhs,
            Relation::Equal => (lhs - self.rhs).abs(),
        }
    }

    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        self.violation(values) <= tolerance
    }
}

/// Explicit linear program: variables, rows, objective.
#[derive(Debug, Clone, Serialize)]
pub struct LinearProgram {
    sense: Sense,
    variables: Vec<VariableDef>,
    constraints: Vec<LinearConstraint>,
    objective: LinearExpr,
}

impl LinearProgram {
    pub fn new(sense: Sense) -> Self {
        Self {
            sense,
            variables: Vec::new(),
            constraints: Vec::new(),
            objective: LinearExpr::new(),
        }
    }

    pub fn add_variable(&mut self, def: VariableDef) -> VarId {
        self.variables.push(def);
        VarId(self.variables.len() - 1)
    }

    pub fn add_constraint(&mut self, constraint: LinearConstraint) {
        self.constraints.push(constraint);
    }

    pub fn extend_constraints(&mut self, constraints: impl IntoIterator<Item = LinearConstraint>) {
        self.constraints.extend(constraints);
    }

    pub fn set_objective(&mut self, objective: LinearExpr) {
        self.objective = objective;
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn variables(&self) -> &[VariableDef] {
        &self.variables
    }

    pub fn variable(&self, id: VarId) -> &VariableDef {
        &self.variables[id.index()]
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn constraints_in<'a>(
        &'a self,
        family: &'a str,
    ) -> impl Iterator<Item = &'a LinearConstraint> + 'a {
        self.constraints.iter().filter(move |c| c.family == family)
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Names of every bound or row that `values` breaks by more than `tolerance`
    pub fn violations(&self, values: &[f64], tolerance: f64) -> Vec<String> {
        let mut broken: Vec<String> = self
            .variables
            .iter()
            .zip(values)
            .filter(|(def, value)| !def.contains(**value, tolerance))
            .map(|(def, value)| format!("bound of {} (value {value})", def.name))
            .collect();

        broken.extend(
            self.constraints
                .iter()
                .filter(|c| !c.is_satisfied(values, tolerance))
                .map(|c| format!("{} (violated by {})", c.name, c.violation(values))),
        );

        broken
    }
}
