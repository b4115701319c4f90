use serde::{Deserialize, Serialize};

/// Index of a variable inside its [`super::LinearProgram`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(pub usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Affine expression `sum(coef * var) + constant`.
///
/// Terms are kept in insertion order; a variable may appear more than once and
/// its coefficients add up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expression made of a single `coef * var` term
    pub fn term(var: VarId, coef: f64) -> Self {
        Self {
            terms: vec![(var, coef)],
            constant: 0.0,
        }
    }

    pub fn add_term(&mut self, var: VarId, coef: f64) {
        self.terms.push((var, coef));
    }

    pub fn with_term(mut self, var: VarId, coef: f64) -> Self {
        self.add_term(var, coef);
        self
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// Append every term of `other`, scaled by `factor`
    pub fn add_scaled(&mut self, other: &LinearExpr, factor: f64) {
        self.terms
            .extend(other.terms.iter().map(|&(var, coef)| (var, coef * factor)));
        self.constant += other.constant * factor;
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// Total coefficient of `var`
    pub fn coefficient(&self, var: VarId) -> f64 {
        self.terms
            .iter()
            .filter(|(v, _)| *v == var)
            .map(|(_, coef)| coef)
            .sum()
    }

    /// Value of the expression for a full assignment (indexed by [`VarId`])
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(var, coef)| coef * values[var.index()])
            .sum::<f64>()
            + self.constant
    }
}

impl FromIterator<(VarId, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
            constant: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coefficients_accumulate() {
        let expr = LinearExpr::term(VarId(0), 2.0)
            .with_term(VarId(1), -1.0)
            .with_term(VarId(0), 0.5);
        assert_eq!(expr.coefficient(VarId(0)), 2.5);
        assert_eq!(expr.coefficient(VarId(1)), -1.0);
        assert_eq!(expr.coefficient(VarId(2)), 0.0);
    }

    #[test]
    fn test_evaluate() {
        let mut expr: LinearExpr = [(VarId(0), 3.0), (VarId(2), -2.0)].into_iter().collect();
        expr.add_constant(1.0);
        assert_eq!(expr.evaluate(&[1.0, 100.0, 4.0]), 3.0 - 8.0 + 1.0);
    }

    #[test]
    fn test_add_scaled() {
        let mut base = LinearExpr::term(VarId(0), 1.0);
        let mut other = LinearExpr::term(VarId(1), 2.0);
        other.add_constant(4.0);
        base.add_scaled(&other, 0.5);
        assert_eq!(base.coefficient(VarId(1)), 1.0);
        assert_eq!(base.constant(), 2.0);
    }
}
