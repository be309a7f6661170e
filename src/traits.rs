use crate::sparsity::{dense_gradient, dense_hessians, SparsityPattern};
use anyhow::{bail, Result};

/// Optimization problem as seen by the plugins.
///
/// The fitness vector is laid out as the objective, followed by the
/// equality constraints (satisfied at zero) and then the inequality
/// constraints (satisfied when non-positive):
///
/// ```txt
///     [ f(x), g_1(x) .. g_neq(x), h_1(x) .. h_nic(x) ]
/// ```
///
/// Only `bounds` and `fitness` are mandatory; every other capability has
/// the default of an unconstrained, derivative-free problem.
pub trait Problem {
    /// Lower and upper bounds of the decision vector.
    fn bounds(&self) -> (Vec<f64>, Vec<f64>);

    /// Evaluates the fitness vector at `x`.
    fn fitness(&self, x: &[f64]) -> Result<Vec<f64>>;

    /// Number of decision variables.
    fn dimension(&self) -> usize {
        self.bounds().0.len()
    }

    fn num_objectives(&self) -> usize {
        1
    }

    fn num_equality_constraints(&self) -> usize {
        0
    }

    fn num_inequality_constraints(&self) -> usize {
        0
    }

    fn num_constraints(&self) -> usize {
        self.num_equality_constraints() + self.num_inequality_constraints()
    }

    /// Length of the fitness vector.
    fn fitness_dimension(&self) -> usize {
        self.num_objectives() + self.num_constraints()
    }

    fn has_gradient(&self) -> bool {
        false
    }

    /// Non-zero entries of the fitness Jacobian, in the order of
    /// `gradient_sparsity()`.
    fn gradient(&self, _x: &[f64]) -> Result<Vec<f64>> {
        bail!("the problem does not provide a gradient")
    }

    fn has_gradient_sparsity(&self) -> bool {
        false
    }

    /// Sorted `(row, col)` pairs of the fitness Jacobian. Row 0 is the objective.
    fn gradient_sparsity(&self) -> SparsityPattern {
        dense_gradient(self.fitness_dimension(), self.dimension())
    }

    fn has_hessians(&self) -> bool {
        false
    }

    /// Non-zero lower triangular entries of the Hessian of each fitness
    /// component, in the order of `hessians_sparsity()`.
    fn hessians(&self, _x: &[f64]) -> Result<Vec<Vec<f64>>> {
        bail!("the problem does not provide hessians")
    }

    fn has_hessians_sparsity(&self) -> bool {
        false
    }

    /// One lower triangular pattern per fitness component.
    fn hessians_sparsity(&self) -> Vec<SparsityPattern> {
        dense_hessians(self.fitness_dimension(), self.dimension())
    }

    /// Tolerances used to decide whether each constraint is satisfied.
    fn constraint_tolerances(&self) -> Vec<f64> {
        vec![0.0; self.num_constraints()]
    }

    fn is_stochastic(&self) -> bool {
        false
    }

    fn name(&self) -> String {
        "Unnamed problem".to_string()
    }
}
