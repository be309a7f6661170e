use crate::{Problem, SparsityPattern};
use anyhow::{bail, Result};
use std::cell::Cell;

/// Convex problem with one equality and three inequality constraints.
///
///     min  x1^2 + 2 x2^2 - x3
///     s.t. x1^2 + x3^2 + x1 x3 = 1
///          x3 - x4 <= -1
///          x2 + x4 <= 5
///          x2 + x4 >= 2.5
///
/// The optimum is at (0, 0.5, 1, 2) with f = -0.5.
pub struct ConvexProblem {
    pub c_tol: f64,
}

impl Default for ConvexProblem {
    fn default() -> Self {
        Self { c_tol: 0.0 }
    }
}

impl Problem for ConvexProblem {
    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![-0.5, -2.0, 0.0, -2.0], vec![5.0, 5.0, 2.0, 2.0])
    }

    fn fitness(&self, x: &[f64]) -> Result<Vec<f64>> {
        Ok(vec![
            x[0] * x[0] + 2.0 * x[1] * x[1] - x[2],
            x[0] * x[0] + x[2] * x[2] + x[0] * x[2] - 1.0,
            x[2] - x[3] + 1.0,
            x[1] + x[3] - 5.0,
            -(x[1] + x[3] - 2.5),
        ])
    }

    fn num_equality_constraints(&self) -> usize {
        1
    }

    fn num_inequality_constraints(&self) -> usize {
        3
    }

    fn has_gradient(&self) -> bool {
        true
    }

    fn gradient(&self, x: &[f64]) -> Result<Vec<f64>> {
        Ok(vec![
            2.0 * x[0],
            4.0 * x[1],
            -1.0,
            2.0 * x[0] + x[2],
            2.0 * x[2] + x[0],
            1.0,
            -1.0,
            1.0,
            1.0,
            -1.0,
            -1.0,
        ])
    }

    fn has_gradient_sparsity(&self) -> bool {
        true
    }

    fn gradient_sparsity(&self) -> SparsityPattern {
        vec![
            (0, 0),
            (0, 1),
            (0, 2),
            (1, 0),
            (1, 2),
            (2, 2),
            (2, 3),
            (3, 1),
            (3, 3),
            (4, 1),
            (4, 3),
        ]
    }

    fn has_hessians(&self) -> bool {
        true
    }

    fn hessians(&self, _x: &[f64]) -> Result<Vec<Vec<f64>>> {
        Ok(vec![
            vec![2.0, 4.0],
            vec![2.0, 1.0, 2.0],
            vec![],
            vec![],
            vec![],
        ])
    }

    fn has_hessians_sparsity(&self) -> bool {
        true
    }

    fn hessians_sparsity(&self) -> Vec<SparsityPattern> {
        vec![
            vec![(0, 0), (1, 1)],
            vec![(0, 0), (2, 0), (2, 2)],
            vec![],
            vec![],
            vec![],
        ]
    }

    fn constraint_tolerances(&self) -> Vec<f64> {
        vec![self.c_tol; 4]
    }

    fn name(&self) -> String {
        "convex test problem".to_string()
    }
}

/// Unconstrained sphere without derivatives.
pub struct Sphere {
    pub dim: usize,
}

impl Problem for Sphere {
    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![-1.0; self.dim], vec![1.0; self.dim])
    }

    fn fitness(&self, x: &[f64]) -> Result<Vec<f64>> {
        Ok(vec![x.iter().map(|xi| xi * xi).sum()])
    }
}

/// Fails on every `period`-th fitness evaluation.
pub struct Throwing {
    pub period: usize,
    pub count: Cell<usize>,
}

impl Throwing {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            count: Cell::new(0),
        }
    }
}

impl Problem for Throwing {
    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![-1.0; 5], vec![1.0; 5])
    }

    fn fitness(&self, x: &[f64]) -> Result<Vec<f64>> {
        self.count.set(self.count.get() + 1);
        if self.count.get() % self.period == 0 {
            bail!("error")
        }
        Ok(vec![
            x[0] + x[1] * x[1] + x[2] * x[3] + 3.0 * x[4],
            x[4] + x[1] * x[2] + 3.0 * x[3],
            x[0] + x[1] - x[2],
        ])
    }

    fn num_equality_constraints(&self) -> usize {
        1
    }

    fn num_inequality_constraints(&self) -> usize {
        1
    }

    fn has_gradient_sparsity(&self) -> bool {
        true
    }

    fn gradient_sparsity(&self) -> SparsityPattern {
        vec![
            (0, 0),
            (0, 1),
            (0, 2),
            (0, 3),
            (0, 4),
            (1, 1),
            (1, 2),
            (1, 3),
            (1, 4),
            (2, 0),
            (2, 1),
            (2, 2),
        ]
    }
}

/// Panics once `after` evaluations have been performed.
pub struct Panicking {
    pub after: usize,
    pub count: Cell<usize>,
}

impl Problem for Panicking {
    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![-1.0; 2], vec![1.0; 2])
    }

    fn fitness(&self, x: &[f64]) -> Result<Vec<f64>> {
        self.count.set(self.count.get() + 1);
        if self.count.get() > self.after {
            panic!("fitness panicked");
        }
        Ok(vec![x[0] + x[1]])
    }
}

/// Two objectives.
pub struct BiObjective;

impl Problem for BiObjective {
    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![0.0; 2], vec![1.0; 2])
    }

    fn fitness(&self, x: &[f64]) -> Result<Vec<f64>> {
        Ok(vec![x[0], 1.0 - x[0] + x[1]])
    }

    fn num_objectives(&self) -> usize {
        2
    }
}

/// Noisy objective.
pub struct Stochastic;

impl Problem for Stochastic {
    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![0.0], vec![1.0])
    }

    fn fitness(&self, x: &[f64]) -> Result<Vec<f64>> {
        Ok(vec![x[0]])
    }

    fn is_stochastic(&self) -> bool {
        true
    }
}

/// Declares an unsorted gradient sparsity pattern.
pub struct BadSparsity;

impl Problem for BadSparsity {
    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![0.0; 2], vec![1.0; 2])
    }

    fn fitness(&self, x: &[f64]) -> Result<Vec<f64>> {
        Ok(vec![x[0] + x[1]])
    }

    fn has_gradient_sparsity(&self) -> bool {
        true
    }

    fn gradient_sparsity(&self) -> SparsityPattern {
        vec![(0, 1), (0, 0)]
    }
}

/// Constrained problem whose fitness loses its constraints after the first
/// evaluation.
#[derive(Default)]
pub struct ShortFitness {
    pub count: Cell<usize>,
}

impl Problem for ShortFitness {
    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![-1.0; 2], vec![1.0; 2])
    }

    fn fitness(&self, x: &[f64]) -> Result<Vec<f64>> {
        self.count.set(self.count.get() + 1);
        if self.count.get() > 1 {
            return Ok(vec![x[0]]);
        }
        Ok(vec![x[0] * x[0], x[0] - x[1], x[1] - 1.0])
    }

    fn num_equality_constraints(&self) -> usize {
        1
    }

    fn num_inequality_constraints(&self) -> usize {
        1
    }
}
