use crate::constrained::compare_fc;
use crate::error::{Error, Result};
use crate::traits::Problem;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// Set of candidate solutions of a single problem.
pub struct Population {
    problem: Box<dyn Problem>,
    x: Vec<Vec<f64>>,
    f: Vec<Vec<f64>>,
}

impl Population {
    pub fn new(problem: Box<dyn Problem>) -> Self {
        Self {
            problem,
            x: Vec::new(),
            f: Vec::new(),
        }
    }

    pub fn problem(&self) -> &dyn Problem {
        self.problem.as_ref()
    }

    /// Evaluates `x` and appends it to the population.
    pub fn push(&mut self, x: Vec<f64>) -> Result<()> {
        let f = self.problem.fitness(&x).map_err(Error::UserCallback)?;
        self.push_with_fitness(x, f)
    }

    /// Evaluates the problem at `x`, checking the length of the fitness vector.
    pub(crate) fn evaluate(&self, x: &[f64]) -> Result<Vec<f64>> {
        let f = self.problem.fitness(x).map_err(Error::UserCallback)?;
        self.check_fitness(&f)?;
        Ok(f)
    }

    /// Appends `x` with an already evaluated fitness.
    pub fn push_with_fitness(&mut self, x: Vec<f64>, f: Vec<f64>) -> Result<()> {
        self.check_xf(&x, &f)?;
        self.x.push(x);
        self.f.push(f);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn x(&self) -> &[Vec<f64>] {
        &self.x
    }

    pub fn f(&self) -> &[Vec<f64>] {
        &self.f
    }

    /// Overwrites the individual at index `i`.
    pub fn set_xf(&mut self, i: usize, x: Vec<f64>, f: Vec<f64>) -> Result<()> {
        if i >= self.len() {
            return Err(Error::Configuration(format!(
                "cannot replace individual {} in a population of size {}",
                i,
                self.len()
            )));
        }
        self.check_xf(&x, &f)?;
        self.x[i] = x;
        self.f[i] = f;
        Ok(())
    }

    /// Index of the best individual under the constrained comparison.
    pub fn best_index(&self) -> Option<usize> {
        self.extreme_index(|a, b| self.better(a, b))
    }

    /// Index of the worst individual under the constrained comparison.
    pub fn worst_index(&self) -> Option<usize> {
        self.extreme_index(|a, b| self.better(b, a))
    }

    fn better(&self, a: usize, b: usize) -> bool {
        let p = self.problem();
        compare_fc(
            &self.f[a],
            &self.f[b],
            p.num_equality_constraints(),
            &p.constraint_tolerances(),
        )
    }

    fn extreme_index<F>(&self, wins: F) -> Option<usize>
    where
        F: Fn(usize, usize) -> bool,
    {
        if self.is_empty() {
            return None;
        }
        let mut k = 0;
        for i in 1..self.len() {
            if wins(i, k) {
                k = i;
            }
        }
        Some(k)
    }

    fn check_xf(&self, x: &[f64], f: &[f64]) -> Result<()> {
        let p = self.problem();
        if x.len() != p.dimension() {
            return Err(Error::ProblemShape(format!(
                "decision vector of length {} does not match the problem dimension {}",
                x.len(),
                p.dimension()
            )));
        }
        self.check_fitness(f)
    }

    fn check_fitness(&self, f: &[f64]) -> Result<()> {
        let p = self.problem();
        if f.len() != p.fitness_dimension() {
            return Err(Error::ProblemShape(format!(
                "fitness vector of length {} does not match the fitness dimension {}",
                f.len(),
                p.fitness_dimension()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Population")
            .field("problem", &self.problem.name())
            .field("x", &self.x)
            .field("f", &self.f)
            .finish()
    }
}

/// Individual selection or replacement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Best,
    Worst,
    Random,
    /// A fixed position in the population.
    Index(usize),
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Best => write!(f, "policy: best"),
            Policy::Worst => write!(f, "policy: worst"),
            Policy::Random => write!(f, "policy: random"),
            Policy::Index(i) => write!(f, "idx: {}", i),
        }
    }
}

/// Selection and replacement of a single individual, for solvers that
/// improve one point at a time.
pub struct NotPopulationBased {
    select: Policy,
    replace: Policy,
    seed: u64,
    rng: StdRng,
}

impl NotPopulationBased {
    pub fn new(seed: u64) -> Self {
        Self {
            select: Policy::Best,
            replace: Policy::Best,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn set_selection(&mut self, policy: Policy) {
        self.select = policy;
    }

    pub fn selection(&self) -> Policy {
        self.select
    }

    pub fn set_replacement(&mut self, policy: Policy) {
        self.replace = policy;
    }

    pub fn replacement(&self) -> Policy {
        self.replace
    }

    /// Reseeds the generator used by `Policy::Random`.
    pub fn set_random_sr_seed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn resolve(&mut self, policy: Policy, pop: &Population) -> Result<usize> {
        let n = pop.len();
        let i = match policy {
            Policy::Best => pop.best_index(),
            Policy::Worst => pop.worst_index(),
            Policy::Random if n > 0 => Some(self.rng.gen_range(0..n)),
            Policy::Random => None,
            Policy::Index(i) => Some(i),
        };
        match i {
            Some(i) if i < n => Ok(i),
            _ => Err(Error::Configuration(format!(
                "cannot apply the individual {} to a population of size {}",
                policy, n
            ))),
        }
    }

    /// Returns a copy of the selected individual.
    pub fn select_individual(&mut self, pop: &Population) -> Result<(Vec<f64>, Vec<f64>)> {
        let i = self.resolve(self.select, pop)?;
        Ok((pop.x()[i].clone(), pop.f()[i].clone()))
    }

    /// Writes `(x, f)` over the individual picked by the replacement policy.
    pub fn replace_individual(
        &mut self,
        pop: &mut Population,
        x: Vec<f64>,
        f: Vec<f64>,
    ) -> Result<()> {
        let i = self.resolve(self.replace, pop)?;
        pop.set_xf(i, x, f)
    }
}

impl Default for NotPopulationBased {
    fn default() -> Self {
        Self::new(0)
    }
}
