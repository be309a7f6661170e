use std::collections::BTreeMap;
use std::fmt::Display;

/// One row of the optimisation log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogLine {
    /// Number of fitness evaluations performed so far.
    pub fevals: usize,
    /// Objective value.
    pub objval: f64,
    /// Number of violated constraints.
    pub violated: usize,
    /// Norm of the constraint violation.
    pub viol_norm: f64,
    /// Feasibility of the point under the problem tolerances.
    pub feasible: bool,
}

pub type Log = Vec<LogLine>;

/// Named solver options, applied to the library at the start of each solve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverOptions {
    pub integer: BTreeMap<String, i32>,
    pub numeric: BTreeMap<String, f64>,
    pub boolean: BTreeMap<String, bool>,
}

impl SolverOptions {
    /// Human readable listing of the non-empty option maps.
    pub fn describe(&self) -> String {
        let mut s = String::new();
        if !self.integer.is_empty() {
            s += &format!("\n\tInteger options: {}", map_to_string(&self.integer));
        }
        if !self.numeric.is_empty() {
            s += &format!("\n\tNumeric options: {}", map_to_string(&self.numeric));
        }
        if !self.boolean.is_empty() {
            s += &format!("\n\tBoolean options: {}", map_to_string(&self.boolean));
        }
        s
    }
}

fn map_to_string<V: Display>(m: &BTreeMap<String, V>) -> String {
    let items: Vec<String> = m.iter().map(|(k, v)| format!("{} : {}", k, v)).collect();
    format!("{{{}}}", items.join(", "))
}
