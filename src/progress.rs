use crate::common::{Log, LogLine};
use crate::constrained::violation;

/// Records one log line every `verbosity` fitness evaluations and mirrors
/// it to the `log` output, with a column header every 50 lines.
pub(crate) struct Logbook {
    verbosity: usize,
    fevals: usize,
    n_eq: usize,
    tol: Vec<f64>,
    lines: Log,
}

impl Logbook {
    pub fn new(verbosity: usize, n_eq: usize, tol: Vec<f64>) -> Self {
        Self {
            verbosity,
            fevals: 0,
            n_eq,
            tol,
            lines: Log::new(),
        }
    }

    /// Counts one fitness evaluation and logs it if it falls on a tick.
    pub fn record(&mut self, f: &[f64]) {
        self.fevals += 1;
        if self.verbosity == 0 || (self.fevals - 1) % self.verbosity != 0 {
            return;
        }
        let v = violation(f, self.n_eq, &self.tol);
        if self.lines.len() % 50 == 0 {
            log::info!(
                "{:>10}{:>15}{:>15}{:>15}",
                "objevals:",
                "objval:",
                "violated:",
                "viol. norm:"
            );
        }
        log::info!(
            "{:>10}{:>15}{:>15}{:>15}{}",
            self.fevals,
            format!("{:.6}", f[0]),
            v.violated,
            format!("{:.6e}", v.norm),
            if v.feasible { "" } else { " i" }
        );
        self.lines.push(LogLine {
            fevals: self.fevals,
            objval: f[0],
            violated: v.violated,
            viol_norm: v.norm,
            feasible: v.feasible,
        });
    }

    pub fn fevals(&self) -> usize {
        self.fevals
    }

    pub fn into_log(self) -> Log {
        self.lines
    }
}
