//! Plugin for the SNOPT7 sparse SQP solver, driven through the `snOptA`
//! interface of the snopt7_c library.

mod callback;
mod ffi;

pub use ffi::describe_result;
pub(crate) use ffi::{SnProblem, SnProblem76, SnProblem77, Snopt7Api};
#[cfg(test)]
pub(crate) use ffi::{SnFunA, USER_ABORT};

use crate::common::{Log, SolverOptions};
use crate::constrained::compare_fc;
use crate::error::{Error, Result};
use crate::library;
use crate::population::{NotPopulationBased, Policy, Population};
use crate::progress::Logbook;
use crate::sparsity::{check_gradient_sparsity, column_major_permutation};
use crate::traits::Problem;
pub(crate) use callback::{snopt_fitness_wrapper, Failure, UserData};
use std::collections::BTreeMap;
use std::ffi::{c_int, CString};
use std::panic::resume_unwind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

static LIBRARY_LOAD_MUTEX: Mutex<()> = Mutex::new(());

const DERIVATIVE_OPTION: &str = "Derivative option";
const FEASIBILITY_TOLERANCE: &str = "Major feasibility tolerance";

/// SNOPT7 as a single-individual algorithm.
///
/// The solver is loaded from `library` at every call to `evolve`. One
/// individual is selected from the population, optimised, and written back
/// only if the result is better under the constrained comparison.
///
/// Options are applied as follows: "Major feasibility tolerance" is the
/// minimum of the problem constraint tolerances when positive, unless set by
/// the user; "Derivative option" is 3 when the problem has a gradient and 0
/// otherwise, and cannot be set by the user. All other options are passed
/// through unchanged and only validated by the library.
///
/// The violated count, violation norm and feasibility recorded in the log
/// use the problem tolerances and may disagree with SNOPT7's own notion of
/// feasibility.
pub struct Snopt7 {
    library: PathBuf,
    screen_output: bool,
    minor_version: u32,
    options: SolverOptions,
    verbosity: usize,
    log: Log,
    last_opt_res: c_int,
    policy: NotPopulationBased,
}

impl Snopt7 {
    /// Creates the plugin for the snopt7_c library at `library`, declared to
    /// be version 7.`minor_version`.
    pub fn new(screen_output: bool, library: impl Into<PathBuf>, minor_version: u32) -> Self {
        Self {
            library: library.into(),
            screen_output,
            minor_version,
            options: SolverOptions::default(),
            verbosity: 0,
            log: Log::new(),
            last_opt_res: 0,
            policy: NotPopulationBased::default(),
        }
    }

    /// Optimises one individual of `pop`.
    pub fn evolve(&mut self, pop: Population) -> Result<Population> {
        if !self.check(&pop)? {
            return Ok(pop);
        }
        if self.minor_version > 6 {
            let api = {
                let _lock = library::lock(&LIBRARY_LOAD_MUTEX);
                Snopt7Api::<SnProblem77>::open(&self.library)?
            };
            self.run(&api, pop)
        } else {
            let api = {
                let _lock = library::lock(&LIBRARY_LOAD_MUTEX);
                Snopt7Api::<SnProblem76>::open(&self.library)?
            };
            self.run(&api, pop)
        }
    }

    /// Optimises one individual of `pop` with already resolved entry points.
    pub(crate) fn evolve_with<P: SnProblem>(
        &mut self,
        api: &Snopt7Api<P>,
        pop: Population,
    ) -> Result<Population> {
        if !self.check(&pop)? {
            return Ok(pop);
        }
        self.run(api, pop)
    }

    /// Validates the population, returning false if there is nothing to do.
    fn check(&self, pop: &Population) -> Result<bool> {
        let prob = pop.problem();
        if prob.num_objectives() != 1 {
            return Err(Error::ProblemShape(format!(
                "Multiple objectives detected in {} instance. {} cannot deal with them",
                prob.name(),
                self.name()
            )));
        }
        if prob.is_stochastic() {
            return Err(Error::ProblemShape(format!(
                "The problem appears to be stochastic {} cannot deal with it",
                self.name()
            )));
        }
        if self.options.integer.contains_key(DERIVATIVE_OPTION) {
            return Err(forbidden_derivative_option());
        }
        if pop.is_empty() {
            log::warn!("{}: empty population, nothing to optimise", self.name());
            return Ok(false);
        }
        Ok(true)
    }

    fn run<P: SnProblem>(&mut self, api: &Snopt7Api<P>, mut pop: Population) -> Result<Population> {
        self.log.clear();

        let (x0, f0) = self.policy.select_individual(&pop)?;
        let prob = pop.problem();
        let n = prob.dimension();
        let nf = prob.fitness_dimension();
        let n_eq = prob.num_equality_constraints();
        let nc = prob.num_constraints();
        let c_tol = prob.constraint_tolerances();
        let (lb, ub) = prob.bounds();

        let sparsity = prob.gradient_sparsity();
        check_gradient_sparsity(&sparsity, nf, n)?;
        let order = column_major_permutation(&sparsity);
        let mut i_gfun: Vec<c_int> = order.iter().map(|&k| sparsity[k].0 as c_int).collect();
        let mut j_gvar: Vec<c_int> = order.iter().map(|&k| sparsity[k].1 as c_int).collect();

        let mut workspace = Workspace::init(api, &prob.name(), self.screen_output);

        if nc > 0 && !self.options.numeric.contains_key(FEASIBILITY_TOLERANCE) {
            let min_tol = c_tol.iter().copied().fold(f64::INFINITY, f64::min);
            if min_tol > 0.0 {
                workspace.set_real(FEASIBILITY_TOLERANCE, min_tol)?;
            }
        }
        for (name, &value) in &self.options.numeric {
            workspace.set_real(name, value)?;
        }
        for (name, &value) in &self.options.integer {
            workspace.set_int(name, value)?;
        }
        workspace.set_int(DERIVATIVE_OPTION, if prob.has_gradient() { 3 } else { 0 })?;

        // Bounds.
        let mut xlow = lb;
        let mut xupp = ub;
        let mut flow = vec![-f64::MAX; nf];
        let mut fupp = vec![f64::MAX; nf];
        for i in 1..nf {
            fupp[i] = 0.0;
            if i <= n_eq {
                flow[i] = 0.0;
            }
        }

        // Initial point, states and multipliers.
        let mut x = x0;
        let mut xstate: Vec<c_int> = vec![0; n];
        let mut xmul = vec![0.0; n];
        let mut f = f0.clone();
        let mut fstate: Vec<c_int> = vec![0; nf];
        let mut fmul = vec![0.0; nf];

        // No linear part.
        let ne_a: c_int = 0;
        let mut i_afun: Vec<c_int> = vec![0; 1];
        let mut j_avar: Vec<c_int> = vec![0; 1];
        let mut a = vec![0.0; 1];

        let (mut ns, mut ninf, mut sinf): (c_int, c_int, f64) = (0, 0, 0.0);

        if self.verbosity > 0 {
            log::info!("SNOPT7 plugin:");
            if prob.has_gradient_sparsity() {
                log::info!(
                    "The gradient sparsity is provided by the user: {} components detected.",
                    sparsity.len()
                );
            } else {
                log::info!(
                    "The gradient sparsity is assumed dense: {} components detected.",
                    sparsity.len()
                );
            }
            if prob.has_gradient() {
                log::info!("The gradient is provided by the user.");
            } else {
                log::info!("The gradient is computed numerically by SNOPT7.");
            }
        }

        let logbook = Logbook::new(self.verbosity, n_eq, c_tol.clone());
        let mut info = UserData::new(prob, order, logbook);
        workspace.problem.set_user_workspace(info.as_workspace());

        self.last_opt_res = unsafe {
            (api.solve_a)(
                workspace.as_mut_ptr(),
                0,
                nf as c_int,
                n as c_int,
                0.0,
                0,
                snopt_fitness_wrapper,
                ne_a,
                i_afun.as_mut_ptr(),
                j_avar.as_mut_ptr(),
                a.as_mut_ptr(),
                sparsity.len() as c_int,
                i_gfun.as_mut_ptr(),
                j_gvar.as_mut_ptr(),
                xlow.as_mut_ptr(),
                xupp.as_mut_ptr(),
                flow.as_mut_ptr(),
                fupp.as_mut_ptr(),
                x.as_mut_ptr(),
                xstate.as_mut_ptr(),
                xmul.as_mut_ptr(),
                f.as_mut_ptr(),
                fstate.as_mut_ptr(),
                fmul.as_mut_ptr(),
                &mut ns,
                &mut ninf,
                &mut sinf,
            )
        };
        drop(workspace);

        if self.verbosity > 0 {
            log::info!("{}", describe_result(self.last_opt_res));
        }
        let failure = info.failure.take();
        log::debug!(
            "solveA returned {} after {} fitness evaluations",
            self.last_opt_res,
            info.logbook.fevals()
        );
        self.log = info.logbook.into_log();

        match failure {
            Some(Failure::Error(e)) => return Err(Error::UserCallback(e)),
            Some(Failure::Panic(payload)) => resume_unwind(payload),
            None => {}
        }

        let f_final = pop.evaluate(&x)?;
        if compare_fc(&f_final, &f0, n_eq, &c_tol) {
            self.policy.replace_individual(&mut pop, x, f_final)?;
        }
        Ok(pop)
    }

    /// Sets the verbosity of the plugin log.
    ///
    /// Every `n` fitness evaluations a line is recorded in the log and printed
    /// through the `log` crate. Fails if the library screen output was
    /// requested on construction.
    pub fn set_verbosity(&mut self, n: usize) -> Result<()> {
        if self.screen_output && n != 0 {
            return Err(Error::Configuration(
                "Cannot set verbosity to a >0 value if SNOPT7 screen output is chosen".to_string(),
            ));
        }
        self.verbosity = n;
        Ok(())
    }

    pub fn verbosity(&self) -> usize {
        self.verbosity
    }

    /// Log of the last call to `evolve`.
    pub fn log(&self) -> &Log {
        &self.log
    }

    /// Return code of the last `solveA` call.
    pub fn last_opt_result(&self) -> i32 {
        self.last_opt_res
    }

    pub fn last_opt_result_description(&self) -> &'static str {
        describe_result(self.last_opt_res)
    }

    pub fn name(&self) -> &'static str {
        "SNOPT7"
    }

    pub fn extra_info(&self) -> String {
        let mut s = format!("\tName of the snopt7_c library: {}", self.library.display());
        s += &format!("\n\tLibrary version declared: 7.{}", self.minor_version);
        if self.screen_output {
            s += "\n\tScreen output: (snopt7)";
        } else {
            s += &format!("\n\tScreen output: (plugin) - verbosity {}", self.verbosity);
        }
        s += &format!(
            "\n\tLast optimisation return code: {}",
            describe_result(self.last_opt_res)
        );
        s += &format!("\n\tIndividual selection {}", self.policy.selection());
        s += &format!("\n\tIndividual replacement {}", self.policy.replacement());
        s += &self.options.describe();
        s += "\n";
        s
    }

    pub fn library(&self) -> &Path {
        &self.library
    }

    /// Sets an integer option. "Derivative option" is rejected since it
    /// follows from the problem.
    pub fn set_integer_option(&mut self, name: &str, value: i32) -> Result<()> {
        if name == DERIVATIVE_OPTION {
            return Err(forbidden_derivative_option());
        }
        self.options.integer.insert(name.to_string(), value);
        Ok(())
    }

    pub fn set_integer_options(&mut self, m: &BTreeMap<String, i32>) -> Result<()> {
        for (name, &value) in m {
            self.set_integer_option(name, value)?;
        }
        Ok(())
    }

    pub fn integer_options(&self) -> BTreeMap<String, i32> {
        self.options.integer.clone()
    }

    pub fn reset_integer_options(&mut self) {
        self.options.integer.clear();
    }

    pub fn set_numeric_option(&mut self, name: &str, value: f64) {
        self.options.numeric.insert(name.to_string(), value);
    }

    pub fn set_numeric_options(&mut self, m: &BTreeMap<String, f64>) {
        for (name, &value) in m {
            self.set_numeric_option(name, value);
        }
    }

    pub fn numeric_options(&self) -> BTreeMap<String, f64> {
        self.options.numeric.clone()
    }

    pub fn reset_numeric_options(&mut self) {
        self.options.numeric.clear();
    }

    pub fn set_selection(&mut self, policy: Policy) {
        self.policy.set_selection(policy);
    }

    pub fn set_replacement(&mut self, policy: Policy) {
        self.policy.set_replacement(policy);
    }

    pub fn set_random_sr_seed(&mut self, seed: u64) {
        self.policy.set_random_sr_seed(seed);
    }
}

fn forbidden_derivative_option() -> Error {
    Error::Configuration(format!(
        "The option \"{}\" was set by the user. This is not allowed, as its value is set \
         from whether the problem has a gradient (true -> 3, false -> 0)",
        DERIVATIVE_OPTION
    ))
}

fn c_string(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

/// SNOPT7 workspace, initialised by `snInit` and released by `deleteSNOPT`.
struct Workspace<'a, P: SnProblem> {
    api: &'a Snopt7Api<P>,
    problem: Box<P>,
    name: CString,
    prtfile: CString,
}

impl<'a, P: SnProblem> Workspace<'a, P> {
    fn init(api: &'a Snopt7Api<P>, name: &str, screen_output: bool) -> Self {
        let mut ws = Self {
            api,
            problem: Box::new(P::empty()),
            name: c_string(name),
            prtfile: CString::default(),
        };
        log::debug!("snInit for problem {:?}", name);
        unsafe {
            (api.sn_init)(
                ws.as_mut_ptr(),
                ws.name.as_ptr() as *mut _,
                ws.prtfile.as_ptr() as *mut _,
                screen_output as c_int,
            )
        };
        ws
    }

    fn as_mut_ptr(&mut self) -> *mut P {
        self.problem.as_mut()
    }

    fn set_int(&mut self, name: &str, value: i32) -> Result<()> {
        let option = c_string(name);
        let stropt = option.as_ptr() as *mut _;
        let res = unsafe { (self.api.set_int_parameter)(self.as_mut_ptr(), stropt, value) };
        if res > 0 {
            return Err(Error::Configuration(format!(
                "The option '{}' was requested by the user to be set to the int value {}, \
                 but SNOPT7 interface returned an error. Did you misspell the option name?",
                name, value
            )));
        }
        Ok(())
    }

    fn set_real(&mut self, name: &str, value: f64) -> Result<()> {
        let option = c_string(name);
        let stropt = option.as_ptr() as *mut _;
        let res = unsafe { (self.api.set_real_parameter)(self.as_mut_ptr(), stropt, value) };
        if res > 0 {
            return Err(Error::Configuration(format!(
                "The option '{}' was requested by the user to be set to the float value {}, \
                 but SNOPT7 interface returned an error. Did you misspell the option name?",
                name, value
            )));
        }
        Ok(())
    }
}

impl<P: SnProblem> Drop for Workspace<'_, P> {
    fn drop(&mut self) {
        log::debug!("deleteSNOPT");
        unsafe { (self.api.delete_snopt)(self.as_mut_ptr()) };
    }
}
