//! Plugin for the WORHP solver, driven through its reverse communication
//! interface.

mod driver;
mod ffi;

pub(crate) use driver::Driver;
pub(crate) use ffi::{is_set, Params, WorhpApi, PATCH_STRING_LENGTH};
#[cfg(test)]
pub(crate) use ffi::{
    Control, OptVar, UserAction, WorhpPrintFn, Workspace, STATUS_MSG_LENGTH, TERMINATE_SUCCESS,
};
pub use ffi::{WORHP_MAJOR, WORHP_MINOR};

use crate::common::{Log, SolverOptions};
use crate::constrained::compare_fc;
use crate::error::{Error, Result};
use crate::library;
use crate::population::{NotPopulationBased, Policy, Population};
use crate::progress::Logbook;
use crate::raw::{copy_to, slice, slice_mut};
use crate::sparsity::{
    check_gradient_sparsity, check_hessians_sparsity, dense_hessian, merge_patterns, GradientLayout,
    HessianLayout,
};
use crate::traits::Problem;
use driver::{c_buffer_to_string, c_string, Session};
use ffi::{no_screen_output, WorhpData};
use std::collections::BTreeMap;
use std::ffi::{c_char, c_int};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

static LIBRARY_LOAD_MUTEX: Mutex<()> = Mutex::new(());

const PARAM_FILE: &str = "param.xml";
const PARAM_FILE_VAR: &str = "WORHP_PARAM_FILE";
const TOL_FEAS: &str = "TolFeas";

/// WORHP as a single-individual algorithm.
///
/// Loading a real library requires the `worhp-headers` feature, which
/// generates the WORHP data structures from the installed headers.
///
/// Parameters are first read from `param.xml` (or the file named by
/// `WORHP_PARAM_FILE`), falling back to the library defaults. `FGtogether` is
/// then set for constrained problems, `UserDF`, `UserDG` and `UserHM` follow
/// the derivatives the problem provides, and `TolFeas` is the minimum of the
/// problem constraint tolerances when positive (`AcceptTolFeas` half of it).
/// The user options are applied last and override all of the above.
///
/// The violated count, violation norm and feasibility recorded in the log
/// use the problem tolerances and may disagree with WORHP's own notion of
/// feasibility.
pub struct Worhp {
    library: PathBuf,
    screen_output: bool,
    options: SolverOptions,
    verbosity: usize,
    log: Log,
    last_opt_res: String,
    last_status: c_int,
    policy: NotPopulationBased,
}

/// Parameter file handed to `ReadParams`.
fn param_file() -> String {
    std::env::var(PARAM_FILE_VAR).unwrap_or_else(|_| PARAM_FILE.to_string())
}

impl Worhp {
    pub fn new(screen_output: bool, library: impl Into<PathBuf>) -> Self {
        Self {
            library: library.into(),
            screen_output,
            options: SolverOptions::default(),
            verbosity: 0,
            log: Log::new(),
            last_opt_res: "WORHP evolve was never successfully called".to_string(),
            last_status: 0,
            policy: NotPopulationBased::default(),
        }
    }

    /// Optimises one individual of `pop`.
    pub fn evolve(&mut self, pop: Population) -> Result<Population> {
        if !self.check(&pop)? {
            return Ok(pop);
        }
        let api = {
            let _lock = library::lock(&LIBRARY_LOAD_MUTEX);
            WorhpApi::open(&self.library)?
        };
        self.run(&api, pop)
    }

    /// Optimises one individual of `pop` with already resolved entry points.
    pub(crate) fn evolve_with(&mut self, api: &WorhpApi, pop: Population) -> Result<Population> {
        if !self.check(&pop)? {
            return Ok(pop);
        }
        self.run(api, pop)
    }

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
        if pop.is_empty() {
            log::warn!("{}: empty population, nothing to optimise", self.name());
            return Ok(false);
        }
        Ok(true)
    }

    fn check_version(&self, api: &WorhpApi) -> Result<String> {
        let (mut major, mut minor): (c_int, c_int) = (0, 0);
        let mut patch = [0 as c_char; PATCH_STRING_LENGTH];
        unsafe { (api.worhp_version)(&mut major, &mut minor, patch.as_mut_ptr()) };
        let patch = c_buffer_to_string(&patch);
        if major != WORHP_MAJOR || minor != WORHP_MINOR {
            return Err(Error::VersionMismatch {
                path: self.library.clone(),
                found: format!("{}.{}", major, minor),
                supported: format!("{}.{}", WORHP_MAJOR, WORHP_MINOR),
            });
        }
        Ok(format!("{}.{}.{}", major, minor, patch))
    }

    fn run(&mut self, api: &WorhpApi, mut pop: Population) -> Result<Population> {
        let version = self.check_version(api)?;
        self.log.clear();

        let prob = pop.problem();
        let n = prob.dimension();
        let nf = prob.fitness_dimension();
        let n_eq = prob.num_equality_constraints();
        let nc = prob.num_constraints();
        let c_tol = prob.constraint_tolerances();
        let (lb, ub) = prob.bounds();

        let gs = prob.gradient_sparsity();
        check_gradient_sparsity(&gs, nf, n)?;
        let gradient = GradientLayout::new(&gs);

        let hs = prob.hessians_sparsity();
        check_hessians_sparsity(&hs, nf, n)?;
        let merged = if prob.has_hessians_sparsity() {
            merge_patterns(&hs)
        } else {
            dense_hessian(n)
        };
        let hessian = HessianLayout::new(merged, n);

        let mut data = WorhpData::empty();
        unsafe {
            let d = data.as_mut();
            (api.worhp_pre_init)(&mut d.opt, &mut d.wsp, &mut d.par, &mut d.cnt);
        }

        let mut n_xml_param: c_int = 0;
        let xml = c_string(&param_file());
        unsafe {
            if self.verbosity > 0 {
                (api.read_params)(&mut n_xml_param, xml.as_ptr(), &mut data.par);
                (api.set_worhp_print)(no_screen_output);
            } else {
                if !self.screen_output {
                    (api.set_worhp_print)(no_screen_output);
                }
                (api.read_params)(&mut n_xml_param, xml.as_ptr(), &mut data.par);
            }
        }

        data.opt.n = n as c_int;
        data.opt.m = nc as c_int;
        data.wsp.DF.nnz = gradient.split as c_int;
        data.wsp.DG.nnz = gradient.jacobian.len() as c_int;
        data.wsp.HM.nnz = hessian.nnz() as c_int;

        let mut session = Session::init(api, data);

        if nc > 0 {
            session.set_bool("FGtogether", true)?;
        }
        session.set_bool("UserDF", prob.has_gradient())?;
        session.set_bool("UserDG", prob.has_gradient())?;
        session.set_bool("UserHM", prob.has_hessians())?;

        if nc > 0 && !self.options.numeric.contains_key(TOL_FEAS) {
            let min_tol = c_tol.iter().copied().fold(f64::INFINITY, f64::min);
            if min_tol > 0.0 {
                session.set_double(TOL_FEAS, min_tol)?;
                session.set_double("AcceptTolFeas", min_tol / 2.0)?;
            }
        }
        for (name, &value) in &self.options.numeric {
            session.set_double(name, value)?;
        }
        for (name, &value) in &self.options.integer {
            session.set_int(name, value)?;
        }
        for (name, &value) in &self.options.boolean {
            session.set_bool(name, value)?;
        }

        let (x0, f0) = self.policy.select_individual(&pop)?;
        {
            let d = session.data.as_mut();
            let (opt, wsp, par) = (&mut d.opt, &mut d.wsp, &d.par);
            unsafe {
                copy_to(slice_mut(opt.X, opt.n), &x0);
                opt.F = wsp.ScaleObj * f0[0];
                copy_to(slice_mut(opt.G, opt.m), &f0[1..]);

                // Box bounds.
                slice_mut(opt.Lambda, opt.n).fill(0.0);
                copy_to(slice_mut(opt.XL, opt.n), &lb);
                copy_to(slice_mut(opt.XU, opt.n), &ub);

                // Equality constraints, then inequality constraints.
                slice_mut(opt.Mu, opt.m).fill(0.0);
                for (i, gl) in slice_mut(opt.GL, opt.m).iter_mut().enumerate() {
                    *gl = if i < n_eq { 0.0 } else { -par.Infty };
                }
                slice_mut(opt.GU, opt.m).fill(0.0);

                // Structures in coordinate format with Fortran indices.
                if is_set(wsp.DF.NeedStructure) {
                    copy_to(slice_mut(wsp.DF.row, wsp.DF.nnz), &gradient.objective_indices(&gs));
                }
                if is_set(wsp.DG.NeedStructure) {
                    let (rows, cols) = gradient.jacobian_indices(&gs);
                    copy_to(slice_mut(wsp.DG.row, wsp.DG.nnz), &rows);
                    copy_to(slice_mut(wsp.DG.col, wsp.DG.nnz), &cols);
                }
                if is_set(wsp.HM.NeedStructure) {
                    let (rows, cols) = hessian.fortran_indices();
                    copy_to(slice_mut(wsp.HM.row, wsp.HM.nnz), &rows);
                    copy_to(slice_mut(wsp.HM.col, wsp.HM.nnz), &cols);
                }
            }
        }

        if self.verbosity > 0 {
            self.print_setup(prob, &version, gs.len(), hessian.merged.len(), &session.data.par);
        }

        let mut driver = Driver::new(
            prob,
            gradient,
            hs,
            hessian,
            Logbook::new(self.verbosity, n_eq, c_tol.clone()),
        );
        let outcome = driver.solve(&mut session);
        let logbook = driver.into_logbook();
        log::debug!("WORHP stopped after {} fitness evaluations", logbook.fevals());
        self.log = logbook.into_log();
        self.last_status = session.status();
        outcome?;

        let x_final = unsafe { slice(session.data.opt.X, session.data.opt.n) }.to_vec();
        let f_final = pop.evaluate(&x_final)?;

        self.last_opt_res = session.status_message();
        if self.verbosity > 0 {
            log::info!("{}", self.last_opt_res);
        } else if self.screen_output {
            session.call(api.status_msg);
        }
        drop(session);

        if compare_fc(&f_final, &f0, n_eq, &c_tol) {
            self.policy.replace_individual(&mut pop, x_final, f_final)?;
        }
        Ok(pop)
    }

    fn print_setup(
        &self,
        prob: &dyn Problem,
        version: &str,
        n_gs: usize,
        n_hs: usize,
        par: &Params,
    ) {
        log::info!("WORHP version is (library): {}", version);
        log::info!("WORHP version is (plugin): {}.{}", WORHP_MAJOR, WORHP_MINOR);
        log::info!("WORHP plugin:");
        if prob.has_gradient_sparsity() {
            log::info!(
                "\tThe gradient sparsity is provided by the user: {} components detected.",
                n_gs
            );
        } else {
            log::info!("\tThe gradient sparsity is assumed dense: {} components detected.", n_gs);
        }
        if prob.has_gradient() {
            log::info!("\tThe gradient is provided by the user.");
        } else {
            log::info!("\tThe gradient is computed numerically by WORHP.");
        }
        log::info!("\tThe hessian of the lagrangian sparsity has: {} components.", n_hs);
        if prob.has_hessians() {
            log::info!("\tThe hessians are provided by the user.");
        } else {
            log::info!("\tThe hessian of the lagrangian is computed numerically by WORHP.");
        }
        log::info!(
            "The following parameters have been set to values other than their xml provided ones \
             (or their default ones):"
        );
        log::info!("\tpar.FGtogether: {}", par.FGtogether);
        log::info!("\tpar.UserDF: {}", par.UserDF);
        log::info!("\tpar.UserDG: {}", par.UserDG);
        log::info!("\tpar.UserHM: {}", par.UserHM);
        log::info!("\tpar.TolFeas: {}", par.TolFeas);
        log::info!("\tpar.AcceptTolFeas: {}", par.AcceptTolFeas);
        for (name, value) in &self.options.numeric {
            log::info!("\tpar.{}: {}", name, value);
        }
        for (name, value) in &self.options.integer {
            log::info!("\tpar.{}: {}", name, value);
        }
        for (name, value) in &self.options.boolean {
            log::info!("\tpar.{}: {}", name, value);
        }
    }

    /// Sets the verbosity of the plugin log. Fails if the library screen
    /// output was requested on construction.
    pub fn set_verbosity(&mut self, n: usize) -> Result<()> {
        if self.screen_output && n != 0 {
            return Err(Error::Configuration(
                "Cannot set verbosity to a >0 value if WORHP screen output is chosen upon \
                 construction."
                    .to_string(),
            ));
        }
        self.verbosity = n;
        Ok(())
    }

    pub fn verbosity(&self) -> usize {
        self.verbosity
    }

    pub fn log(&self) -> &Log {
        &self.log
    }

    /// Status message of the last solve.
    pub fn last_opt_result(&self) -> &str {
        &self.last_opt_res
    }

    /// Raw control status at the end of the last solve.
    pub fn last_status(&self) -> i32 {
        self.last_status
    }

    pub fn name(&self) -> &'static str {
        "WORHP"
    }

    pub fn extra_info(&self) -> String {
        let mut s = format!("\tWorhp library filename: {}", self.library.display());
        s += &format!("\n\tLibrary version supported: {}.{}", WORHP_MAJOR, WORHP_MINOR);
        if self.screen_output {
            s += "\n\tScreen output: (worhp)";
        } else {
            s += &format!("\n\tScreen output: (plugin) - verbosity {}", self.verbosity);
        }
        s += &format!("\n\tIndividual selection {}", self.policy.selection());
        s += &format!("\n\tIndividual replacement {}", self.policy.replacement());
        s += &self.options.describe();
        s += &format!("\n\nLast optimisation result: \n{}\n", self.last_opt_res);
        s
    }

    pub fn library(&self) -> &Path {
        &self.library
    }

    pub fn set_integer_option(&mut self, name: &str, value: i32) {
        self.options.integer.insert(name.to_string(), value);
    }

    pub fn set_integer_options(&mut self, m: &BTreeMap<String, i32>) {
        for (name, &value) in m {
            self.set_integer_option(name, value);
        }
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

    pub fn set_bool_option(&mut self, name: &str, value: bool) {
        self.options.boolean.insert(name.to_string(), value);
    }

    pub fn set_bool_options(&mut self, m: &BTreeMap<String, bool>) {
        for (name, &value) in m {
            self.set_bool_option(name, value);
        }
    }

    pub fn bool_options(&self) -> BTreeMap<String, bool> {
        self.options.boolean.clone()
    }

    pub fn reset_bool_options(&mut self) {
        self.options.boolean.clear();
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
