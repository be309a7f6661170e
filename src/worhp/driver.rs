use super::ffi::{
    Control, OptVar, Params, UserAction, WorhpApi, WorhpData, WorhpFn, Workspace, STATUS_MSG_LENGTH,
    TERMINATE_ERROR, TERMINATE_SUCCESS,
};
use crate::error::{Error, Result};
use crate::progress::Logbook;
use crate::raw::{slice, slice_mut};
use crate::sparsity::{GradientLayout, HessianLayout, SparsityPattern};
use crate::traits::Problem;
use std::collections::HashMap;
use std::ffi::{c_char, c_int, CString};

/// WORHP data allocated by `WorhpInit` and released by `WorhpFree`.
pub(crate) struct Session<'a> {
    api: &'a WorhpApi,
    pub data: Box<WorhpData>,
}

impl<'a> Session<'a> {
    /// Allocates the solver memory for the dimensions already set in `data`.
    pub fn init(api: &'a WorhpApi, data: Box<WorhpData>) -> Self {
        let mut session = Self { api, data };
        log::debug!(
            "WorhpInit with n = {}, m = {}",
            session.data.opt.n,
            session.data.opt.m
        );
        unsafe {
            let (o, w, p, c) = session.pointers();
            (api.worhp_init)(o, w, p, c);
        }
        session
    }

    fn pointers(&mut self) -> (*mut OptVar, *mut Workspace, *mut Params, *mut Control) {
        let d = self.data.as_mut();
        (&mut d.opt, &mut d.wsp, &mut d.par, &mut d.cnt)
    }

    pub fn call(&mut self, f: WorhpFn) {
        let (o, w, p, c) = self.pointers();
        unsafe { f(o, w, p, c) };
    }

    pub fn has_action(&self, action: UserAction) -> bool {
        unsafe { (self.api.get_user_action)(&self.data.cnt, action as c_int) }
    }

    pub fn done(&mut self, action: UserAction) {
        unsafe { (self.api.done_user_action)(&mut self.data.cnt, action as c_int) };
    }

    /// Control status, whatever integer type the headers give it.
    #[allow(clippy::unnecessary_cast)]
    pub fn status(&self) -> c_int {
        self.data.cnt.status as c_int
    }

    pub fn running(&self) -> bool {
        let status = self.status();
        status < TERMINATE_SUCCESS && status > TERMINATE_ERROR
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> Result<()> {
        let option = c_string(name);
        let ok = unsafe { (self.api.set_bool_param)(&mut self.data.par, option.as_ptr(), value) };
        check_param(ok, name, "bool", value)
    }

    pub fn set_int(&mut self, name: &str, value: i32) -> Result<()> {
        let option = c_string(name);
        let ok = unsafe { (self.api.set_int_param)(&mut self.data.par, option.as_ptr(), value) };
        check_param(ok, name, "integer", value)
    }

    pub fn set_double(&mut self, name: &str, value: f64) -> Result<()> {
        let option = c_string(name);
        let ok = unsafe { (self.api.set_double_param)(&mut self.data.par, option.as_ptr(), value) };
        check_param(ok, name, "float", value)
    }

    /// Text describing the final solver status.
    pub fn status_message(&mut self) -> String {
        let mut buf = [0 as c_char; STATUS_MSG_LENGTH];
        let (o, w, p, c) = self.pointers();
        unsafe { (self.api.status_msg_string)(o, w, p, c, buf.as_mut_ptr()) };
        c_buffer_to_string(&buf)
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        log::debug!("WorhpFree");
        let free = self.api.worhp_free;
        self.call(free);
    }
}

fn check_param<T: std::fmt::Display>(ok: bool, name: &str, kind: &str, value: T) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "The option '{}' was requested by the user to be set to the {} value {}, but WORHP \
             interface returned an error. Did you misspell the option name?",
            name, kind, value
        )))
    }
}

pub(crate) fn c_string(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

/// Reads a NUL terminated string out of a fixed size C buffer.
pub(crate) fn c_buffer_to_string(buf: &[c_char]) -> String {
    let bytes: Vec<u8> = buf.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Evaluates the problem on behalf of WORHP.
pub(crate) struct Driver<'a> {
    problem: &'a dyn Problem,
    n: usize,
    nc: usize,
    gradient: GradientLayout,
    hessians_sparsity: Vec<SparsityPattern>,
    hessian: HessianLayout,
    f_cache: Option<(Vec<f64>, Vec<f64>)>,
    g_cache: Option<(Vec<f64>, Vec<f64>)>,
    logbook: Logbook,
}

impl<'a> Driver<'a> {
    pub fn new(
        problem: &'a dyn Problem,
        gradient: GradientLayout,
        hessians_sparsity: Vec<SparsityPattern>,
        hessian: HessianLayout,
        logbook: Logbook,
    ) -> Self {
        Self {
            problem,
            n: problem.dimension(),
            nc: problem.num_constraints(),
            gradient,
            hessians_sparsity,
            hessian,
            f_cache: None,
            g_cache: None,
            logbook,
        }
    }

    /// Runs the reverse communication loop until WORHP reaches a terminal status.
    ///
    /// In every iteration each pending action is served in `POLL_ORDER` and,
    /// except for `CallWorhp` and `Fidif`, acknowledged.
    pub fn solve(&mut self, session: &mut Session) -> Result<()> {
        while session.running() {
            for action in UserAction::POLL_ORDER {
                if !session.has_action(action) {
                    continue;
                }
                let api = session.api;
                match action {
                    UserAction::CallWorhp => session.call(api.worhp),
                    UserAction::IterOutput => session.call(api.iteration_output),
                    UserAction::EvalF => {
                        let d = &mut *session.data;
                        self.user_f(&mut d.opt, &d.wsp)?
                    }
                    UserAction::EvalG => self.user_g(&mut session.data.opt)?,
                    UserAction::EvalDF => {
                        let d = &mut *session.data;
                        self.user_df(&d.opt, &mut d.wsp)?
                    }
                    UserAction::EvalHM => {
                        let d = &mut *session.data;
                        self.user_hm(&d.opt, &mut d.wsp)?
                    }
                    UserAction::EvalDG => {
                        let d = &mut *session.data;
                        self.user_dg(&d.opt, &mut d.wsp)?
                    }
                    UserAction::Fidif => session.call(api.worhp_fidif),
                }
                if action.needs_ack() {
                    session.done(action);
                }
            }
        }
        Ok(())
    }

    fn x(&self, opt: &OptVar) -> Vec<f64> {
        unsafe { slice(opt.X, opt.n) }.to_vec()
    }

    /// Fitness at `x`, reusing the last evaluation if `x` has not changed.
    fn fitness(&mut self, x: &[f64]) -> Result<Vec<f64>> {
        if let Some((cx, cf)) = &self.f_cache {
            if cx.as_slice() == x {
                return Ok(cf.clone());
            }
        }
        let f = self.problem.fitness(x).map_err(Error::UserCallback)?;
        if f.len() != self.nc + 1 {
            return Err(Error::ProblemShape(format!(
                "fitness returned {} values, {} were expected",
                f.len(),
                self.nc + 1
            )));
        }
        self.logbook.record(&f);
        self.f_cache = Some((x.to_vec(), f.clone()));
        Ok(f)
    }

    fn gradient(&mut self, x: &[f64]) -> Result<Vec<f64>> {
        if let Some((cx, cg)) = &self.g_cache {
            if cx.as_slice() == x {
                return Ok(cg.clone());
            }
        }
        let g = self.problem.gradient(x).map_err(Error::UserCallback)?;
        let expected = self.gradient.split + self.gradient.jacobian.len();
        if g.len() != expected {
            return Err(Error::ProblemShape(format!(
                "gradient returned {} values, the sparsity pattern has {}",
                g.len(),
                expected
            )));
        }
        self.g_cache = Some((x.to_vec(), g.clone()));
        Ok(g)
    }

    fn user_f(&mut self, opt: &mut OptVar, wsp: &Workspace) -> Result<()> {
        let x = self.x(opt);
        let f = self.fitness(&x)?;
        opt.F = wsp.ScaleObj * f[0];
        Ok(())
    }

    fn user_g(&mut self, opt: &mut OptVar) -> Result<()> {
        let x = self.x(opt);
        let f = self.fitness(&x)?;
        let g = unsafe { slice_mut(opt.G, opt.m) };
        for (gi, fi) in g.iter_mut().zip(&f[1..]) {
            *gi = *fi;
        }
        Ok(())
    }

    fn user_df(&mut self, opt: &OptVar, wsp: &mut Workspace) -> Result<()> {
        let x = self.x(opt);
        let grad = self.gradient(&x)?;
        let val = unsafe { slice_mut(wsp.DF.val, wsp.DF.nnz) };
        for (v, gi) in val.iter_mut().zip(&grad[..self.gradient.split]) {
            *v = wsp.ScaleObj * gi;
        }
        Ok(())
    }

    fn user_dg(&mut self, opt: &OptVar, wsp: &mut Workspace) -> Result<()> {
        let x = self.x(opt);
        let grad = self.gradient(&x)?;
        let jac = &grad[self.gradient.split..];
        let val = unsafe { slice_mut(wsp.DG.val, wsp.DG.nnz) };
        for (v, &k) in val.iter_mut().zip(&self.gradient.jacobian) {
            *v = jac[k];
        }
        Ok(())
    }

    /// Hessian of the Lagrangian `ScaleObj * f + sum(mu_i * g_i)`.
    fn user_hm(&mut self, opt: &OptVar, wsp: &mut Workspace) -> Result<()> {
        let x = self.x(opt);
        let h = self.problem.hessians(&x).map_err(Error::UserCallback)?;
        let mu = unsafe { slice(opt.Mu, opt.m) };
        let values = self.lagrangian(&h, wsp.ScaleObj, mu)?;
        let val = unsafe { slice_mut(wsp.HM.val, wsp.HM.nnz) };
        for (v, hv) in val.iter_mut().zip(values) {
            *v = hv;
        }
        Ok(())
    }

    /// Assembles the Lagrangian Hessian in solver order: strict lower
    /// triangle by column then the diagonal.
    pub fn lagrangian(&self, h: &[Vec<f64>], scale_obj: f64, mu: &[f64]) -> Result<Vec<f64>> {
        if h.len() != self.hessians_sparsity.len() {
            return Err(Error::ProblemShape(format!(
                "hessians returned {} matrices, {} were expected",
                h.len(),
                self.hessians_sparsity.len()
            )));
        }
        let mut merged: HashMap<(usize, usize), f64> = HashMap::new();
        for (i, (hi, sp)) in h.iter().zip(&self.hessians_sparsity).enumerate() {
            if hi.len() != sp.len() {
                return Err(Error::ProblemShape(format!(
                    "hessian {} has {} values, its sparsity pattern has {}",
                    i,
                    hi.len(),
                    sp.len()
                )));
            }
            let weight = if i == 0 {
                scale_obj
            } else {
                mu.get(i - 1).copied().unwrap_or(0.0)
            };
            for (&v, &ij) in hi.iter().zip(sp) {
                *merged.entry(ij).or_insert(0.0) += v * weight;
            }
        }

        let layout = &self.hessian;
        let lower = layout
            .lower
            .iter()
            .map(|&k| merged.get(&layout.merged[k]).copied().unwrap_or(0.0));
        let diagonal = (0..self.n).map(|i| merged.get(&(i, i)).copied().unwrap_or(0.0));
        Ok(lower.chain(diagonal).collect())
    }

    pub fn into_logbook(self) -> Logbook {
        self.logbook
    }
}
