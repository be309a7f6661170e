use super::ffi::USER_ABORT;
use crate::progress::Logbook;
use crate::raw::{read_int, slice, slice_mut};
use crate::traits::Problem;
use anyhow::{anyhow, Result};
use std::any::Any;
use std::ffi::{c_char, c_int};
use std::mem::align_of;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Failure raised while evaluating the problem inside the user function.
pub(crate) enum Failure {
    Error(anyhow::Error),
    Panic(Box<dyn Any + Send + 'static>),
}

/// State shared with the user function through the `iu` workspace pointer.
pub(crate) struct UserData<'a> {
    problem: &'a dyn Problem,
    dv: Vec<f64>,
    /// Solver order of the gradient entries.
    gradient_order: Vec<usize>,
    has_gradient: bool,
    pub logbook: Logbook,
    pub failure: Option<Failure>,
}

impl<'a> UserData<'a> {
    pub fn new(problem: &'a dyn Problem, gradient_order: Vec<usize>, logbook: Logbook) -> Self {
        Self {
            problem,
            dv: vec![0.0; problem.dimension()],
            gradient_order,
            has_gradient: problem.has_gradient(),
            logbook,
            failure: None,
        }
    }

    /// Address to store in the user integer workspace.
    pub fn as_workspace(&mut self) -> *mut c_int {
        (self as *mut Self).cast()
    }

    /// Recovers the capsule from the user integer workspace pointer.
    ///
    /// # Safety
    ///
    /// A non-null, aligned `iu` must have been produced by `as_workspace` on a
    /// capsule that is still alive and not otherwise borrowed.
    pub unsafe fn from_workspace<'b>(iu: *mut c_int) -> Option<&'b mut UserData<'a>> {
        let ptr = iu.cast::<UserData<'a>>();
        if ptr.is_null() || (ptr as usize) % align_of::<UserData<'a>>() != 0 {
            return None;
        }
        Some(&mut *ptr)
    }

    fn evaluate(&mut self, x: &[f64], f: Option<&mut [f64]>, g: Option<&mut [f64]>) -> Result<()> {
        let n = self.dv.len().min(x.len());
        self.dv[..n].copy_from_slice(&x[..n]);

        if let Some(f) = f {
            let fit = self.problem.fitness(&self.dv)?;
            if fit.len() < f.len() {
                return Err(anyhow!(
                    "fitness returned {} values, {} were expected",
                    fit.len(),
                    f.len()
                ));
            }
            let nf = f.len();
            f.copy_from_slice(&fit[..nf]);
            self.logbook.record(&fit);
        }

        if let Some(g) = g {
            if self.has_gradient {
                let grad = self.problem.gradient(&self.dv)?;
                if grad.len() != self.gradient_order.len() {
                    return Err(anyhow!(
                        "gradient returned {} values, the sparsity pattern has {}",
                        grad.len(),
                        self.gradient_order.len()
                    ));
                }
                for (gk, &k) in g.iter_mut().zip(&self.gradient_order) {
                    *gk = grad[k];
                }
            }
        }
        Ok(())
    }
}

/// User function passed to `solveA`.
///
/// Problem errors and panics never unwind into the library: they are stored
/// in the capsule and the solve is stopped with `USER_ABORT`.
pub(crate) unsafe extern "C" fn snopt_fitness_wrapper(
    status: *mut c_int,
    n: *mut c_int,
    x: *mut f64,
    need_f: *mut c_int,
    nf: *mut c_int,
    f: *mut f64,
    need_g: *mut c_int,
    neg: *mut c_int,
    g: *mut f64,
    _cu: *mut c_char,
    _lencu: *mut c_int,
    iu: *mut c_int,
    _leniu: *mut c_int,
    _ru: *mut f64,
    _lenru: *mut c_int,
) {
    let info = match UserData::from_workspace(iu) {
        Some(info) => info,
        None => {
            if !status.is_null() {
                *status = USER_ABORT;
            }
            return;
        }
    };
    let x = slice(x, read_int(n));
    let f = (read_int(need_f) > 0).then(|| slice_mut(f, read_int(nf)));
    let g = (read_int(need_g) > 0).then(|| slice_mut(g, read_int(neg)));

    let failure = match catch_unwind(AssertUnwindSafe(|| info.evaluate(x, f, g))) {
        Ok(Ok(())) => return,
        Ok(Err(e)) => Failure::Error(e),
        Err(payload) => Failure::Panic(payload),
    };
    info.failure = Some(failure);
    if !status.is_null() {
        *status = USER_ABORT;
    }
}
