//! In-process stand-in for the snopt7_c library.
//!
//! `solveA` calls the user function a fixed number of times at the initial
//! point, asking for both values and derivatives, and stops early if the
//! user function writes a negative status.

use crate::raw::slice;
use crate::snopt7::{SnFunA, SnProblem, Snopt7Api};
use std::cell::RefCell;
use std::ffi::{c_char, c_int, CStr};
use std::ptr;

#[derive(Debug, Default)]
pub struct SnoptState {
    /// Entry points called, in order.
    pub calls: Vec<String>,
    pub int_params: Vec<(String, i32)>,
    pub real_params: Vec<(String, f64)>,
    pub name: String,
    pub summ_on: c_int,
    /// Number of user function calls performed by `solveA`.
    pub evaluations: usize,
    /// Point written back by `solveA`, if any.
    pub solution: Option<Vec<f64>>,
    pub i_gfun: Vec<c_int>,
    pub j_gvar: Vec<c_int>,
    pub flow: Vec<f64>,
    pub fupp: Vec<f64>,
    pub f_init: Vec<f64>,
    pub last_f: Vec<f64>,
    pub last_g: Vec<f64>,
    pub last_status: c_int,
}

thread_local! {
    static STATE: RefCell<SnoptState> = RefCell::new(SnoptState::default());
}

/// Clears the recorded state and sets the number of evaluations.
pub fn reset(evaluations: usize) {
    STATE.with(|s| {
        *s.borrow_mut() = SnoptState {
            evaluations,
            ..Default::default()
        }
    });
}

pub fn with<R>(f: impl FnOnce(&mut SnoptState) -> R) -> R {
    STATE.with(|s| f(&mut s.borrow_mut()))
}

pub fn calls() -> Vec<String> {
    with(|s| s.calls.clone())
}

pub fn api<P: SnProblem>() -> Snopt7Api<P> {
    Snopt7Api {
        sn_init: sn_init::<P>,
        set_int_parameter: set_int_parameter::<P>,
        set_real_parameter: set_real_parameter::<P>,
        delete_snopt: delete_snopt::<P>,
        solve_a: solve_a::<P>,
        library: None,
    }
}

unsafe fn string(s: *const c_char) -> String {
    if s.is_null() {
        String::new()
    } else {
        CStr::from_ptr(s).to_string_lossy().into_owned()
    }
}

unsafe extern "C" fn sn_init<P: SnProblem>(
    _prob: *mut P,
    name: *mut c_char,
    _prtfile: *mut c_char,
    summ_on: c_int,
) {
    let name = string(name);
    with(|s| {
        s.calls.push("snInit".to_string());
        s.name = name;
        s.summ_on = summ_on;
    });
}

unsafe extern "C" fn set_int_parameter<P: SnProblem>(
    _prob: *mut P,
    stropt: *mut c_char,
    opt: c_int,
) -> c_int {
    let name = string(stropt);
    let rejected = name.starts_with("invalid");
    with(|s| s.int_params.push((name, opt)));
    rejected as c_int
}

unsafe extern "C" fn set_real_parameter<P: SnProblem>(
    _prob: *mut P,
    stropt: *mut c_char,
    opt: f64,
) -> c_int {
    let name = string(stropt);
    let rejected = name.starts_with("invalid");
    with(|s| s.real_params.push((name, opt)));
    rejected as c_int
}

unsafe extern "C" fn delete_snopt<P: SnProblem>(_prob: *mut P) {
    with(|s| s.calls.push("deleteSNOPT".to_string()));
}

#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn solve_a<P: SnProblem>(
    prob: *mut P,
    _start: c_int,
    nf: c_int,
    n: c_int,
    _obj_add: f64,
    _obj_row: c_int,
    usrfun: SnFunA,
    _ne_a: c_int,
    _i_afun: *mut c_int,
    _j_avar: *mut c_int,
    _a: *mut f64,
    ne_g: c_int,
    i_gfun: *mut c_int,
    j_gvar: *mut c_int,
    _xlow: *mut f64,
    _xupp: *mut f64,
    flow: *mut f64,
    fupp: *mut f64,
    x: *mut f64,
    _xstate: *mut c_int,
    _xmul: *mut f64,
    f: *mut f64,
    _fstate: *mut c_int,
    _fmul: *mut f64,
    _ns: *mut c_int,
    _ninf: *mut c_int,
    _sinf: *mut f64,
) -> c_int {
    let evaluations = with(|s| {
        s.calls.push("solveA".to_string());
        s.i_gfun = slice(i_gfun, ne_g).to_vec();
        s.j_gvar = slice(j_gvar, ne_g).to_vec();
        s.flow = slice(flow, nf).to_vec();
        s.fupp = slice(fupp, nf).to_vec();
        s.f_init = slice(f, nf).to_vec();
        s.evaluations
    });

    let iu = (*prob).user_workspace();
    let mut xs = slice(x, n).to_vec();
    let mut fs = vec![0.0; nf.max(0) as usize];
    let mut gs = vec![0.0; ne_g.max(0) as usize];
    let (mut n, mut nf, mut ne_g) = (n, nf, ne_g);
    let (mut lencu, mut leniu, mut lenru) = (0, 0, 0);

    for _ in 0..evaluations {
        let (mut status, mut need_f, mut need_g) = (0, 1, 1);
        usrfun(
            &mut status,
            &mut n,
            xs.as_mut_ptr(),
            &mut need_f,
            &mut nf,
            fs.as_mut_ptr(),
            &mut need_g,
            &mut ne_g,
            gs.as_mut_ptr(),
            ptr::null_mut(),
            &mut lencu,
            iu,
            &mut leniu,
            ptr::null_mut(),
            &mut lenru,
        );
        if status < 0 {
            with(|s| s.last_status = status);
            return 71;
        }
    }

    let solution = with(|s| {
        s.last_f = fs;
        s.last_g = gs;
        s.solution.clone()
    });
    if let Some(sol) = solution {
        for (i, v) in sol.into_iter().enumerate().take(n.max(0) as usize) {
            *x.add(i) = v;
        }
    }
    1
}
