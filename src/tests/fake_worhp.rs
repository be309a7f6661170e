//! In-process stand-in for the WORHP library.
//!
//! `Worhp` snapshots the user-visible buffers and then requests the next
//! action mask of a script. Once the script is exhausted it terminates with
//! `final_status`, writing `solution` into `X` if one is set.

use crate::raw::{slice, slice_mut};
use crate::worhp::{
    is_set, Control, OptVar, Params, UserAction, WorhpApi, WorhpPrintFn, Workspace,
    STATUS_MSG_LENGTH, TERMINATE_SUCCESS,
};
use std::cell::RefCell;
use std::ffi::{c_char, c_int, CStr};

pub const STATUS_MESSAGE: &str = "All went great!!!! What a glamorous Success!!";

/// Buffers seen by one call to `Worhp`.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub x: Vec<f64>,
    pub f: f64,
    pub g: Vec<f64>,
    pub df: Vec<f64>,
    pub dg: Vec<f64>,
    pub hm: Vec<f64>,
}

/// Arrays allocated by `WorhpInit`.
#[derive(Debug, Default)]
struct Memory {
    x: Vec<f64>,
    lambda: Vec<f64>,
    xl: Vec<f64>,
    xu: Vec<f64>,
    g: Vec<f64>,
    mu: Vec<f64>,
    gl: Vec<f64>,
    gu: Vec<f64>,
    df: (Vec<c_int>, Vec<c_int>, Vec<f64>),
    dg: (Vec<c_int>, Vec<c_int>, Vec<f64>),
    hm: (Vec<c_int>, Vec<c_int>, Vec<f64>),
}

#[derive(Debug)]
pub struct WorhpState {
    pub version: (c_int, c_int),
    pub calls: Vec<String>,
    pub bool_params: Vec<(String, bool)>,
    pub int_params: Vec<(String, i32)>,
    pub double_params: Vec<(String, f64)>,
    /// File handed to `ReadParams`.
    pub param_file: Option<String>,
    /// Mask of the actions currently requested.
    pending: c_int,
    /// Actions found pending by `GetUserAction`, in order.
    pub polled: Vec<c_int>,
    /// Actions acknowledged with `DoneUserAction`, in order.
    pub acked: Vec<c_int>,
    /// Action masks requested by successive calls to `Worhp`.
    pub script: Vec<c_int>,
    pub final_status: c_int,
    pub solution: Option<Vec<f64>>,
    /// Multipliers and objective scaling set by the first call to `Worhp`.
    pub mu: Vec<f64>,
    pub scale_obj: f64,
    pub snapshots: Vec<Snapshot>,
    pub df_row: Vec<c_int>,
    pub dg_row: Vec<c_int>,
    pub dg_col: Vec<c_int>,
    pub hm_row: Vec<c_int>,
    pub hm_col: Vec<c_int>,
    pub xl: Vec<f64>,
    pub xu: Vec<f64>,
    pub gl: Vec<f64>,
    pub gu: Vec<f64>,
    pub par: (bool, bool, bool, bool, f64, f64),
    memory: Memory,
}

impl Default for WorhpState {
    fn default() -> Self {
        Self {
            version: (1, 14),
            calls: Vec::new(),
            bool_params: Vec::new(),
            int_params: Vec::new(),
            double_params: Vec::new(),
            param_file: None,
            pending: 0,
            polled: Vec::new(),
            acked: Vec::new(),
            script: Vec::new(),
            final_status: TERMINATE_SUCCESS,
            solution: None,
            mu: Vec::new(),
            scale_obj: 1.0,
            snapshots: Vec::new(),
            df_row: Vec::new(),
            dg_row: Vec::new(),
            dg_col: Vec::new(),
            hm_row: Vec::new(),
            hm_col: Vec::new(),
            xl: Vec::new(),
            xu: Vec::new(),
            gl: Vec::new(),
            gu: Vec::new(),
            par: (false, false, false, false, 0.0, 0.0),
            memory: Memory::default(),
        }
    }
}

thread_local! {
    static STATE: RefCell<WorhpState> = RefCell::new(WorhpState::default());
}

/// Clears the recorded state and installs the action script.
pub fn reset(script: &[c_int]) {
    STATE.with(|s| {
        *s.borrow_mut() = WorhpState {
            script: script.to_vec(),
            ..Default::default()
        }
    });
}

pub fn with<R>(f: impl FnOnce(&mut WorhpState) -> R) -> R {
    STATE.with(|s| f(&mut s.borrow_mut()))
}

pub fn calls() -> Vec<String> {
    with(|s| s.calls.clone())
}

/// Bit mask of `actions`.
pub fn mask(actions: &[UserAction]) -> c_int {
    actions.iter().fold(0, |m, &a| m | a as c_int)
}

pub fn api() -> WorhpApi {
    WorhpApi {
        worhp_pre_init,
        worhp_init,
        read_params,
        set_worhp_print,
        get_user_action,
        done_user_action,
        iteration_output,
        worhp,
        status_msg,
        status_msg_string,
        worhp_free,
        worhp_fidif,
        set_bool_param,
        set_int_param,
        set_double_param,
        worhp_version,
        library: None,
    }
}

fn record(call: &str) {
    with(|s| s.calls.push(call.to_string()));
}

unsafe fn string(s: *const c_char) -> String {
    CStr::from_ptr(s).to_string_lossy().into_owned()
}

unsafe extern "C" fn worhp_pre_init(
    _o: *mut OptVar,
    w: *mut Workspace,
    p: *mut Params,
    _c: *mut Control,
) {
    record("WorhpPreInit");
    let (wsp, par) = (&mut *w, &mut *p);
    wsp.ScaleObj = 1.0;
    par.Infty = 1e20;
    par.TolFeas = 1e-6;
    par.AcceptTolFeas = 1e-3;
}

unsafe extern "C" fn worhp_init(
    o: *mut OptVar,
    w: *mut Workspace,
    _p: *mut Params,
    c: *mut Control,
) {
    let (opt, wsp, cnt) = (&mut *o, &mut *w, &mut *c);
    let (n, m) = (opt.n.max(0) as usize, opt.m.max(0) as usize);
    let matrix = |nnz: c_int| {
        let nnz = nnz.max(0) as usize;
        (vec![0; nnz], vec![0; nnz], vec![0.0; nnz])
    };
    with(|s| {
        s.calls.push("WorhpInit".to_string());
        s.memory = Memory {
            x: vec![0.0; n],
            lambda: vec![0.0; n],
            xl: vec![0.0; n],
            xu: vec![0.0; n],
            g: vec![0.0; m],
            mu: vec![0.0; m],
            gl: vec![0.0; m],
            gu: vec![0.0; m],
            df: matrix(wsp.DF.nnz),
            dg: matrix(wsp.DG.nnz),
            hm: matrix(wsp.HM.nnz),
        };
        let mem = &mut s.memory;
        opt.X = mem.x.as_mut_ptr();
        opt.Lambda = mem.lambda.as_mut_ptr();
        opt.XL = mem.xl.as_mut_ptr();
        opt.XU = mem.xu.as_mut_ptr();
        opt.G = mem.g.as_mut_ptr();
        opt.Mu = mem.mu.as_mut_ptr();
        opt.GL = mem.gl.as_mut_ptr();
        opt.GU = mem.gu.as_mut_ptr();
        for (matrix, mem) in [
            (&mut wsp.DF, &mut mem.df),
            (&mut wsp.DG, &mut mem.dg),
            (&mut wsp.HM, &mut mem.hm),
        ] {
            matrix.row = mem.0.as_mut_ptr();
            matrix.col = mem.1.as_mut_ptr();
            matrix.val = mem.2.as_mut_ptr();
            matrix.NeedStructure = true.into();
        }
        s.pending = UserAction::CallWorhp as c_int;
    });
    cnt.status = 0;
}

unsafe extern "C" fn read_params(_n_xml: *mut c_int, filename: *const c_char, _par: *mut Params) {
    let filename = string(filename);
    with(|s| {
        s.calls.push("ReadParams".to_string());
        s.param_file = Some(filename);
    });
}

unsafe extern "C" fn set_worhp_print(_f: WorhpPrintFn) {
    record("SetWorhpPrint");
}

unsafe extern "C" fn get_user_action(_cnt: *const Control, action: c_int) -> bool {
    with(|s| {
        let pending = s.pending & action != 0;
        if pending {
            s.polled.push(action);
        }
        pending
    })
}

unsafe extern "C" fn done_user_action(_cnt: *mut Control, action: c_int) {
    with(|s| {
        s.pending &= !action;
        s.acked.push(action);
    });
}

unsafe extern "C" fn iteration_output(
    _o: *mut OptVar,
    _w: *mut Workspace,
    _p: *mut Params,
    _c: *mut Control,
) {
    record("IterationOutput");
}

unsafe extern "C" fn worhp(o: *mut OptVar, w: *mut Workspace, p: *mut Params, c: *mut Control) {
    let (opt, wsp, par, cnt) = (&mut *o, &mut *w, &*p, &mut *c);
    let first = with(|s| {
        s.calls.push("Worhp".to_string());
        s.snapshots.push(Snapshot {
            x: slice(opt.X, opt.n).to_vec(),
            f: opt.F,
            g: slice(opt.G, opt.m).to_vec(),
            df: slice(wsp.DF.val, wsp.DF.nnz).to_vec(),
            dg: slice(wsp.DG.val, wsp.DG.nnz).to_vec(),
            hm: slice(wsp.HM.val, wsp.HM.nnz).to_vec(),
        });
        s.snapshots.len() == 1
    });

    if first {
        with(|s| {
            s.df_row = slice(wsp.DF.row, wsp.DF.nnz).to_vec();
            s.dg_row = slice(wsp.DG.row, wsp.DG.nnz).to_vec();
            s.dg_col = slice(wsp.DG.col, wsp.DG.nnz).to_vec();
            s.hm_row = slice(wsp.HM.row, wsp.HM.nnz).to_vec();
            s.hm_col = slice(wsp.HM.col, wsp.HM.nnz).to_vec();
            s.xl = slice(opt.XL, opt.n).to_vec();
            s.xu = slice(opt.XU, opt.n).to_vec();
            s.gl = slice(opt.GL, opt.m).to_vec();
            s.gu = slice(opt.GU, opt.m).to_vec();
            s.par = (
                is_set(par.FGtogether),
                is_set(par.UserDF),
                is_set(par.UserDG),
                is_set(par.UserHM),
                par.TolFeas,
                par.AcceptTolFeas,
            );
            for (mu, v) in slice_mut(opt.Mu, opt.m).iter_mut().zip(&s.mu) {
                *mu = *v;
            }
            wsp.ScaleObj = s.scale_obj;
        });
    }

    let next = with(|s| {
        if s.script.is_empty() {
            None
        } else {
            Some(s.script.remove(0))
        }
    });
    match next {
        Some(mask) => {
            cnt.status = 1;
            with(|s| s.pending = mask);
        }
        None => {
            if let Some(solution) = with(|s| s.solution.clone()) {
                for (x, v) in slice_mut(opt.X, opt.n).iter_mut().zip(solution) {
                    *x = v;
                }
            }
            cnt.status = with(|s| {
                s.pending = 0;
                s.final_status
            });
        }
    }
}

unsafe extern "C" fn status_msg(
    _o: *mut OptVar,
    _w: *mut Workspace,
    _p: *mut Params,
    _c: *mut Control,
) {
    record("StatusMsg");
}

unsafe extern "C" fn status_msg_string(
    _o: *mut OptVar,
    _w: *mut Workspace,
    _p: *mut Params,
    _c: *mut Control,
    message: *mut c_char,
) {
    let buf = std::slice::from_raw_parts_mut(message, STATUS_MSG_LENGTH);
    for (b, &c) in buf.iter_mut().zip(STATUS_MESSAGE.as_bytes()) {
        *b = c as c_char;
    }
    buf[STATUS_MESSAGE.len()] = 0;
}

unsafe extern "C" fn worhp_free(
    _o: *mut OptVar,
    _w: *mut Workspace,
    _p: *mut Params,
    _c: *mut Control,
) {
    with(|s| {
        s.calls.push("WorhpFree".to_string());
        s.memory = Memory::default();
    });
}

unsafe extern "C" fn worhp_fidif(
    _o: *mut OptVar,
    _w: *mut Workspace,
    _p: *mut Params,
    _c: *mut Control,
) {
    with(|s| {
        s.calls.push("WorhpFidif".to_string());
        s.pending &= !(UserAction::Fidif as c_int);
    });
}

unsafe extern "C" fn set_bool_param(par: *mut Params, name: *const c_char, value: bool) -> bool {
    let name = string(name);
    let par = &mut *par;
    match name.as_str() {
        "FGtogether" => par.FGtogether = value.into(),
        "UserDF" => par.UserDF = value.into(),
        "UserDG" => par.UserDG = value.into(),
        "UserHM" => par.UserHM = value.into(),
        _ => {}
    }
    let accepted = !name.starts_with("invalid");
    with(|s| s.bool_params.push((name, value)));
    accepted
}

unsafe extern "C" fn set_int_param(_par: *mut Params, name: *const c_char, value: c_int) -> bool {
    let name = string(name);
    let accepted = !name.starts_with("invalid");
    with(|s| s.int_params.push((name, value)));
    accepted
}

unsafe extern "C" fn set_double_param(par: *mut Params, name: *const c_char, value: f64) -> bool {
    let name = string(name);
    let par = &mut *par;
    match name.as_str() {
        "TolFeas" => par.TolFeas = value,
        "AcceptTolFeas" => par.AcceptTolFeas = value,
        _ => {}
    }
    let accepted = !name.starts_with("invalid");
    with(|s| s.double_params.push((name, value)));
    accepted
}

unsafe extern "C" fn worhp_version(major: *mut c_int, minor: *mut c_int, patch: *mut c_char) {
    let (ma, mi) = with(|s| s.version);
    *major = ma;
    *minor = mi;
    *patch = b'1' as c_char;
    *patch.add(1) = 0;
}
