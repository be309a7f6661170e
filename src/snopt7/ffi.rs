//! C interface of the snopt7_c library.

use crate::error::Result;
use crate::library::SharedLibrary;
use std::ffi::{c_char, c_int, c_void};
use std::path::Path;
use std::ptr;

/// Status written by the user function to ask SNOPT7 to stop.
pub const USER_ABORT: c_int = -100;

/// Signature of the user function called back by `solveA`.
pub type SnFunA = unsafe extern "C" fn(
    status: *mut c_int,
    n: *mut c_int,
    x: *mut f64,
    need_f: *mut c_int,
    nf: *mut c_int,
    f: *mut f64,
    need_g: *mut c_int,
    neg: *mut c_int,
    g: *mut f64,
    cu: *mut c_char,
    lencu: *mut c_int,
    iu: *mut c_int,
    leniu: *mut c_int,
    ru: *mut f64,
    lenru: *mut c_int,
);

/// Layout of the `snProblem` struct, which changed between SNOPT 7.6 and 7.7.
pub trait SnProblem: Sized {
    /// A struct with all pointers null and all counters zero, ready for `snInit`.
    fn empty() -> Self;

    /// Stores the user integer workspace handed back to the user function.
    fn set_user_workspace(&mut self, iu: *mut c_int);

    fn user_workspace(&self) -> *mut c_int;
}

/// `snProblem` as declared by SNOPT up to 7.6.
#[repr(C)]
pub struct SnProblem76 {
    pub name: *mut c_char,

    pub mem_called: c_int,
    pub init_called: c_int,

    pub sn_stop: *mut c_void,
    pub sn_log: *mut c_void,
    pub sn_log2: *mut c_void,
    pub sq_log: *mut c_void,

    pub lenrw: c_int,
    pub leniw: c_int,
    pub iw: *mut c_int,
    pub rw: *mut f64,

    pub lenru: c_int,
    pub leniu: c_int,
    pub iu: *mut c_int,
    pub ru: *mut f64,
}

/// `snProblem` as declared by SNOPT 7.7, which adds a user character workspace.
#[repr(C)]
pub struct SnProblem77 {
    pub name: *mut c_char,

    pub mem_called: c_int,
    pub init_called: c_int,

    pub sn_stop: *mut c_void,
    pub sn_log: *mut c_void,
    pub sn_log2: *mut c_void,
    pub sq_log: *mut c_void,

    pub lenrw: c_int,
    pub leniw: c_int,
    pub iw: *mut c_int,
    pub rw: *mut f64,

    pub lenru: c_int,
    pub leniu: c_int,
    pub iu: *mut c_int,
    pub ru: *mut f64,

    pub lencu: c_int,
    pub cu: *mut c_char,
}

impl SnProblem for SnProblem76 {
    fn empty() -> Self {
        Self {
            name: ptr::null_mut(),
            mem_called: 0,
            init_called: 0,
            sn_stop: ptr::null_mut(),
            sn_log: ptr::null_mut(),
            sn_log2: ptr::null_mut(),
            sq_log: ptr::null_mut(),
            lenrw: 0,
            leniw: 0,
            iw: ptr::null_mut(),
            rw: ptr::null_mut(),
            lenru: 0,
            leniu: 0,
            iu: ptr::null_mut(),
            ru: ptr::null_mut(),
        }
    }

    fn set_user_workspace(&mut self, iu: *mut c_int) {
        self.iu = iu;
    }

    fn user_workspace(&self) -> *mut c_int {
        self.iu
    }
}

impl SnProblem for SnProblem77 {
    fn empty() -> Self {
        Self {
            name: ptr::null_mut(),
            mem_called: 0,
            init_called: 0,
            sn_stop: ptr::null_mut(),
            sn_log: ptr::null_mut(),
            sn_log2: ptr::null_mut(),
            sq_log: ptr::null_mut(),
            lenrw: 0,
            leniw: 0,
            iw: ptr::null_mut(),
            rw: ptr::null_mut(),
            lenru: 0,
            leniu: 0,
            iu: ptr::null_mut(),
            ru: ptr::null_mut(),
            lencu: 0,
            cu: ptr::null_mut(),
        }
    }

    fn set_user_workspace(&mut self, iu: *mut c_int) {
        self.iu = iu;
    }

    fn user_workspace(&self) -> *mut c_int {
        self.iu
    }
}

pub type SnInitFn<P> =
    unsafe extern "C" fn(prob: *mut P, name: *mut c_char, prtfile: *mut c_char, summ_on: c_int);
pub type SetIntParameterFn<P> =
    unsafe extern "C" fn(prob: *mut P, stropt: *mut c_char, opt: c_int) -> c_int;
pub type SetRealParameterFn<P> =
    unsafe extern "C" fn(prob: *mut P, stropt: *mut c_char, opt: f64) -> c_int;
pub type DeleteSnoptFn<P> = unsafe extern "C" fn(prob: *mut P);
pub type SolveAFn<P> = unsafe extern "C" fn(
    prob: *mut P,
    start: c_int,
    nf: c_int,
    n: c_int,
    obj_add: f64,
    obj_row: c_int,
    usrfun: SnFunA,
    ne_a: c_int,
    i_afun: *mut c_int,
    j_avar: *mut c_int,
    a: *mut f64,
    ne_g: c_int,
    i_gfun: *mut c_int,
    j_gvar: *mut c_int,
    xlow: *mut f64,
    xupp: *mut f64,
    flow: *mut f64,
    fupp: *mut f64,
    x: *mut f64,
    xstate: *mut c_int,
    xmul: *mut f64,
    f: *mut f64,
    fstate: *mut c_int,
    fmul: *mut f64,
    ns: *mut c_int,
    ninf: *mut c_int,
    sinf: *mut f64,
) -> c_int;

/// Entry points of the snopt7_c library for one `snProblem` layout.
pub struct Snopt7Api<P: SnProblem> {
    pub sn_init: SnInitFn<P>,
    pub set_int_parameter: SetIntParameterFn<P>,
    pub set_real_parameter: SetRealParameterFn<P>,
    pub delete_snopt: DeleteSnoptFn<P>,
    pub solve_a: SolveAFn<P>,
    pub(crate) library: Option<SharedLibrary>,
}

impl<P: SnProblem> Snopt7Api<P> {
    /// Loads the library at `path` and resolves the entry points.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let library = SharedLibrary::open("snopt7_c", path)?;
        unsafe {
            Ok(Self {
                sn_init: library.get("snInit")?,
                set_int_parameter: library.get("setIntParameter")?,
                set_real_parameter: library.get("setRealParameter")?,
                delete_snopt: library.get("deleteSNOPT")?,
                solve_a: library.get("solveA")?,
                library: Some(library),
            })
        }
    }
}

/// Textual descriptions of the `solveA` return codes.
const RESULTS: &[(c_int, &str)] = &[
    (0, "None"),
    (1, "Finished successfully - optimality conditions satisfied"),
    (2, "Finished successfully - feasible point found"),
    (3, "Finished successfully - requested accuracy could not be achieved"),
    (5, "Finished successfully - elastic objective minimized"),
    (6, "Finished successfully - elastic infeasibilities minimized"),
    (11, "The problem appears to be infeasible - infeasible linear constraints"),
    (12, "The problem appears to be infeasible - infeasible linear equality constraints"),
    (13, "The problem appears to be infeasible - nonlinear infeasibilities minimized"),
    (14, "The problem appears to be infeasible - linear infeasibilities minimized"),
    (15, "The problem appears to be infeasible - infeasible linear constraints in QP subproblem"),
    (16, "The problem appears to be infeasible - infeasible nonelastic constraints"),
    (21, "The problem appears to be unbounded - unbounded objective"),
    (22, "The problem appears to be unbounded - constraint violation limit reached"),
    (31, "Resource limit error - iteration limit reached"),
    (32, "Resource limit error - major iteration limit reached"),
    (33, "Resource limit error - the superbasics limit is too small"),
    (34, "Resource limit error - time limit reached"),
    (41, "Terminated after numerical difficulties - current point cannot be improved"),
    (42, "Terminated after numerical difficulties - singular basis"),
    (43, "Terminated after numerical difficulties - cannot satisfy the general constraints"),
    (44, "Terminated after numerical difficulties - ill-conditioned null-space basis"),
    (45, "Terminated after numerical difficulties - unable to compute acceptable LU factors"),
    (51, "Error in the user-supplied functions - incorrect objective derivatives"),
    (52, "Error in the user-supplied functions - incorrect constraint derivatives"),
    (56, "Error in the user-supplied functions - irregular or badly scaled problem functions"),
    (61, "Undefined user-supplied functions - undefined function at the first feasible point"),
    (62, "Undefined user-supplied functions - undefined function at the initial point"),
    (63, "Undefined user-supplied functions - unable to proceed into undefined region"),
    (71, "User requested termination - terminated during function evaluation"),
    (74, "User requested termination - terminated from monitor routine"),
    (81, "Insufficient storage allocated - work arrays must have at least 500 elements"),
    (82, "Insufficient storage allocated - not enough character storage"),
    (83, "Insufficient storage allocated - not enough integer storage"),
    (84, "Insufficient storage allocated - not enough real storage"),
    (91, "Input arguments out of range - invalid input argument"),
    (92, "Input arguments out of range - basis file dimensions do not match this problem"),
    (141, "System error - wrong number of basic variables"),
    (142, "System error - error in basis package"),
];

/// Looks up the description of a `solveA` return code.
pub fn describe_result(code: c_int) -> &'static str {
    RESULTS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, s)| *s)
        .unwrap_or("Unknown SNOPT7 return code")
}
