//! C interface of the WORHP library (unified solver interface).
//!
//! With the `worhp-headers` feature the four WORHP data structures are
//! generated from the headers of the installed library (see `build.rs`).
//! Without it, only the members the plugin touches are declared. That layout
//! is only valid for in-process entry points, and `WorhpApi::open` refuses to
//! load a real library with it.

use crate::error::{Error, Result};
use crate::library::SharedLibrary;
use std::ffi::{c_char, c_int};
use std::path::Path;

/// WORHP version the plugin is written against.
pub const WORHP_MAJOR: c_int = 1;
pub const WORHP_MINOR: c_int = 14;

pub const PATCH_STRING_LENGTH: usize = 8;
pub const STATUS_MSG_LENGTH: usize = 1024;

/// The solver keeps iterating while `TERMINATE_ERROR < status < TERMINATE_SUCCESS`.
pub const TERMINATE_SUCCESS: c_int = 1000;
pub const TERMINATE_ERROR: c_int = -1000;

/// Whether the data structures were generated from the library headers.
pub const HEADER_LAYOUT: bool = cfg!(feature = "worhp-headers");

#[cfg(feature = "worhp-headers")]
#[allow(non_snake_case, non_camel_case_types, non_upper_case_globals, dead_code)]
#[allow(clippy::all)]
mod layout {
    include!(concat!(env!("OUT_DIR"), "/worhp_layout.rs"));
}

#[cfg(not(feature = "worhp-headers"))]
#[allow(non_snake_case)]
mod layout {
    use std::ffi::c_int;

    /// Optimisation variables.
    #[repr(C)]
    pub struct OptVar {
        pub n: c_int,
        pub m: c_int,
        /// Scaled objective value.
        pub F: f64,
        pub X: *mut f64,
        pub Lambda: *mut f64,
        pub XL: *mut f64,
        pub XU: *mut f64,
        pub G: *mut f64,
        pub Mu: *mut f64,
        pub GL: *mut f64,
        pub GU: *mut f64,
    }

    /// Sparse matrix in coordinate format with one-based indices.
    #[repr(C)]
    pub struct WorhpMatrix {
        pub nnz: c_int,
        pub row: *mut c_int,
        pub col: *mut c_int,
        pub val: *mut f64,
        pub NeedStructure: bool,
    }

    /// Solver workspace.
    #[repr(C)]
    pub struct Workspace {
        /// Objective gradient.
        pub DF: WorhpMatrix,
        /// Constraint Jacobian.
        pub DG: WorhpMatrix,
        /// Hessian of the Lagrangian.
        pub HM: WorhpMatrix,
        pub ScaleObj: f64,
    }

    /// Solver parameters.
    #[repr(C)]
    pub struct Params {
        pub Infty: f64,
        pub FGtogether: bool,
        pub UserDF: bool,
        pub UserDG: bool,
        pub UserHM: bool,
        pub TolFeas: f64,
        pub AcceptTolFeas: f64,
    }

    /// Reverse communication state.
    #[repr(C)]
    pub struct Control {
        pub status: c_int,
    }
}

pub use layout::{Control, OptVar, Params, WorhpMatrix, Workspace};

/// The four WORHP data structures, kept together at a stable address.
#[repr(C)]
pub struct WorhpData {
    pub opt: OptVar,
    pub wsp: Workspace,
    pub par: Params,
    pub cnt: Control,
}

impl WorhpData {
    /// Zeroed structures, to be filled in by `WorhpPreInit`.
    pub fn empty() -> Box<Self> {
        // All members are integers, floats, booleans or raw pointers, for
        // which the all-zero bit pattern is valid.
        Box::new(unsafe { std::mem::zeroed() })
    }
}

/// Reads a boolean member, whichever C type the headers give it.
pub fn is_set<T: Default + PartialEq>(flag: T) -> bool {
    flag != T::default()
}

/// Actions requested by the solver through `GetUserAction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum UserAction {
    CallWorhp = 1,
    IterOutput = 2,
    EvalF = 4,
    EvalG = 8,
    EvalDF = 16,
    EvalDG = 32,
    EvalHM = 64,
    Fidif = 128,
}

impl UserAction {
    /// Order in which pending actions are served within one loop iteration.
    pub const POLL_ORDER: [UserAction; 8] = [
        UserAction::CallWorhp,
        UserAction::IterOutput,
        UserAction::EvalF,
        UserAction::EvalG,
        UserAction::EvalDF,
        UserAction::EvalHM,
        UserAction::EvalDG,
        UserAction::Fidif,
    ];

    /// Whether the action must be acknowledged with `DoneUserAction`. The
    /// solver resets `CallWorhp` and `Fidif` itself.
    pub fn needs_ack(self) -> bool {
        !matches!(self, UserAction::CallWorhp | UserAction::Fidif)
    }
}

pub type WorhpPrintFn = unsafe extern "C" fn(mode: c_int, message: *const c_char);

pub type WorhpFn = unsafe extern "C" fn(*mut OptVar, *mut Workspace, *mut Params, *mut Control);
pub type ReadParamsFn =
    unsafe extern "C" fn(n_xml: *mut c_int, filename: *const c_char, par: *mut Params);
pub type SetWorhpPrintFn = unsafe extern "C" fn(f: WorhpPrintFn);
pub type GetUserActionFn = unsafe extern "C" fn(cnt: *const Control, action: c_int) -> bool;
pub type DoneUserActionFn = unsafe extern "C" fn(cnt: *mut Control, action: c_int);
pub type StatusMsgStringFn = unsafe extern "C" fn(
    *mut OptVar,
    *mut Workspace,
    *mut Params,
    *mut Control,
    message: *mut c_char,
);
pub type SetBoolParamFn =
    unsafe extern "C" fn(par: *mut Params, name: *const c_char, value: bool) -> bool;
pub type SetIntParamFn =
    unsafe extern "C" fn(par: *mut Params, name: *const c_char, value: c_int) -> bool;
pub type SetDoubleParamFn =
    unsafe extern "C" fn(par: *mut Params, name: *const c_char, value: f64) -> bool;
pub type WorhpVersionFn =
    unsafe extern "C" fn(major: *mut c_int, minor: *mut c_int, patch: *mut c_char);

/// Entry points of the WORHP library.
pub struct WorhpApi {
    pub worhp_pre_init: WorhpFn,
    pub worhp_init: WorhpFn,
    pub read_params: ReadParamsFn,
    pub set_worhp_print: SetWorhpPrintFn,
    pub get_user_action: GetUserActionFn,
    pub done_user_action: DoneUserActionFn,
    pub iteration_output: WorhpFn,
    pub worhp: WorhpFn,
    pub status_msg: WorhpFn,
    pub status_msg_string: StatusMsgStringFn,
    pub worhp_free: WorhpFn,
    pub worhp_fidif: WorhpFn,
    pub set_bool_param: SetBoolParamFn,
    pub set_int_param: SetIntParamFn,
    pub set_double_param: SetDoubleParamFn,
    pub worhp_version: WorhpVersionFn,
    pub(crate) library: Option<SharedLibrary>,
}

impl WorhpApi {
    /// Loads the library at `path` and resolves the entry points.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        if !HEADER_LAYOUT {
            return Err(Error::Load {
                solver: "worhp",
                path: path.to_path_buf(),
                message: "the WORHP data structures were not generated from the library headers. \
                          Rebuild with the `worhp-headers` feature and WORHP_INCLUDE_DIR set"
                    .to_string(),
            });
        }
        let library = SharedLibrary::open("worhp", path)?;
        unsafe {
            Ok(Self {
                worhp_pre_init: library.get("WorhpPreInit")?,
                worhp_init: library.get("WorhpInit")?,
                read_params: library.get("ReadParams")?,
                set_worhp_print: library.get("SetWorhpPrint")?,
                get_user_action: library.get("GetUserAction")?,
                done_user_action: library.get("DoneUserAction")?,
                iteration_output: library.get("IterationOutput")?,
                worhp: library.get("Worhp")?,
                status_msg: library.get("StatusMsg")?,
                status_msg_string: library.get("StatusMsgString")?,
                worhp_free: library.get("WorhpFree")?,
                worhp_fidif: library.get("WorhpFidif")?,
                set_bool_param: library.get("WorhpSetBoolParam")?,
                set_int_param: library.get("WorhpSetIntParam")?,
                set_double_param: library.get("WorhpSetDoubleParam")?,
                worhp_version: library.get("WorhpVersion")?,
                library: Some(library),
            })
        }
    }
}

/// Print handler that drops all library output.
pub unsafe extern "C" fn no_screen_output(_mode: c_int, _message: *const c_char) {}
