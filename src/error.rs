use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while preparing or running a plugin solve.
#[derive(Debug, Error)]
pub enum Error {
    /// The solver library could not be opened or lacks a required symbol.
    #[error("could not load the {solver} library {path:?}: {message}")]
    Load {
        solver: &'static str,
        path: PathBuf,
        message: String,
    },

    /// A forbidden option was set, or the library rejected a named option.
    #[error("{0}")]
    Configuration(String),

    /// The population's problem cannot be handled by the solver.
    #[error("{0}")]
    ProblemShape(String),

    /// A gradient or Hessian sparsity pattern is malformed.
    #[error("invalid sparsity pattern: {0}")]
    InvalidSparsity(String),

    /// User problem code failed while being evaluated on behalf of the solver.
    #[error("error raised by the problem during the solve: {0}")]
    UserCallback(#[source] anyhow::Error),

    /// The loaded library reports a version the bridge was not built for.
    #[error("library {path:?} reports version {found} but only {supported} is supported")]
    VersionMismatch {
        path: PathBuf,
        found: String,
        supported: String,
    },
}

impl Error {
    /// Returns the error raised by user code, if this is a callback failure.
    pub fn user_error(&self) -> Option<&anyhow::Error> {
        match self {
            Error::UserCallback(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
