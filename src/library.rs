//! Run-time loading of the solver shared libraries.

use crate::error::{Error, Result};
use libloading::Library;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// An opened solver library. Symbols resolved from it stay valid for as
/// long as this value is alive.
pub(crate) struct SharedLibrary {
    solver: &'static str,
    path: PathBuf,
    lib: Library,
}

impl SharedLibrary {
    /// Opens the library at `path` on behalf of `solver`.
    pub fn open(solver: &'static str, path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(load_error(
                solver,
                path,
                format!("the file {:?} does not appear to be a file", path),
            ));
        }
        log::debug!("loading {} library {:?}", solver, path);
        let lib = unsafe { Library::new(path) }
            .map_err(|e| load_error(solver, path, e.to_string()))?;
        Ok(Self {
            solver,
            path: path.to_path_buf(),
            lib,
        })
    }

    /// Resolves the function `name` with signature `T`.
    ///
    /// # Safety
    ///
    /// `T` must be a function pointer type matching the exported symbol.
    pub unsafe fn get<T: Copy>(&self, name: &str) -> Result<T> {
        self.lib
            .get::<T>(name.as_bytes())
            .map(|sym| *sym)
            .map_err(|e| load_error(self.solver, &self.path, format!("{}: {}", name, e)))
    }
}

/// Holds the loader lock of one solver type for the duration of a load.
pub(crate) fn lock(mutex: &'static Mutex<()>) -> MutexGuard<'static, ()> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn load_error(solver: &'static str, path: &Path, cause: String) -> Error {
    Error::Load {
        solver,
        path: path.to_path_buf(),
        message: format!(
            "\nThis is typically caused by one of the following reasons:\n\n \
             - The file declared to be the {solver} library is not found or is not a shared \
             library containing the necessary symbols (is the path really pointing to a valid \
             shared library?)\n \
             - The library is found and contains the symbols, but it needs linking to some \
             additional libraries that are not found at run-time.\n\n\
             The exact error reported was:\n\n {cause}"
        ),
    }
}
