//! Build script for nlp-plugins.
//!
//! With the `worhp-headers` feature, the WORHP data structures are generated
//! from the library headers, found with the following priority:
//! 1. The directory named by WORHP_INCLUDE_DIR
//! 2. The include flags of the `worhp` pkg-config package

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    #[cfg(feature = "worhp-headers")]
    worhp::generate_layout();
}

#[cfg(feature = "worhp-headers")]
mod worhp {
    use std::path::PathBuf;
    use std::process::Command;

    const LAYOUT_TYPES: [&str; 5] = ["OptVar", "Workspace", "Params", "Control", "WorhpMatrix"];

    pub fn generate_layout() {
        println!("cargo:rerun-if-env-changed=WORHP_INCLUDE_DIR");

        let include_dirs = match std::env::var("WORHP_INCLUDE_DIR") {
            Ok(dir) => vec![PathBuf::from(dir)],
            Err(_) => pkg_config_include_dirs().unwrap_or_default(),
        };
        let header = include_dirs
            .iter()
            .flat_map(|dir| [dir.join("worhp.h"), dir.join("worhp").join("worhp.h")])
            .find(|h| h.is_file())
            .unwrap_or_else(|| {
                panic!(
                    "WORHP headers not found!\n\n\
                     The worhp-headers feature needs worhp.h of the installed WORHP 1.14:\n\
                     1. Set WORHP_INCLUDE_DIR to the directory containing worhp.h\n\
                     2. Or make the `worhp` pkg-config package available\n"
                )
            });
        println!("cargo:warning=Using WORHP headers from {}", header.display());

        let mut builder = bindgen::Builder::default()
            .header(header.to_string_lossy())
            .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
            .layout_tests(true);
        for dir in &include_dirs {
            builder = builder.clang_arg(format!("-I{}", dir.display()));
        }
        for ty in LAYOUT_TYPES {
            builder = builder.allowlist_type(ty);
        }
        let bindings = builder.generate().expect("Failed to generate the WORHP layout");

        let out_dir = PathBuf::from(std::env::var("OUT_DIR").unwrap());
        bindings
            .write_to_file(out_dir.join("worhp_layout.rs"))
            .expect("Failed to write the WORHP layout");
    }

    /// Include directories of the `worhp` pkg-config package.
    fn pkg_config_include_dirs() -> Option<Vec<PathBuf>> {
        let output = Command::new("pkg-config")
            .args(["--cflags-only-I", "worhp"])
            .output()
            .ok()
            .filter(|o| o.status.success())?;
        let flags = String::from_utf8_lossy(&output.stdout);
        Some(
            flags
                .split_whitespace()
                .filter_map(|flag| flag.strip_prefix("-I"))
                .map(PathBuf::from)
                .collect(),
        )
    }
}
