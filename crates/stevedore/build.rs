//! Generates the ABI bindings this crate compiles against.
//!
//! The schema is resolved, the native header is rendered once, and each
//! platform's hand-maintained export fragment is appended to it and parsed
//! back into a function set. The build fails unless every platform's set is
//! identical; only then are the Rust bindings written into `OUT_DIR`.

use std::path::PathBuf;

use stevedore_codegen::host::{self, HostGenerator};
use stevedore_codegen::native::NativeGenerator;
use stevedore_codegen::schema;

const EXPORT_FRAGMENTS: &[&str] = &[
    "stevedore-linux.h",
    "stevedore-darwin.h",
    "stevedore-windows.h",
];

fn main() {
    if let Err(e) = run() {
        eprintln!("binding generation failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?);
    let schema_path = manifest_dir.join("../../codegen/types.yml");
    let exports_dir = manifest_dir.join("../stevedore-native/exports");

    println!("cargo:rerun-if-changed={}", schema_path.display());

    let types = schema::load(&schema_path)?;
    let header = NativeGenerator::new(&types).generate_header()?;

    let mut sets = Vec::new();
    for fragment in EXPORT_FRAGMENTS {
        let path = exports_dir.join(fragment);
        println!("cargo:rerun-if-changed={}", path.display());

        let exports = std::fs::read_to_string(&path)?;
        let combined = format!("{header}\n{exports}");
        sets.push((path.clone(), host::parse_header_content(&path, &combined)?));
    }

    let agreed = host::verify_consistent(&sets)?;
    let bindings = HostGenerator::new(&types).generate(&agreed)?;

    let out_path = PathBuf::from(std::env::var("OUT_DIR")?).join("bindings.rs");
    std::fs::write(out_path, bindings)?;
    Ok(())
}
