//! Stevedore development tasks.
//!
//! Usage:
//!   cargo xtask codegen [--out <dir>]      Emit the C artifacts from the schema
//!   cargo xtask verify-abi <header>...     Check exported-function consistency

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use stevedore_codegen::host;
use stevedore_codegen::native::NativeGenerator;
use stevedore_codegen::schema;

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(|s| s.as_str()) {
        Some("codegen") => {
            let out = args
                .iter()
                .position(|a| a == "--out")
                .and_then(|i| args.get(i + 1))
                .map(PathBuf::from)
                .unwrap_or_else(|| workspace_root().join("codegen").join("generated"));
            codegen(&out);
        }
        Some("verify-abi") => {
            let headers: Vec<PathBuf> = args[1..].iter().map(PathBuf::from).collect();
            if headers.is_empty() {
                usage();
            }
            verify_abi(&headers);
        }
        _ => usage(),
    }
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  cargo xtask codegen [--out <dir>]      Emit types.h / types.c from codegen/types.yml");
    eprintln!("  cargo xtask verify-abi <header>...     Verify exported-function sets match");
    std::process::exit(1);
}

// =============================================================================
// codegen
// =============================================================================

fn codegen(out_dir: &Path) {
    let schema_path = workspace_root().join("codegen").join("types.yml");

    let types = match schema::load(&schema_path) {
        Ok(types) => types,
        Err(e) => fail(&e.to_string()),
    };

    fs::create_dir_all(out_dir).expect("failed to create output directory");
    if let Err(e) = NativeGenerator::new(&types).write_to(out_dir) {
        fail(&e.to_string());
    }

    println!("wrote {}", out_dir.join("types.h").display());
    println!("wrote {}", out_dir.join("types.c").display());
}

// =============================================================================
// verify-abi
// =============================================================================

fn verify_abi(headers: &[PathBuf]) {
    let mut sets = Vec::new();
    for path in headers {
        match host::parse_header(path) {
            Ok(functions) => {
                println!("{}: {} exported functions", path.display(), functions.len());
                sets.push((path.clone(), functions));
            }
            Err(e) => fail(&e.to_string()),
        }
    }

    match host::verify_consistent(&sets) {
        Ok(agreed) => println!("ok: all artifacts agree on {} functions", agreed.len()),
        Err(e) => fail(&e.to_string()),
    }
}

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("xtask must live inside the workspace")
        .to_path_buf()
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1)
}
