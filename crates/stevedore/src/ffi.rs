//! Generated ABI bindings, included from the build script's output.
//!
//! Nothing in this module is written by hand; `build.rs` regenerates it from
//! `codegen/types.yml` and the per-platform export fragments on every change.

#[allow(non_snake_case, dead_code, clippy::missing_safety_doc)]
mod bindings {
    include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
}

pub use bindings::*;
