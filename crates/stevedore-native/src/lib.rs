//! Native side of the engine ABI.
//!
//! This crate implements the exported surface declared by the generated
//! header (`stevedore-codegen`): struct lifecycle functions, array accessors,
//! callback shims, the pipe registries backing the streaming bridge, and the
//! client registry. It is compiled as a `cdylib` for real deployments and as
//! an `rlib` so the host crate's tests can link it in-process.
//!
//! Rules for code in this crate:
//!
//! - Exported symbol names and layouts match the generated header exactly;
//!   the host only ever agrees with us through that header.
//! - No panics may cross the boundary. Failures are returned as allocated
//!   `EngineError` values; absence of error is a null pointer.
//! - No third-party dependencies beyond the platform layer. The ABI crate
//!   stays thin.

// Exported symbols follow the header's PascalCase naming convention.
#![allow(non_snake_case)]

pub mod alloc;
pub mod client;
pub mod error;
pub mod pipes;
pub mod sys;
pub mod testing;
pub mod types;

/// Stream handles 0, 1 and 2 are reserved for the process's own standard
/// streams and are never minted by the pipe-creation path.
pub const STDIN_STREAM: u64 = 0;
pub const STDOUT_STREAM: u64 = 1;
pub const STDERR_STREAM: u64 = 2;

/// First handle value the pipe registries hand out.
pub const FIRST_DYNAMIC_HANDLE: u64 = 3;
