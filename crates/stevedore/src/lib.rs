//! Host side of the container-engine bridge.
//!
//! The native library exposes a C ABI generated from a declarative schema
//! (`codegen/types.yml`); this crate compiles against bindings generated
//! from the same schema at build time (see `build.rs`) and layers the parts
//! the raw ABI cannot express:
//!
//! - [`marshal`] — scoped ownership of native allocations and the
//!   error-first decoding contract.
//! - [`io`] — the pipe streaming bridge: one OS pipe plus one blocking pump
//!   thread per stream direction.
//! - [`client`] — the thin typed client over the exported operations.
//!
//! Raw pointers never escape the marshaling seam: callers see owned values,
//! borrowed views, and `Result`s.

pub mod client;
pub mod error;
pub mod ffi;
pub mod io;
pub mod marshal;

pub use client::{EngineClient, ExecSpec, PingResponse};
pub use error::{ClientError, NativeCallError, StreamError};
pub use io::{InputSource, InputStream, OutputDestination, OutputStream};
