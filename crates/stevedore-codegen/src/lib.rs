//! Binding generation for the engine ABI.
//!
//! Everything that crosses the native boundary is described once, in a
//! declarative YAML schema (`codegen/types.yml`), and generated from there:
//!
//! - **Native side** ([`native`]): a C header declaring every exported symbol
//!   and a C source file implementing per-struct `Alloc`/`Free` pairs, one
//!   array accessor trio per distinct element type, and one `Invoke` shim per
//!   callback.
//! - **Host side** ([`host`]): `#[repr(C)]` struct bindings with typed field
//!   accessors, alias and callback type definitions, and one `extern "C"`
//!   block mirroring the native export set.
//!
//! The two sides never see each other at compile time — they agree on the ABI
//! only because both are derived from the same resolved schema. The host
//! generator additionally cross-checks the exported function sets parsed from
//! every platform's header artifact and refuses to generate bindings if the
//! artifacts disagree (see [`host::verify_consistent`]); a silent mismatch
//! there would corrupt the ABI at runtime.
//!
//! All generation is deterministic: the same schema produces byte-identical
//! output on every run.

pub mod host;
pub mod native;
pub mod schema;

use std::path::PathBuf;

/// Errors raised while loading a schema or generating bindings.
///
/// Every variant is fatal at generation time; none of these can occur at
/// runtime of the generated code.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// The schema file could not be read or parsed.
    #[error("could not load schema from {path}: {reason}")]
    SchemaLoad { path: PathBuf, reason: String },

    /// A field references a type that is neither declared nor primitive.
    #[error("unknown type '{type_name}' for field '{field}' in struct '{owner}'")]
    UnknownType {
        type_name: String,
        field: String,
        owner: String,
    },

    /// A callback parameter references an unknown type.
    #[error("unknown type '{type_name}' for parameter '{parameter}' of callback '{owner}'")]
    UnknownParameterType {
        type_name: String,
        parameter: String,
        owner: String,
    },

    /// Structs may not embed callback types as fields; callbacks are passed
    /// as opaque function-pointer parameters only.
    #[error("field '{field}' of struct '{owner}' embeds callback type '{callback}'; callbacks cannot be struct fields")]
    CallbackField {
        field: String,
        owner: String,
        callback: String,
    },

    /// Struct references form a cycle, which has no finite field layout.
    #[error("cyclic type reference: struct '{owner}' (via field '{field}') refers back to '{type_name}'")]
    CyclicReference {
        owner: String,
        field: String,
        type_name: String,
    },

    /// Two schema entries share a name.
    #[error("type '{0}' is declared more than once")]
    DuplicateType(String),

    /// Strict mode: the generator was about to emit the same symbol twice.
    #[error("duplicate generated symbol '{0}'; the schema produces colliding exports")]
    DuplicateSymbol(String),

    /// An alias wraps a native type the host generator has no mapping for.
    #[error("alias '{alias}' wraps unsupported native type '{native_type}'")]
    UnsupportedNativeType { alias: String, native_type: String },

    /// A platform header artifact could not be parsed.
    #[error("could not parse header {path}: {reason}")]
    HeaderParse { path: PathBuf, reason: String },

    /// Platform header artifacts disagree on the exported function set.
    #[error("native artifacts disagree on exported functions:\n{details}")]
    AbiMismatch { details: String },

    /// Generated output could not be written.
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CodegenError>;
