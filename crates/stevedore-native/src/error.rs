//! Error values crossing the boundary.
//!
//! The boundary contract is error-first: a null `EngineError*` means
//! success, anything else carries a machine-readable kind plus a
//! human-readable message, and ownership of the allocation passes to the
//! caller (released via `FreeEngineError`).

use std::os::raw::c_char;
use std::ptr;

use crate::alloc;

#[repr(C)]
pub struct EngineError {
    pub kind: *mut c_char,
    pub message: *mut c_char,
}

/// Allocate an error to return across the boundary.
pub fn raise(kind: &str, message: &str) -> *mut EngineError {
    alloc::alloc_value(EngineError {
        kind: alloc::make_cstring(kind),
        message: alloc::make_cstring(message),
    })
}

#[no_mangle]
pub extern "C" fn AllocEngineError() -> *mut EngineError {
    alloc::alloc_value(EngineError {
        kind: ptr::null_mut(),
        message: ptr::null_mut(),
    })
}

#[no_mangle]
pub unsafe extern "C" fn FreeEngineError(value: *mut EngineError) {
    if value.is_null() {
        return;
    }

    let value = alloc::take_value(value);
    alloc::free_cstring(value.kind);
    alloc::free_cstring(value.message);
}
