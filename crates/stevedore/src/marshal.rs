//! Scoped ownership of native allocations and the error-first contract.
//!
//! Every pointer the native side hands back is wrapped in [`Owned`] at the
//! FFI seam and never escapes it raw: callers get `Deref` access while the
//! wrapper is alive and the matching `Free` export runs exactly once when it
//! goes out of scope, on every exit path.
//!
//! Return structs follow the error-first contract: they carry a result
//! pointer and an error pointer of which exactly one is non-null, and the
//! error slot is decoded before the result is ever consulted.

use std::ffi::{CStr, CString};
use std::ops::{Deref, DerefMut};
use std::os::raw::c_char;
use std::ptr::NonNull;

use crate::error::{ClientError, NativeCallError};
use crate::ffi;

// =============================================================================
// Ownership
// =============================================================================

/// A struct generated from the schema, paired with its `Free` export.
///
/// # Safety
///
/// `free_raw` must release a pointer produced by the matching native
/// allocation path, and must tolerate being handed the struct together with
/// everything its pointer fields own.
pub unsafe trait NativeStruct {
    const NAME: &'static str;

    unsafe fn free_raw(ptr: *mut Self);
}

/// Move-only owner of a native-allocated struct.
pub struct Owned<T: NativeStruct> {
    ptr: NonNull<T>,
}

impl<T: NativeStruct> Owned<T> {
    /// Take ownership of a pointer returned by the native side.
    /// Returns `None` for null, leaving the caller to decide what a missing
    /// value means for its operation.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live allocation that `T::free_raw` can
    /// release, and ownership must not be held anywhere else.
    pub unsafe fn from_raw(ptr: *mut T) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Owned { ptr })
    }
}

impl<T: NativeStruct> Deref for Owned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: NativeStruct> DerefMut for Owned<T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: NativeStruct> Drop for Owned<T> {
    fn drop(&mut self) {
        unsafe { T::free_raw(self.ptr.as_ptr()) }
    }
}

impl<T: NativeStruct> std::fmt::Debug for Owned<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Owned<{}>({:p})", T::NAME, self.ptr)
    }
}

// =============================================================================
// Error decoding
// =============================================================================

/// Decode the error slot of a return struct. The slot stays owned by the
/// enclosing struct; this only copies the strings out.
pub fn decode_error(error: Option<&ffi::EngineError>) -> Result<(), NativeCallError> {
    match error {
        None => Ok(()),
        Some(error) => Err(NativeCallError {
            kind: error.kind().unwrap_or_default(),
            message: error.message().unwrap_or_default(),
        }),
    }
}

/// Decode and release a bare `EngineError*` returned by operations that have
/// no result value. Null means success.
///
/// # Safety
///
/// `error` must be null or an error allocation owned by the caller.
pub unsafe fn check_native_error(error: *mut ffi::EngineError) -> Result<(), NativeCallError> {
    match Owned::from_raw(error) {
        None => Ok(()),
        Some(error) => Err(NativeCallError {
            kind: error.kind().unwrap_or_default(),
            message: error.message().unwrap_or_default(),
        }),
    }
}

// =============================================================================
// Field access (used by the generated accessors)
// =============================================================================

/// Copy a string field out of a native struct. Null reads as `None`.
pub unsafe fn string_field(ptr: *mut c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

/// Borrowed view of a nested struct field; ownership stays with the parent.
pub unsafe fn struct_field<'a, T>(ptr: *mut T) -> Option<&'a T> {
    ptr.as_ref()
}

/// View of a value-element array field. An array field whose pointer is null
/// while its count is non-zero violates the layout contract, which is a
/// programming error on one side of the boundary, not a runtime condition.
pub unsafe fn value_array_field<'a, T>(field: &str, ptr: *mut T, count: u64) -> &'a [T] {
    if count == 0 {
        return &[];
    }
    if ptr.is_null() {
        panic!("array field '{field}' is unexpectedly null with {count} elements");
    }
    std::slice::from_raw_parts(ptr, count as usize)
}

/// Borrowed views of a struct-element array field.
pub unsafe fn struct_array_field<'a, T>(
    field: &str,
    ptr: *mut *mut T,
    count: u64,
) -> Vec<&'a T> {
    value_array_field(field, ptr, count)
        .iter()
        .enumerate()
        .map(|(index, element)| match element.cast_const().as_ref() {
            Some(element) => element,
            None => panic!("array field '{field}' holds a null element at index {index}"),
        })
        .collect()
}

/// Copies of a string-element array field.
pub unsafe fn string_array_field(field: &str, ptr: *mut *mut c_char, count: u64) -> Vec<String> {
    value_array_field(field, ptr, count)
        .iter()
        .enumerate()
        .map(|(index, &element)| match string_field(element) {
            Some(value) => value,
            None => panic!("array field '{field}' holds a null element at index {index}"),
        })
        .collect()
}

// =============================================================================
// Outbound marshaling
// =============================================================================

/// Allocate a NUL-terminated copy of `s` whose ownership passes to the
/// native struct it is stored in (released by that struct's `Free`).
pub fn to_native_string(s: &str) -> Result<*mut c_char, ClientError> {
    CString::new(s)
        .map(CString::into_raw)
        .map_err(|_| ClientError::InvalidString(s.to_string()))
}

/// Build a native string array. Conversion happens before any native
/// allocation, so a rejected string leaks nothing.
pub fn to_native_string_array(values: &[String]) -> Result<(u64, *mut *mut c_char), ClientError> {
    let converted: Vec<CString> = values
        .iter()
        .map(|value| {
            CString::new(value.as_str()).map_err(|_| ClientError::InvalidString(value.clone()))
        })
        .collect::<Result<_, _>>()?;

    let count = converted.len() as u64;
    let array = unsafe { ffi::CreateStringArray(count) };
    for (index, value) in converted.into_iter().enumerate() {
        unsafe { ffi::SetStringArrayElement(array, index as u64, value.into_raw()) };
    }

    Ok((count, array))
}
