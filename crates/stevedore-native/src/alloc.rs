//! Allocation helpers with live-allocation accounting.
//!
//! Structs and arrays handed across the boundary are counted; the
//! `LiveAllocationCount` export lets host test suites assert that a scenario
//! released everything it was given. Strings are not counted separately: a
//! leaked string is always reachable from a leaked struct or array, which the
//! counter already catches.
//!
//! Strings cross the boundary as NUL-terminated buffers produced by
//! [`CString::into_raw`]; both sides of the bridge run in one process and
//! share the allocator, so either side may release them.

use std::ffi::CString;
use std::os::raw::c_char;
use std::sync::atomic::{AtomicI64, Ordering};

static LIVE: AtomicI64 = AtomicI64::new(0);

/// Number of boundary-crossing structs and arrays currently alive.
#[no_mangle]
pub extern "C" fn LiveAllocationCount() -> i64 {
    LIVE.load(Ordering::SeqCst)
}

/// Move a value to the heap and hand out the raw pointer.
pub fn alloc_value<T>(value: T) -> *mut T {
    LIVE.fetch_add(1, Ordering::SeqCst);
    Box::into_raw(Box::new(value))
}

/// Take back ownership of a pointer produced by [`alloc_value`].
///
/// # Safety
///
/// `ptr` must come from [`alloc_value`] and must not be used afterwards.
pub unsafe fn take_value<T>(ptr: *mut T) -> Box<T> {
    LIVE.fetch_sub(1, Ordering::SeqCst);
    Box::from_raw(ptr)
}

/// Allocate a NUL-terminated copy of `s`.
pub fn make_cstring(s: &str) -> *mut c_char {
    // Interior NULs never occur in engine-produced strings; an empty string
    // is the safe stand-in if one ever does.
    match CString::new(s) {
        Ok(c) => c.into_raw(),
        Err(_) => CString::default().into_raw(),
    }
}

/// Release a string produced by [`make_cstring`] (or by the host's
/// marshaling layer). Null is a no-op.
///
/// # Safety
///
/// `ptr` must be null or a live `CString::into_raw` pointer.
pub unsafe fn free_cstring(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    drop(CString::from_raw(ptr));
}

/// Allocate a zeroed string array of `size` elements.
pub fn alloc_string_array(size: u64) -> *mut *mut c_char {
    LIVE.fetch_add(1, Ordering::SeqCst);
    let backing = vec![std::ptr::null_mut::<c_char>(); size as usize].into_boxed_slice();
    Box::into_raw(backing) as *mut *mut c_char
}

/// Release a string array and every string it holds.
///
/// # Safety
///
/// `ptr` must be null or a [`alloc_string_array`] pointer whose allocation
/// size was `count`.
pub unsafe fn free_string_array(ptr: *mut *mut c_char, count: u64) {
    if ptr.is_null() {
        return;
    }

    let backing = std::ptr::slice_from_raw_parts_mut(ptr, count as usize);
    for element in (*backing).iter() {
        free_cstring(*element);
    }

    LIVE.fetch_sub(1, Ordering::SeqCst);
    drop(Box::from_raw(backing));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn cstrings_round_trip() {
        let ptr = make_cstring("v1.43");
        let copied = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        assert_eq!(copied, "v1.43");
        unsafe { free_cstring(ptr) };
    }

    #[test]
    fn string_arrays_start_zeroed() {
        let array = alloc_string_array(3);
        for i in 0..3 {
            assert!(unsafe { *array.add(i) }.is_null());
        }
        unsafe { free_string_array(array, 3) };
    }

    #[test]
    fn empty_string_array_is_valid() {
        let array = alloc_string_array(0);
        assert!(!array.is_null());
        unsafe { free_string_array(array, 0) };
    }
}
