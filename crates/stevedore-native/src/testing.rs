//! Exports that exist only so host test suites can drive the engine side of
//! a pipe: feed bytes into an output stream, drain bytes from an input
//! stream, and signal end-of-stream.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr;

use crate::error::{self, EngineError};
use crate::pipes;
use crate::sys::{self, RawPipe};

/// Write a NUL-terminated string into an output stream, as the engine would.
#[no_mangle]
pub unsafe extern "C" fn WriteToTestOutputStream(
    handle: u64,
    data: *mut c_char,
) -> *mut EngineError {
    let Some(write_end) = pipes::output_write_end(handle) else {
        return error::raise(
            "InvalidOutputStreamHandle",
            &format!("no open output stream with handle {handle}"),
        );
    };

    let bytes = CStr::from_ptr(data).to_bytes();
    match sys::write_all(write_end, bytes) {
        Ok(()) => ptr::null_mut(),
        Err(e) => error::raise("WriteFailed", &e.to_string()),
    }
}

/// Close the write end of an output stream so the host-side reader sees
/// end-of-stream. The handle stays valid until disposed.
#[no_mangle]
pub extern "C" fn CloseTestOutputStream(handle: u64) -> *mut EngineError {
    if pipes::close_output_write_end(handle) {
        return ptr::null_mut();
    }

    error::raise(
        "InvalidOutputStreamHandle",
        &format!("no output stream with handle {handle}"),
    )
}

/// Blocking read from an input stream, as the engine would. Returns the
/// number of bytes read, zero at end-of-stream, or a negative value if the
/// handle is unknown or the read fails.
#[no_mangle]
pub unsafe extern "C" fn ReadFromTestInputStream(
    handle: u64,
    buffer: *mut c_char,
    capacity: i64,
) -> i64 {
    let Some(read_end) = pipes::input_read_end(handle) else {
        return -1;
    };

    let buf = std::slice::from_raw_parts_mut(buffer as *mut u8, capacity as usize);
    match sys::read(read_end as RawPipe, buf) {
        Ok(n) => n as i64,
        Err(_) => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc;
    use crate::pipes::{CreateOutputPipe, DisposeOutputPipe};
    use crate::types::FreeCreateOutputPipeReturn;

    #[test]
    fn test_writes_reach_the_host_descriptor() {
        let ret = CreateOutputPipe();
        let (handle, fd) = unsafe {
            let out = ((*ret).output_stream, (*ret).read_file_descriptor);
            FreeCreateOutputPipeReturn(ret);
            out
        };

        let data = alloc::make_cstring("from the engine");
        let err = unsafe { WriteToTestOutputStream(handle, data) };
        unsafe { alloc::free_cstring(data) };
        assert!(err.is_null());

        let mut buf = [0u8; 32];
        let n = sys::read(fd as RawPipe, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"from the engine");

        assert!(CloseTestOutputStream(handle).is_null());
        assert!(DisposeOutputPipe(handle).is_null());
    }

    #[test]
    fn writing_to_an_unknown_stream_is_rejected() {
        let data = alloc::make_cstring("lost");
        let err = unsafe { WriteToTestOutputStream(9_999_999, data) };
        unsafe { alloc::free_cstring(data) };

        assert!(!err.is_null());
        unsafe { crate::error::FreeEngineError(err) };
    }

    #[test]
    fn reading_from_an_unknown_stream_reports_failure() {
        let mut buf = [0u8; 8];
        let n = unsafe { ReadFromTestInputStream(9_999_999, buf.as_mut_ptr() as *mut c_char, 8) };
        assert_eq!(n, -1);
    }
}
