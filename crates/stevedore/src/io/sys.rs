//! Platform seam for pipe descriptors handed over by the native side.
//!
//! Descriptors cross the boundary as `u64` (a POSIX file descriptor or a
//! Windows pipe handle). The host only ever reads and writes them; both
//! ends are closed by the native disposal path.

use std::io;

use crate::error::StreamError;

/// Classify an I/O failure: end-of-stream conditions terminate a pump
/// without error, everything else carries its OS code out.
pub(crate) fn is_end_of_stream(error: &io::Error) -> bool {
    #[cfg(unix)]
    {
        error.raw_os_error() == Some(libc::EPIPE)
    }
    #[cfg(windows)]
    {
        use winapi::shared::winerror::{ERROR_BROKEN_PIPE, ERROR_NO_DATA};

        matches!(
            error.raw_os_error(),
            Some(code) if code == ERROR_BROKEN_PIPE as i32 || code == ERROR_NO_DATA as i32
        )
    }
}

pub(crate) fn stream_error(error: io::Error) -> StreamError {
    let code = error.raw_os_error().unwrap_or(0);
    StreamError::Io {
        code,
        message: error_message(code),
    }
}

// =============================================================================
// POSIX
// =============================================================================

#[cfg(unix)]
pub(crate) fn read_pipe(descriptor: u64, buf: &mut [u8]) -> io::Result<usize> {
    let fd = descriptor as libc::c_int;
    loop {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n >= 0 {
            return Ok(n as usize);
        }

        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(unix)]
pub(crate) fn write_pipe(descriptor: u64, mut buf: &[u8]) -> io::Result<()> {
    let fd = descriptor as libc::c_int;
    while !buf.is_empty() {
        let n = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        buf = &buf[n as usize..];
    }
    Ok(())
}

/// Human-readable message for an OS error code, with a hex fallback when
/// the platform has none.
#[cfg(unix)]
pub(crate) fn error_message(code: i32) -> String {
    let message = unsafe { libc::strerror(code) };
    if message.is_null() {
        return format!("unknown error 0x{code:x}");
    }
    unsafe { std::ffi::CStr::from_ptr(message) }
        .to_string_lossy()
        .into_owned()
}

// =============================================================================
// Windows
// =============================================================================

#[cfg(windows)]
pub(crate) fn read_pipe(descriptor: u64, buf: &mut [u8]) -> io::Result<usize> {
    use winapi::shared::winerror::ERROR_BROKEN_PIPE;
    use winapi::um::fileapi::ReadFile;

    let mut read = 0u32;
    let ok = unsafe {
        ReadFile(
            descriptor as winapi::um::winnt::HANDLE,
            buf.as_mut_ptr() as *mut winapi::ctypes::c_void,
            buf.len() as u32,
            &mut read,
            std::ptr::null_mut(),
        )
    };

    if ok == 0 {
        let err = io::Error::last_os_error();
        // The writer closing its end is ordinary end-of-stream.
        if err.raw_os_error() == Some(ERROR_BROKEN_PIPE as i32) {
            return Ok(0);
        }
        return Err(err);
    }
    Ok(read as usize)
}

#[cfg(windows)]
pub(crate) fn write_pipe(descriptor: u64, mut buf: &[u8]) -> io::Result<()> {
    use winapi::um::fileapi::WriteFile;

    while !buf.is_empty() {
        let mut written = 0u32;
        let ok = unsafe {
            WriteFile(
                descriptor as winapi::um::winnt::HANDLE,
                buf.as_ptr() as *const winapi::ctypes::c_void,
                buf.len() as u32,
                &mut written,
                std::ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        buf = &buf[written as usize..];
    }
    Ok(())
}

#[cfg(windows)]
pub(crate) fn error_message(code: i32) -> String {
    use winapi::shared::winerror::{
        ERROR_ACCESS_DENIED, ERROR_BROKEN_PIPE, ERROR_HANDLE_EOF, ERROR_INVALID_HANDLE,
        ERROR_NOT_ENOUGH_MEMORY, ERROR_OPERATION_ABORTED,
    };

    let known = match code as u32 {
        ERROR_ACCESS_DENIED => "access denied",
        ERROR_INVALID_HANDLE => "invalid handle",
        ERROR_NOT_ENOUGH_MEMORY => "not enough memory",
        ERROR_BROKEN_PIPE => "broken pipe",
        ERROR_HANDLE_EOF => "end of file",
        ERROR_OPERATION_ABORTED => "operation aborted",
        _ => return format!("unknown error 0x{code:x}"),
    };
    known.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_resolve_to_messages() {
        #[cfg(unix)]
        {
            let message = error_message(libc::EPIPE);
            assert!(!message.starts_with("unknown error"), "{message}");
        }
        #[cfg(windows)]
        {
            assert_eq!(
                error_message(winapi::shared::winerror::ERROR_BROKEN_PIPE as i32),
                "broken pipe"
            );
        }
    }

    // On unix strerror answers for any code, so only the windows table has
    // a reachable fallback path.
    #[cfg(windows)]
    #[test]
    fn unknown_codes_fall_back_to_hex() {
        assert_eq!(error_message(0x7fff_1234), "unknown error 0x7fff1234");
    }
}
