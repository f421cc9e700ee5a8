//! Platform layer for anonymous pipes.
//!
//! Everything above this module works in terms of [`RawPipe`] and byte
//! slices; the unix/windows split stays contained here.

use std::io;

// =============================================================================
// Unix
// =============================================================================

#[cfg(unix)]
pub type RawPipe = libc::c_int;

#[cfg(unix)]
pub fn create_pipe() -> io::Result<(RawPipe, RawPipe)> {
    let mut ends = [0 as libc::c_int; 2];
    if unsafe { libc::pipe(ends.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((ends[0], ends[1]))
}

/// Close a pipe end. Errors (including closing an already-closed descriptor)
/// are deliberately ignored: disposal must be idempotent.
#[cfg(unix)]
pub fn close(pipe: RawPipe) {
    unsafe {
        libc::close(pipe);
    }
}

/// Blocking read. Returns the number of bytes read; zero means the write end
/// has been closed and no more data will arrive.
#[cfg(unix)]
pub fn read(pipe: RawPipe, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        let n = unsafe { libc::read(pipe, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n >= 0 {
            return Ok(n as usize);
        }

        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Blocking write of the whole buffer.
#[cfg(unix)]
pub fn write_all(pipe: RawPipe, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        let n = unsafe { libc::write(pipe, buf.as_ptr() as *const libc::c_void, buf.len()) };
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

// =============================================================================
// Windows
// =============================================================================

// Pipe ends are HANDLEs, stored as usize so registry maps stay Send.
#[cfg(windows)]
pub type RawPipe = usize;

#[cfg(windows)]
pub fn create_pipe() -> io::Result<(RawPipe, RawPipe)> {
    use winapi::um::namedpipeapi::CreatePipe;

    let mut read_end = std::ptr::null_mut();
    let mut write_end = std::ptr::null_mut();

    let ok = unsafe { CreatePipe(&mut read_end, &mut write_end, std::ptr::null_mut(), 0) };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((read_end as RawPipe, write_end as RawPipe))
}

#[cfg(windows)]
pub fn close(pipe: RawPipe) {
    use winapi::um::handleapi::CloseHandle;

    unsafe {
        CloseHandle(pipe as winapi::um::winnt::HANDLE);
    }
}

#[cfg(windows)]
pub fn read(pipe: RawPipe, buf: &mut [u8]) -> io::Result<usize> {
    use winapi::shared::winerror::ERROR_BROKEN_PIPE;
    use winapi::um::fileapi::ReadFile;

    let mut read = 0u32;
    let ok = unsafe {
        ReadFile(
            pipe as winapi::um::winnt::HANDLE,
            buf.as_mut_ptr() as *mut winapi::ctypes::c_void,
            buf.len() as u32,
            &mut read,
            std::ptr::null_mut(),
        )
    };

    if ok == 0 {
        let err = io::Error::last_os_error();
        // The writer closing its end surfaces as ERROR_BROKEN_PIPE here;
        // that is ordinary end-of-stream for an anonymous pipe.
        if err.raw_os_error() == Some(ERROR_BROKEN_PIPE as i32) {
            return Ok(0);
        }
        return Err(err);
    }
    Ok(read as usize)
}

#[cfg(windows)]
pub fn write_all(pipe: RawPipe, mut buf: &[u8]) -> io::Result<()> {
    use winapi::um::fileapi::WriteFile;

    while !buf.is_empty() {
        let mut written = 0u32;
        let ok = unsafe {
            WriteFile(
                pipe as winapi::um::winnt::HANDLE,
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
