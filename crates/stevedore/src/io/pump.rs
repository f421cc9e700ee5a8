//! Pump loops, one per stream direction.
//!
//! Each prepared stream owns exactly one pump thread doing blocking I/O in
//! fixed-size chunks: no buffering beyond the chunk in flight, bytes
//! forwarded strictly in arrival order. A zero-byte read and the platform's
//! broken-pipe code both mean the far side is done and terminate the pump
//! cleanly; every other failure carries its OS code out through the pump's
//! result.

use std::io::{Read, Write};

use tracing::{debug, trace};

use crate::error::StreamError;
use crate::ffi;
use crate::io::sys;
use crate::marshal;

pub(crate) const CHUNK_SIZE: usize = 8192;

/// Engine output -> host sink.
pub(crate) fn pump_to_sink(
    descriptor: u64,
    mut sink: Box<dyn Write + Send>,
) -> Result<(), StreamError> {
    let mut buf = [0u8; CHUNK_SIZE];

    loop {
        let n = match sys::read_pipe(descriptor, &mut buf) {
            Ok(0) => {
                debug!(descriptor, "output stream reached end-of-stream");
                sink.flush().map_err(sys::stream_error)?;
                return Ok(());
            }
            Ok(n) => n,
            Err(e) if sys::is_end_of_stream(&e) => {
                debug!(descriptor, "output stream closed by the far side");
                sink.flush().map_err(sys::stream_error)?;
                return Ok(());
            }
            Err(e) => return Err(sys::stream_error(e)),
        };

        sink.write_all(&buf[..n]).map_err(sys::stream_error)?;
        trace!(descriptor, bytes = n, "forwarded output chunk");
    }
}

/// Host source -> engine input. When the source is exhausted (or fails,
/// which a caller signals by closing it), the native write end is closed so
/// the engine-side reader observes end-of-stream.
pub(crate) fn pump_from_source(
    mut source: Box<dyn Read + Send>,
    descriptor: u64,
    stream: u64,
) -> Result<(), StreamError> {
    let mut buf = [0u8; CHUNK_SIZE];

    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => {
                debug!(stream, "input source exhausted");
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                // A failing source is how aborts surface; stop forwarding
                // and let the engine see end-of-stream.
                debug!(stream, error = %e, "input source closed");
                break;
            }
        };

        match sys::write_pipe(descriptor, &buf[..n]) {
            Ok(()) => trace!(stream, bytes = n, "forwarded input chunk"),
            Err(e) if sys::is_end_of_stream(&e) => {
                debug!(stream, "engine stopped reading input");
                break;
            }
            Err(e) => {
                let failure = sys::stream_error(e);
                close_write_end(stream);
                return Err(failure);
            }
        }
    }

    close_write_end(stream);
    Ok(())
}

fn close_write_end(stream: u64) {
    // Disposal may have raced ahead of the pump; an already-gone handle is
    // fine here, the reader saw end-of-stream either way.
    let result = unsafe { marshal::check_native_error(ffi::CloseInputPipeWriteEnd(stream)) };
    if let Err(error) = result {
        trace!(stream, %error, "close of input write end was superfluous");
    }
}
