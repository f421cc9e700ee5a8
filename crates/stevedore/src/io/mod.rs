//! Pipe streaming bridge.
//!
//! Engine operations stream through OS pipes created on the native side.
//! Preparing a stream creates the pipe, receives {handle, local descriptor}
//! and spawns one dedicated pump thread for the direction:
//!
//! - output: blocking chunked reads from the descriptor, forwarded in order
//!   to the destination sink;
//! - input: blocking chunked reads from the source, forwarded in order to
//!   the descriptor, with the native write end closed at source EOF so the
//!   engine observes end-of-stream.
//!
//! Stream handles 0, 1 and 2 stand for the process's own standard streams:
//! preparing one of those allocates nothing and disposal is a no-op, on
//! both sides of the boundary.
//!
//! [`OutputStream::finish`]/[`InputStream::finish`] join the pump and then
//! dispose the native pipe exactly once; dropping an unfinished stream
//! disposes first (which unblocks the pump) and discards the pump's result.

mod pump;
mod sys;

use std::io::{Read, Write};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::StreamError;
use crate::ffi;
use crate::marshal::{self, Owned};

/// Reserved stream identities, shared with the native registries.
pub const STDIN_STREAM: u64 = 0;
pub const STDOUT_STREAM: u64 = 1;
pub const STDERR_STREAM: u64 = 2;

type Pump = JoinHandle<Result<(), StreamError>>;

// =============================================================================
// Output
// =============================================================================

/// Where an engine output stream should go.
pub enum OutputDestination {
    Stdout,
    Stderr,
    /// An arbitrary sink, fed by a pump thread.
    Sink(Box<dyn Write + Send>),
}

impl OutputDestination {
    /// Prepare a stream for this destination.
    pub fn prepare(self) -> Result<OutputStream, StreamError> {
        match self {
            OutputDestination::Stdout => Ok(OutputStream::standard(STDOUT_STREAM)),
            OutputDestination::Stderr => Ok(OutputStream::standard(STDERR_STREAM)),
            OutputDestination::Sink(sink) => OutputStream::piped(sink),
        }
    }
}

/// A prepared engine output stream. The handle is what engine operations
/// take; bytes the engine writes to it arrive at the destination in order.
pub struct OutputStream {
    handle: u64,
    pump: Option<Pump>,
    disposed: bool,
}

impl OutputStream {
    fn standard(handle: u64) -> Self {
        OutputStream {
            handle,
            pump: None,
            disposed: false,
        }
    }

    fn piped(sink: Box<dyn Write + Send>) -> Result<Self, StreamError> {
        let ret = unsafe { Owned::from_raw(ffi::CreateOutputPipe()) }
            .ok_or(StreamError::MissingResult)?;
        marshal::decode_error(ret.error()).map_err(StreamError::Create)?;

        let handle = ret.output_stream();
        let descriptor = ret.read_file_descriptor();
        drop(ret);
        debug!(handle, descriptor, "output pipe created");

        let pump = thread::Builder::new()
            .name(format!("stevedore-out-{handle}"))
            .spawn(move || pump::pump_to_sink(descriptor, sink))
            .map_err(spawn_error)?;

        Ok(OutputStream {
            handle,
            pump: Some(pump),
            disposed: false,
        })
    }

    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// Wait for the pump to observe end-of-stream, then dispose the pipe.
    /// A pump failure takes precedence over a disposal failure.
    pub fn finish(mut self) -> Result<(), StreamError> {
        let pumped = self.join_pump();
        let disposed = self.dispose();
        pumped.and(disposed)
    }

    fn join_pump(&mut self) -> Result<(), StreamError> {
        match self.pump.take() {
            Some(pump) => pump.join().unwrap_or(Err(StreamError::PumpPanicked)),
            None => Ok(()),
        }
    }

    fn dispose(&mut self) -> Result<(), StreamError> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;

        // The native side treats the reserved handles as no-ops.
        unsafe { marshal::check_native_error(ffi::DisposeOutputPipe(self.handle)) }
            .map_err(StreamError::Dispose)
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        if let Err(error) = self.dispose() {
            warn!(handle = self.handle, %error, "disposing output stream failed");
        }
        // Disposal closed the pipe's write end, so a still-running pump
        // unblocks with end-of-stream.
        let _ = self.join_pump();
    }
}

// =============================================================================
// Input
// =============================================================================

/// Where an engine input stream comes from.
pub enum InputSource {
    Stdin,
    /// An arbitrary source, drained by a pump thread. Aborting a stream
    /// means closing the source: the pump's next read observes the closure
    /// and stops forwarding.
    Source(Box<dyn Read + Send>),
}

impl InputSource {
    /// Prepare a stream for this source.
    pub fn prepare(self) -> Result<InputStream, StreamError> {
        match self {
            InputSource::Stdin => Ok(InputStream::standard(STDIN_STREAM)),
            InputSource::Source(source) => InputStream::piped(source),
        }
    }
}

/// A prepared engine input stream.
pub struct InputStream {
    handle: u64,
    pump: Option<Pump>,
    disposed: bool,
}

impl InputStream {
    fn standard(handle: u64) -> Self {
        InputStream {
            handle,
            pump: None,
            disposed: false,
        }
    }

    fn piped(source: Box<dyn Read + Send>) -> Result<Self, StreamError> {
        let ret = unsafe { Owned::from_raw(ffi::CreateInputPipe()) }
            .ok_or(StreamError::MissingResult)?;
        marshal::decode_error(ret.error()).map_err(StreamError::Create)?;

        let handle = ret.input_stream();
        let descriptor = ret.write_file_descriptor();
        drop(ret);
        debug!(handle, descriptor, "input pipe created");

        let pump = thread::Builder::new()
            .name(format!("stevedore-in-{handle}"))
            .spawn(move || pump::pump_from_source(source, descriptor, handle))
            .map_err(spawn_error)?;

        Ok(InputStream {
            handle,
            pump: Some(pump),
            disposed: false,
        })
    }

    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// Wait for the pump to drain the source, then dispose the pipe.
    /// A pump failure takes precedence over a disposal failure.
    pub fn finish(mut self) -> Result<(), StreamError> {
        let pumped = self.join_pump();
        let disposed = self.dispose();
        pumped.and(disposed)
    }

    fn join_pump(&mut self) -> Result<(), StreamError> {
        match self.pump.take() {
            Some(pump) => pump.join().unwrap_or(Err(StreamError::PumpPanicked)),
            None => Ok(()),
        }
    }

    fn dispose(&mut self) -> Result<(), StreamError> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;

        unsafe { marshal::check_native_error(ffi::DisposeInputPipe(self.handle)) }
            .map_err(StreamError::Dispose)
    }
}

impl Drop for InputStream {
    fn drop(&mut self) {
        if let Err(error) = self.dispose() {
            warn!(handle = self.handle, %error, "disposing input stream failed");
        }
        // Disposal closed the pipe's read end; a pump blocked writing
        // unblocks with a broken pipe, which it treats as closure.
        let _ = self.join_pump();
    }
}

fn spawn_error(error: std::io::Error) -> StreamError {
    StreamError::Io {
        code: error.raw_os_error().unwrap_or(0),
        message: error.to_string(),
    }
}
