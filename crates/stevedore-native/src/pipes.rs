//! Handle registries for the streaming bridge.
//!
//! Each direction keeps its own registry and handle counter; both counters
//! start at [`crate::FIRST_DYNAMIC_HANDLE`] so handles 0..=2 stay reserved
//! for the process's standard streams. An output pipe carries engine output
//! toward the host (the host reads the returned descriptor); an input pipe
//! carries host bytes toward the engine (the host writes the returned
//! descriptor).

use std::collections::HashMap;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

use crate::alloc;
use crate::error::{self, EngineError};
use crate::sys::{self, RawPipe};
use crate::types::{CreateInputPipeReturn, CreateOutputPipeReturn};
use crate::{FIRST_DYNAMIC_HANDLE, STDERR_STREAM};

struct Pipe {
    read_end: RawPipe,
    write_end: RawPipe,
    write_closed: bool,
}

type Registry = Mutex<HashMap<u64, Pipe>>;

fn output_pipes() -> &'static Registry {
    static PIPES: OnceLock<Registry> = OnceLock::new();
    PIPES.get_or_init(|| Mutex::new(HashMap::new()))
}

fn input_pipes() -> &'static Registry {
    static PIPES: OnceLock<Registry> = OnceLock::new();
    PIPES.get_or_init(|| Mutex::new(HashMap::new()))
}

static NEXT_OUTPUT_HANDLE: AtomicU64 = AtomicU64::new(FIRST_DYNAMIC_HANDLE);
static NEXT_INPUT_HANDLE: AtomicU64 = AtomicU64::new(FIRST_DYNAMIC_HANDLE);

// A poisoned registry lock only means another thread panicked mid-update;
// the map itself is still usable.
fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<u64, Pipe>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Output pipes (engine -> host)
// =============================================================================

#[no_mangle]
pub extern "C" fn CreateOutputPipe() -> *mut CreateOutputPipeReturn {
    let (read_end, write_end) = match sys::create_pipe() {
        Ok(ends) => ends,
        Err(e) => {
            return alloc::alloc_value(CreateOutputPipeReturn {
                output_stream: 0,
                read_file_descriptor: 0,
                error: error::raise("PipeCreationFailed", &e.to_string()),
            })
        }
    };

    let handle = NEXT_OUTPUT_HANDLE.fetch_add(1, Ordering::SeqCst);
    lock(output_pipes()).insert(
        handle,
        Pipe {
            read_end,
            write_end,
            write_closed: false,
        },
    );

    alloc::alloc_value(CreateOutputPipeReturn {
        output_stream: handle,
        read_file_descriptor: read_end as u64,
        error: ptr::null_mut(),
    })
}

#[no_mangle]
pub extern "C" fn DisposeOutputPipe(handle: u64) -> *mut EngineError {
    if handle <= STDERR_STREAM {
        // Standard streams are not ours to close.
        return ptr::null_mut();
    }

    let Some(pipe) = lock(output_pipes()).remove(&handle) else {
        return error::raise(
            "InvalidOutputStreamHandle",
            &format!("no output stream with handle {handle}"),
        );
    };

    // Write end first: a reader still blocked on the pipe sees end-of-stream
    // before its descriptor goes away.
    if !pipe.write_closed {
        sys::close(pipe.write_end);
    }
    sys::close(pipe.read_end);
    ptr::null_mut()
}

/// Write end of an output pipe, if the handle is live and still open.
pub(crate) fn output_write_end(handle: u64) -> Option<RawPipe> {
    lock(output_pipes())
        .get(&handle)
        .filter(|pipe| !pipe.write_closed)
        .map(|pipe| pipe.write_end)
}

/// Close the write end of an output pipe, leaving the handle registered.
/// Returns false for an unknown handle; closing twice is a no-op.
pub(crate) fn close_output_write_end(handle: u64) -> bool {
    let mut pipes = lock(output_pipes());
    let Some(pipe) = pipes.get_mut(&handle) else {
        return false;
    };

    if !pipe.write_closed {
        sys::close(pipe.write_end);
        pipe.write_closed = true;
    }
    true
}

// =============================================================================
// Input pipes (host -> engine)
// =============================================================================

#[no_mangle]
pub extern "C" fn CreateInputPipe() -> *mut CreateInputPipeReturn {
    let (read_end, write_end) = match sys::create_pipe() {
        Ok(ends) => ends,
        Err(e) => {
            return alloc::alloc_value(CreateInputPipeReturn {
                input_stream: 0,
                write_file_descriptor: 0,
                error: error::raise("PipeCreationFailed", &e.to_string()),
            })
        }
    };

    let handle = NEXT_INPUT_HANDLE.fetch_add(1, Ordering::SeqCst);
    lock(input_pipes()).insert(
        handle,
        Pipe {
            read_end,
            write_end,
            write_closed: false,
        },
    );

    alloc::alloc_value(CreateInputPipeReturn {
        input_stream: handle,
        write_file_descriptor: write_end as u64,
        error: ptr::null_mut(),
    })
}

/// Close the write end of an input pipe so the engine-side reader sees
/// end-of-stream. The handle stays registered until disposal.
#[no_mangle]
pub extern "C" fn CloseInputPipeWriteEnd(handle: u64) -> *mut EngineError {
    if handle <= STDERR_STREAM {
        return ptr::null_mut();
    }

    let mut pipes = lock(input_pipes());
    let Some(pipe) = pipes.get_mut(&handle) else {
        return error::raise(
            "InvalidInputStreamHandle",
            &format!("no input stream with handle {handle}"),
        );
    };

    if !pipe.write_closed {
        sys::close(pipe.write_end);
        pipe.write_closed = true;
    }
    ptr::null_mut()
}

#[no_mangle]
pub extern "C" fn DisposeInputPipe(handle: u64) -> *mut EngineError {
    if handle <= STDERR_STREAM {
        return ptr::null_mut();
    }

    let Some(pipe) = lock(input_pipes()).remove(&handle) else {
        return error::raise(
            "InvalidInputStreamHandle",
            &format!("no input stream with handle {handle}"),
        );
    };

    if !pipe.write_closed {
        sys::close(pipe.write_end);
    }
    sys::close(pipe.read_end);
    ptr::null_mut()
}

/// Read end of an input pipe, if the handle is live.
pub(crate) fn input_read_end(handle: u64) -> Option<RawPipe> {
    lock(input_pipes()).get(&handle).map(|pipe| pipe.read_end)
}
