//! Streaming bridge end-to-end, with the in-process native library playing
//! the engine side through its test exports.

use std::ffi::CString;
use std::io::{self, Cursor, Write};
use std::os::raw::c_char;
use std::sync::{Arc, Mutex};

use stevedore::marshal;
use stevedore::{ffi, InputSource, OutputDestination, StreamError};

use stevedore_native as _;

#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A sink whose first write fails with a fixed OS code.
struct FailingSink(i32);

impl Write for FailingSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from_raw_os_error(self.0))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn engine_writes(handle: u64, data: &str) {
    let data = CString::new(data).unwrap();
    let err = unsafe { ffi::WriteToTestOutputStream(handle, data.as_ptr() as *mut c_char) };
    unsafe { marshal::check_native_error(err) }.unwrap();
}

fn engine_closes_output(handle: u64) {
    let err = unsafe { ffi::CloseTestOutputStream(handle) };
    unsafe { marshal::check_native_error(err) }.unwrap();
}

// =============================================================================
// Output direction
// =============================================================================

#[test]
fn output_arrives_at_the_sink_in_order() {
    let sink = SharedSink::default();
    let stream = OutputDestination::Sink(Box::new(sink.clone()))
        .prepare()
        .unwrap();

    engine_writes(stream.handle(), "first ");
    engine_writes(stream.handle(), "second ");
    engine_writes(stream.handle(), "third");
    engine_closes_output(stream.handle());

    stream.finish().unwrap();
    assert_eq!(sink.contents(), b"first second third");
}

#[test]
fn end_of_stream_is_not_an_error() {
    let sink = SharedSink::default();
    let stream = OutputDestination::Sink(Box::new(sink.clone()))
        .prepare()
        .unwrap();

    // The engine writes nothing at all before closing.
    engine_closes_output(stream.handle());
    stream.finish().unwrap();
    assert!(sink.contents().is_empty());
}

#[test]
fn sink_failures_surface_with_their_os_code() {
    let code = 5; // EIO
    let stream = OutputDestination::Sink(Box::new(FailingSink(code)))
        .prepare()
        .unwrap();

    engine_writes(stream.handle(), "doomed bytes");
    engine_closes_output(stream.handle());

    match stream.finish() {
        Err(StreamError::Io { code: seen, message }) => {
            assert_eq!(seen, code);
            assert!(!message.is_empty());
        }
        other => panic!("expected an I/O stream error, got {other:?}"),
    }
}

#[test]
fn standard_output_streams_use_reserved_handles() {
    let stdout = OutputDestination::Stdout.prepare().unwrap();
    assert_eq!(stdout.handle(), stevedore::io::STDOUT_STREAM);
    stdout.finish().unwrap();

    let stderr = OutputDestination::Stderr.prepare().unwrap();
    assert_eq!(stderr.handle(), stevedore::io::STDERR_STREAM);
    stderr.finish().unwrap();
}

#[test]
fn dropping_an_unfinished_output_stream_is_clean() {
    let sink = SharedSink::default();
    let stream = OutputDestination::Sink(Box::new(sink.clone()))
        .prepare()
        .unwrap();

    engine_writes(stream.handle(), "partial");
    // No close, no finish: drop disposes the pipe and unblocks the pump.
    drop(stream);
}

// =============================================================================
// Input direction
// =============================================================================

#[test]
fn input_reaches_the_engine_in_order_then_eof() {
    let payload = b"line one\nline two\nline three\n".to_vec();
    let stream = InputSource::Source(Box::new(Cursor::new(payload.clone())))
        .prepare()
        .unwrap();

    let mut received = Vec::new();
    let mut buf = [0u8; 8]; // smaller than the payload on purpose
    loop {
        let n = unsafe {
            ffi::ReadFromTestInputStream(
                stream.handle(),
                buf.as_mut_ptr() as *mut c_char,
                buf.len() as i64,
            )
        };
        assert!(n >= 0, "engine-side read failed");
        if n == 0 {
            break;
        }
        received.extend_from_slice(&buf[..n as usize]);
    }

    assert_eq!(received, payload);
    stream.finish().unwrap();
}

#[test]
fn standard_input_uses_the_reserved_handle() {
    let stdin = InputSource::Stdin.prepare().unwrap();
    assert_eq!(stdin.handle(), stevedore::io::STDIN_STREAM);
    stdin.finish().unwrap();
}

#[test]
fn dropping_an_unfinished_input_stream_is_clean() {
    // An endless source: the pump can never drain it, so only disposal
    // stops the stream.
    let stream = InputSource::Source(Box::new(io::repeat(b'x')))
        .prepare()
        .unwrap();

    let mut buf = [0u8; 64];
    let n = unsafe {
        ffi::ReadFromTestInputStream(stream.handle(), buf.as_mut_ptr() as *mut c_char, 64)
    };
    assert!(n > 0, "pump should be forwarding");

    drop(stream);
}
