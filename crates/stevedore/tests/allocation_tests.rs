//! Allocation accounting across full boundary scenarios.
//!
//! Kept to a single test so nothing else mutates the native live-allocation
//! counter while it runs (integration test binaries run one at a time).

use std::ffi::CString;
use std::io::Cursor;
use std::os::raw::c_char;

use stevedore::marshal;
use stevedore::{ffi, EngineClient, ExecSpec, InputSource, OutputDestination};

use stevedore_native as _;

#[test]
fn boundary_scenarios_release_every_allocation() {
    {
        let client = EngineClient::new().unwrap();
        assert_eq!(client.ping().unwrap().api_version, "1.43");

        let request = ExecSpec {
            container_id: "abc123".to_string(),
            command: vec!["echo".to_string(), "hello".to_string()],
            environment: vec!["TERM=xterm".to_string()],
            attach_stdout: true,
            attach_stderr: true,
            attach_stdin: false,
        }
        .to_native()
        .unwrap();
        assert_eq!(request.command(), vec!["echo", "hello"]);
        drop(request);

        let output = OutputDestination::Sink(Box::new(std::io::sink()))
            .prepare()
            .unwrap();
        let data = CString::new("streamed output").unwrap();
        let err =
            unsafe { ffi::WriteToTestOutputStream(output.handle(), data.as_ptr() as *mut c_char) };
        unsafe { marshal::check_native_error(err) }.unwrap();
        unsafe { marshal::check_native_error(ffi::CloseTestOutputStream(output.handle())) }
            .unwrap();
        output.finish().unwrap();

        let input = InputSource::Source(Box::new(Cursor::new(b"stdin bytes".to_vec())))
            .prepare()
            .unwrap();
        input.finish().unwrap();
    }

    assert_eq!(unsafe { ffi::LiveAllocationCount() }, 0);
}
