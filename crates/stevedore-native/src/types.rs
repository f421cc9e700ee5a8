//! `#[repr(C)]` mirrors of the generated `types.h` layouts, plus the
//! lifecycle exports the header declares for them.
//!
//! Field order here must match the schema's declaration order exactly; the
//! host's bindings are generated from the same schema and agree on layout
//! only because both sides follow it. `Free` exports release pointer fields
//! in declaration order, then the struct itself, exactly like the generated
//! C implementation they stand in for.

use std::os::raw::{c_char, c_void};
use std::ptr;

use crate::alloc;
use crate::error::{EngineError, FreeEngineError};

pub type ClientHandle = u64;
pub type OutputStreamHandle = u64;
pub type InputStreamHandle = u64;
pub type FileDescriptor = u64;

pub type EventCallback =
    Option<unsafe extern "C" fn(user_data: *mut c_void, event: *mut c_char) -> bool>;

#[repr(C)]
pub struct Response {
    pub api_version: *mut c_char,
    pub experimental: bool,
}

#[repr(C)]
pub struct PingReturn {
    pub response: *mut Response,
    pub error: *mut EngineError,
}

#[repr(C)]
pub struct CreateClientReturn {
    pub client: ClientHandle,
    pub error: *mut EngineError,
}

#[repr(C)]
pub struct CreateOutputPipeReturn {
    pub output_stream: OutputStreamHandle,
    pub read_file_descriptor: FileDescriptor,
    pub error: *mut EngineError,
}

#[repr(C)]
pub struct CreateInputPipeReturn {
    pub input_stream: InputStreamHandle,
    pub write_file_descriptor: FileDescriptor,
    pub error: *mut EngineError,
}

#[repr(C)]
pub struct ExecRequest {
    pub container_id: *mut c_char,
    pub command_count: u64,
    pub command: *mut *mut c_char,
    pub environment_variables_count: u64,
    pub environment_variables: *mut *mut c_char,
    pub attach_stdout: bool,
    pub attach_stderr: bool,
    pub attach_stdin: bool,
}

// =============================================================================
// Alloc / Free
// =============================================================================

#[no_mangle]
pub extern "C" fn AllocResponse() -> *mut Response {
    alloc::alloc_value(Response {
        api_version: ptr::null_mut(),
        experimental: false,
    })
}

#[no_mangle]
pub unsafe extern "C" fn FreeResponse(value: *mut Response) {
    if value.is_null() {
        return;
    }

    let value = alloc::take_value(value);
    alloc::free_cstring(value.api_version);
}

#[no_mangle]
pub extern "C" fn AllocPingReturn() -> *mut PingReturn {
    alloc::alloc_value(PingReturn {
        response: ptr::null_mut(),
        error: ptr::null_mut(),
    })
}

#[no_mangle]
pub unsafe extern "C" fn FreePingReturn(value: *mut PingReturn) {
    if value.is_null() {
        return;
    }

    let value = alloc::take_value(value);
    FreeResponse(value.response);
    FreeEngineError(value.error);
}

#[no_mangle]
pub extern "C" fn AllocCreateClientReturn() -> *mut CreateClientReturn {
    alloc::alloc_value(CreateClientReturn {
        client: 0,
        error: ptr::null_mut(),
    })
}

#[no_mangle]
pub unsafe extern "C" fn FreeCreateClientReturn(value: *mut CreateClientReturn) {
    if value.is_null() {
        return;
    }

    let value = alloc::take_value(value);
    FreeEngineError(value.error);
}

#[no_mangle]
pub extern "C" fn AllocCreateOutputPipeReturn() -> *mut CreateOutputPipeReturn {
    alloc::alloc_value(CreateOutputPipeReturn {
        output_stream: 0,
        read_file_descriptor: 0,
        error: ptr::null_mut(),
    })
}

#[no_mangle]
pub unsafe extern "C" fn FreeCreateOutputPipeReturn(value: *mut CreateOutputPipeReturn) {
    if value.is_null() {
        return;
    }

    let value = alloc::take_value(value);
    FreeEngineError(value.error);
}

#[no_mangle]
pub extern "C" fn AllocCreateInputPipeReturn() -> *mut CreateInputPipeReturn {
    alloc::alloc_value(CreateInputPipeReturn {
        input_stream: 0,
        write_file_descriptor: 0,
        error: ptr::null_mut(),
    })
}

#[no_mangle]
pub unsafe extern "C" fn FreeCreateInputPipeReturn(value: *mut CreateInputPipeReturn) {
    if value.is_null() {
        return;
    }

    let value = alloc::take_value(value);
    FreeEngineError(value.error);
}

#[no_mangle]
pub extern "C" fn AllocExecRequest() -> *mut ExecRequest {
    alloc::alloc_value(ExecRequest {
        container_id: ptr::null_mut(),
        command_count: 0,
        command: ptr::null_mut(),
        environment_variables_count: 0,
        environment_variables: ptr::null_mut(),
        attach_stdout: false,
        attach_stderr: false,
        attach_stdin: false,
    })
}

#[no_mangle]
pub unsafe extern "C" fn FreeExecRequest(value: *mut ExecRequest) {
    if value.is_null() {
        return;
    }

    let value = alloc::take_value(value);
    alloc::free_cstring(value.container_id);
    alloc::free_string_array(value.command, value.command_count);
    alloc::free_string_array(value.environment_variables, value.environment_variables_count);
}

// =============================================================================
// Array accessors
// =============================================================================

#[no_mangle]
pub extern "C" fn CreateStringArray(size: u64) -> *mut *mut c_char {
    alloc::alloc_string_array(size)
}

#[no_mangle]
pub unsafe extern "C" fn SetStringArrayElement(
    array: *mut *mut c_char,
    index: u64,
    value: *mut c_char,
) {
    *array.add(index as usize) = value;
}

#[no_mangle]
pub unsafe extern "C" fn GetStringArrayElement(array: *mut *mut c_char, index: u64) -> *mut c_char {
    *array.add(index as usize)
}

// =============================================================================
// Callback shims
// =============================================================================

#[no_mangle]
pub unsafe extern "C" fn InvokeEventCallback(
    method: EventCallback,
    user_data: *mut c_void,
    event: *mut c_char,
) -> bool {
    match method {
        Some(method) => method(user_data, event),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn alloc_produces_zeroed_requests() {
        let request = AllocExecRequest();
        unsafe {
            assert!((*request).container_id.is_null());
            assert_eq!((*request).command_count, 0);
            assert!((*request).command.is_null());
            assert!(!(*request).attach_stdout);
            FreeExecRequest(request);
        }
    }

    #[test]
    fn request_free_releases_strings_and_arrays() {
        let request = AllocExecRequest();
        unsafe {
            (*request).container_id = alloc::make_cstring("abc123");

            let command = CreateStringArray(2);
            SetStringArrayElement(command, 0, alloc::make_cstring("echo"));
            SetStringArrayElement(command, 1, alloc::make_cstring("hello"));
            (*request).command = command;
            (*request).command_count = 2;

            let element = GetStringArrayElement(command, 1);
            assert_eq!(CStr::from_ptr(element).to_str().unwrap(), "hello");

            FreeExecRequest(request);
        }
    }

    #[test]
    fn ping_return_free_recurses_into_nested_structs() {
        let ret = AllocPingReturn();
        unsafe {
            let response = AllocResponse();
            (*response).api_version = alloc::make_cstring("1.43");
            (*ret).response = response;
            // Releases the response and its string; the dedicated allocation
            // accounting test lives in the host suite where it runs alone.
            FreePingReturn(ret);
        }
    }

    #[test]
    fn invoking_a_null_callback_reports_failure() {
        let handled = unsafe {
            InvokeEventCallback(None, std::ptr::null_mut(), std::ptr::null_mut())
        };
        assert!(!handled);
    }

    #[test]
    fn invoke_prepends_user_data() {
        unsafe extern "C" fn record(user_data: *mut c_void, event: *mut c_char) -> bool {
            let seen = &mut *(user_data as *mut String);
            *seen = CStr::from_ptr(event).to_str().unwrap().to_string();
            true
        }

        let mut seen = String::new();
        let event = alloc::make_cstring("container started");
        let handled = unsafe {
            InvokeEventCallback(
                Some(record),
                &mut seen as *mut String as *mut c_void,
                event,
            )
        };
        unsafe { alloc::free_cstring(event) };

        assert!(handled);
        assert_eq!(seen, "container started");
    }
}
