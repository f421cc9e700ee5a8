//! Client handle registry.
//!
//! A client handle stands for one engine connection. The stand-in keeps the
//! negotiated API facts in the registry entry so `Ping` answers from state
//! rather than from literals scattered through the exports.

use std::collections::HashMap;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

use crate::alloc;
use crate::error::{self, EngineError};
use crate::types::{CreateClientReturn, PingReturn, Response};

struct Client {
    api_version: &'static str,
    experimental: bool,
}

type Registry = Mutex<HashMap<u64, Client>>;

fn clients() -> &'static Registry {
    static CLIENTS: OnceLock<Registry> = OnceLock::new();
    CLIENTS.get_or_init(|| Mutex::new(HashMap::new()))
}

static NEXT_CLIENT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<u64, Client>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[no_mangle]
pub extern "C" fn CreateClient() -> *mut CreateClientReturn {
    let handle = NEXT_CLIENT_HANDLE.fetch_add(1, Ordering::SeqCst);
    lock(clients()).insert(
        handle,
        Client {
            api_version: "1.43",
            experimental: false,
        },
    );

    alloc::alloc_value(CreateClientReturn {
        client: handle,
        error: ptr::null_mut(),
    })
}

#[no_mangle]
pub extern "C" fn DisposeClient(client: u64) -> *mut EngineError {
    if lock(clients()).remove(&client).is_none() {
        return error::raise(
            "InvalidClientHandle",
            &format!("no client with handle {client}"),
        );
    }
    ptr::null_mut()
}

#[no_mangle]
pub extern "C" fn Ping(client: u64) -> *mut PingReturn {
    let registry = lock(clients());
    let Some(state) = registry.get(&client) else {
        return alloc::alloc_value(PingReturn {
            response: ptr::null_mut(),
            error: error::raise(
                "InvalidClientHandle",
                &format!("no client with handle {client}"),
            ),
        });
    };

    alloc::alloc_value(PingReturn {
        response: alloc::alloc_value(Response {
            api_version: alloc::make_cstring(state.api_version),
            experimental: state.experimental,
        }),
        error: ptr::null_mut(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FreeEngineError;
    use crate::types::{FreeCreateClientReturn, FreePingReturn};
    use std::ffi::CStr;

    fn create_client_checked() -> u64 {
        let ret = CreateClient();
        unsafe {
            assert!((*ret).error.is_null());
            let handle = (*ret).client;
            FreeCreateClientReturn(ret);
            handle
        }
    }

    #[test]
    fn ping_reports_the_negotiated_api_version() {
        let client = create_client_checked();

        let ret = Ping(client);
        unsafe {
            assert!((*ret).error.is_null());
            let response = (*ret).response;
            assert!(!response.is_null());
            let version = CStr::from_ptr((*response).api_version).to_str().unwrap();
            assert_eq!(version, "1.43");
            assert!(!(*response).experimental);
            FreePingReturn(ret);
        }

        assert!(DisposeClient(client).is_null());
    }

    #[test]
    fn ping_with_an_unknown_handle_is_error_first() {
        let ret = Ping(9_999_999);
        unsafe {
            assert!((*ret).response.is_null(), "no result may accompany an error");
            let error = (*ret).error;
            assert!(!error.is_null());
            let kind = CStr::from_ptr((*error).kind).to_str().unwrap();
            assert_eq!(kind, "InvalidClientHandle");
            FreePingReturn(ret);
        }
    }

    #[test]
    fn disposing_twice_reports_an_invalid_handle() {
        let client = create_client_checked();
        assert!(DisposeClient(client).is_null());

        let err = DisposeClient(client);
        unsafe {
            let kind = CStr::from_ptr((*err).kind).to_str().unwrap().to_string();
            FreeEngineError(err);
            assert_eq!(kind, "InvalidClientHandle");
        }
    }
}
