//! Thin typed client over the exported engine operations.

use tracing::{debug, warn};

use crate::error::ClientError;
use crate::ffi;
use crate::marshal::{self, Owned};

/// A connection to the engine. Dropping the client releases the native
/// handle.
pub struct EngineClient {
    handle: ffi::ClientHandle,
}

/// The engine's answer to a ping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingResponse {
    pub api_version: String,
    pub experimental: bool,
}

impl EngineClient {
    pub fn new() -> Result<Self, ClientError> {
        let ret =
            unsafe { Owned::from_raw(ffi::CreateClient()) }.ok_or(ClientError::MissingResult)?;
        marshal::decode_error(ret.error()).map_err(ClientError::CreateClient)?;

        let handle = ret.client();
        debug!(handle, "engine client created");
        Ok(EngineClient { handle })
    }

    pub fn handle(&self) -> ffi::ClientHandle {
        self.handle
    }

    pub fn ping(&self) -> Result<PingResponse, ClientError> {
        let ret =
            unsafe { Owned::from_raw(ffi::Ping(self.handle)) }.ok_or(ClientError::MissingResult)?;
        marshal::decode_error(ret.error()).map_err(ClientError::Ping)?;

        let response = ret.response().ok_or(ClientError::MissingResult)?;
        Ok(PingResponse {
            api_version: response.api_version().unwrap_or_default(),
            experimental: response.experimental(),
        })
    }
}

impl Drop for EngineClient {
    fn drop(&mut self) {
        let result = unsafe { marshal::check_native_error(ffi::DisposeClient(self.handle)) };
        if let Err(error) = result {
            warn!(handle = self.handle, %error, "disposing engine client failed");
        }
    }
}

// =============================================================================
// Exec requests
// =============================================================================

/// Parameters for an exec session, marshaled into the request struct the
/// boundary understands.
#[derive(Debug, Clone, Default)]
pub struct ExecSpec {
    pub container_id: String,
    pub command: Vec<String>,
    pub environment: Vec<String>,
    pub attach_stdout: bool,
    pub attach_stderr: bool,
    pub attach_stdin: bool,
}

impl ExecSpec {
    /// Marshal into a native request. Every allocation's ownership moves
    /// into the returned value, whose drop releases strings, arrays, and
    /// the struct itself through one `Free` call.
    pub fn to_native(&self) -> Result<Owned<ffi::ExecRequest>, ClientError> {
        let mut request = unsafe { Owned::from_raw(ffi::AllocExecRequest()) }
            .ok_or(ClientError::MissingResult)?;

        request.container_id = marshal::to_native_string(&self.container_id)?;

        let (count, array) = marshal::to_native_string_array(&self.command)?;
        request.command_count = count;
        request.command = array;

        let (count, array) = marshal::to_native_string_array(&self.environment)?;
        request.environment_variables_count = count;
        request.environment_variables = array;

        request.attach_stdout = self.attach_stdout;
        request.attach_stderr = self.attach_stderr;
        request.attach_stdin = self.attach_stdin;

        Ok(request)
    }
}
