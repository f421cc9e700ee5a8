//! Client operations against the in-process native library.

use stevedore::marshal::{self, Owned};
use stevedore::{ffi, EngineClient};

use stevedore_native as _;

#[test]
fn ping_reports_the_negotiated_api_version() {
    let client = EngineClient::new().unwrap();

    let response = client.ping().unwrap();
    assert_eq!(response.api_version, "1.43");
    assert!(!response.experimental);
}

#[test]
fn clients_are_independent() {
    let first = EngineClient::new().unwrap();
    let second = EngineClient::new().unwrap();
    assert_ne!(first.handle(), second.handle());

    drop(first);
    // The surviving client still answers after the other is released.
    assert_eq!(second.ping().unwrap().api_version, "1.43");
}

#[test]
fn error_slot_is_decoded_before_the_response() {
    let ret = unsafe { Owned::from_raw(ffi::Ping(9_999_999)) }.unwrap();

    assert!(ret.response().is_none(), "no result may accompany an error");
    let error = marshal::decode_error(ret.error()).unwrap_err();
    assert_eq!(error.kind, "InvalidClientHandle");
    assert!(error.message.contains("9999999"), "{}", error.message);
}
