//! S1: a minimal RSA handshake with no extensions runs end to end through the
//! public `HandshakeDriver` API and reaches `HandshakeOver`.

mod common;

use std::sync::Arc;

use tls_handshake::{CipherSuiteId, HandshakeDriver, State, StepStatus};

use common::{client_finished_message, client_key_exchange_message, base_rsa_config_builder, ClientHelloBuilder, FakeRecordLayer};

#[test]
fn full_rsa_handshake_reaches_handshake_over() {
    let config = Arc::new(base_rsa_config_builder(3, 3).build().unwrap());

    let client_hello = ClientHelloBuilder::new(3, vec![0x002F]).record();
    let (record_layer, handle) = FakeRecordLayer::new(
        client_hello,
        vec![client_key_exchange_message(), client_finished_message(&[0xAAu8; 12])],
    );
    let mut driver = HandshakeDriver::new(record_layer, config);

    loop {
        match driver.step().expect("every step in this script is well-formed") {
            StepStatus::Done => break,
            _ => continue,
        }
    }

    assert_eq!(driver.state(), State::HandshakeOver);
    let established = driver.take_established().unwrap();
    assert_eq!(established.session.cipher_suite, Some(CipherSuiteId::TlsRsaWithAes128CbcSha));
    assert_eq!(established.session.minor, 3);
    assert!(!established.master_secret.is_empty());

    // ServerHello, Certificate, ServerHelloDone, ChangeCipherSpec is handled
    // out of band by the record layer -- only handshake messages land here.
    let sent = handle.outbound();
    assert!(sent.len() >= 4, "expected at least ServerHello/Certificate/ServerHelloDone/Finished, got {}", sent.len());

    // Once HANDSHAKE_OVER, calling step() again is a caller error.
    assert!(driver.step().is_err());
}
