//! Shared test doubles for the scenario suite: an in-memory record layer, a
//! fixed-byte RNG, a no-op key schedule/hasher pair, and the wire-byte builders
//! the scenarios in this directory are seeded from.
#![allow(dead_code)]

pub mod capture;

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use tls_handshake::{
    AlertDescription, AlertLevel, CipherSuiteId, CompressionPolicy, HandshakeError, HashAlgorithm, Hasher,
    HasherFactory, KeySchedule, PrfHash, ProtocolMinorVersion, RecordLayer, Result, RsaPrivateKey, SecureRandom,
    ServerConfig, ServerConfigBuilder, TLS1_2_MINOR,
};

/// An in-memory stand-in for the record-layer collaborator: raw bytes (for
/// ClientHello, before any version is negotiated) plus a queue of
/// already-defragmented handshake message bodies for everything after.
///
/// `fetch_raw` never consumes on the 5-byte disambiguation peek `read_client_hello`
/// always does first; it consumes on the larger follow-up fetch that actually
/// reads the full record. That mirrors a real record layer's buffer closely
/// enough to let a test push a *second* ClientHello's bytes into the same
/// buffer once the first has been drained -- needed to script a renegotiation.
pub struct FakeRecordLayer {
    handle: FakeRecordLayerHandle,
}

#[derive(Clone)]
pub struct FakeRecordLayerHandle {
    raw_inbound: Arc<Mutex<Vec<u8>>>,
    inbound: Arc<Mutex<VecDeque<Vec<u8>>>>,
    outbound: Arc<Mutex<Vec<Vec<u8>>>>,
    alerts: Arc<Mutex<Vec<AlertDescription>>>,
}

impl FakeRecordLayerHandle {
    pub fn push_raw(&self, bytes: &[u8]) {
        self.raw_inbound.lock().unwrap().extend_from_slice(bytes);
    }

    pub fn push_message(&self, body: Vec<u8>) {
        self.inbound.lock().unwrap().push_back(body);
    }

    pub fn outbound(&self) -> Vec<Vec<u8>> {
        self.outbound.lock().unwrap().clone()
    }

    pub fn alerts(&self) -> Vec<AlertDescription> {
        self.alerts.lock().unwrap().clone()
    }
}

impl FakeRecordLayer {
    /// Returns the layer (to hand to `HandshakeDriver::new`) and a cloneable
    /// handle the test keeps to feed more bytes in and inspect what went out.
    pub fn new(raw_inbound: Vec<u8>, inbound: Vec<Vec<u8>>) -> (Self, FakeRecordLayerHandle) {
        let handle = FakeRecordLayerHandle {
            raw_inbound: Arc::new(Mutex::new(raw_inbound)),
            inbound: Arc::new(Mutex::new(VecDeque::from(inbound))),
            outbound: Arc::new(Mutex::new(vec![])),
            alerts: Arc::new(Mutex::new(vec![])),
        };
        (FakeRecordLayer { handle: handle.clone() }, handle)
    }
}

impl RecordLayer for FakeRecordLayer {
    fn fetch_raw(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
        let mut buf = self.handle.raw_inbound.lock().unwrap();
        if buf.len() < n {
            return Ok(None);
        }
        let out = buf[..n].to_vec();
        if n != 5 {
            buf.drain(..n);
        }
        Ok(Some(out))
    }
    fn read_handshake_message(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.handle.inbound.lock().unwrap().pop_front())
    }
    fn write_handshake_message(&mut self, body: &[u8]) -> Result<()> {
        self.handle.outbound.lock().unwrap().push(body.to_vec());
        Ok(())
    }
    fn send_alert(&mut self, _level: AlertLevel, description: AlertDescription) -> Result<()> {
        self.handle.alerts.lock().unwrap().push(description);
        Ok(())
    }
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
    fn change_write_cipher_spec(&mut self) -> Result<()> {
        Ok(())
    }
    fn change_read_cipher_spec(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Fixed-byte-stream RNG: deterministic, never blocks, never actually random.
pub struct FakeRng(pub u8);

impl SecureRandom for FakeRng {
    fn fill(&self, buf: &mut [u8]) {
        buf.fill(self.0);
    }
}

pub struct FakeKeySchedule;

impl KeySchedule for FakeKeySchedule {
    fn derive_master_secret(&mut self, _premaster: &[u8], _randbytes: &[u8; 64], _prf_hash: PrfHash) -> Result<Vec<u8>> {
        Ok(vec![0x99u8; 48])
    }
    fn verify_data(&self, _master_secret: &[u8], _transcript_hash: &[u8], _prf_hash: PrfHash, sender_is_client: bool) -> Vec<u8> {
        vec![if sender_is_client { 0xAA } else { 0xBB }; 12]
    }
}

pub struct FakeRsaKey;

impl RsaPrivateKey for FakeRsaKey {
    fn modulus_len(&self) -> usize {
        4
    }
    fn decrypt_pkcs1v15(&self, _ciphertext: &[u8]) -> Result<Vec<u8>> {
        let mut pms = vec![0u8; 48];
        pms[0] = 3;
        pms[1] = 3;
        Ok(pms)
    }
    fn sign_pkcs1v15(&self, _digest: &[u8]) -> Result<Vec<u8>> {
        Ok(vec![0xAA; 4])
    }
    fn verify_pkcs1v15(&self, _public_key_der: &[u8], _digest: &[u8], _signature: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
struct NoopHasher;

impl Hasher for NoopHasher {
    fn block_size(&self) -> usize {
        64
    }
    fn output_size(&self) -> usize {
        32
    }
    fn update(&mut self, _data: &[u8]) {}
    fn finish(&self) -> Vec<u8> {
        vec![0u8; 32]
    }
    fn box_clone(&self) -> Box<dyn Hasher> {
        Box::new(NoopHasher)
    }
}

pub fn hasher_factories() -> BTreeMap<HashAlgorithm, HasherFactory> {
    let factory: HasherFactory = Arc::new(|| Box::new(NoopHasher));
    let mut m = BTreeMap::new();
    m.insert(HashAlgorithm::Sha256, factory.clone());
    m.insert(HashAlgorithm::Md5, factory.clone());
    m.insert(HashAlgorithm::Sha1, factory);
    m
}

/// A minimal RSA-only config covering one minor version, usable as the base for
/// scenarios that only need to vary a couple of fields via the closure.
pub fn base_rsa_config_builder(min_minor: ProtocolMinorVersion, max_minor: ProtocolMinorVersion) -> ServerConfigBuilder {
    let factories = hasher_factories();
    ServerConfig::builder()
        .min_minor(min_minor)
        .max_minor(max_minor)
        .cipher_suites(TLS1_2_MINOR, vec![CipherSuiteId::TlsRsaWithAes128CbcSha])
        .compression(CompressionPolicy::NullOnly)
        .private_key(Arc::new(FakeRsaKey))
        .certificate_chain(vec![vec![0xCCu8; 8]])
        .rng(Arc::new(FakeRng(0x11)))
        .key_schedule(Arc::new(Mutex::new(FakeKeySchedule)))
        .hasher_factory(HashAlgorithm::Sha256, factories[&HashAlgorithm::Sha256].clone())
        .hasher_factory(HashAlgorithm::Md5, factories[&HashAlgorithm::Md5].clone())
        .hasher_factory(HashAlgorithm::Sha1, factories[&HashAlgorithm::Sha1].clone())
}

/// Wraps a handshake-message body in its 1-byte-type + 3-byte-length envelope.
pub fn handshake_envelope(kind: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![kind];
    let len = body.len() as u32;
    out.push((len >> 16) as u8);
    out.push((len >> 8) as u8);
    out.push(len as u8);
    out.extend_from_slice(body);
    out
}

const HANDSHAKE_CLIENT_HELLO: u8 = 1;
const HANDSHAKE_CLIENT_KEY_EXCHANGE: u8 = 16;
const HANDSHAKE_FINISHED: u8 = 20;

/// Builds a complete modern-record-framed ClientHello, with an optional raw
/// extensions block (already including its own 2-byte length prefix semantics
/// handled by the caller) appended after the compression list.
pub struct ClientHelloBuilder {
    pub major: u8,
    pub minor: u8,
    pub client_random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suites: Vec<u16>,
    pub compression: Vec<u8>,
    pub extensions: Vec<u8>,
}

impl ClientHelloBuilder {
    pub fn new(minor: u8, cipher_suites: Vec<u16>) -> Self {
        ClientHelloBuilder {
            major: 3,
            minor,
            client_random: [7u8; 32],
            session_id: vec![],
            cipher_suites,
            compression: vec![0],
            extensions: vec![],
        }
    }

    fn body(&self) -> Vec<u8> {
        let mut body = vec![self.major, self.minor];
        body.extend_from_slice(&self.client_random);
        body.push(self.session_id.len() as u8);
        body.extend_from_slice(&self.session_id);

        let cipher_bytes: Vec<u8> = self.cipher_suites.iter().flat_map(|c| c.to_be_bytes()).collect();
        body.extend_from_slice(&((cipher_bytes.len() as u16).to_be_bytes()));
        body.extend_from_slice(&cipher_bytes);

        body.push(self.compression.len() as u8);
        body.extend_from_slice(&self.compression);

        if !self.extensions.is_empty() {
            body.extend_from_slice(&((self.extensions.len() as u16).to_be_bytes()));
            body.extend_from_slice(&self.extensions);
        }
        body
    }

    /// Full TLS record: 5-byte record header + ClientHello envelope.
    pub fn record(&self) -> Vec<u8> {
        let envelope = handshake_envelope(HANDSHAKE_CLIENT_HELLO, &self.body());
        let mut record = vec![22, self.major, self.minor];
        record.extend_from_slice(&(envelope.len() as u16).to_be_bytes());
        record.extend_from_slice(&envelope);
        record
    }
}

/// A 4-byte RSA-encrypted-PMS ClientKeyExchange body (length matches
/// `FakeRsaKey::modulus_len`).
pub fn client_key_exchange_message() -> Vec<u8> {
    let mut body = vec![];
    body.extend_from_slice(&4u16.to_be_bytes());
    body.extend_from_slice(&[0u8; 4]);
    handshake_envelope(HANDSHAKE_CLIENT_KEY_EXCHANGE, &body)
}

pub fn client_finished_message(verify_data: &[u8]) -> Vec<u8> {
    handshake_envelope(HANDSHAKE_FINISHED, verify_data)
}

/// Builds a literal SSLv2-compatible ClientHello (spec.md §4.C's legacy path):
/// `0x80`-flagged 2-byte record length, message type 1, a cipher list of
/// 3-byte SSLv2-style entries, an empty session id, and a fixed-length
/// challenge that right-aligns into `randbytes[0..32]`.
pub fn legacy_sslv2_client_hello_record(version: (u8, u8), cipher_specs: &[[u8; 3]], challenge: &[u8]) -> Vec<u8> {
    let mut body = vec![1u8, version.0, version.1];
    let cipher_bytes: Vec<u8> = cipher_specs.iter().flatten().copied().collect();
    body.extend_from_slice(&((cipher_bytes.len() as u16).to_be_bytes()));
    body.extend_from_slice(&0u16.to_be_bytes()); // session_id_length = 0
    body.extend_from_slice(&(challenge.len() as u16).to_be_bytes());
    body.extend_from_slice(&cipher_bytes);
    body.extend_from_slice(challenge);

    let total_len = body.len() as u16;
    let mut record = vec![0x80 | ((total_len >> 8) as u8), total_len as u8];
    record.extend_from_slice(&body);
    record
}
