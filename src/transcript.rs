//! Accumulates the raw bytes of every handshake message exchanged so far, so that
//! `Finished` and `CertificateVerify` can be computed over "all handshake messages
//! ... in the order they were sent or received" (spec.md §4.F, §4.E).
//!
//! Grounded on the teacher's `tls/transcript.rs`; generalized from a single
//! TLS-1.3-style `hash()` call to the two-hash bookkeeping TLS 1.2 server-side
//! handshakes need once a PRF hash is negotiated (spec.md §9: "md5_sha1 for versions
//! below TLS 1.2, and the suite's PRF hash ... for TLS 1.2").

use crate::hasher::HasherFactory;

/// Stores a list of all handshake messages seen as part of the handshake, in wire
/// order, starting with ClientHello and ending with whichever message was most
/// recently processed.
pub struct Transcript {
    messages: Vec<Vec<u8>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self { messages: vec![] }
    }

    /// Appends a single handshake message body (the `HandshakeType || u24(len) ||
    /// body` envelope, not the record layer framing around it).
    pub fn push(&mut self, message: &[u8]) {
        self.messages.push(message.to_vec());
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Runs every message seen so far through a fresh hasher produced by
    /// `hasher_factory` and returns the digest. Called once per PRF hash needed
    /// (md5_sha1 concatenation pre-TLS-1.2, or the single negotiated suite hash at
    /// TLS 1.2) rather than cached, since the transcript is still being appended to
    /// when `CertificateVerify` needs a snapshot mid-handshake.
    pub fn hash(&self, hasher_factory: &HasherFactory) -> Vec<u8> {
        let mut hasher = hasher_factory();
        for m in self.messages.iter() {
            hasher.update(m);
        }
        hasher.finish()
    }
}
