//! External collaborator traits (spec.md §6): everything this engine needs from its
//! embedder but deliberately does not implement itself -- the record layer, RSA
//! sign/decrypt, secure randomness, the session cache, and the SNI callback.
//!
//! None of these traits know anything about TLS wire format; they are the seams
//! named in spec.md §1's "deliberately out of scope" list, expressed as plain Rust
//! traits the way the teacher lineage isolates its own crypto/IO primitives behind
//! traits (`dh::DiffieHellmanFn`, this crate's own `hasher::Hasher`) rather than
//! hard-coding a single backend.

use crate::alert::AlertDescription;
use crate::error::Result;

/// Everything the engine needs from the record layer (spec.md §6): fetching
/// handshake bytes, handing off outbound bytes, and sending alerts. Framing,
/// encryption, MAC, and fragmentation are this collaborator's problem, not the
/// engine's.
///
/// The engine never calls these concurrently with itself (spec.md §5: "single
/// threaded cooperative per connection"); implementors may assume calls are
/// strictly sequential for a given session.
pub trait RecordLayer: Send {
    /// Fetches exactly `n` raw, pre-record-layer bytes from the transport (spec.md
    /// §6: "fetch at least N bytes into the inbound buffer"). Used only for the
    /// very first ClientHello, before any record version has been negotiated,
    /// since `crate::client_hello` must inspect the raw first byte to disambiguate
    /// the modern record-framed shape from the legacy SSLv2-compatible one
    /// (spec.md §4.C). Returns `Ok(None)` when fewer than `n` bytes are currently
    /// available; the collaborator is expected to retain whatever it has already
    /// buffered so a later call with a larger `n` does not re-read from scratch.
    fn fetch_raw(&mut self, n: usize) -> Result<Option<Vec<u8>>>;

    /// Returns the next complete handshake message body (already stripped of
    /// record-layer framing and defragmented across records, spec.md §2: "parsers
    /// read from `in_msg`"). Returns `Ok(None)` when the transport would block;
    /// the driver preserves all state and expects to be re-invoked (spec.md §5).
    fn read_handshake_message(&mut self) -> Result<Option<Vec<u8>>>;

    /// Hands a fully serialized handshake message to the record layer for framing
    /// and transmission. The engine does not flush after every write; `flush` is
    /// called explicitly once a flight is complete.
    fn write_handshake_message(&mut self, body: &[u8]) -> Result<()>;

    /// Sends a fatal or warning alert. Called by the driver before returning a
    /// terminal error (spec.md §7); the driver treats this call as having
    /// succeeded even if the transport is already gone, since there is nothing
    /// useful left to do with a failed alert send.
    fn send_alert(&mut self, level: crate::alert::AlertLevel, description: AlertDescription) -> Result<()>;

    /// Flushes any buffered outbound bytes (spec.md §4.F step 2: "flushes pending
    /// outbound record bytes").
    fn flush(&mut self) -> Result<()>;

    /// Switches the outbound direction to the newly negotiated cipher state
    /// (ChangeCipherSpec). A no-op collaborator that never encrypts is valid for
    /// testing but not for production use.
    fn change_write_cipher_spec(&mut self) -> Result<()>;

    /// Switches the inbound direction to the newly negotiated cipher state.
    fn change_read_cipher_spec(&mut self) -> Result<()>;
}

/// Cryptographically secure randomness (spec.md §6's "RNG handle"). Used for
/// `server_random`, fresh session ids, and the Bleichenbacher countermeasure's
/// substitute premaster.
pub trait SecureRandom: Send + Sync {
    fn fill(&self, buf: &mut [u8]);
}

/// The server's RSA signing/decryption key (spec.md §6: "RSA sign/decrypt with a
/// key handle"). `modulus_len` drives the length checks in ClientKeyExchange and
/// CertificateRequest (spec.md §4.E, §4.D).
pub trait RsaPrivateKey: Send + Sync {
    /// Size, in bytes, of the RSA modulus. Used to validate the length of an
    /// incoming `EncryptedPMS` and an outgoing signature.
    fn modulus_len(&self) -> usize;

    /// Decrypts a PKCS#1 v1.5-padded ciphertext. Callers MUST treat any `Err`
    /// here identically to a successful decrypt that produced the wrong length or
    /// wrong version bytes (spec.md §4.E's Bleichenbacher countermeasure) -- never
    /// branch observably on *why* decryption failed.
    fn decrypt_pkcs1v15(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Produces a PKCS#1 v1.5 signature over `digest`, which is already the final
    /// hash (or MD5||SHA1 concatenation) to be signed -- this trait performs no
    /// hashing of its own.
    fn sign_pkcs1v15(&self, digest: &[u8]) -> Result<Vec<u8>>;

    /// Verifies a PKCS#1 v1.5 signature over `digest` against the peer
    /// certificate's public key, for CertificateVerify (spec.md §4.E). Takes the
    /// encoded public key rather than `&self`, since the key being verified
    /// against belongs to the client's certificate, not the server's.
    fn verify_pkcs1v15(&self, public_key_der: &[u8], digest: &[u8], signature: &[u8]) -> Result<()>;
}

/// Invoked once per ClientHello carrying a `server_name` extension (spec.md
/// §4.B). Returning `Err` forces a fatal `unrecognized_name` alert (spec.md §4.B,
/// tested by scenario S6).
pub trait SniCallback: Send + Sync {
    fn accept(&self, host_name: &[u8]) -> bool;
}

/// Session-resumption lookup (spec.md §6's "session-cache get callback", §4.D's
/// resumption shortcut). The engine never writes through this trait directly on
/// the hot path described here; population of the cache on a fresh session is the
/// embedder's responsibility once `HANDSHAKE_OVER` is reached.
pub trait SessionCache: Send + Sync {
    /// Looks up a previously established session by the id the client presented.
    /// `Some` means a cache hit: the embedder is asserting `ciphersuite` and
    /// `master_secret` came from a session negotiated with parameters compatible
    /// with the current connection.
    fn get(&self, session_id: &[u8]) -> Option<CachedSession>;

    /// Stores a newly completed session for future resumption.
    fn put(&self, session_id: &[u8], session: CachedSession);
}

/// The minimal state the session cache needs to persist to support resumption
/// (spec.md §3's "Handshake session (negotiating)" fields that survive into the
/// established session).
#[derive(Clone)]
pub struct CachedSession {
    pub ciphersuite: crate::cipher_suite::CipherSuiteId,
    pub master_secret: Vec<u8>,
}

/// The PRF/key-schedule collaborator (spec.md §1: "Key schedule / PRF
/// (`ssl_derive_keys`) ... ChangeCipherSpec/Finished generation and verification"
/// are explicitly out of scope). The engine calls this once per handshake to turn
/// a premaster secret into a master secret, and again whenever it needs a
/// `verify_data` value to place in or check against a Finished message; it never
/// touches the PRF math itself.
pub trait KeySchedule: Send {
    /// Derives the 48-byte master secret from the premaster secret and the
    /// client/server random pair (spec.md §3's `randbytes`), per RFC 5246 §8.1.
    fn derive_master_secret(
        &mut self,
        premaster: &[u8],
        randbytes: &[u8; 64],
        prf_hash: crate::cipher_suite::PrfHash,
    ) -> Result<Vec<u8>>;

    /// Computes the `verify_data` RFC 5246 §7.4.9 places in a Finished message, for
    /// either the client or the server side of the handshake, over the given
    /// transcript hash.
    fn verify_data(
        &self,
        master_secret: &[u8],
        transcript_hash: &[u8],
        prf_hash: crate::cipher_suite::PrfHash,
        sender_is_client: bool,
    ) -> Vec<u8>;
}
