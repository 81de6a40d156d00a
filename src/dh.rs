//! Key-agreement collaborator interfaces (spec.md §6: "Diffie-Hellman / elliptic-curve
//! Diffie-Hellman key agreement ... generate an ephemeral keypair, encode the public
//! value for ServerKeyExchange, and compute the shared secret from the peer's
//! ClientKeyExchange public value").
//!
//! Adapted from the teacher's `dh.rs` `DiffieHellmanFn` trait: made synchronous (this
//! engine's `step()` never awaits anything, per spec.md §5) and split the single
//! `secret_value`/`public_value`/`shared_secret` trio into the two shapes the
//! handshake actually needs on the server side -- a plain Diffie-Hellman group and a
//! named-curve ECDH group both implement `KeyAgreement` the same way.

use crate::error::Result;

/// A Diffie-Hellman-family group (finite-field DH or an elliptic curve) capable of
/// generating an ephemeral keypair and deriving a shared secret from a peer's public
/// value. The server side of this engine only ever plays the "generate ephemeral,
/// receive peer public, derive shared secret" role (spec.md §4.D, §4.E); it never
/// needs a long-lived keypair.
pub trait KeyAgreement: Send + Sync {
    /// Generates a fresh ephemeral secret. Never sent to the peer or logged; dropped
    /// (and, where the collaborator supports it, zeroized) once `shared_secret` has
    /// been called for this handshake.
    fn generate_secret(&self) -> Result<Vec<u8>>;

    /// Encodes the public value corresponding to `secret`, in the wire format this
    /// group uses in ServerKeyExchange (an opaque DH `dh_Ys`, or an uncompressed EC
    /// point for ECDHE).
    fn public_value(&self, secret: &[u8]) -> Result<Vec<u8>>;

    /// Computes the shared secret (the DH/ECDH premaster secret, spec.md §4.E) from
    /// our `secret` and the peer's `peer_public` value as read from
    /// ClientKeyExchange. Returns `Err` if `peer_public` is not a valid point/value
    /// for this group (`HandshakeError::BadClientKeyExchangeReadPublic` is the
    /// expected mapping at the call site).
    fn shared_secret(&self, secret: &[u8], peer_public: &[u8]) -> Result<Vec<u8>>;
}
