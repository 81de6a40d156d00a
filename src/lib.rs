//! Server-side SSLv3/TLS 1.0-1.2 handshake state machine.
//!
//! This crate owns the handshake *logic*: parsing ClientHello and its
//! extensions, negotiating a ciphersuite and version, building the server's
//! flight of messages, parsing the client's response flight, and driving the
//! whole thing forward one `step()` at a time via `state_machine::HandshakeDriver`.
//! Everything it needs from the outside world -- the record layer, RSA
//! sign/decrypt, DH/ECDH math, hashing, secure randomness, session storage, and
//! the SNI callback -- is named as a trait in `collaborators` (plus `dh` and
//! `hasher`) and supplied by the embedder through `ServerConfig`.

#[macro_use]
mod macros;

pub mod alert;
pub mod cipher_suite;
pub mod client_hello;
pub mod client_messages;
pub mod collaborators;
pub mod config;
pub mod dh;
pub mod error;
pub mod extensions;
pub mod handshake;
pub mod hasher;
pub mod reader;
pub mod server_messages;
pub mod session;
pub mod state_machine;
pub mod transcript;

pub use alert::{AlertDescription, AlertLevel};
pub use cipher_suite::{CipherSuiteId, CipherSuiteInfo, KeyExchangeFamily, PrfHash};
pub use collaborators::{CachedSession, KeySchedule, RecordLayer, RsaPrivateKey, SecureRandom, SessionCache, SniCallback};
pub use config::{
    AuthMode, CertificateDer, CompressionPolicy, ConfigError, DhGroup, LegacyRenegotiationPolicy, PskConfig,
    ServerConfig, ServerConfigBuilder,
};
pub use dh::KeyAgreement;
pub use error::{HandshakeError, Result};
pub use extensions::{EcPointFormat, ExtensionType, HashAlgorithm, NamedGroup, SignatureAlgorithm};
pub use handshake::{ProtocolMinorVersion, SSL3_MINOR, TLS1_0_MINOR, TLS1_1_MINOR, TLS1_2_MINOR};
pub use hasher::{Hasher, HasherFactory};
pub use session::{CompressionMethod, EstablishedSession, HandshakeSession, SecureRenegotiation};
pub use state_machine::{HandshakeDriver, State, StepStatus};
