//! Tagged-union error type for the handshake engine (spec.md §7).
//!
//! Every parse/build function in this crate returns `Result<T, HandshakeError>`. The
//! driver (`crate::state_machine`) propagates this verbatim; it never downgrades an
//! error into a different kind or swallows it silently. See `SPEC_FULL.md` §7 for the
//! rationale behind carrying an `AlertDescription` on the fatal variants.

use failure::Fail;

use crate::alert::AlertDescription;

/// The single error type returned by every fallible operation in this crate.
///
/// `Fail` (rather than a hand-rolled `Display`/`Error` pair) is this dependency stack's
/// idiom for tagged-union errors, matching `common::errors::Error` in the teacher
/// lineage; we use the crate directly rather than its in-house convenience re-exports.
#[derive(Debug, Fail)]
pub enum HandshakeError {
    /// Any framing/length/field violation in ClientHello or its extensions.
    #[fail(display = "bad ClientHello: {}", reason)]
    BadClientHello {
        reason: &'static str,
        alert: Option<AlertDescription>,
    },

    /// Negotiated version fell below the configured minimum.
    #[fail(display = "protocol version too low")]
    BadHsProtocolVersion,

    /// Framing error in ClientKeyExchange.
    #[fail(display = "bad ClientKeyExchange: {}", reason)]
    BadClientKeyExchange { reason: &'static str },

    /// The crypto collaborator rejected a client public value (DH/ECDH).
    #[fail(display = "bad ClientKeyExchange: crypto library rejected public value")]
    BadClientKeyExchangeReadPublic,

    /// Shared-secret computation failed (DH/ECDH).
    #[fail(display = "bad ClientKeyExchange: shared secret computation failed")]
    BadClientKeyExchangeComputeSecret,

    /// Framing or signature failure in CertificateVerify.
    #[fail(display = "bad CertificateVerify: {}", reason)]
    BadCertificateVerify { reason: &'static str },

    /// A peer's Finished `verify_data` did not match what the key schedule
    /// expected for the transcript seen so far. Not a distinct kind in
    /// spec.md §7's enumeration (Finished verification is named there as
    /// collaborator territory), but the byte-equality check itself is this
    /// engine's to make, and it needs somewhere to report failure.
    #[fail(display = "Finished verify_data mismatch")]
    BadFinished,

    /// No mutually acceptable ciphersuite.
    #[fail(display = "no cipher chosen")]
    NoCipherChosen,

    /// Configuration is missing a private key required for the negotiated suite.
    #[fail(display = "private key required but not configured")]
    PrivateKeyRequired,

    /// Negotiated parameters require a disabled capability.
    #[fail(display = "feature unavailable: {}", feature)]
    FeatureUnavailable { feature: &'static str },

    /// API misuse: the driver was invoked after the handshake already completed.
    #[fail(display = "bad input data: driver invoked in a terminal state")]
    BadInputData,

    /// Bubbled up from the record-layer collaborator (framing/IO on the wire).
    #[fail(display = "record layer error: {}", _0)]
    RecordLayer(failure::Error),
}

impl HandshakeError {
    /// The alert the engine owes the peer before this error may be returned, if any.
    ///
    /// `state_machine::HandshakeDriver::step` checks this on every `Err` path and
    /// refuses to propagate the error until the alert has actually been handed to the
    /// record-layer collaborator (spec.md §7: "the engine sends a fatal alert ...
    /// before returning").
    pub fn alert(&self) -> Option<AlertDescription> {
        match self {
            HandshakeError::BadClientHello { alert, .. } => *alert,
            HandshakeError::BadHsProtocolVersion => Some(AlertDescription::ProtocolVersion),
            HandshakeError::NoCipherChosen => Some(AlertDescription::HandshakeFailure),
            HandshakeError::BadCertificateVerify { .. } => Some(AlertDescription::HandshakeFailure),
            HandshakeError::BadFinished => Some(AlertDescription::HandshakeFailure),
            HandshakeError::BadClientKeyExchange { .. }
            | HandshakeError::BadClientKeyExchangeReadPublic
            | HandshakeError::BadClientKeyExchangeComputeSecret => {
                Some(AlertDescription::HandshakeFailure)
            }
            _ => None,
        }
    }

    pub(crate) fn bad_client_hello(reason: &'static str) -> Self {
        HandshakeError::BadClientHello {
            reason,
            alert: Some(AlertDescription::HandshakeFailure),
        }
    }

    pub(crate) fn bad_client_hello_with_alert(
        reason: &'static str,
        alert: AlertDescription,
    ) -> Self {
        HandshakeError::BadClientHello {
            reason,
            alert: Some(alert),
        }
    }
}

pub type Result<T> = core::result::Result<T, HandshakeError>;
