//! Ciphersuite identifiers and the key-exchange-family sum type (spec.md §9 DESIGN
//! NOTES: "a closed sum type over {RSA, DHE_RSA, ECDHE_RSA, PSK, DHE_PSK, ...} and
//! exhaustive match, so the compiler enforces that every new family visits every
//! step").
//!
//! The actual bulk cipher and MAC negotiated by a suite are the record layer's
//! concern (out of scope, spec.md §1); this module only carries what the handshake
//! itself needs to branch on: the key-exchange family, whether the suite requires a
//! server certificate, and which digest `CertificateRequest` should advertise for
//! this suite's PRF hash.

use crate::error::HandshakeError;
use crate::reader::Reader;

tls_enum_u16!(CipherSuiteId => {
    TlsRsaWithAes128CbcSha(0x002F),
    TlsRsaWithAes256CbcSha(0x0035),
    TlsRsaWithAes128CbcSha256(0x003C),
    TlsDheRsaWithAes128CbcSha(0x0033),
    TlsDheRsaWithAes256CbcSha(0x0039),
    TlsDheRsaWithAes128CbcSha256(0x0067),
    TlsEcdheRsaWithAes128CbcSha(0xC013),
    TlsEcdheRsaWithAes256CbcSha(0xC014),
    TlsEcdheRsaWithAes128CbcSha256(0xC027),
    TlsDhePskWithAes128CbcSha(0x0090),
    TlsPskWithAes128CbcSha(0x008C),
    TlsEmptyRenegotiationInfoScsv(0x00FF),
    (0xffff)
});

/// Closed sum type over the key-exchange families this engine implements. Every
/// place that behaves differently per family (`crate::server_messages`,
/// `crate::client_messages`) matches on this exhaustively rather than branching on
/// the raw ciphersuite id, per the redesign note above.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyExchangeFamily {
    Rsa,
    DheRsa,
    EcdheRsa,
    Psk,
    DhePsk,
}

impl KeyExchangeFamily {
    /// Whether this family requires the server to send a Certificate message and,
    /// when applicable, a ServerKeyExchange signed by that certificate's key.
    pub fn uses_server_certificate(&self) -> bool {
        matches!(self, Self::Rsa | Self::DheRsa | Self::EcdheRsa)
    }

    /// Whether this family sends a ServerKeyExchange at all (spec.md §4.D:
    /// "only for DHE-RSA, ECDHE-RSA, DHE-PSK; skipped otherwise").
    pub fn sends_server_key_exchange(&self) -> bool {
        matches!(self, Self::DheRsa | Self::EcdheRsa | Self::DhePsk)
    }

    /// Whether this family ever sends a CertificateRequest / expects
    /// CertificateVerify (spec.md §4.D, §4.E: "Skipped ... when key-exchange is
    /// PSK/DHE-PSK").
    pub fn uses_client_certificate(&self) -> bool {
        matches!(self, Self::Rsa | Self::DheRsa | Self::EcdheRsa)
    }
}

/// Static per-suite metadata consulted during negotiation (spec.md §4.C step 9) and
/// message construction (§4.D).
#[derive(Clone, Copy, Debug)]
pub struct CipherSuiteInfo {
    pub id: CipherSuiteId,
    pub key_exchange: KeyExchangeFamily,
    /// Inclusive range of protocol minor versions this suite may be negotiated in.
    pub min_minor: u8,
    pub max_minor: u8,
    /// The PRF/transcript hash this suite uses once TLS 1.2 is negotiated. Drives the
    /// `CertificateRequest` `verify_sig_alg` choice (spec.md §4.D: SHA384 if the
    /// suite's MAC is SHA384, else SHA256).
    pub prf_hash: PrfHash,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrfHash {
    Sha256,
    Sha384,
}

/// The complete catalogue of suites this engine recognises, independent of whether
/// any particular `ServerConfig` enables them. `min_minor`/`max_minor` use the
/// `ProtocolMinorVersion` convention from `crate::handshake` (SSLv3 = 0, TLS 1.0 = 1,
/// 1.1 = 2, 1.2 = 3).
pub const SUITE_TABLE: &[CipherSuiteInfo] = &[
    CipherSuiteInfo {
        id: CipherSuiteId::TlsRsaWithAes128CbcSha,
        key_exchange: KeyExchangeFamily::Rsa,
        min_minor: 0,
        max_minor: 3,
        prf_hash: PrfHash::Sha256,
    },
    CipherSuiteInfo {
        id: CipherSuiteId::TlsRsaWithAes256CbcSha,
        key_exchange: KeyExchangeFamily::Rsa,
        min_minor: 0,
        max_minor: 3,
        prf_hash: PrfHash::Sha256,
    },
    CipherSuiteInfo {
        id: CipherSuiteId::TlsRsaWithAes128CbcSha256,
        key_exchange: KeyExchangeFamily::Rsa,
        min_minor: 3,
        max_minor: 3,
        prf_hash: PrfHash::Sha256,
    },
    CipherSuiteInfo {
        id: CipherSuiteId::TlsDheRsaWithAes128CbcSha,
        key_exchange: KeyExchangeFamily::DheRsa,
        min_minor: 0,
        max_minor: 3,
        prf_hash: PrfHash::Sha256,
    },
    CipherSuiteInfo {
        id: CipherSuiteId::TlsDheRsaWithAes256CbcSha,
        key_exchange: KeyExchangeFamily::DheRsa,
        min_minor: 0,
        max_minor: 3,
        prf_hash: PrfHash::Sha256,
    },
    CipherSuiteInfo {
        id: CipherSuiteId::TlsDheRsaWithAes128CbcSha256,
        key_exchange: KeyExchangeFamily::DheRsa,
        min_minor: 3,
        max_minor: 3,
        prf_hash: PrfHash::Sha256,
    },
    CipherSuiteInfo {
        id: CipherSuiteId::TlsEcdheRsaWithAes128CbcSha,
        key_exchange: KeyExchangeFamily::EcdheRsa,
        min_minor: 1,
        max_minor: 3,
        prf_hash: PrfHash::Sha256,
    },
    CipherSuiteInfo {
        id: CipherSuiteId::TlsEcdheRsaWithAes256CbcSha,
        key_exchange: KeyExchangeFamily::EcdheRsa,
        min_minor: 1,
        max_minor: 3,
        prf_hash: PrfHash::Sha384,
    },
    CipherSuiteInfo {
        id: CipherSuiteId::TlsEcdheRsaWithAes128CbcSha256,
        key_exchange: KeyExchangeFamily::EcdheRsa,
        min_minor: 3,
        max_minor: 3,
        prf_hash: PrfHash::Sha256,
    },
    CipherSuiteInfo {
        id: CipherSuiteId::TlsDhePskWithAes128CbcSha,
        key_exchange: KeyExchangeFamily::DhePsk,
        min_minor: 0,
        max_minor: 3,
        prf_hash: PrfHash::Sha256,
    },
    CipherSuiteInfo {
        id: CipherSuiteId::TlsPskWithAes128CbcSha,
        key_exchange: KeyExchangeFamily::Psk,
        min_minor: 0,
        max_minor: 3,
        prf_hash: PrfHash::Sha256,
    },
];

pub fn lookup(id: CipherSuiteId) -> Option<&'static CipherSuiteInfo> {
    SUITE_TABLE.iter().find(|s| s.id == id)
}
