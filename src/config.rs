//! The caller-constructed configuration surface (SPEC_FULL.md §9), enumerated from
//! spec.md §6's "Configuration surface" list. Built with a validating builder rather
//! than public mutable fields, matching this dependency stack's preference for
//! fallible, validated construction (see the teacher's own `ClientOptions::recommended`
//! constructor in `tls/options.rs`, generalized here into a `Result`-returning
//! `.build()` since a server config has failure modes a client's recommended defaults
//! do not).

use std::collections::BTreeMap;
use std::sync::Arc;

use failure::Fail;

use crate::cipher_suite::CipherSuiteId;
use crate::collaborators::{KeySchedule, RsaPrivateKey, SecureRandom, SessionCache, SniCallback};
use crate::dh::KeyAgreement;
use crate::extensions::{HashAlgorithm, NamedGroup};
use crate::handshake::{ProtocolMinorVersion, SSL3_MINOR, TLS1_2_MINOR};
use crate::hasher::HasherFactory;

/// An encoded X.509 certificate, leaf-first when part of a chain. Certificate
/// parsing itself is out of scope (spec.md §1); this engine only ever copies these
/// bytes onto the wire or hands the leaf's public key to `RsaPrivateKey::verify_pkcs1v15`.
pub type CertificateDer = Vec<u8>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionPolicy {
    NullOnly,
    AllowDeflate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMode {
    None,
    Optional,
    Required,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LegacyRenegotiationPolicy {
    NoRenegotiation,
    AllowLegacy,
    BreakHandshake,
}

/// Static DH group parameters plus the collaborator that performs the actual
/// modular-exponentiation math for them (spec.md §6: "DH parameter copy + make
/// params + read public + compute secret").
pub struct DhGroup {
    /// Big-endian prime modulus P.
    pub p: Vec<u8>,
    /// Big-endian generator G.
    pub g: Vec<u8>,
    pub agreement: Arc<dyn KeyAgreement>,
}

pub struct PskConfig {
    pub identity: Vec<u8>,
    pub key: Vec<u8>,
}

/// Caller-supplied configuration for one listening endpoint. Immutable once built;
/// threaded by shared reference into every `HandshakeDriver`.
pub struct ServerConfig {
    pub min_minor: ProtocolMinorVersion,
    pub max_minor: ProtocolMinorVersion,
    /// Server-preference-ordered ciphersuite list, per negotiated minor version
    /// (spec.md §4.C step 9 walks this in order).
    pub cipher_suites: BTreeMap<ProtocolMinorVersion, Vec<CipherSuiteId>>,
    pub compression: CompressionPolicy,
    pub dh_group: Option<DhGroup>,
    /// One `KeyAgreement` collaborator per named EC group this config is willing
    /// to negotiate via ECDHE.
    pub ec_groups: BTreeMap<NamedGroup, Arc<dyn KeyAgreement>>,
    pub private_key: Option<Arc<dyn RsaPrivateKey>>,
    pub certificate_chain: Vec<CertificateDer>,
    pub ca_chain: Vec<CertificateDer>,
    pub psk: Option<PskConfig>,
    pub authmode: AuthMode,
    pub legacy_renegotiation: LegacyRenegotiationPolicy,
    pub allow_sslv2_client_hello: bool,
    pub sni_callback: Option<Arc<dyn SniCallback>>,
    pub session_cache: Option<Arc<dyn SessionCache>>,
    pub rng: Arc<dyn SecureRandom>,
    pub key_schedule: Arc<std::sync::Mutex<dyn KeySchedule>>,
    /// One hasher factory per hash algorithm this config can produce a transcript
    /// digest for; must at minimum cover every hash named in `SIG_HASH_PREFERENCE`
    /// that the embedder intends to advertise, plus `Md5` and `Sha1` whenever any
    /// supported version is below TLS 1.2 (spec.md §9: "md5_sha1 for versions
    /// below TLS 1.2").
    pub hasher_factories: BTreeMap<HashAlgorithm, HasherFactory>,
}

#[derive(Debug, Fail)]
pub enum ConfigError {
    #[fail(display = "min_minor ({}) must be <= max_minor ({})", min, max)]
    VersionRangeInverted { min: u8, max: u8 },

    #[fail(display = "no ciphersuites configured for any negotiable minor version")]
    NoCipherSuitesConfigured,

    #[fail(display = "a configured ciphersuite requires a server certificate, but no private key was provided")]
    PrivateKeyMissingForRsaSuite,

    #[fail(display = "authmode is Required but no CA chain was provided to validate client certificates against")]
    RequiredAuthWithoutCaChain,

    #[fail(display = "a configured ciphersuite needs PSK material, but none was provided")]
    PskMissingForPskSuite,

    #[fail(display = "a configured ciphersuite needs a DH group, but none was provided")]
    DhGroupMissingForDheSuite,

    #[fail(display = "missing a hasher factory for {:?}, required by an advertised signature hash or a pre-TLS-1.2 transcript digest", _0)]
    MissingHasherFactory(HashAlgorithm),

    #[fail(display = "no RNG was configured; ServerConfigBuilder::rng(...) is required")]
    RngRequired,

    #[fail(display = "no key schedule was configured; ServerConfigBuilder::key_schedule(...) is required")]
    KeyScheduleRequired,
}

pub struct ServerConfigBuilder {
    min_minor: ProtocolMinorVersion,
    max_minor: ProtocolMinorVersion,
    cipher_suites: BTreeMap<ProtocolMinorVersion, Vec<CipherSuiteId>>,
    compression: CompressionPolicy,
    dh_group: Option<DhGroup>,
    ec_groups: BTreeMap<NamedGroup, Arc<dyn KeyAgreement>>,
    private_key: Option<Arc<dyn RsaPrivateKey>>,
    certificate_chain: Vec<CertificateDer>,
    ca_chain: Vec<CertificateDer>,
    psk: Option<PskConfig>,
    authmode: AuthMode,
    legacy_renegotiation: LegacyRenegotiationPolicy,
    allow_sslv2_client_hello: bool,
    sni_callback: Option<Arc<dyn SniCallback>>,
    session_cache: Option<Arc<dyn SessionCache>>,
    rng: Option<Arc<dyn SecureRandom>>,
    key_schedule: Option<Arc<std::sync::Mutex<dyn KeySchedule>>>,
    hasher_factories: BTreeMap<HashAlgorithm, HasherFactory>,
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            min_minor: SSL3_MINOR,
            max_minor: TLS1_2_MINOR,
            cipher_suites: BTreeMap::new(),
            compression: CompressionPolicy::NullOnly,
            dh_group: None,
            ec_groups: BTreeMap::new(),
            private_key: None,
            certificate_chain: vec![],
            ca_chain: vec![],
            psk: None,
            authmode: AuthMode::None,
            legacy_renegotiation: LegacyRenegotiationPolicy::AllowLegacy,
            allow_sslv2_client_hello: false,
            sni_callback: None,
            session_cache: None,
            rng: None,
            key_schedule: None,
            hasher_factories: BTreeMap::new(),
        }
    }
}

impl ServerConfigBuilder {
    pub fn min_minor(mut self, v: ProtocolMinorVersion) -> Self {
        self.min_minor = v;
        self
    }

    pub fn max_minor(mut self, v: ProtocolMinorVersion) -> Self {
        self.max_minor = v;
        self
    }

    pub fn cipher_suites(mut self, minor: ProtocolMinorVersion, suites: Vec<CipherSuiteId>) -> Self {
        self.cipher_suites.insert(minor, suites);
        self
    }

    pub fn compression(mut self, policy: CompressionPolicy) -> Self {
        self.compression = policy;
        self
    }

    pub fn dh_group(mut self, group: DhGroup) -> Self {
        self.dh_group = Some(group);
        self
    }

    pub fn ec_group(mut self, group: NamedGroup, agreement: Arc<dyn KeyAgreement>) -> Self {
        self.ec_groups.insert(group, agreement);
        self
    }

    pub fn private_key(mut self, key: Arc<dyn RsaPrivateKey>) -> Self {
        self.private_key = Some(key);
        self
    }

    pub fn certificate_chain(mut self, chain: Vec<CertificateDer>) -> Self {
        self.certificate_chain = chain;
        self
    }

    pub fn ca_chain(mut self, chain: Vec<CertificateDer>) -> Self {
        self.ca_chain = chain;
        self
    }

    pub fn psk(mut self, psk: PskConfig) -> Self {
        self.psk = Some(psk);
        self
    }

    pub fn authmode(mut self, mode: AuthMode) -> Self {
        self.authmode = mode;
        self
    }

    pub fn legacy_renegotiation(mut self, policy: LegacyRenegotiationPolicy) -> Self {
        self.legacy_renegotiation = policy;
        self
    }

    pub fn allow_sslv2_client_hello(mut self, allow: bool) -> Self {
        self.allow_sslv2_client_hello = allow;
        self
    }

    pub fn sni_callback(mut self, cb: Arc<dyn SniCallback>) -> Self {
        self.sni_callback = Some(cb);
        self
    }

    pub fn session_cache(mut self, cache: Arc<dyn SessionCache>) -> Self {
        self.session_cache = Some(cache);
        self
    }

    pub fn rng(mut self, rng: Arc<dyn SecureRandom>) -> Self {
        self.rng = Some(rng);
        self
    }

    pub fn key_schedule(mut self, ks: Arc<std::sync::Mutex<dyn KeySchedule>>) -> Self {
        self.key_schedule = Some(ks);
        self
    }

    pub fn hasher_factory(mut self, alg: HashAlgorithm, factory: HasherFactory) -> Self {
        self.hasher_factories.insert(alg, factory);
        self
    }

    /// Validates the accumulated configuration and produces an immutable
    /// `ServerConfig`, or the first `ConfigError` found (SPEC_FULL.md §9 /
    /// testable property 9): an impossible configuration is rejected here, at
    /// construction time, rather than discovered mid-handshake.
    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        if self.min_minor > self.max_minor {
            return Err(ConfigError::VersionRangeInverted {
                min: self.min_minor,
                max: self.max_minor,
            });
        }

        let all_suites: Vec<CipherSuiteId> = self
            .cipher_suites
            .values()
            .flatten()
            .copied()
            .collect();
        if all_suites.is_empty() {
            return Err(ConfigError::NoCipherSuitesConfigured);
        }

        let mut needs_certificate = false;
        let mut needs_dh = false;
        let mut needs_psk = false;
        for id in &all_suites {
            if let Some(info) = crate::cipher_suite::lookup(*id) {
                if info.key_exchange.uses_server_certificate() {
                    needs_certificate = true;
                }
                if matches!(
                    info.key_exchange,
                    crate::cipher_suite::KeyExchangeFamily::DheRsa
                        | crate::cipher_suite::KeyExchangeFamily::DhePsk
                ) {
                    needs_dh = true;
                }
                if matches!(
                    info.key_exchange,
                    crate::cipher_suite::KeyExchangeFamily::Psk | crate::cipher_suite::KeyExchangeFamily::DhePsk
                ) {
                    needs_psk = true;
                }
            }
        }

        if needs_certificate && self.private_key.is_none() {
            return Err(ConfigError::PrivateKeyMissingForRsaSuite);
        }
        if needs_dh && self.dh_group.is_none() {
            return Err(ConfigError::DhGroupMissingForDheSuite);
        }
        if needs_psk && self.psk.is_none() {
            return Err(ConfigError::PskMissingForPskSuite);
        }
        if self.authmode == AuthMode::Required && self.ca_chain.is_empty() {
            return Err(ConfigError::RequiredAuthWithoutCaChain);
        }

        if self.min_minor < TLS1_2_MINOR {
            for alg in [HashAlgorithm::Md5, HashAlgorithm::Sha1] {
                if !self.hasher_factories.contains_key(&alg) {
                    return Err(ConfigError::MissingHasherFactory(alg));
                }
            }
        }
        for alg in crate::extensions::SIG_HASH_PREFERENCE {
            if self.max_minor >= TLS1_2_MINOR
                && needs_certificate
                && !self.hasher_factories.contains_key(&alg)
                && alg == HashAlgorithm::Sha256
            {
                // SHA256 must always be available once TLS 1.2 + certificates are in
                // play: it is the fallback `verify_sig_alg` (spec.md §4.D).
                return Err(ConfigError::MissingHasherFactory(alg));
            }
        }

        let rng = self.rng.ok_or(ConfigError::RngRequired)?;
        let key_schedule = self.key_schedule.ok_or(ConfigError::KeyScheduleRequired)?;

        Ok(ServerConfig {
            min_minor: self.min_minor,
            max_minor: self.max_minor,
            cipher_suites: self.cipher_suites,
            compression: self.compression,
            dh_group: self.dh_group,
            ec_groups: self.ec_groups,
            private_key: self.private_key,
            certificate_chain: self.certificate_chain,
            ca_chain: self.ca_chain,
            psk: self.psk,
            authmode: self.authmode,
            legacy_renegotiation: self.legacy_renegotiation,
            allow_sslv2_client_hello: self.allow_sslv2_client_hello,
            sni_callback: self.sni_callback,
            session_cache: self.session_cache,
            rng,
            key_schedule,
            hasher_factories: self.hasher_factories,
        })
    }
}
