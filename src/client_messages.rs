//! Parsers for the client's responses (spec.md §4.E): ClientKeyExchange (one
//! shape per key-exchange family) and CertificateVerify.

use std::collections::BTreeMap;

use crate::cipher_suite::KeyExchangeFamily;
use crate::collaborators::{RsaPrivateKey, SecureRandom};
use crate::config::PskConfig;
use crate::dh::KeyAgreement;
use crate::error::{HandshakeError, Result};
use crate::extensions::{HashAlgorithm, SignatureAlgorithm};
use crate::handshake::{ProtocolMinorVersion, SSL3_MINOR, TLS1_2_MINOR};
use crate::hasher::HasherFactory;
use crate::reader::{Reader, U16_LIMIT};
use crate::transcript::Transcript;

/// Parses ClientKeyExchange and returns the premaster secret (spec.md §4.E).
/// `body` is the handshake message body with the envelope already stripped
/// and its `msg_type` already checked to be ClientKeyExchange by the caller.
///
/// For the RSA family this function implements the Bleichenbacher
/// countermeasure directly: wrong length, a decrypt error, or a bad PMS
/// version are all folded into "substitute 48 random bytes and return `Ok`"
/// rather than propagated as an error, so the failure is only observable later
/// at the Finished MAC (spec.md §4.E, §7). A genuinely malformed message (the
/// declared length overruns the buffer, or trailing bytes remain) is still a
/// framing error, since there is no ciphertext to even attempt decrypting.
///
/// `minor` is the negotiated minor version: spec.md §4.E's `(16-bit length,
/// EncryptedPMS)` framing applies "for TLS ≥ 1.0" only. SSLv3's RSA
/// ClientKeyExchange has no length prefix -- the whole body is the ciphertext.
#[allow(clippy::too_many_arguments)]
pub fn parse_client_key_exchange(
    body: &[u8],
    family: KeyExchangeFamily,
    minor: ProtocolMinorVersion,
    client_max_version: (u8, ProtocolMinorVersion),
    rsa_private_key: Option<&dyn RsaPrivateKey>,
    dh_agreement: Option<(&dyn KeyAgreement, &[u8])>,
    ec_agreement: Option<(&dyn KeyAgreement, &[u8])>,
    dhm_len: usize,
    ec_max_point_len: usize,
    psk: Option<&PskConfig>,
    rng: &dyn SecureRandom,
) -> Result<Vec<u8>> {
    let mut r = Reader::new(body);

    match family {
        KeyExchangeFamily::Rsa => {
            let private_key = rsa_private_key.ok_or(HandshakeError::PrivateKeyRequired)?;
            let ciphertext = if minor == SSL3_MINOR {
                r.take_rest()
            } else {
                let enc_len = r.u16()? as usize;
                r.take(enc_len).map_err(|_| HandshakeError::BadClientKeyExchange {
                    reason: "declared EncryptedPMS length overruns the message",
                })?
            };
            if !r.is_empty() {
                return Err(HandshakeError::BadClientKeyExchange {
                    reason: "trailing bytes after EncryptedPMS",
                });
            }

            let mut premaster = vec![0u8; 48];
            let length_ok = ciphertext.len() == private_key.modulus_len();
            let decrypted = if length_ok {
                private_key.decrypt_pkcs1v15(ciphertext).ok()
            } else {
                None
            };
            let valid = match &decrypted {
                Some(pms) => {
                    pms.len() == 48 && pms[0] == client_max_version.0 && pms[1] == client_max_version.1
                }
                None => false,
            };
            if valid {
                premaster.copy_from_slice(decrypted.as_ref().unwrap());
            } else {
                rng.fill(&mut premaster);
            }
            Ok(premaster)
        }

        KeyExchangeFamily::DheRsa => {
            let gy = r.vector_u16(1, dhm_len)?;
            if !r.is_empty() {
                return Err(HandshakeError::BadClientKeyExchange {
                    reason: "trailing bytes after client DH public value",
                });
            }
            let (agreement, secret) = dh_agreement.ok_or(HandshakeError::FeatureUnavailable {
                feature: "DHE-RSA without a configured DH group",
            })?;
            agreement
                .shared_secret(secret, gy)
                .map_err(|_| HandshakeError::BadClientKeyExchangeReadPublic)
        }

        KeyExchangeFamily::EcdheRsa => {
            let point = r.vector_u8(1, ec_max_point_len)?;
            if !r.is_empty() {
                return Err(HandshakeError::BadClientKeyExchange {
                    reason: "trailing bytes after client ECDH public value",
                });
            }
            let (agreement, secret) = ec_agreement.ok_or(HandshakeError::FeatureUnavailable {
                feature: "ECDHE-RSA without a negotiated curve",
            })?;
            agreement
                .shared_secret(secret, point)
                .map_err(|_| HandshakeError::BadClientKeyExchangeReadPublic)
        }

        KeyExchangeFamily::Psk => {
            let identity = r.vector_u16(0, U16_LIMIT)?;
            if !r.is_empty() {
                return Err(HandshakeError::BadClientKeyExchange {
                    reason: "trailing bytes after PSK identity",
                });
            }
            let psk = psk.ok_or(HandshakeError::FeatureUnavailable { feature: "PSK not configured" })?;
            if identity != psk.identity.as_slice() {
                return Err(HandshakeError::BadClientKeyExchange { reason: "unknown PSK identity" });
            }
            Ok(build_psk_premaster(&vec![0u8; psk.key.len()], &psk.key))
        }

        KeyExchangeFamily::DhePsk => {
            let identity = r.vector_u16(0, U16_LIMIT)?;
            let psk = psk.ok_or(HandshakeError::FeatureUnavailable { feature: "PSK not configured" })?;
            if identity != psk.identity.as_slice() {
                return Err(HandshakeError::BadClientKeyExchange { reason: "unknown PSK identity" });
            }
            let gy = r.vector_u16(1, dhm_len)?;
            if !r.is_empty() {
                return Err(HandshakeError::BadClientKeyExchange {
                    reason: "trailing bytes after client DH public value",
                });
            }
            let (agreement, secret) = dh_agreement.ok_or(HandshakeError::FeatureUnavailable {
                feature: "DHE-PSK without a configured DH group",
            })?;
            let z = agreement
                .shared_secret(secret, gy)
                .map_err(|_| HandshakeError::BadClientKeyExchangeReadPublic)?;
            Ok(build_psk_premaster(&z, &psk.key))
        }
    }
}

/// `premaster = u16(|other|) || other || u16(|psk|) || psk` (spec.md §4.E),
/// shared by plain PSK (`other` is `psk.len()` zero bytes) and DHE-PSK
/// (`other` is the DH shared secret `Z`).
fn build_psk_premaster(other: &[u8], psk: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + other.len() + psk.len());
    out.extend_from_slice(&(other.len() as u16).to_be_bytes());
    out.extend_from_slice(other);
    out.extend_from_slice(&(psk.len() as u16).to_be_bytes());
    out.extend_from_slice(psk);
    out
}

/// Parses and verifies CertificateVerify (spec.md §4.E). Callers must not
/// invoke this for PSK/DHE-PSK families or when the peer sent no certificate.
#[allow(clippy::too_many_arguments)]
pub fn parse_certificate_verify(
    body: &[u8],
    minor: ProtocolMinorVersion,
    requested_verify_sig_alg: HashAlgorithm,
    peer_public_key_der: &[u8],
    transcript: &Transcript,
    hasher_factories: &BTreeMap<HashAlgorithm, HasherFactory>,
    rsa: &dyn RsaPrivateKey,
) -> Result<()> {
    let mut r = Reader::new(body);

    let digest = if minor >= TLS1_2_MINOR {
        let hash = HashAlgorithm::read(&mut r)?;
        let sig = SignatureAlgorithm::read(&mut r)?;
        if hash != requested_verify_sig_alg || sig != SignatureAlgorithm::Rsa {
            return Err(HandshakeError::BadCertificateVerify {
                reason: "signature_algorithm does not match what CertificateRequest advertised",
            });
        }
        let factory = hasher_factories
            .get(&hash)
            .ok_or(HandshakeError::FeatureUnavailable { feature: "verify hash" })?;
        transcript.hash(factory)
    } else {
        let md5_factory = hasher_factories
            .get(&HashAlgorithm::Md5)
            .ok_or(HandshakeError::FeatureUnavailable { feature: "md5" })?;
        let sha1_factory = hasher_factories
            .get(&HashAlgorithm::Sha1)
            .ok_or(HandshakeError::FeatureUnavailable { feature: "sha1" })?;
        let mut digest = transcript.hash(md5_factory);
        digest.extend_from_slice(&transcript.hash(sha1_factory));
        digest
    };

    let sig = r.vector_u16(1, U16_LIMIT)?;
    if !r.is_empty() {
        return Err(HandshakeError::BadCertificateVerify { reason: "trailing bytes" });
    }

    // The signature's length is a function of the peer certificate's RSA
    // modulus, which this engine never inspects (certificate parsing is out
    // of scope); a wrong-length signature is simply a verification failure.
    rsa.verify_pkcs1v15(peer_public_key_der, &digest, sig)
        .map_err(|_| HandshakeError::BadCertificateVerify { reason: "signature verification failed" })
}
