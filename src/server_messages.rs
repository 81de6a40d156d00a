//! Server-to-client message builders (spec.md §4.D): ServerHello,
//! ServerKeyExchange, CertificateRequest, ServerHelloDone. Certificate itself is
//! out of scope (spec.md §1, §6 -- "Certificate chain parsing and emission" is
//! an external collaborator's job); this module only ever copies already-encoded
//! certificate bytes onto the wire for CertificateRequest's DN list.

use std::collections::BTreeMap;

use crate::cipher_suite::{CipherSuiteId, KeyExchangeFamily};
use crate::collaborators::RsaPrivateKey;
use crate::config::CertificateDer;
use crate::error::{HandshakeError, Result};
use crate::extensions::{ExtensionType, HashAlgorithm, NamedGroup, SignatureAlgorithm};
use crate::handshake::{HandshakeEnvelope, HandshakeType, ProtocolMinorVersion, TLS1_2_MINOR};
use crate::hasher::HasherFactory;
use crate::reader::{write_vector_u16, write_vector_u8};
use crate::session::{CompressionMethod, SecureRenegotiation};

/// RFC 4492 §5.4 `ECCurveType::named_curve`.
const EC_CURVE_TYPE_NAMED_CURVE: u8 = 3;
/// TLS cert_type `rsa_sign` (RFC 5246 §7.4.4).
const CERT_TYPE_RSA_SIGN: u8 = 1;
/// CertificateRequest's DN list is capped at this many aggregate bytes
/// (spec.md §4.D: "stopping when the aggregate output would exceed 4096 bytes").
const MAX_DN_LIST_BYTES: usize = 4096;

/// Builds the complete ServerHello handshake message (envelope included).
///
/// `prior_verify_data` is `Some((client_verify_data, server_verify_data))` when
/// a `renegotiation_info` extension must echo a prior handshake's Finished
/// values (RFC 5746 §3.7's ordering: client data first), or `None` on an
/// initial handshake -- which still emits the extension with an empty body
/// when `secure_renegotiation` is `Secure` (spec.md §4.D: the general
/// `5 + 2*verify_data_len` formula degenerates to `verify_data_len = 0`).
pub fn build_server_hello(
    minor: ProtocolMinorVersion,
    server_random: &[u8; 32],
    session_id: &[u8],
    cipher_suite: CipherSuiteId,
    compression: CompressionMethod,
    secure_renegotiation: SecureRenegotiation,
    prior_verify_data: Option<(&[u8], &[u8])>,
) -> Vec<u8> {
    let mut body = vec![];
    body.push(crate::handshake::RECORD_MAJOR_VERSION);
    body.push(minor);
    body.extend_from_slice(server_random);
    write_vector_u8(&mut body, |out| out.extend_from_slice(session_id));
    cipher_suite.write(&mut body);
    body.push(compression.to_u8());

    if secure_renegotiation == SecureRenegotiation::Secure {
        let mut extensions = vec![];
        ExtensionType::RenegotiationInfo.write(&mut extensions);
        write_vector_u16(&mut extensions, |ext_body| {
            write_vector_u8(ext_body, |data| {
                if let Some((client_verify, server_verify)) = prior_verify_data {
                    data.extend_from_slice(client_verify);
                    data.extend_from_slice(server_verify);
                }
            });
        });
        write_vector_u16(&mut body, |out| out.extend_from_slice(&extensions));
    }

    let mut envelope = vec![];
    HandshakeEnvelope::write(HandshakeType::ServerHello, &body, &mut envelope);
    envelope
}

/// The key-agreement parameters ServerKeyExchange carries, one shape per
/// family that sends this message (spec.md §4.D).
pub enum KeyExchangeParams<'a> {
    Dhe { p: &'a [u8], g: &'a [u8], ys: &'a [u8] },
    Ecdhe { curve: NamedGroup, point: &'a [u8] },
}

/// Builds ServerKeyExchange for DHE-RSA, ECDHE-RSA, or DHE-PSK (spec.md §4.D);
/// callers must not invoke this for families where
/// `KeyExchangeFamily::sends_server_key_exchange()` is false.
#[allow(clippy::too_many_arguments)]
pub fn build_server_key_exchange(
    family: KeyExchangeFamily,
    params: &KeyExchangeParams,
    minor: ProtocolMinorVersion,
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    sig_alg: Option<HashAlgorithm>,
    private_key: Option<&dyn RsaPrivateKey>,
    hasher_factories: &BTreeMap<HashAlgorithm, HasherFactory>,
) -> Result<Vec<u8>> {
    let mut body = vec![];

    if family == KeyExchangeFamily::DhePsk {
        // Empty PSK identity hint (spec.md §4.D: "prepend a 2-byte zero-length
        // identity hint").
        write_vector_u16(&mut body, |_| {});
    }

    match params {
        KeyExchangeParams::Dhe { p, g, ys } => {
            write_vector_u16(&mut body, |out| out.extend_from_slice(p));
            write_vector_u16(&mut body, |out| out.extend_from_slice(g));
            write_vector_u16(&mut body, |out| out.extend_from_slice(ys));
        }
        KeyExchangeParams::Ecdhe { curve, point } => {
            body.push(EC_CURVE_TYPE_NAMED_CURVE);
            curve.write(&mut body);
            write_vector_u8(&mut body, |out| out.extend_from_slice(point));
        }
    }

    let needs_signature = matches!(family, KeyExchangeFamily::DheRsa | KeyExchangeFamily::EcdheRsa);
    if needs_signature {
        let private_key = private_key.ok_or(HandshakeError::PrivateKeyRequired)?;
        let digest = signature_digest(minor, client_random, server_random, &body, sig_alg, hasher_factories)?;
        let signature = private_key.sign_pkcs1v15(&digest)?;

        if minor >= TLS1_2_MINOR {
            let alg = sig_alg.ok_or_else(|| {
                HandshakeError::bad_client_hello("no signature hash negotiated for TLS 1.2 ServerKeyExchange")
            })?;
            alg.write(&mut body);
            SignatureAlgorithm::Rsa.write(&mut body);
        }
        write_vector_u16(&mut body, |out| out.extend_from_slice(&signature));
    }

    let mut envelope = vec![];
    HandshakeEnvelope::write(HandshakeType::ServerKeyExchange, &body, &mut envelope);
    Ok(envelope)
}

/// Computes the digest ServerKeyExchange's (and, by the same construction,
/// CertificateVerify's) RSA signature covers: the fixed 36-byte MD5||SHA1
/// concatenation below TLS 1.2, or the single negotiated hash at TLS 1.2
/// (spec.md §4.D).
fn signature_digest(
    minor: ProtocolMinorVersion,
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    params: &[u8],
    sig_alg: Option<HashAlgorithm>,
    hasher_factories: &BTreeMap<HashAlgorithm, HasherFactory>,
) -> Result<Vec<u8>> {
    if minor >= TLS1_2_MINOR {
        let alg = sig_alg
            .ok_or_else(|| HandshakeError::bad_client_hello("no signature hash negotiated"))?;
        let factory = hasher_factories
            .get(&alg)
            .ok_or(HandshakeError::FeatureUnavailable { feature: "signature hash" })?;
        let mut hasher = factory();
        hasher.update(client_random);
        hasher.update(server_random);
        hasher.update(params);
        Ok(hasher.finish())
    } else {
        let md5_factory = hasher_factories
            .get(&HashAlgorithm::Md5)
            .ok_or(HandshakeError::FeatureUnavailable { feature: "md5" })?;
        let sha1_factory = hasher_factories
            .get(&HashAlgorithm::Sha1)
            .ok_or(HandshakeError::FeatureUnavailable { feature: "sha1" })?;

        let mut md5 = md5_factory();
        md5.update(client_random);
        md5.update(server_random);
        md5.update(params);

        let mut sha1 = sha1_factory();
        sha1.update(client_random);
        sha1.update(server_random);
        sha1.update(params);

        let mut digest = md5.finish();
        digest.extend_from_slice(&sha1.finish());
        Ok(digest)
    }
}

/// Builds CertificateRequest (spec.md §4.D). Callers must not invoke this when
/// the key-exchange family is PSK/DHE-PSK or `authmode == AuthMode::None`.
pub fn build_certificate_request(
    minor: ProtocolMinorVersion,
    ca_chain: &[CertificateDer],
    verify_sig_alg: HashAlgorithm,
) -> Vec<u8> {
    let mut body = vec![];
    write_vector_u8(&mut body, |out| out.push(CERT_TYPE_RSA_SIGN));

    if minor >= TLS1_2_MINOR {
        write_vector_u16(&mut body, |out| {
            verify_sig_alg.write(out);
            SignatureAlgorithm::Rsa.write(out);
        });
    }

    let mut dn_list = vec![];
    for dn in ca_chain {
        let mut entry = vec![];
        write_vector_u16(&mut entry, |out| out.extend_from_slice(dn));
        if dn_list.len() + entry.len() > MAX_DN_LIST_BYTES {
            break;
        }
        dn_list.extend_from_slice(&entry);
    }
    write_vector_u16(&mut body, |out| out.extend_from_slice(&dn_list));

    let mut envelope = vec![];
    HandshakeEnvelope::write(HandshakeType::CertificateRequest, &body, &mut envelope);
    envelope
}

/// ServerHelloDone has an empty handshake body (spec.md §4.D).
pub fn build_server_hello_done() -> Vec<u8> {
    let mut envelope = vec![];
    HandshakeEnvelope::write(HandshakeType::ServerHelloDone, &[], &mut envelope);
    envelope
}
