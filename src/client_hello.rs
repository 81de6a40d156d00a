//! ClientHello parsing and ciphersuite negotiation (spec.md §4.C), including the
//! legacy SSLv2-compatible shape and the renegotiation policy table (§4.G).
//!
//! The two shapes are disambiguated by the high bit of the very first byte the
//! peer sends (spec.md §4.C), before any record-layer framing has been
//! negotiated -- this is why parsing here reads raw bytes via
//! `RecordLayer::fetch_raw` rather than `RecordLayer::read_handshake_message`,
//! which is only meaningful once a record version is established.

use crate::cipher_suite::{self, CipherSuiteId, KeyExchangeFamily};
use crate::collaborators::RecordLayer;
use crate::config::{LegacyRenegotiationPolicy, ServerConfig};
use crate::error::{HandshakeError, Result};
use crate::extensions::{self, EcPointFormat, ExtensionType, HashAlgorithm, NamedGroup};
use crate::handshake::{HandshakeEnvelope, HandshakeType, ProtocolMinorVersion};
use crate::reader::{Reader, U16_LIMIT};
use crate::session::{CompressionMethod, SecureRenegotiation};

const SCSV: u16 = 0x00FF;

/// Everything the rest of the driver needs out of a successfully parsed
/// ClientHello, independent of which of the two wire shapes produced it.
pub struct ClientHelloOutcome {
    pub minor: ProtocolMinorVersion,
    pub client_random: [u8; 32],
    pub client_max_version: (u8, ProtocolMinorVersion),
    pub session_id: Vec<u8>,
    pub cipher_suite: CipherSuiteId,
    pub compression: CompressionMethod,
    pub secure_renegotiation: SecureRenegotiation,
    pub ec_curve: Option<NamedGroup>,
    pub ec_point_format: Option<EcPointFormat>,
    pub sig_alg: Option<HashAlgorithm>,
}

/// Attempts to read and parse the next ClientHello. Returns `Ok(None)` if the
/// record layer does not yet have enough bytes buffered (spec.md §5:
/// "preserves all state and expects re-entry"); the driver should call again
/// once the transport is ready.
pub fn read_client_hello(
    record_layer: &mut dyn RecordLayer,
    config: &ServerConfig,
    is_renegotiation: bool,
    established_secure: SecureRenegotiation,
    prior_verify_data: Option<(&[u8], &[u8])>,
) -> Result<Option<(Vec<u8>, ClientHelloOutcome)>> {
    let header = match record_layer.fetch_raw(5)? {
        Some(b) => b,
        None => return Ok(None),
    };

    if header[0] & 0x80 != 0 {
        if !config.allow_sslv2_client_hello || is_renegotiation {
            return Err(HandshakeError::bad_client_hello(
                "legacy SSLv2 ClientHello not accepted here",
            ));
        }
        return read_legacy_client_hello(record_layer, config, &header);
    }

    read_modern_client_hello(
        record_layer,
        config,
        is_renegotiation,
        established_secure,
        prior_verify_data,
        &header,
    )
}

fn read_modern_client_hello(
    record_layer: &mut dyn RecordLayer,
    config: &ServerConfig,
    is_renegotiation: bool,
    established_secure: SecureRenegotiation,
    prior_verify_data: Option<(&[u8], &[u8])>,
    header: &[u8],
) -> Result<Option<(Vec<u8>, ClientHelloOutcome)>> {
    if header[0] != 22 || header[1] != crate::handshake::RECORD_MAJOR_VERSION {
        return Err(HandshakeError::bad_client_hello("not a ClientHello record"));
    }
    let n = u16::from_be_bytes([header[3], header[4]]) as usize;
    if n < 45 || n > 512 {
        return Err(HandshakeError::bad_client_hello("ClientHello record length out of range"));
    }

    let full = match record_layer.fetch_raw(5 + n)? {
        Some(b) => b,
        None => return Ok(None),
    };
    let record_body = &full[5..5 + n];

    let envelope = HandshakeEnvelope::parse(record_body)?;
    if envelope.msg_type != HandshakeType::ClientHello {
        return Err(HandshakeError::bad_client_hello("expected ClientHello"));
    }
    let message_bytes = record_body.to_vec();

    let mut r = Reader::new(envelope.body);
    let peer_major = r.u8()?;
    let peer_minor = r.u8()?;
    if peer_major != crate::handshake::RECORD_MAJOR_VERSION {
        return Err(HandshakeError::bad_client_hello("unsupported client_version major"));
    }

    let negotiated_minor = peer_minor.min(config.max_minor);
    if negotiated_minor < config.min_minor {
        return Err(HandshakeError::BadHsProtocolVersion);
    }

    let client_random_slice = r.take(32)?;
    let mut client_random = [0u8; 32];
    client_random.copy_from_slice(client_random_slice);

    let session_id = r.vector_u8(0, 32)?.to_vec();

    let cipher_list = r.vector_u16(2, 256)?;
    if cipher_list.len() % 2 != 0 {
        return Err(HandshakeError::bad_client_hello("odd-length cipher suite list"));
    }
    let mut scsv_seen = false;
    let mut client_suite_ids: Vec<u16> = Vec::with_capacity(cipher_list.len() / 2);
    {
        let mut cr = Reader::new(cipher_list);
        while !cr.is_empty() {
            let id = cr.u16()?;
            if id == SCSV {
                if is_renegotiation {
                    return Err(HandshakeError::bad_client_hello(
                        "SCSV must not be resent during renegotiation",
                    ));
                }
                scsv_seen = true;
            }
            client_suite_ids.push(id);
        }
    }

    let compression_offers = r.vector_u8(1, 16)?.to_vec();
    let compression = if config.compression == crate::config::CompressionPolicy::AllowDeflate
        && compression_offers.contains(&1)
    {
        CompressionMethod::Deflate
    } else {
        CompressionMethod::Null
    };

    let mut sni_host_name: Option<Vec<u8>> = None;
    let mut sig_alg: Option<HashAlgorithm> = None;
    let mut ec_curve: Option<NamedGroup> = None;
    let mut ec_point_format: Option<EcPointFormat> = None;
    let mut renegotiation_info_seen = false;

    if !r.is_empty() {
        let ext_block = r.vector_u16(0, U16_LIMIT)?;
        let mut er = Reader::new(ext_block);
        while !er.is_empty() {
            let ext_type = ExtensionType::read(&mut er)?;
            let body = er.vector_u16(0, U16_LIMIT)?;
            match ext_type {
                ExtensionType::ServerName => {
                    sni_host_name = extensions::parse_server_name(body)?.map(|b| b.to_vec());
                }
                ExtensionType::RenegotiationInfo => {
                    let peer_data = if is_renegotiation {
                        Some(
                            prior_verify_data
                                .ok_or_else(|| {
                                    HandshakeError::bad_client_hello("renegotiation with no prior verify_data")
                                })?
                                .0,
                        )
                    } else {
                        None
                    };
                    extensions::parse_renegotiation_info(body, peer_data)?;
                    renegotiation_info_seen = true;
                }
                ExtensionType::SignatureAlgorithms => {
                    sig_alg = extensions::parse_signature_algorithms(body)?;
                }
                ExtensionType::SupportedGroups => {
                    ec_curve = extensions::parse_supported_groups(body)?;
                }
                ExtensionType::EcPointFormats => {
                    ec_point_format = extensions::parse_ec_point_formats(body)?;
                }
                ExtensionType::Unknown(_) => {}
            }
        }
    }
    if !r.is_empty() {
        return Err(HandshakeError::bad_client_hello("trailing bytes after ClientHello"));
    }

    if let Some(host_name) = sni_host_name.as_deref() {
        if let Some(cb) = &config.sni_callback {
            if !cb.accept(host_name) {
                return Err(HandshakeError::bad_client_hello_with_alert(
                    "SNI callback rejected the requested server name",
                    crate::alert::AlertDescription::UnrecognizedName,
                ));
            }
        }
    }

    let info_seen = scsv_seen || renegotiation_info_seen;
    let secure_renegotiation =
        apply_renegotiation_policy(is_renegotiation, established_secure, config.legacy_renegotiation, info_seen)?;

    let cipher_suite = select_cipher_suite(config, negotiated_minor, &client_suite_ids, ec_curve.is_some())?;

    Ok(Some((
        message_bytes,
        ClientHelloOutcome {
            minor: negotiated_minor,
            client_random,
            client_max_version: (peer_major, peer_minor),
            session_id,
            cipher_suite,
            compression,
            secure_renegotiation,
            ec_curve,
            ec_point_format,
            sig_alg,
        },
    )))
}

fn read_legacy_client_hello(
    record_layer: &mut dyn RecordLayer,
    config: &ServerConfig,
    header: &[u8],
) -> Result<Option<(Vec<u8>, ClientHelloOutcome)>> {
    let n = (((header[0] & 0x7f) as usize) << 8) | header[1] as usize;
    if n < 17 || n > 512 {
        return Err(HandshakeError::bad_client_hello("legacy ClientHello length out of range"));
    }

    let full = match record_layer.fetch_raw(2 + n)? {
        Some(b) => b,
        None => return Ok(None),
    };
    let body = &full[2..2 + n];
    let message_bytes = body.to_vec();

    let mut r = Reader::new(body);
    let msg_type = r.u8()?;
    if msg_type != HandshakeType::ClientHello.to_u8() {
        return Err(HandshakeError::bad_client_hello("expected legacy ClientHello"));
    }
    let peer_major = r.u8()?;
    let peer_minor = r.u8()?;
    if peer_major != crate::handshake::RECORD_MAJOR_VERSION {
        return Err(HandshakeError::bad_client_hello("unsupported client_version major"));
    }

    let negotiated_minor = peer_minor.min(config.max_minor);
    if negotiated_minor < config.min_minor {
        return Err(HandshakeError::BadHsProtocolVersion);
    }

    let cipher_len = r.u16()? as usize;
    let session_len = r.u16()? as usize;
    let challenge_len = r.u16()? as usize;

    let ciphers = r.take(cipher_len)?;
    let session_id = r.take(session_len)?.to_vec();
    let challenge = r.take(challenge_len)?;
    if !r.is_empty() {
        return Err(HandshakeError::bad_client_hello("trailing bytes after legacy ClientHello"));
    }

    if cipher_len == 0 || cipher_len % 3 != 0 {
        return Err(HandshakeError::bad_client_hello("legacy cipher suite list not a multiple of 3"));
    }
    if session_len > 32 {
        return Err(HandshakeError::bad_client_hello("legacy session id too long"));
    }
    if challenge_len < 8 || challenge_len > 32 {
        return Err(HandshakeError::bad_client_hello("legacy challenge out of range"));
    }

    let mut client_random = [0u8; 32];
    client_random[32 - challenge_len..].copy_from_slice(challenge);

    let mut scsv_seen = false;
    let mut client_suite_ids: Vec<u16> = Vec::with_capacity(cipher_len / 3);
    for entry in ciphers.chunks_exact(3) {
        if entry == [0, 0, 0xFF] {
            scsv_seen = true;
        }
        if entry[0] == 0 {
            client_suite_ids.push(u16::from_be_bytes([entry[1], entry[2]]));
        }
        // Entries with a non-zero first byte are SSLv2-only ciphers this
        // engine never negotiates; they are retained in no list and simply
        // cannot be selected below.
    }

    let secure_renegotiation = if scsv_seen {
        SecureRenegotiation::Secure
    } else {
        SecureRenegotiation::Insecure
    };

    let cipher_suite = select_cipher_suite(config, negotiated_minor, &client_suite_ids, false)?;

    Ok(Some((
        message_bytes,
        ClientHelloOutcome {
            minor: negotiated_minor,
            client_random,
            client_max_version: (peer_major, peer_minor),
            session_id,
            cipher_suite,
            compression: CompressionMethod::Null,
            secure_renegotiation,
            ec_curve: None,
            ec_point_format: None,
            sig_alg: None,
        },
    )))
}

/// Realises spec.md §4.G's renegotiation-policy table exactly.
pub fn apply_renegotiation_policy(
    is_renegotiation: bool,
    established_secure: SecureRenegotiation,
    legacy_policy: LegacyRenegotiationPolicy,
    info_seen: bool,
) -> Result<SecureRenegotiation> {
    if !is_renegotiation {
        if !info_seen && legacy_policy == LegacyRenegotiationPolicy::BreakHandshake {
            return Err(HandshakeError::bad_client_hello(
                "legacy renegotiation peer rejected by policy",
            ));
        }
        return Ok(if info_seen {
            SecureRenegotiation::Secure
        } else {
            SecureRenegotiation::Insecure
        });
    }

    match (established_secure, info_seen) {
        (SecureRenegotiation::Secure, false) => Err(HandshakeError::bad_client_hello(
            "secure renegotiation downgrade attempt",
        )),
        (SecureRenegotiation::Insecure, true) => Err(HandshakeError::bad_client_hello(
            "illegal renegotiation_info on a previously legacy connection",
        )),
        (SecureRenegotiation::Insecure, false) => {
            if legacy_policy == LegacyRenegotiationPolicy::NoRenegotiation
                || legacy_policy == LegacyRenegotiationPolicy::BreakHandshake
            {
                Err(HandshakeError::bad_client_hello(
                    "legacy renegotiation rejected by policy",
                ))
            } else {
                Ok(SecureRenegotiation::Insecure)
            }
        }
        (SecureRenegotiation::Secure, true) => Ok(SecureRenegotiation::Secure),
    }
}

/// spec.md §4.C step 9: server-preference-ordered selection, honouring the
/// negotiated minor version's range and the EC-curve constraint.
fn select_cipher_suite(
    config: &ServerConfig,
    minor: ProtocolMinorVersion,
    client_suite_ids: &[u16],
    have_ec_curve: bool,
) -> Result<CipherSuiteId> {
    let preference = config
        .cipher_suites
        .get(&minor)
        .map(|v| v.as_slice())
        .unwrap_or(&[]);

    for candidate in preference {
        let info = match cipher_suite::lookup(*candidate) {
            Some(i) => i,
            None => continue,
        };
        if minor < info.min_minor || minor > info.max_minor {
            continue;
        }
        if info.key_exchange == KeyExchangeFamily::EcdheRsa && !have_ec_curve {
            continue;
        }
        if client_suite_ids.contains(&candidate.to_u16()) {
            return Ok(*candidate);
        }
    }

    Err(HandshakeError::NoCipherChosen)
}
