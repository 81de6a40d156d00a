//! ClientHello extension parsing (spec.md §4.B).
//!
//! Each function here operates on the already-length-validated `(extension_body)`
//! slice the ClientHello parser (`crate::client_hello`) hands it; none of them touch
//! the outer message framing. Unknown extension types are skipped by the caller
//! before any of these functions are reached.

use crate::error::{HandshakeError, Result};
use crate::reader::Reader;

tls_enum_u16!(ExtensionType => {
    ServerName(0),
    SupportedGroups(10),
    EcPointFormats(11),
    SignatureAlgorithms(13),
    RenegotiationInfo(0xff01),
    (0xffff)
});

tls_enum_u16!(NamedGroup => {
    Secp192r1(19),
    Secp224r1(21),
    Secp256r1(23),
    Secp384r1(24),
    Secp521r1(25),
    (0xffff)
});

tls_enum_u8!(EcPointFormat => {
    Uncompressed(0),
    AnsiX962CompressedPrime(1),
    AnsiX962CompressedChar2(2),
    (255)
});

tls_enum_u8!(HashAlgorithm => {
    None(0),
    Md5(1),
    Sha1(2),
    Sha224(3),
    Sha256(4),
    Sha384(5),
    Sha512(6),
    (255)
});

tls_enum_u8!(SignatureAlgorithm => {
    Anonymous(0),
    Rsa(1),
    Dsa(2),
    Ecdsa(3),
    (255)
});

const HOST_NAME: u8 = 0;

/// Order in which we'll accept an RSA signature hash, most preferred first
/// (spec.md §4.B: "the ordered preference {SHA512, SHA384, SHA256, SHA224, SHA1, MD5}").
pub const SIG_HASH_PREFERENCE: [HashAlgorithm; 6] = [
    HashAlgorithm::Sha512,
    HashAlgorithm::Sha384,
    HashAlgorithm::Sha256,
    HashAlgorithm::Sha224,
    HashAlgorithm::Sha1,
    HashAlgorithm::Md5,
];

/// Order in which a named group is selected when the client advertises several
/// (spec.md §4.B: "the fixed preference order {secp192r1, secp224r1, secp256r1,
/// secp384r1, secp521r1}").
pub const GROUP_PREFERENCE: [NamedGroup; 5] = [
    NamedGroup::Secp192r1,
    NamedGroup::Secp224r1,
    NamedGroup::Secp256r1,
    NamedGroup::Secp384r1,
    NamedGroup::Secp521r1,
];

/// Parses a `server_name` extension body and returns the first `host_name` entry's
/// raw bytes, if the name list contains one. Does not invoke the SNI callback; that
/// dispatch happens in `crate::client_hello` once the fatal-alert plumbing is in
/// scope.
pub fn parse_server_name<'a>(body: &'a [u8]) -> Result<Option<&'a [u8]>> {
    let mut r = Reader::new(body);
    let list = r.vector_u16(1, crate::reader::U16_LIMIT)?;
    let mut names = Reader::new(list);
    while !names.is_empty() {
        let typ = names.u8()?;
        let name = names.vector_u16(1, crate::reader::U16_LIMIT)?;
        if typ == HOST_NAME {
            return Ok(Some(name));
        }
        // Skip unknown name types; only the first host_name entry is meaningful.
    }
    Ok(None)
}

/// Parses a `renegotiation_info` extension body and validates it against the
/// renegotiation-signalling rules in spec.md §4.B.
///
/// `peer_verify_data` is `None` on an initial handshake (body must be a single zero
/// byte) and `Some(client's previous Finished verify_data)` during renegotiation
/// (body must equal `verify_data_len || client_verify_data`).
pub fn parse_renegotiation_info(body: &[u8], peer_verify_data: Option<&[u8]>) -> Result<()> {
    let mut r = Reader::new(body);
    let data = r.vector_u8(0, crate::reader::U8_LIMIT)?;
    if !r.is_empty() {
        return Err(HandshakeError::bad_client_hello("trailing data after renegotiation_info"));
    }

    match peer_verify_data {
        None => {
            if !data.is_empty() {
                return Err(HandshakeError::bad_client_hello(
                    "renegotiation_info must be empty on initial handshake",
                ));
            }
        }
        Some(expected) => {
            if data != expected {
                return Err(HandshakeError::bad_client_hello(
                    "renegotiation_info does not match prior verify_data",
                ));
            }
        }
    }
    Ok(())
}

/// Parses a `signature_algorithms` extension body and returns the first RSA hash
/// algorithm in `SIG_HASH_PREFERENCE` that the client advertised, if any.
pub fn parse_signature_algorithms(body: &[u8]) -> Result<Option<HashAlgorithm>> {
    let mut r = Reader::new(body);
    let list = r.vector_u16(2, crate::reader::U16_LIMIT)?;
    if list.len() % 2 != 0 {
        return Err(HandshakeError::bad_client_hello("odd-length signature_algorithms list"));
    }

    let mut pairs = Reader::new(list);
    let mut rsa_hashes = [false; 7]; // indexed by HashAlgorithm variant position below
    while !pairs.is_empty() {
        let hash = HashAlgorithm::read(&mut pairs)?;
        let sig = SignatureAlgorithm::read(&mut pairs)?;
        if sig == SignatureAlgorithm::Rsa {
            if let Some(idx) = hash_index(hash) {
                rsa_hashes[idx] = true;
            }
        }
    }

    for &pref in SIG_HASH_PREFERENCE.iter() {
        if let Some(idx) = hash_index(pref) {
            if rsa_hashes[idx] {
                return Ok(Some(pref));
            }
        }
    }
    Ok(None)
}

fn hash_index(h: HashAlgorithm) -> Option<usize> {
    match h {
        HashAlgorithm::Md5 => Some(0),
        HashAlgorithm::Sha1 => Some(1),
        HashAlgorithm::Sha224 => Some(2),
        HashAlgorithm::Sha256 => Some(3),
        HashAlgorithm::Sha384 => Some(4),
        HashAlgorithm::Sha512 => Some(5),
        HashAlgorithm::None | HashAlgorithm::Unknown(_) => None,
    }
}

/// Parses a `supported_groups` (née `elliptic_curves`) extension body and returns the
/// first group in `GROUP_PREFERENCE` the client advertised.
pub fn parse_supported_groups(body: &[u8]) -> Result<Option<NamedGroup>> {
    let mut r = Reader::new(body);
    let list = r.vector_u16(2, crate::reader::U16_LIMIT)?;
    if list.len() % 2 != 0 {
        return Err(HandshakeError::bad_client_hello("odd-length supported_groups list"));
    }

    let mut groups = Reader::new(list);
    let mut seen = [false; 5];
    while !groups.is_empty() {
        let group = NamedGroup::read(&mut groups)?;
        if let Some(idx) = GROUP_PREFERENCE.iter().position(|g| *g == group) {
            seen[idx] = true;
        }
    }

    Ok(GROUP_PREFERENCE.iter().copied().find(|g| {
        seen[GROUP_PREFERENCE.iter().position(|x| x == g).unwrap()]
    }))
}

/// Parses an `ec_point_formats` extension body and returns the first format, in the
/// client's own order, that this engine supports.
///
/// Per spec.md §9 DESIGN NOTES, this reads the 1-byte length at offset 0 and the data
/// starting at offset 1 -- the teacher's `ssl_parse_supported_point_formats` advanced
/// from `buf+2`, an off-by-one we deliberately do not reproduce.
pub fn parse_ec_point_formats(body: &[u8]) -> Result<Option<EcPointFormat>> {
    let mut r = Reader::new(body);
    let list = r.vector_u8(1, crate::reader::U8_LIMIT)?;
    let mut formats = Reader::new(list);
    while !formats.is_empty() {
        let fmt = EcPointFormat::read(&mut formats)?;
        match fmt {
            EcPointFormat::Uncompressed
            | EcPointFormat::AnsiX962CompressedPrime
            | EcPointFormat::AnsiX962CompressedChar2 => return Ok(Some(fmt)),
            EcPointFormat::Unknown(_) => continue,
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_name_extracts_first_host_name() {
        let mut body = vec![];
        crate::reader::write_vector_u16(&mut body, |list| {
            list.push(HOST_NAME);
            crate::reader::write_vector_u16(list, |name| name.extend_from_slice(b"example.com"));
        });
        assert_eq!(parse_server_name(&body).unwrap(), Some(&b"example.com"[..]));
    }

    #[test]
    fn renegotiation_info_initial_must_be_empty() {
        let mut body = vec![];
        crate::reader::write_vector_u8(&mut body, |_| {});
        assert!(parse_renegotiation_info(&body, None).is_ok());

        let mut bad = vec![];
        crate::reader::write_vector_u8(&mut bad, |v| v.push(1));
        assert!(parse_renegotiation_info(&bad, None).is_err());
    }

    #[test]
    fn renegotiation_info_must_match_prior_verify_data() {
        let prior = [1u8, 2, 3, 4];
        let mut body = vec![];
        crate::reader::write_vector_u8(&mut body, |v| v.extend_from_slice(&prior));
        assert!(parse_renegotiation_info(&body, Some(&prior)).is_ok());
        assert!(parse_renegotiation_info(&body, Some(&[9, 9, 9, 9])).is_err());
    }

    #[test]
    fn signature_algorithms_picks_highest_preference_rsa_hash() {
        let mut body = vec![];
        crate::reader::write_vector_u16(&mut body, |list| {
            HashAlgorithm::Sha1.write(list);
            SignatureAlgorithm::Rsa.write(list);
            HashAlgorithm::Sha256.write(list);
            SignatureAlgorithm::Rsa.write(list);
            HashAlgorithm::Sha512.write(list);
            SignatureAlgorithm::Ecdsa.write(list);
        });
        assert_eq!(parse_signature_algorithms(&body).unwrap(), Some(HashAlgorithm::Sha256));
    }

    #[test]
    fn supported_groups_follows_fixed_preference_not_client_order() {
        let mut body = vec![];
        crate::reader::write_vector_u16(&mut body, |list| {
            NamedGroup::Secp521r1.write(list);
            NamedGroup::Secp224r1.write(list);
        });
        assert_eq!(parse_supported_groups(&body).unwrap(), Some(NamedGroup::Secp224r1));
    }

    #[test]
    fn ec_point_formats_follows_client_order() {
        let mut body = vec![];
        crate::reader::write_vector_u8(&mut body, |list| {
            EcPointFormat::AnsiX962CompressedPrime.write(list);
            EcPointFormat::Uncompressed.write(list);
        });
        assert_eq!(
            parse_ec_point_formats(&body).unwrap(),
            Some(EcPointFormat::AnsiX962CompressedPrime)
        );
    }
}
