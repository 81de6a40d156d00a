//! Common handshake-message framing: the `HandshakeType` tag and the 4-byte
//! `msg_type || u24(length)` envelope every handshake message is wrapped in on the
//! wire (RFC 5246 §7.4), plus the protocol-version constants used throughout
//! negotiation.

use crate::error::{HandshakeError, Result};
use crate::reader::Reader;

tls_enum_u8!(HandshakeType => {
    HelloRequest(0),
    ClientHello(1),
    ServerHello(2),
    Certificate(11),
    ServerKeyExchange(12),
    CertificateRequest(13),
    ServerHelloDone(14),
    CertificateVerify(15),
    ClientKeyExchange(16),
    Finished(20),
    (255)
});

/// `major` is always `3` for every version this engine negotiates (SSLv3 through TLS
/// 1.2 all keep `ProtocolVersion.major == 3`); `minor` is `0` for SSLv3 up through
/// `3` for TLS 1.2. Spec.md §3 calls these "chosen major/minor version".
pub type ProtocolMinorVersion = u8;

pub const SSL3_MINOR: ProtocolMinorVersion = 0;
pub const TLS1_0_MINOR: ProtocolMinorVersion = 1;
pub const TLS1_1_MINOR: ProtocolMinorVersion = 2;
pub const TLS1_2_MINOR: ProtocolMinorVersion = 3;

pub const RECORD_MAJOR_VERSION: u8 = 3;

/// The minimal envelope every handshake message is wrapped in: a 1-byte
/// `HandshakeType` followed by a 24-bit length. `body` is exactly that many bytes.
pub struct HandshakeEnvelope<'a> {
    pub msg_type: HandshakeType,
    pub body: &'a [u8],
}

impl<'a> HandshakeEnvelope<'a> {
    /// Parses the envelope from a buffer that contains exactly one handshake message
    /// (the record layer is responsible for defragmenting handshake messages that
    /// spanned multiple records before handing them to this engine).
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let msg_type = HandshakeType::read(&mut r)?;
        let body = r.vector_u24(0, crate::reader::U24_LIMIT)?;
        if !r.is_empty() {
            return Err(HandshakeError::bad_client_hello("trailing bytes after handshake message"));
        }
        Ok(Self { msg_type, body })
    }

    /// Writes the envelope for a message whose body has already been serialized.
    pub fn write(msg_type: HandshakeType, body: &[u8], out: &mut Vec<u8>) {
        msg_type.write(out);
        crate::reader::write_vector_u24(out, |out| out.extend_from_slice(body));
    }
}
