//! TLS alert wire types (RFC 5246 §7.2).
//!
//! The record layer is an external collaborator (spec.md §6) responsible for actually
//! framing and sending alerts; this module only defines the wire-level vocabulary the
//! engine uses to tell that collaborator *which* alert to send.

use crate::error::{HandshakeError, Result};
use crate::reader::Reader;

tls_enum_u8!(AlertLevel => {
    Warning(1), Fatal(2), (255)
});

tls_enum_u8!(AlertDescription => {
    CloseNotify(0),
    UnexpectedMessage(10),
    BadRecordMac(20),
    RecordOverflow(22),
    HandshakeFailure(40),
    BadCertificate(42),
    UnsupportedCertificate(43),
    CertificateRevoked(44),
    CertificateExpired(45),
    CertificateUnknown(46),
    IllegalParameter(47),
    UnknownCa(48),
    AccessDenied(49),
    DecodeError(50),
    DecryptError(51),
    ProtocolVersion(70),
    InsufficientSecurity(71),
    InternalError(80),
    InappropriateFallback(86),
    UserCanceled(90),
    MissingExtension(109),
    UnsupportedExtension(110),
    UnrecognizedName(112),
    (255)
});
