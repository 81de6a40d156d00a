//! The one-step handshake driver (spec.md §4.F): advances `state` through the
//! TLS flight ordering, dispatching to the parsers/builders in
//! `crate::client_hello`, `crate::server_messages`, and `crate::client_messages`,
//! and enforcing the single alert-sending point spec.md §7 requires.
//!
//! Certificate itself (`Certificate` handshake message) is out of scope as an
//! X.509 concern (spec.md §1), but framing it onto the wire is pure copying of
//! already-encoded bytes -- no different from `server_messages::build_certificate_request`'s
//! DN list -- so the two small helpers at the bottom of this file do exactly
//! that and nothing more.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::alert::AlertLevel;
use crate::cipher_suite::{self, KeyExchangeFamily, PrfHash};
use crate::client_hello;
use crate::client_messages;
use crate::collaborators::{CachedSession, RecordLayer};
use crate::config::{AuthMode, CertificateDer, ServerConfig};
use crate::dh::KeyAgreement;
use crate::error::{HandshakeError, Result};
use crate::extensions::{HashAlgorithm, NamedGroup};
use crate::handshake::{HandshakeEnvelope, HandshakeType, ProtocolMinorVersion, TLS1_2_MINOR};
use crate::hasher::HasherFactory;
use crate::reader::{write_vector_u24, Reader, U24_LIMIT};
use crate::server_messages::{self, KeyExchangeParams};
use crate::session::{EstablishedSession, HandshakeScratch, HandshakeSession, SecureRenegotiation};
use crate::transcript::Transcript;

/// spec.md §4.F's flight ordering, in the order a full (non-resumed,
/// non-abbreviated) handshake visits them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    HelloRequest,
    ClientHello,
    ServerHello,
    ServerCertificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    ClientCertificate,
    ClientKeyExchange,
    CertificateVerify,
    ClientChangeCipherSpec,
    ClientFinished,
    ServerChangeCipherSpec,
    ServerFinished,
    FlushBuffers,
    HandshakeWrapup,
    HandshakeOver,
}

/// What a single `step()` call accomplished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    /// The record layer did not yet have enough bytes/output capacity; call
    /// `step()` again once it does (spec.md §5: "preserves all state and
    /// expects re-entry").
    WouldBlock,
    /// `state` advanced; call `step()` again to continue the handshake.
    Progressed,
    /// `HANDSHAKE_OVER` was reached this call. `take_established()` now
    /// returns `Some`.
    Done,
}

/// Drives one server-side handshake to completion, one `step()` at a time
/// (spec.md §5: "single-threaded cooperative per connection").
pub struct HandshakeDriver<R: RecordLayer> {
    record_layer: R,
    config: std::sync::Arc<ServerConfig>,
    state: State,
    session: HandshakeSession,
    scratch: Option<HandshakeScratch>,
    is_renegotiation: bool,
    /// Whether the session-cache resumption shortcut (spec.md §4.D) was taken
    /// for the handshake in progress -- changes where `ServerFinished` and
    /// `ClientFinished` hand off to next, since the abbreviated handshake
    /// sends its CCS/Finished flights in the opposite order from a full one.
    resuming: bool,
    /// The session id the client presented in ClientHello, kept separately
    /// from `session.session_id` (which may instead be a freshly generated
    /// one) so the cache lookup has something to key on.
    client_session_id: Vec<u8>,
    requested_client_cert: bool,
    peer_certificate: Option<CertificateDer>,
    master_secret: Option<Vec<u8>>,
    client_verify_data: Option<Vec<u8>>,
    server_verify_data: Option<Vec<u8>>,
    /// Whether RFC 5746 secure renegotiation was established by the most
    /// recently completed handshake on this connection; `Insecure` before any
    /// handshake has completed.
    established_secure: SecureRenegotiation,
    /// `(client, server)` verify_data from the most recently completed
    /// handshake, carried forward for a subsequent renegotiation's
    /// `renegotiation_info` checks (spec.md §4.B) and its ServerHello
    /// extension (spec.md §4.D).
    prior_verify_data: Option<(Vec<u8>, Vec<u8>)>,
    established: Option<EstablishedSession>,
}

impl<R: RecordLayer> HandshakeDriver<R> {
    pub fn new(record_layer: R, config: std::sync::Arc<ServerConfig>) -> Self {
        Self {
            record_layer,
            config,
            state: State::ClientHello,
            session: HandshakeSession::new(),
            scratch: None,
            is_renegotiation: false,
            resuming: false,
            client_session_id: Vec::new(),
            requested_client_cert: false,
            peer_certificate: None,
            master_secret: None,
            client_verify_data: None,
            server_verify_data: None,
            established_secure: SecureRenegotiation::Insecure,
            prior_verify_data: None,
            established: None,
        }
    }

    /// Resets the driver to begin a fresh handshake over the existing
    /// connection (spec.md's GLOSSARY: "a fresh handshake performed over an
    /// already-secured connection"). Secure-renegotiation state from the
    /// handshake just completed is preserved; everything else resets.
    pub fn begin_renegotiation(&mut self) {
        self.state = State::ClientHello;
        self.scratch = None;
        self.is_renegotiation = true;
        self.resuming = false;
        self.client_session_id.clear();
        self.requested_client_cert = false;
        self.peer_certificate = None;
        self.master_secret = None;
        self.client_verify_data = None;
        self.server_verify_data = None;
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Returns the just-completed handshake's result, consuming it. `None`
    /// until a `step()` call has returned `StepStatus::Done`.
    pub fn take_established(&mut self) -> Option<EstablishedSession> {
        self.established.take()
    }

    /// Advances the handshake by exactly one step (spec.md §4.F).
    pub fn step(&mut self) -> Result<StepStatus> {
        if self.state == State::HandshakeOver {
            return Err(HandshakeError::BadInputData);
        }
        self.record_layer.flush()?;
        tracing::debug!(state = ?self.state, "handshake step");

        match self.dispatch() {
            Ok(status) => Ok(status),
            Err(err) => {
                if let Some(alert) = err.alert() {
                    tracing::warn!(state = ?self.state, alert = ?alert, "sending fatal alert");
                    let _ = self.record_layer.send_alert(AlertLevel::Fatal, alert);
                }
                Err(err)
            }
        }
    }

    fn dispatch(&mut self) -> Result<StepStatus> {
        match self.state {
            State::HelloRequest => {
                self.state = State::ClientHello;
                Ok(StepStatus::Progressed)
            }
            State::ClientHello => self.step_client_hello(),
            State::ServerHello => self.step_server_hello(),
            State::ServerCertificate => self.step_server_certificate(),
            State::ServerKeyExchange => self.step_server_key_exchange(),
            State::CertificateRequest => self.step_certificate_request(),
            State::ServerHelloDone => self.step_server_hello_done(),
            State::ClientCertificate => self.step_client_certificate(),
            State::ClientKeyExchange => self.step_client_key_exchange(),
            State::CertificateVerify => self.step_certificate_verify(),
            State::ClientChangeCipherSpec => self.step_client_change_cipher_spec(),
            State::ClientFinished => self.step_client_finished(),
            State::ServerChangeCipherSpec => self.step_server_change_cipher_spec(),
            State::ServerFinished => self.step_server_finished(),
            State::FlushBuffers => self.step_flush_buffers(),
            State::HandshakeWrapup => self.step_wrapup(),
            State::HandshakeOver => unreachable!("step() rejects calls in this state before dispatch"),
        }
    }

    fn step_client_hello(&mut self) -> Result<StepStatus> {
        let prior = self.prior_verify_data.as_ref().map(|(c, s)| (c.as_slice(), s.as_slice()));
        let parsed = client_hello::read_client_hello(
            &mut self.record_layer,
            &self.config,
            self.is_renegotiation,
            self.established_secure,
            prior,
        )?;
        let (raw, outcome) = match parsed {
            None => return Ok(StepStatus::WouldBlock),
            Some(v) => v,
        };

        let mut scratch = HandshakeScratch::new(self.is_renegotiation, None);
        scratch.transcript.push(&raw);
        scratch.randbytes[0..32].copy_from_slice(&outcome.client_random);
        scratch.client_max_version = outcome.client_max_version;
        scratch.sig_alg = outcome.sig_alg;
        scratch.ec_curve = outcome.ec_curve;
        scratch.ec_point_format = outcome.ec_point_format;
        scratch.secure_renegotiation = outcome.secure_renegotiation;
        scratch.key_exchange = cipher_suite::lookup(outcome.cipher_suite).map(|i| i.key_exchange);

        self.session.major = crate::handshake::RECORD_MAJOR_VERSION;
        self.session.minor = outcome.minor;
        self.session.cipher_suite = Some(outcome.cipher_suite);
        self.session.compression = outcome.compression;

        self.client_session_id = outcome.session_id;
        self.scratch = Some(scratch);
        self.state = State::ServerHello;
        Ok(StepStatus::Progressed)
    }

    fn step_server_hello(&mut self) -> Result<StepStatus> {
        let minor = self.session.minor;
        let cipher_suite = self.session.cipher_suite.expect("set by ClientHello state");

        let mut server_random = [0u8; 32];
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        server_random[0..4].copy_from_slice(&now.to_be_bytes());
        self.config.rng.fill(&mut server_random[4..]);

        // Resumption shortcut (spec.md §4.D): only considered on an initial
        // handshake, since a renegotiation already has an established session.
        let cached: Option<CachedSession> = if !self.is_renegotiation {
            self.config
                .session_cache
                .as_ref()
                .and_then(|cache| cache.get(&self.client_session_id))
        } else {
            None
        };

        let (session_id, resume) = match &cached {
            Some(_) => (self.client_session_id.clone(), true),
            None => {
                let mut id = vec![0u8; 32];
                self.config.rng.fill(&mut id);
                (id, false)
            }
        };
        self.session.session_id = session_id.clone();
        self.session.resume = resume;

        let scratch = self.scratch.as_mut().expect("set by ClientHello state");
        scratch.randbytes[32..64].copy_from_slice(&server_random);

        let prior = self.prior_verify_data.as_ref().map(|(c, s)| (c.as_slice(), s.as_slice()));
        let msg = server_messages::build_server_hello(
            minor,
            &server_random,
            &session_id,
            cipher_suite,
            self.session.compression,
            scratch.secure_renegotiation,
            prior,
        );
        scratch.transcript.push(&msg);
        self.record_layer.write_handshake_message(&msg)?;

        if let Some(cached) = cached {
            self.master_secret = Some(cached.master_secret);
            self.resuming = true;
            self.state = State::ServerChangeCipherSpec;
        } else {
            self.resuming = false;
            self.state = State::ServerCertificate;
        }
        Ok(StepStatus::Progressed)
    }

    fn step_server_certificate(&mut self) -> Result<StepStatus> {
        let scratch = self.scratch.as_mut().expect("present for the whole in-progress handshake");
        let family = scratch.key_exchange.expect("set by ClientHello state");
        if family.uses_server_certificate() {
            let msg = build_certificate_message(&self.config.certificate_chain);
            scratch.transcript.push(&msg);
            self.record_layer.write_handshake_message(&msg)?;
        }
        self.state = State::ServerKeyExchange;
        Ok(StepStatus::Progressed)
    }

    fn step_server_key_exchange(&mut self) -> Result<StepStatus> {
        let family = self
            .scratch
            .as_ref()
            .expect("present for the whole in-progress handshake")
            .key_exchange
            .expect("set by ClientHello state");

        if family.sends_server_key_exchange() {
            let (params, secret) = self.build_key_exchange_params(family)?;
            let minor = self.session.minor;
            let scratch = self.scratch.as_mut().unwrap();
            scratch.key_agreement_secret = Some(secret);

            let client_random: [u8; 32] = scratch.randbytes[0..32].try_into().unwrap();
            let server_random: [u8; 32] = scratch.randbytes[32..64].try_into().unwrap();
            let msg = server_messages::build_server_key_exchange(
                family,
                &params.as_params(),
                minor,
                &client_random,
                &server_random,
                scratch.sig_alg,
                self.config.private_key.as_deref(),
                &self.config.hasher_factories,
            )?;
            scratch.transcript.push(&msg);
            self.record_layer.write_handshake_message(&msg)?;
        }
        self.state = State::CertificateRequest;
        Ok(StepStatus::Progressed)
    }

    fn build_key_exchange_params(&self, family: KeyExchangeFamily) -> Result<(OwnedKeyExchangeParams, Vec<u8>)> {
        match family {
            KeyExchangeFamily::DheRsa | KeyExchangeFamily::DhePsk => {
                let group = self.config.dh_group.as_ref().ok_or(HandshakeError::FeatureUnavailable {
                    feature: "DHE without a configured DH group",
                })?;
                let secret = group.agreement.generate_secret()?;
                let ys = group.agreement.public_value(&secret)?;
                Ok((
                    OwnedKeyExchangeParams::Dhe { p: group.p.clone(), g: group.g.clone(), ys },
                    secret,
                ))
            }
            KeyExchangeFamily::EcdheRsa => {
                let curve = self
                    .scratch
                    .as_ref()
                    .unwrap()
                    .ec_curve
                    .ok_or(HandshakeError::FeatureUnavailable { feature: "ECDHE without a negotiated curve" })?;
                let agreement = self
                    .config
                    .ec_groups
                    .get(&curve)
                    .ok_or(HandshakeError::FeatureUnavailable { feature: "ECDHE curve not configured" })?;
                let secret = agreement.generate_secret()?;
                let point = agreement.public_value(&secret)?;
                Ok((OwnedKeyExchangeParams::Ecdhe { curve, point }, secret))
            }
            KeyExchangeFamily::Rsa | KeyExchangeFamily::Psk => {
                unreachable!("caller checks sends_server_key_exchange() first")
            }
        }
    }

    fn step_certificate_request(&mut self) -> Result<StepStatus> {
        let family = self.scratch.as_ref().unwrap().key_exchange.unwrap();
        if family.uses_client_certificate() && self.config.authmode != AuthMode::None {
            let prf_hash = cipher_suite::lookup(self.session.cipher_suite.unwrap())
                .map(|i| i.prf_hash)
                .unwrap_or(PrfHash::Sha256);
            let verify_sig_alg = match prf_hash {
                PrfHash::Sha384 => HashAlgorithm::Sha384,
                PrfHash::Sha256 => HashAlgorithm::Sha256,
            };
            let scratch = self.scratch.as_mut().unwrap();
            scratch.verify_sig_alg = Some(verify_sig_alg);
            let msg = server_messages::build_certificate_request(self.session.minor, &self.config.ca_chain, verify_sig_alg);
            scratch.transcript.push(&msg);
            self.record_layer.write_handshake_message(&msg)?;
            self.requested_client_cert = true;
        } else {
            self.requested_client_cert = false;
        }
        self.state = State::ServerHelloDone;
        Ok(StepStatus::Progressed)
    }

    fn step_server_hello_done(&mut self) -> Result<StepStatus> {
        let scratch = self.scratch.as_mut().unwrap();
        let msg = server_messages::build_server_hello_done();
        scratch.transcript.push(&msg);
        self.record_layer.write_handshake_message(&msg)?;
        self.state = State::ClientCertificate;
        Ok(StepStatus::Progressed)
    }

    fn step_client_certificate(&mut self) -> Result<StepStatus> {
        if !self.requested_client_cert {
            self.state = State::ClientKeyExchange;
            return Ok(StepStatus::Progressed);
        }

        let raw = match self.record_layer.read_handshake_message()? {
            None => return Ok(StepStatus::WouldBlock),
            Some(b) => b,
        };
        let envelope = HandshakeEnvelope::parse(&raw)?;
        if envelope.msg_type != HandshakeType::Certificate {
            return Err(HandshakeError::bad_client_hello("expected Certificate"));
        }
        let leaf = parse_certificate_message(envelope.body)?;
        if leaf.is_none() && self.config.authmode == AuthMode::Required {
            return Err(HandshakeError::bad_client_hello("client certificate required but not presented"));
        }
        self.session.peer_certificate = leaf.clone();
        self.peer_certificate = leaf;
        self.scratch.as_mut().unwrap().transcript.push(&raw);
        self.state = State::ClientKeyExchange;
        Ok(StepStatus::Progressed)
    }

    fn step_client_key_exchange(&mut self) -> Result<StepStatus> {
        let raw = match self.record_layer.read_handshake_message()? {
            None => return Ok(StepStatus::WouldBlock),
            Some(b) => b,
        };
        let envelope = HandshakeEnvelope::parse(&raw)?;
        if envelope.msg_type != HandshakeType::ClientKeyExchange {
            return Err(HandshakeError::bad_client_hello("expected ClientKeyExchange"));
        }

        let family = self.scratch.as_ref().unwrap().key_exchange.unwrap();
        let client_max_version = self.scratch.as_ref().unwrap().client_max_version;
        let dh_secret = self.scratch.as_ref().unwrap().key_agreement_secret.clone();
        let ec_curve = self.scratch.as_ref().unwrap().ec_curve;

        let dh_group_agreement = self.config.dh_group.as_ref().map(|g| g.agreement.as_ref());
        let ec_agreement = ec_curve.and_then(|c| self.config.ec_groups.get(&c)).map(|a| a.as_ref());

        let (dh_agreement, ec_agreement): (
            Option<(&dyn KeyAgreement, &[u8])>,
            Option<(&dyn KeyAgreement, &[u8])>,
        ) = match family {
            KeyExchangeFamily::DheRsa | KeyExchangeFamily::DhePsk => {
                (dh_group_agreement.zip(dh_secret.as_deref()), None)
            }
            KeyExchangeFamily::EcdheRsa => (None, ec_agreement.zip(dh_secret.as_deref())),
            _ => (None, None),
        };

        let dhm_len = self.config.dh_group.as_ref().map(|g| g.p.len()).unwrap_or(0);
        let ec_max_point_len = ec_curve.map(curve_max_point_len).unwrap_or(0);

        let premaster = client_messages::parse_client_key_exchange(
            envelope.body,
            family,
            self.session.minor,
            client_max_version,
            self.config.private_key.as_deref(),
            dh_agreement,
            ec_agreement,
            dhm_len,
            ec_max_point_len,
            self.config.psk.as_ref(),
            self.config.rng.as_ref(),
        )?;

        let prf_hash = cipher_suite::lookup(self.session.cipher_suite.unwrap())
            .map(|i| i.prf_hash)
            .unwrap_or(PrfHash::Sha256);

        let scratch = self.scratch.as_mut().unwrap();
        scratch.premaster = premaster;
        scratch.transcript.push(&raw);

        let master_secret = self
            .config
            .key_schedule
            .lock()
            .unwrap()
            .derive_master_secret(&scratch.premaster, &scratch.randbytes, prf_hash)?;
        self.master_secret = Some(master_secret);

        self.state = if family.uses_client_certificate() && self.peer_certificate.is_some() {
            State::CertificateVerify
        } else {
            State::ClientChangeCipherSpec
        };
        Ok(StepStatus::Progressed)
    }

    fn step_certificate_verify(&mut self) -> Result<StepStatus> {
        let raw = match self.record_layer.read_handshake_message()? {
            None => return Ok(StepStatus::WouldBlock),
            Some(b) => b,
        };
        let envelope = HandshakeEnvelope::parse(&raw)?;
        if envelope.msg_type != HandshakeType::CertificateVerify {
            return Err(HandshakeError::bad_client_hello("expected CertificateVerify"));
        }

        let peer_cert = self
            .peer_certificate
            .as_ref()
            .ok_or_else(|| HandshakeError::bad_client_hello("CertificateVerify without a client certificate"))?;
        let private_key = self.config.private_key.as_deref().ok_or(HandshakeError::PrivateKeyRequired)?;
        let minor = self.session.minor;

        let scratch = self.scratch.as_mut().unwrap();
        let verify_sig_alg = scratch.verify_sig_alg.unwrap_or(HashAlgorithm::Sha256);
        client_messages::parse_certificate_verify(
            envelope.body,
            minor,
            verify_sig_alg,
            peer_cert,
            &scratch.transcript,
            &self.config.hasher_factories,
            private_key,
        )?;
        scratch.transcript.push(&raw);
        self.state = State::ClientChangeCipherSpec;
        Ok(StepStatus::Progressed)
    }

    fn step_client_change_cipher_spec(&mut self) -> Result<StepStatus> {
        self.record_layer.change_read_cipher_spec()?;
        self.state = State::ClientFinished;
        Ok(StepStatus::Progressed)
    }

    fn step_client_finished(&mut self) -> Result<StepStatus> {
        let raw = match self.record_layer.read_handshake_message()? {
            None => return Ok(StepStatus::WouldBlock),
            Some(b) => b,
        };
        let envelope = HandshakeEnvelope::parse(&raw)?;
        if envelope.msg_type != HandshakeType::Finished {
            return Err(HandshakeError::bad_client_hello("expected Finished"));
        }

        let minor = self.session.minor;
        let prf_hash = cipher_suite::lookup(self.session.cipher_suite.unwrap())
            .map(|i| i.prf_hash)
            .unwrap_or(PrfHash::Sha256);
        let master_secret = self.master_secret.clone().expect("master secret derived before ClientFinished");

        let scratch = self.scratch.as_mut().unwrap();
        let digest = verify_digest(&scratch.transcript, minor, prf_hash, &self.config.hasher_factories)?;
        let expected = self.config.key_schedule.lock().unwrap().verify_data(&master_secret, &digest, prf_hash, true);
        if expected.as_slice() != envelope.body {
            return Err(HandshakeError::BadFinished);
        }
        scratch.transcript.push(&raw);
        self.client_verify_data = Some(envelope.body.to_vec());

        self.state = if self.resuming { State::FlushBuffers } else { State::ServerChangeCipherSpec };
        Ok(StepStatus::Progressed)
    }

    fn step_server_change_cipher_spec(&mut self) -> Result<StepStatus> {
        self.record_layer.change_write_cipher_spec()?;
        self.state = State::ServerFinished;
        Ok(StepStatus::Progressed)
    }

    fn step_server_finished(&mut self) -> Result<StepStatus> {
        let minor = self.session.minor;
        let prf_hash = cipher_suite::lookup(self.session.cipher_suite.unwrap())
            .map(|i| i.prf_hash)
            .unwrap_or(PrfHash::Sha256);
        let master_secret = self.master_secret.clone().expect("master secret available by ServerFinished");

        let scratch = self.scratch.as_mut().unwrap();
        let digest = verify_digest(&scratch.transcript, minor, prf_hash, &self.config.hasher_factories)?;
        let verify_data = self.config.key_schedule.lock().unwrap().verify_data(&master_secret, &digest, prf_hash, false);

        let mut envelope = vec![];
        HandshakeEnvelope::write(HandshakeType::Finished, &verify_data, &mut envelope);
        scratch.transcript.push(&envelope);
        self.record_layer.write_handshake_message(&envelope)?;
        self.server_verify_data = Some(verify_data);

        self.state = if self.resuming { State::ClientChangeCipherSpec } else { State::FlushBuffers };
        Ok(StepStatus::Progressed)
    }

    fn step_flush_buffers(&mut self) -> Result<StepStatus> {
        self.record_layer.flush()?;
        self.state = State::HandshakeWrapup;
        Ok(StepStatus::Progressed)
    }

    fn step_wrapup(&mut self) -> Result<StepStatus> {
        let master_secret = self.master_secret.take().expect("master secret available by wrapup");

        if !self.session.resume {
            if let Some(cache) = &self.config.session_cache {
                cache.put(
                    &self.session.session_id,
                    CachedSession {
                        ciphersuite: self.session.cipher_suite.unwrap(),
                        master_secret: master_secret.clone(),
                    },
                );
            }
        }

        self.established_secure =
            self.scratch.as_ref().map(|s| s.secure_renegotiation).unwrap_or(SecureRenegotiation::Insecure);
        self.prior_verify_data = match (self.client_verify_data.take(), self.server_verify_data.take()) {
            (Some(c), Some(s)) => Some((c, s)),
            _ => None,
        };
        self.scratch = None;

        let session = std::mem::replace(&mut self.session, HandshakeSession::new());
        self.established = Some(EstablishedSession { session, master_secret });

        self.state = State::HandshakeOver;
        tracing::debug!("handshake complete");
        Ok(StepStatus::Done)
    }
}

/// Computes the digest CertificateVerify/Finished sign or authenticate over:
/// the fixed 36-byte MD5||SHA1 concatenation below TLS 1.2, or the suite's PRF
/// hash at TLS 1.2 (spec.md §4.E, §9: "md5_sha1 for versions below TLS 1.2").
fn verify_digest(
    transcript: &Transcript,
    minor: ProtocolMinorVersion,
    prf_hash: PrfHash,
    hasher_factories: &BTreeMap<HashAlgorithm, HasherFactory>,
) -> Result<Vec<u8>> {
    if minor >= TLS1_2_MINOR {
        let alg = match prf_hash {
            PrfHash::Sha256 => HashAlgorithm::Sha256,
            PrfHash::Sha384 => HashAlgorithm::Sha384,
        };
        let factory = hasher_factories.get(&alg).ok_or(HandshakeError::FeatureUnavailable { feature: "PRF hash" })?;
        Ok(transcript.hash(factory))
    } else {
        let md5 = hasher_factories.get(&HashAlgorithm::Md5).ok_or(HandshakeError::FeatureUnavailable { feature: "md5" })?;
        let sha1 =
            hasher_factories.get(&HashAlgorithm::Sha1).ok_or(HandshakeError::FeatureUnavailable { feature: "sha1" })?;
        let mut digest = transcript.hash(md5);
        digest.extend_from_slice(&transcript.hash(sha1));
        Ok(digest)
    }
}

/// Owned counterpart of `server_messages::KeyExchangeParams`, needed because the
/// ephemeral public value is generated fresh for each ServerKeyExchange rather
/// than borrowed from long-lived configuration.
enum OwnedKeyExchangeParams {
    Dhe { p: Vec<u8>, g: Vec<u8>, ys: Vec<u8> },
    Ecdhe { curve: NamedGroup, point: Vec<u8> },
}

impl OwnedKeyExchangeParams {
    fn as_params(&self) -> KeyExchangeParams<'_> {
        match self {
            Self::Dhe { p, g, ys } => KeyExchangeParams::Dhe { p, g, ys },
            Self::Ecdhe { curve, point } => KeyExchangeParams::Ecdhe { curve: *curve, point },
        }
    }
}

/// The maximum encoded length of an uncompressed point on `curve`:
/// `2 * coordinate_size + 1` (spec.md §4.E).
fn curve_max_point_len(curve: NamedGroup) -> usize {
    let coordinate_len = match curve {
        NamedGroup::Secp192r1 => 24,
        NamedGroup::Secp224r1 => 28,
        NamedGroup::Secp256r1 => 32,
        NamedGroup::Secp384r1 => 48,
        NamedGroup::Secp521r1 => 66,
        NamedGroup::Unknown(_) => 66,
    };
    2 * coordinate_len + 1
}

/// Builds the Certificate handshake message: a 24-bit-length-prefixed list of
/// 24-bit-length-prefixed DER certificates, leaf first (RFC 5246 §7.4.2).
fn build_certificate_message(chain: &[CertificateDer]) -> Vec<u8> {
    let mut body = vec![];
    write_vector_u24(&mut body, |list| {
        for cert in chain {
            write_vector_u24(list, |out| out.extend_from_slice(cert));
        }
    });
    let mut envelope = vec![];
    HandshakeEnvelope::write(HandshakeType::Certificate, &body, &mut envelope);
    envelope
}

/// Parses a Certificate handshake message body and returns the leaf
/// certificate's raw DER bytes, or `None` for an empty chain (a client
/// declining to present a certificate under `AuthMode::Optional`).
fn parse_certificate_message(body: &[u8]) -> Result<Option<CertificateDer>> {
    let mut r = Reader::new(body);
    let list = r.vector_u24(0, U24_LIMIT)?;
    if !r.is_empty() {
        return Err(HandshakeError::bad_client_hello("trailing bytes after Certificate"));
    }
    let mut lr = Reader::new(list);
    if lr.is_empty() {
        return Ok(None);
    }
    let leaf = lr.vector_u24(1, U24_LIMIT)?;
    Ok(Some(leaf.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher_suite::CipherSuiteId;
    use crate::collaborators::{KeySchedule, SecureRandom, SessionCache, SniCallback};
    use crate::config::CompressionPolicy;
    use crate::handshake::TLS1_2_MINOR;
    use std::sync::{Arc, Mutex};

    struct ScriptedRecordLayer {
        inbound: std::collections::VecDeque<Vec<u8>>,
        raw_inbound: Vec<u8>,
        pub outbound: Vec<Vec<u8>>,
        pub alerts: Vec<crate::alert::AlertDescription>,
    }

    impl RecordLayer for ScriptedRecordLayer {
        fn fetch_raw(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
            if self.raw_inbound.len() < n {
                return Ok(None);
            }
            Ok(Some(self.raw_inbound[..n].to_vec()))
        }
        fn read_handshake_message(&mut self) -> Result<Option<Vec<u8>>> {
            Ok(self.inbound.pop_front())
        }
        fn write_handshake_message(&mut self, body: &[u8]) -> Result<()> {
            self.outbound.push(body.to_vec());
            Ok(())
        }
        fn send_alert(&mut self, _level: AlertLevel, d: crate::alert::AlertDescription) -> Result<()> {
            self.alerts.push(d);
            Ok(())
        }
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
        fn change_write_cipher_spec(&mut self) -> Result<()> {
            Ok(())
        }
        fn change_read_cipher_spec(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct FakeRng;
    impl SecureRandom for FakeRng {
        fn fill(&self, buf: &mut [u8]) {
            buf.fill(0x11);
        }
    }

    struct FakeKeySchedule;
    impl KeySchedule for FakeKeySchedule {
        fn derive_master_secret(&mut self, _: &[u8], _: &[u8; 64], _: PrfHash) -> Result<Vec<u8>> {
            Ok(vec![0x22u8; 48])
        }
        fn verify_data(&self, _: &[u8], _: &[u8], _: PrfHash, sender_is_client: bool) -> Vec<u8> {
            vec![if sender_is_client { 1 } else { 2 }; 12]
        }
    }

    struct FakeRsaKey;
    impl crate::collaborators::RsaPrivateKey for FakeRsaKey {
        fn modulus_len(&self) -> usize {
            4
        }
        fn decrypt_pkcs1v15(&self, _c: &[u8]) -> Result<Vec<u8>> {
            let mut pms = vec![0u8; 48];
            pms[0] = 3;
            pms[1] = 3;
            Ok(pms)
        }
        fn sign_pkcs1v15(&self, _digest: &[u8]) -> Result<Vec<u8>> {
            Ok(vec![0xAA; 4])
        }
        fn verify_pkcs1v15(&self, _pk: &[u8], _digest: &[u8], _sig: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    fn hasher_factories() -> BTreeMap<HashAlgorithm, HasherFactory> {
        struct Noop;
        impl crate::hasher::Hasher for Noop {
            fn block_size(&self) -> usize {
                64
            }
            fn output_size(&self) -> usize {
                32
            }
            fn update(&mut self, _: &[u8]) {}
            fn finish(&self) -> Vec<u8> {
                vec![0u8; 32]
            }
            fn box_clone(&self) -> Box<dyn crate::hasher::Hasher> {
                Box::new(Noop)
            }
        }
        let mut m: BTreeMap<HashAlgorithm, HasherFactory> = BTreeMap::new();
        let factory: HasherFactory = Arc::new(|| Box::new(Noop));
        m.insert(HashAlgorithm::Sha256, factory.clone());
        m.insert(HashAlgorithm::Md5, factory.clone());
        m.insert(HashAlgorithm::Sha1, factory);
        m
    }

    fn rsa_config() -> Arc<ServerConfig> {
        Arc::new(
            ServerConfig::builder()
                .min_minor(TLS1_2_MINOR)
                .max_minor(TLS1_2_MINOR)
                .cipher_suites(TLS1_2_MINOR, vec![CipherSuiteId::TlsRsaWithAes128CbcSha])
                .compression(CompressionPolicy::NullOnly)
                .private_key(Arc::new(FakeRsaKey))
                .certificate_chain(vec![vec![0xCCu8; 8]])
                .rng(Arc::new(FakeRng))
                .key_schedule(Arc::new(Mutex::new(FakeKeySchedule)))
                .hasher_factory(HashAlgorithm::Sha256, hasher_factories()[&HashAlgorithm::Sha256].clone())
                .hasher_factory(HashAlgorithm::Md5, hasher_factories()[&HashAlgorithm::Md5].clone())
                .hasher_factory(HashAlgorithm::Sha1, hasher_factories()[&HashAlgorithm::Sha1].clone())
                .build()
                .unwrap(),
        )
    }

    fn client_hello_record() -> Vec<u8> {
        let mut body = vec![];
        body.push(3);
        body.push(3);
        body.extend_from_slice(&[7u8; 32]);
        crate::reader::write_vector_u8(&mut body, |_| {});
        crate::reader::write_vector_u16(&mut body, |out| out.extend_from_slice(&0x002Fu16.to_be_bytes()));
        crate::reader::write_vector_u8(&mut body, |out| out.push(0));

        let mut envelope = vec![];
        HandshakeEnvelope::write(HandshakeType::ClientHello, &body, &mut envelope);
        let mut record = vec![22, 3, 3];
        record.extend_from_slice(&(envelope.len() as u16).to_be_bytes());
        record.extend_from_slice(&envelope);
        record
    }

    fn client_key_exchange_message() -> Vec<u8> {
        let mut body = vec![];
        body.extend_from_slice(&4u16.to_be_bytes());
        body.extend_from_slice(&[0u8; 4]);
        let mut envelope = vec![];
        HandshakeEnvelope::write(HandshakeType::ClientKeyExchange, &body, &mut envelope);
        envelope
    }

    fn client_finished_message(verify_data: &[u8]) -> Vec<u8> {
        let mut envelope = vec![];
        HandshakeEnvelope::write(HandshakeType::Finished, verify_data, &mut envelope);
        envelope
    }

    #[test]
    fn full_rsa_handshake_reaches_handshake_over() {
        let config = rsa_config();
        let record_layer = ScriptedRecordLayer {
            raw_inbound: client_hello_record(),
            inbound: std::collections::VecDeque::from(vec![
                client_key_exchange_message(),
                client_finished_message(&[1u8; 12]),
            ]),
            outbound: vec![],
            alerts: vec![],
        };
        let mut driver = HandshakeDriver::new(record_layer, config);

        loop {
            match driver.step().unwrap() {
                StepStatus::Done => break,
                _ => continue,
            }
        }

        assert_eq!(driver.state(), State::HandshakeOver);
        let established = driver.take_established().unwrap();
        assert_eq!(established.master_secret, vec![0x22u8; 48]);
        assert!(driver.step().is_err());
    }

    #[test]
    fn session_cache_hit_skips_the_certificate_flight() {
        struct HitCache;
        impl SessionCache for HitCache {
            fn get(&self, _id: &[u8]) -> Option<CachedSession> {
                Some(CachedSession {
                    ciphersuite: CipherSuiteId::TlsRsaWithAes128CbcSha,
                    master_secret: vec![0x33u8; 48],
                })
            }
            fn put(&self, _id: &[u8], _session: CachedSession) {}
        }

        let config = Arc::new(
            ServerConfig::builder()
                .min_minor(TLS1_2_MINOR)
                .max_minor(TLS1_2_MINOR)
                .cipher_suites(TLS1_2_MINOR, vec![CipherSuiteId::TlsRsaWithAes128CbcSha])
                .private_key(Arc::new(FakeRsaKey))
                .rng(Arc::new(FakeRng))
                .key_schedule(Arc::new(Mutex::new(FakeKeySchedule)))
                .hasher_factory(HashAlgorithm::Sha256, hasher_factories()[&HashAlgorithm::Sha256].clone())
                .hasher_factory(HashAlgorithm::Md5, hasher_factories()[&HashAlgorithm::Md5].clone())
                .hasher_factory(HashAlgorithm::Sha1, hasher_factories()[&HashAlgorithm::Sha1].clone())
                .session_cache(Arc::new(HitCache))
                .build()
                .unwrap(),
        );

        let record_layer = ScriptedRecordLayer {
            raw_inbound: client_hello_record(),
            inbound: std::collections::VecDeque::from(vec![client_finished_message(&[1u8; 12])]),
            outbound: vec![],
            alerts: vec![],
        };
        let mut driver = HandshakeDriver::new(record_layer, config);

        // ClientHello -> ServerHello.
        assert_eq!(driver.step().unwrap(), StepStatus::Progressed);
        assert_eq!(driver.step().unwrap(), StepStatus::Progressed);
        assert_eq!(driver.state(), State::ServerChangeCipherSpec);
    }

    #[test]
    fn sni_rejection_sends_unrecognized_name_and_fails() {
        struct RejectingSni;
        impl SniCallback for RejectingSni {
            fn accept(&self, _host_name: &[u8]) -> bool {
                false
            }
        }

        let config = Arc::new(
            ServerConfig::builder()
                .min_minor(TLS1_2_MINOR)
                .max_minor(TLS1_2_MINOR)
                .cipher_suites(TLS1_2_MINOR, vec![CipherSuiteId::TlsRsaWithAes128CbcSha])
                .private_key(Arc::new(FakeRsaKey))
                .rng(Arc::new(FakeRng))
                .key_schedule(Arc::new(Mutex::new(FakeKeySchedule)))
                .hasher_factory(HashAlgorithm::Sha256, hasher_factories()[&HashAlgorithm::Sha256].clone())
                .sni_callback(Arc::new(RejectingSni))
                .build()
                .unwrap(),
        );

        let mut body = vec![];
        body.push(3);
        body.push(3);
        body.extend_from_slice(&[7u8; 32]);
        crate::reader::write_vector_u8(&mut body, |_| {});
        crate::reader::write_vector_u16(&mut body, |out| out.extend_from_slice(&0x002Fu16.to_be_bytes()));
        crate::reader::write_vector_u8(&mut body, |out| out.push(0));
        let mut extensions = vec![];
        crate::extensions::ExtensionType::ServerName.write(&mut extensions);
        crate::reader::write_vector_u16(&mut extensions, |ext_body| {
            crate::reader::write_vector_u16(ext_body, |list| {
                list.push(0); // host_name
                crate::reader::write_vector_u16(list, |name| name.extend_from_slice(b"example.com"));
            });
        });
        crate::reader::write_vector_u16(&mut body, |out| out.extend_from_slice(&extensions));

        let mut envelope = vec![];
        HandshakeEnvelope::write(HandshakeType::ClientHello, &body, &mut envelope);
        let mut record = vec![22, 3, 3];
        record.extend_from_slice(&(envelope.len() as u16).to_be_bytes());
        record.extend_from_slice(&envelope);

        let record_layer = ScriptedRecordLayer {
            raw_inbound: record,
            inbound: std::collections::VecDeque::new(),
            outbound: vec![],
            alerts: vec![],
        };
        let mut driver = HandshakeDriver::new(record_layer, config);
        let err = driver.step().unwrap_err();
        assert!(matches!(err, HandshakeError::BadClientHello { .. }));
    }
}
