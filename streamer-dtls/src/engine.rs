use std::io::{Read, Write};

use openssl::hash::MessageDigest;
use openssl::ssl::{HandshakeError, MidHandshakeSslStream, Ssl, SslContextBuilder, SslMethod, SslStream, SslVerifyMode};
use openssl::x509::X509;
use openssl::pkey::PKey;
use streamer_shared::{Error, Result};

use crate::cert::Identity;
use crate::channel::MemoryChannel;

const SRTP_PROFILE: &str = "SRTP_AES128_CM_SHA1_80";
const KEY_LEN: usize = 16;
const SALT_LEN: usize = 14;
const EXPORTER_LABEL: &str = "EXTRACTOR-dtls_srtp";
const MTU: u32 = 1200;

/// One side's exported SRTP master key/salt pair.
#[derive(Clone)]
pub struct SrtpKeys {
    pub master_key: Vec<u8>,
    pub master_salt: Vec<u8>,
}

/// Keys for both directions, already assigned relative to our role.
pub struct SrtpKeyMaterial {
    pub outbound: SrtpKeys,
    pub inbound: SrtpKeys,
}

enum State {
    Handshaking(MidHandshakeSslStream<MemoryChannel>),
    Established(SslStream<MemoryChannel>),
    /// Taken out mid-transition; never observed from the outside.
    Empty,
}

/// Drives a single DTLS-SRTP handshake in the server/passive role per
/// spec §4.4, over an in-memory channel instead of a live socket.
/// Grounded on `dtls/runtime.rs`'s `dtls_accept_openssl`/`derive_srtp_keys`,
/// restructured sans-io so the caller supplies datagrams instead of a
/// blocking `UdpSocket`.
pub struct DtlsEngine {
    state: State,
}

impl DtlsEngine {
    pub fn new(identity: &Identity, expected_remote_fingerprint: Option<String>) -> Result<Self> {
        let mut builder = SslContextBuilder::new(SslMethod::dtls()).map_err(openssl_err)?;
        builder.set_tlsext_use_srtp(SRTP_PROFILE).map_err(openssl_err)?;
        builder.set_cipher_list("DEFAULT:@SECLEVEL=0").map_err(openssl_err)?;

        let cert = X509::from_der(&identity.cert_der).map_err(openssl_err)?;
        let key = PKey::private_key_from_der(&identity.key_der).map_err(openssl_err)?;
        builder.set_certificate(&cert).map_err(openssl_err)?;
        builder.set_private_key(&key).map_err(openssl_err)?;
        builder.check_private_key().map_err(openssl_err)?;

        if let Some(expected) = expected_remote_fingerprint {
            builder.set_verify(SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT);
            builder.set_verify_callback(SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT, move |_, ctx| {
                let Some(cert) = ctx.current_cert() else {
                    return false;
                };
                let Ok(digest) = cert.digest(MessageDigest::sha256()) else {
                    return false;
                };
                let actual = digest.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(":");
                actual.eq_ignore_ascii_case(&expected)
            });
        } else {
            builder.set_verify(SslVerifyMode::NONE);
        }

        let ctx = builder.build();
        let mut ssl = Ssl::new(&ctx).map_err(openssl_err)?;
        ssl.set_mtu(MTU).map_err(openssl_err)?;

        let state = match ssl.accept(MemoryChannel::new()) {
            Ok(stream) => State::Established(stream),
            Err(HandshakeError::WouldBlock(mid)) => State::Handshaking(mid),
            Err(e) => return Err(Error::ErrDtlsHandshake(format!("{e:?}"))),
        };
        Ok(Self { state })
    }

    pub fn is_established(&self) -> bool {
        matches!(self.state, State::Established(_))
    }

    pub fn feed_bytes(&mut self, datagram: &[u8]) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Empty) {
            State::Established(mut stream) => {
                stream.get_mut().feed_bytes(datagram);
                self.state = State::Established(stream);
                Ok(())
            }
            State::Handshaking(mut mid) => {
                mid.get_mut().feed_bytes(datagram);
                self.state = match mid.handshake() {
                    Ok(stream) => State::Established(stream),
                    Err(HandshakeError::WouldBlock(mid)) => State::Handshaking(mid),
                    Err(e) => return Err(Error::ErrDtlsHandshake(format!("{e:?}"))),
                };
                Ok(())
            }
            State::Empty => unreachable!("engine state left empty across calls"),
        }
    }

    pub fn poll_transmit(&mut self) -> Option<Vec<u8>> {
        match &mut self.state {
            State::Established(stream) => stream.get_mut().take_outgoing(),
            State::Handshaking(mid) => mid.get_mut().take_outgoing(),
            State::Empty => None,
        }
    }

    pub fn export_srtp_keys(&self, we_are_server: bool) -> Result<SrtpKeyMaterial> {
        let State::Established(stream) = &self.state else {
            return Err(Error::ErrDtlsNotEstablished);
        };

        let profile = stream.ssl().selected_srtp_profile().ok_or(Error::ErrDtlsNoSrtpProfile)?;
        if profile.name() != SRTP_PROFILE {
            return Err(Error::ErrDtlsNoSrtpProfile);
        }

        let total = 2 * (KEY_LEN + SALT_LEN);
        let mut material = vec![0u8; total];
        stream
            .ssl()
            .export_keying_material(&mut material, EXPORTER_LABEL, None)
            .map_err(|_| Error::ErrDtlsKeyExport)?;

        let (client_key, rest) = material.split_at(KEY_LEN);
        let (server_key, rest) = rest.split_at(KEY_LEN);
        let (client_salt, rest) = rest.split_at(SALT_LEN);
        let (server_salt, _) = rest.split_at(SALT_LEN);

        let client = SrtpKeys {
            master_key: client_key.to_vec(),
            master_salt: client_salt.to_vec(),
        };
        let server = SrtpKeys {
            master_key: server_key.to_vec(),
            master_salt: server_salt.to_vec(),
        };

        Ok(if we_are_server {
            SrtpKeyMaterial {
                outbound: server,
                inbound: client,
            }
        } else {
            SrtpKeyMaterial {
                outbound: client,
                inbound: server,
            }
        })
    }

    pub fn write_application_data(&mut self, data: &[u8]) -> Result<()> {
        let State::Established(stream) = &mut self.state else {
            return Err(Error::ErrDtlsNotEstablished);
        };
        stream.write_all(data).map_err(|e| Error::ErrDtlsHandshake(e.to_string()))
    }

    pub fn read_application_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        let State::Established(stream) = &mut self.state else {
            return Err(Error::ErrDtlsNotEstablished);
        };
        stream.read(buf).map_err(|e| Error::ErrDtlsHandshake(e.to_string()))
    }
}

fn openssl_err(e: openssl::error::ErrorStack) -> Error {
    Error::ErrDtlsHandshake(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_engine_starts_in_handshaking_state() {
        let identity = Identity::generate().unwrap();
        let engine = DtlsEngine::new(&identity, None).unwrap();
        assert!(!engine.is_established());
    }

    #[test]
    fn export_before_handshake_completes_is_an_error() {
        let identity = Identity::generate().unwrap();
        let engine = DtlsEngine::new(&identity, None).unwrap();
        assert!(engine.export_srtp_keys(true).is_err());
    }
}
