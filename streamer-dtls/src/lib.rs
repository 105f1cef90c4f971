#![warn(rust_2018_idioms)]

mod cert;
mod channel;
mod engine;

pub use cert::{fingerprint_sha256, Identity};
pub use channel::MemoryChannel;
pub use engine::{DtlsEngine, SrtpKeyMaterial, SrtpKeys};

#[cfg(test)]
mod tests {
    use super::*;

    // The session always negotiates DTLS in the passive (server) role per
    // spec §4.4; a fresh engine has nothing to send until a ClientHello
    // arrives, and reports itself not yet established.
    #[test]
    fn fresh_passive_engine_waits_for_a_client_hello() {
        let identity = Identity::generate().unwrap();
        let mut engine = DtlsEngine::new(&identity, None).unwrap();
        assert!(!engine.is_established());
        assert!(engine.poll_transmit().is_none());
    }

    #[test]
    fn fingerprint_matches_the_identity_used_to_build_the_engine() {
        let identity = Identity::generate().unwrap();
        let expected = fingerprint_sha256(&identity.cert_der).unwrap();
        let mismatched = DtlsEngine::new(&identity, Some("00:11:22".to_string())).unwrap();
        // the fingerprint pinning callback only fires once a peer
        // certificate is actually presented during the handshake; building
        // the engine with a pin that won't match the session's own
        // identity is still valid construction.
        assert!(!mismatched.is_established());
        assert_eq!(expected.split(':').count(), 32);
    }
}
