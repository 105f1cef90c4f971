use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, PKCS_ECDSA_P256_SHA256};
use streamer_shared::{Error, Result};

const VALIDITY_DAYS: i64 = 365;
const COMMON_NAME: &str = "cppstreamer.org";

/// A self-signed EC P-256 identity held in memory for the lifetime of one
/// session. Generated fresh per `PeerConnection`, never persisted to disk,
/// per spec §4.4.
pub struct Identity {
    pub cert_der: Vec<u8>,
    pub key_der: Vec<u8>,
}

impl Identity {
    pub fn generate() -> Result<Self> {
        let key_pair =
            KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).map_err(|e| Error::ErrDtlsCertGen(e.to_string()))?;

        let mut params =
            CertificateParams::new(vec![COMMON_NAME.to_string()]).map_err(|e| Error::ErrDtlsCertGen(e.to_string()))?;
        let mut name = DistinguishedName::new();
        name.push(DnType::CommonName, COMMON_NAME);
        params.distinguished_name = name;
        params.not_before = time::OffsetDateTime::now_utc();
        params.not_after = params.not_before + time::Duration::days(VALIDITY_DAYS);

        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| Error::ErrDtlsCertGen(e.to_string()))?;

        Ok(Self {
            cert_der: cert.der().to_vec(),
            key_der: key_pair.serialize_der(),
        })
    }
}

/// SHA-256 fingerprint of a DER-encoded certificate, formatted
/// colon-separated uppercase hex for embedding in an SDP `a=fingerprint` line.
pub fn fingerprint_sha256(cert_der: &[u8]) -> Result<String> {
    use openssl::hash::MessageDigest;
    use openssl::x509::X509;

    let x509 = X509::from_der(cert_der).map_err(|e| Error::ErrDtlsCertGen(e.to_string()))?;
    let digest = x509
        .digest(MessageDigest::sha256())
        .map_err(|e| Error::ErrDtlsCertGen(e.to_string()))?;
    Ok(digest.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(":"))
}
