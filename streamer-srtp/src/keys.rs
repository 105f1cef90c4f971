use aes::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;

use crate::constants::{
    LABEL_RTP_AUTH, LABEL_RTP_ENCRYPTION, LABEL_RTP_SALT, SESSION_AUTH_KEY_LEN, SESSION_KEY_LEN, SESSION_SALT_LEN,
};

type Aes128Ctr = Ctr128BE<aes::Aes128>;

/// A single master key/salt pair, as exported from the DTLS handshake for
/// one direction.
#[derive(Clone)]
pub struct MasterKeys {
    pub master_key: Vec<u8>,
    pub master_salt: Vec<u8>,
}

/// Session keys derived from a master key/salt via the AES-CM key
/// derivation PRF (RFC 3711 §4.3.1).
pub struct SessionKeys {
    pub enc_key: [u8; SESSION_KEY_LEN],
    pub auth_key: [u8; SESSION_AUTH_KEY_LEN],
    pub salt: [u8; SESSION_SALT_LEN],
}

pub fn derive_session_keys(master: &MasterKeys) -> SessionKeys {
    let mut salt_pad = [0u8; 16];
    let n = master.master_salt.len().min(SESSION_SALT_LEN);
    salt_pad[..n].copy_from_slice(&master.master_salt[..n]);

    let mut enc_key = [0u8; SESSION_KEY_LEN];
    let mut auth_key = [0u8; SESSION_AUTH_KEY_LEN];
    let mut salt = [0u8; SESSION_SALT_LEN];

    aes_cm_prf(&master.master_key, &salt_pad, LABEL_RTP_ENCRYPTION, &mut enc_key);
    aes_cm_prf(&master.master_key, &salt_pad, LABEL_RTP_AUTH, &mut auth_key);
    aes_cm_prf(&master.master_key, &salt_pad, LABEL_RTP_SALT, &mut salt);

    SessionKeys { enc_key, auth_key, salt }
}

fn aes_cm_prf(master_key: &[u8], master_salt_padded: &[u8; 16], label: u8, out: &mut [u8]) {
    let mut iv = *master_salt_padded;
    iv[7] ^= label;
    let mut cipher = Aes128Ctr::new(master_key.into(), &iv.into());
    out.fill(0);
    cipher.apply_keystream(out);
}

/// Builds the 128-bit counter-mode IV for a single packet: session salt
/// XORed with the SSRC and the 48-bit rollover-extended packet index.
pub fn packet_iv(session_salt: &[u8; SESSION_SALT_LEN], ssrc: u32, index: u64) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..SESSION_SALT_LEN].copy_from_slice(session_salt);

    let ssrc_bytes = ssrc.to_be_bytes();
    for i in 0..4 {
        iv[4 + i] ^= ssrc_bytes[i];
    }
    let index_bytes = index.to_be_bytes();
    for i in 0..6 {
        iv[8 + i] ^= index_bytes[2 + i];
    }
    iv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let master = MasterKeys {
            master_key: vec![7u8; 16],
            master_salt: vec![3u8; 14],
        };
        let a = derive_session_keys(&master);
        let b = derive_session_keys(&master);
        assert_eq!(a.enc_key, b.enc_key);
        assert_eq!(a.auth_key, b.auth_key);
        assert_eq!(a.salt, b.salt);
    }

    #[test]
    fn the_three_labels_produce_distinct_keys() {
        let master = MasterKeys {
            master_key: vec![7u8; 16],
            master_salt: vec![3u8; 14],
        };
        let keys = derive_session_keys(&master);
        assert_ne!(&keys.auth_key[..14], &keys.salt[..]);
    }
}
