//! AES_CM_128_HMAC_SHA1_80 parameters, RFC 3711 §4.3/§4.2.1.

pub const SESSION_KEY_LEN: usize = 16;
pub const SESSION_AUTH_KEY_LEN: usize = 20;
pub const SESSION_SALT_LEN: usize = 14;
pub const AUTH_TAG_LEN: usize = 10;

pub const LABEL_RTP_ENCRYPTION: u8 = 0x00;
pub const LABEL_RTP_AUTH: u8 = 0x01;
pub const LABEL_RTP_SALT: u8 = 0x02;

/// Replay window size in packets, per spec §4.5.
pub const REPLAY_WINDOW_SIZE: u64 = 8192;
