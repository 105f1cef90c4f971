use std::collections::HashMap;

use aes::cipher::{KeyIvInit, StreamCipher};
use byteorder::{BigEndian, ByteOrder};
use ctr::Ctr128BE;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use streamer_shared::{Error, Result};

use crate::constants::AUTH_TAG_LEN;
use crate::keys::{derive_session_keys, packet_iv, MasterKeys, SessionKeys};
use crate::replay::ReplayWindow;

type Aes128Ctr = Ctr128BE<aes::Aes128>;
type HmacSha1 = Hmac<Sha1>;

/// One direction's AES_CM_128_HMAC_SHA1_80 state. Rollover counters and
/// replay windows are tracked per SSRC since a single context serves any
/// SSRC presented to it (`ssrc_any_outbound`/`ssrc_any_inbound` per spec
/// §4.5), rather than binding one context per stream up front.
pub struct SrtpContext {
    keys: SessionKeys,
    rocs: HashMap<u32, u32>,
    last_seqs: HashMap<u32, u16>,
    replay_windows: HashMap<u32, ReplayWindow>,
}

impl SrtpContext {
    pub fn new(master: MasterKeys) -> Self {
        Self {
            keys: derive_session_keys(&master),
            rocs: HashMap::new(),
            last_seqs: HashMap::new(),
            replay_windows: HashMap::new(),
        }
    }

    /// Encrypts an RTP packet in place and appends the 10-byte auth tag.
    pub fn protect(&mut self, packet: &mut Vec<u8>) -> Result<()> {
        if packet.len() < 12 {
            return Err(Error::ErrSrtpTooShort);
        }
        let seq = BigEndian::read_u16(&packet[2..4]);
        let ssrc = BigEndian::read_u32(&packet[8..12]);
        let roc = self.advance_roc_for_send(ssrc, seq);
        let index = ((roc as u64) << 16) | seq as u64;

        let header_len = rtp_header_len(packet)?;
        let iv = packet_iv(&self.keys.salt, ssrc, index);
        let mut cipher = Aes128Ctr::new(&self.keys.enc_key.into(), &iv.into());
        cipher.apply_keystream(&mut packet[header_len..]);

        let tag = self.auth_tag(packet, roc);
        packet.extend_from_slice(&tag);
        Ok(())
    }

    /// Verifies and decrypts an SRTP packet in place, stripping the auth
    /// tag. Per spec §4.5, callers should treat any `Err` as "drop the
    /// packet silently" rather than surfacing it to the peer.
    pub fn unprotect(&mut self, packet: &mut Vec<u8>) -> Result<()> {
        if packet.len() < 12 + AUTH_TAG_LEN {
            return Err(Error::ErrSrtpTooShort);
        }
        let tag_start = packet.len() - AUTH_TAG_LEN;
        let seq = BigEndian::read_u16(&packet[2..4]);
        let ssrc = BigEndian::read_u32(&packet[8..12]);
        let roc = self.estimate_roc(ssrc, seq);
        let index = ((roc as u64) << 16) | seq as u64;

        let window = self.replay_windows.entry(ssrc).or_default();
        if window.is_replay(index) {
            return Err(Error::ErrSrtpReplayed(seq));
        }

        let expected_tag = self.auth_tag(&packet[..tag_start], roc);
        if expected_tag.ct_eq(&packet[tag_start..]).unwrap_u8() != 1 {
            return Err(Error::ErrSrtpAuthTagMismatch);
        }

        packet.truncate(tag_start);
        let header_len = rtp_header_len(packet)?;
        let iv = packet_iv(&self.keys.salt, ssrc, index);
        let mut cipher = Aes128Ctr::new(&self.keys.enc_key.into(), &iv.into());
        cipher.apply_keystream(&mut packet[header_len..]);

        self.rocs.insert(ssrc, roc);
        self.last_seqs.insert(ssrc, seq);
        self.replay_windows.entry(ssrc).or_default().record(index);
        Ok(())
    }

    fn auth_tag(&self, content: &[u8], roc: u32) -> [u8; AUTH_TAG_LEN] {
        let mut mac = HmacSha1::new_from_slice(&self.keys.auth_key).expect("hmac accepts any key length");
        mac.update(content);
        mac.update(&roc.to_be_bytes());
        let full = mac.finalize().into_bytes();
        let mut tag = [0u8; AUTH_TAG_LEN];
        tag.copy_from_slice(&full[..AUTH_TAG_LEN]);
        tag
    }

    fn advance_roc_for_send(&mut self, ssrc: u32, seq: u16) -> u32 {
        let Some(&last_seq) = self.last_seqs.get(&ssrc) else {
            self.last_seqs.insert(ssrc, seq);
            self.rocs.insert(ssrc, 0);
            return 0;
        };
        let mut roc = *self.rocs.get(&ssrc).unwrap_or(&0);
        if seq < last_seq && (last_seq as u32).wrapping_sub(seq as u32) > 1000 {
            roc = roc.wrapping_add(1);
        }
        self.last_seqs.insert(ssrc, seq);
        self.rocs.insert(ssrc, roc);
        roc
    }

    fn estimate_roc(&self, ssrc: u32, seq: u16) -> u32 {
        let Some(&last_seq) = self.last_seqs.get(&ssrc) else {
            return 0;
        };
        let last_roc = *self.rocs.get(&ssrc).unwrap_or(&0);
        let delta = seq as i32 - last_seq as i32;
        if delta <= -32768 {
            last_roc.wrapping_add(1)
        } else if delta >= 32768 {
            last_roc.wrapping_sub(1)
        } else {
            last_roc
        }
    }
}

fn rtp_header_len(packet: &[u8]) -> Result<usize> {
    if packet.len() < 12 {
        return Err(Error::ErrRtpHeaderTooShort);
    }
    let cc = (packet[0] & 0x0F) as usize;
    let has_extension = packet[0] & 0x10 != 0;
    let mut len = 12 + cc * 4;
    if has_extension {
        if packet.len() < len + 4 {
            return Err(Error::ErrRtpHeaderTooShort);
        }
        let ext_words = BigEndian::read_u16(&packet[len + 2..len + 4]) as usize;
        len += 4 + ext_words * 4;
    }
    if packet.len() < len {
        return Err(Error::ErrRtpHeaderTooShort);
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn master() -> MasterKeys {
        MasterKeys {
            master_key: vec![0x11; 16],
            master_salt: vec![0x22; 14],
        }
    }

    fn rtp_packet(seq: u16, ssrc: u32) -> Vec<u8> {
        let mut p = vec![0x80, 0x60, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        BigEndian::write_u16(&mut p[2..4], seq);
        BigEndian::write_u32(&mut p[8..12], ssrc);
        p.extend_from_slice(b"payload-bytes");
        p
    }

    #[test]
    fn protect_then_unprotect_recovers_the_original_packet() {
        let mut tx = SrtpContext::new(master());
        let mut rx = SrtpContext::new(master());

        let original = rtp_packet(1, 0xABCD);
        let mut packet = original.clone();
        tx.protect(&mut packet).unwrap();
        assert!(packet.len() > original.len());

        rx.unprotect(&mut packet).unwrap();
        assert_eq!(packet, original);
    }

    #[test]
    fn tampered_payload_fails_authentication() {
        let mut tx = SrtpContext::new(master());
        let mut rx = SrtpContext::new(master());

        let mut packet = rtp_packet(1, 1);
        tx.protect(&mut packet).unwrap();
        let last = packet.len() - 1;
        packet[last] ^= 0xFF;

        assert!(matches!(rx.unprotect(&mut packet), Err(Error::ErrSrtpAuthTagMismatch)));
    }

    #[test]
    fn replayed_packet_is_rejected() {
        let mut tx = SrtpContext::new(master());
        let mut rx = SrtpContext::new(master());

        let mut packet = rtp_packet(1, 1);
        tx.protect(&mut packet).unwrap();
        let mut replay = packet.clone();
        rx.unprotect(&mut packet).unwrap();

        assert!(matches!(rx.unprotect(&mut replay), Err(Error::ErrSrtpReplayed(_))));
    }

    #[test]
    fn a_single_context_serves_multiple_ssrcs() {
        let mut tx = SrtpContext::new(master());
        let mut rx = SrtpContext::new(master());

        let mut a = rtp_packet(1, 100);
        let mut b = rtp_packet(1, 200);
        tx.protect(&mut a).unwrap();
        tx.protect(&mut b).unwrap();

        assert!(rx.unprotect(&mut a).is_ok());
        assert!(rx.unprotect(&mut b).is_ok());
    }
}
