//! Common RTCP header (RFC 3550 §6.4.1): 4 bytes shared by every RTCP
//! packet type. `count` doubles as the report/source count for SR/RR/SDES/
//! BYE and as the feedback message type (FMT) for RTPFB/PSFB.

use byteorder::{BigEndian, ByteOrder};

use streamer_shared::{Error, Result};

pub const HEADER_LEN: usize = 4;
pub const VERSION: u8 = 2;

pub const PT_SR: u8 = 200;
pub const PT_RR: u8 = 201;
pub const PT_SDES: u8 = 202;
pub const PT_BYE: u8 = 203;
pub const PT_APP: u8 = 204;
pub const PT_RTPFB: u8 = 205;
pub const PT_PSFB: u8 = 206;
pub const PT_XR: u8 = 207;

pub const FMT_NACK: u8 = 1;
pub const FMT_PLI: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub padding: bool,
    pub count: u8,
    pub packet_type: u8,
    /// Length of the packet body in 32-bit words, minus one (the header
    /// word itself is excluded per RFC 3550).
    pub length: u16,
}

impl Header {
    pub fn new(packet_type: u8, count: u8, length: u16) -> Self {
        Self {
            padding: false,
            count,
            packet_type,
            length,
        }
    }

    pub fn marshal_to(&self, buf: &mut Vec<u8>) {
        let b0 = (VERSION << 6) | ((self.padding as u8) << 5) | (self.count & 0x1F);
        buf.push(b0);
        buf.push(self.packet_type);
        buf.extend_from_slice(&self.length.to_be_bytes());
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(Error::ErrRtcpHeaderTooSmall);
        }
        let b0 = buf[0];
        let version = b0 >> 6;
        if version != VERSION {
            return Err(Error::ErrRtcpBadVersion);
        }
        Ok(Self {
            padding: (b0 >> 5) & 1 != 0,
            count: b0 & 0x1F,
            packet_type: buf[1],
            length: BigEndian::read_u16(&buf[2..4]),
        })
    }

    /// Total packet size in bytes implied by `length`.
    pub fn packet_len(&self) -> usize {
        (self.length as usize + 1) * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let header = Header::new(PT_SR, 3, 7);
        let mut buf = Vec::new();
        header.marshal_to(&mut buf);
        let decoded = Header::unmarshal(&buf).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn rejects_wrong_version() {
        let buf = [0x00, PT_SR, 0, 0];
        assert!(matches!(Header::unmarshal(&buf), Err(Error::ErrRtcpBadVersion)));
    }

    #[test]
    fn packet_len_converts_words_to_bytes() {
        let header = Header::new(PT_RR, 0, 1);
        assert_eq!(header.packet_len(), 8);
    }
}
