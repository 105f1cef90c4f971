//! RTP fixed header (RFC 3550 §5.1) plus the optional CSRC list and
//! extension block.

use byteorder::{BigEndian, ByteOrder};

use streamer_shared::{Error, Result};

use crate::extension::{self, Extension};

pub const VERSION: u8 = 2;
pub const FIXED_HEADER_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub padding: bool,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrc: Vec<u32>,
    /// `None` when the packet carries no extension block (X bit unset).
    pub extension_profile: Option<u16>,
    pub extensions: Vec<Extension>,
}

impl Header {
    pub fn new(payload_type: u8, sequence_number: u16, timestamp: u32, ssrc: u32) -> Self {
        Self {
            version: VERSION,
            padding: false,
            marker: false,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc: Vec::new(),
            extension_profile: None,
            extensions: Vec::new(),
        }
    }

    pub fn with_marker(mut self, marker: bool) -> Self {
        self.marker = marker;
        self
    }

    pub fn marshal_size(&self) -> usize {
        let mut size = FIXED_HEADER_LEN + self.csrc.len() * 4;
        if let Some(profile) = self.extension_profile {
            size += 4 + self.extension_payload_len(profile);
        }
        size
    }

    fn extension_payload_len(&self, profile: u16) -> usize {
        if extension::is_two_byte_profile(profile) {
            extension::serialize_two_byte(&self.extensions)
                .map(|b| b.len())
                .unwrap_or(0)
        } else {
            extension::serialize_one_byte(&self.extensions)
                .map(|b| b.len())
                .unwrap_or(0)
        }
    }

    pub fn marshal_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        if self.csrc.len() > 0x0F {
            return Err(Error::ErrRtpHeaderTooShort);
        }
        let has_extension = self.extension_profile.is_some();
        let vpxcc = (self.version << 6)
            | ((self.padding as u8) << 5)
            | ((has_extension as u8) << 4)
            | (self.csrc.len() as u8);
        let m_pt = ((self.marker as u8) << 7) | (self.payload_type & 0x7F);

        buf.push(vpxcc);
        buf.push(m_pt);
        buf.extend_from_slice(&self.sequence_number.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.ssrc.to_be_bytes());
        for csrc in &self.csrc {
            buf.extend_from_slice(&csrc.to_be_bytes());
        }

        if let Some(profile) = self.extension_profile {
            let payload = if extension::is_two_byte_profile(profile) {
                extension::serialize_two_byte(&self.extensions)?
            } else {
                extension::serialize_one_byte(&self.extensions)?
            };
            let words = (payload.len() / 4) as u16;
            buf.extend_from_slice(&profile.to_be_bytes());
            buf.extend_from_slice(&words.to_be_bytes());
            buf.extend_from_slice(&payload);
        }
        Ok(())
    }

    /// Parses a header from `buf`, returning the header and the number of
    /// bytes it consumed (so the caller can slice out the payload).
    pub fn unmarshal(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < FIXED_HEADER_LEN {
            return Err(Error::ErrRtpHeaderTooShort);
        }
        let vpxcc = buf[0];
        let m_pt = buf[1];

        let version = vpxcc >> 6;
        let padding = (vpxcc >> 5) & 1 != 0;
        let has_extension = (vpxcc >> 4) & 1 != 0;
        let cc = (vpxcc & 0x0F) as usize;

        let marker = m_pt >> 7 != 0;
        let payload_type = m_pt & 0x7F;

        let sequence_number = BigEndian::read_u16(&buf[2..4]);
        let timestamp = BigEndian::read_u32(&buf[4..8]);
        let ssrc = BigEndian::read_u32(&buf[8..12]);

        let mut offset = FIXED_HEADER_LEN;
        if buf.len() < offset + cc * 4 {
            return Err(Error::ErrRtpHeaderTooShort);
        }
        let mut csrc = Vec::with_capacity(cc);
        for _ in 0..cc {
            csrc.push(BigEndian::read_u32(&buf[offset..offset + 4]));
            offset += 4;
        }

        let mut extension_profile = None;
        let mut extensions = Vec::new();
        if has_extension {
            if buf.len() < offset + 4 {
                return Err(Error::ErrRtpHeaderTooShort);
            }
            let profile = BigEndian::read_u16(&buf[offset..offset + 2]);
            let words = BigEndian::read_u16(&buf[offset + 2..offset + 4]) as usize;
            offset += 4;
            let ext_len = words * 4;
            if buf.len() < offset + ext_len {
                return Err(Error::ErrRtpHeaderTooShort);
            }
            let payload = &buf[offset..offset + ext_len];
            extensions = if extension::is_two_byte_profile(profile) {
                extension::parse_two_byte(payload)?
            } else {
                extension::parse_one_byte(payload)?
            };
            extension_profile = Some(profile);
            offset += ext_len;
        }

        Ok((
            Self {
                version,
                padding,
                marker,
                payload_type,
                sequence_number,
                timestamp,
                ssrc,
                csrc,
                extension_profile,
                extensions,
            },
            offset,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_minimal_header() {
        let header = Header::new(96, 42, 9000, 0xAABBCCDD).with_marker(true);
        let mut buf = Vec::new();
        header.marshal_to(&mut buf).unwrap();
        let (decoded, consumed) = Header::unmarshal(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded, header);
    }

    #[test]
    fn round_trip_with_csrcs_and_one_byte_extension() {
        let mut header = Header::new(111, 1, 2, 3);
        header.csrc = vec![10, 20, 30];
        header.extension_profile = Some(extension::ONE_BYTE_PROFILE);
        header.extensions = vec![
            Extension { id: 1, payload: vec![0x11] },
            Extension { id: 2, payload: vec![0xAB, 0xCD] },
        ];
        let mut buf = Vec::new();
        header.marshal_to(&mut buf).unwrap();
        let (decoded, consumed) = Header::unmarshal(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded, header);
    }

    #[test]
    fn round_trip_with_two_byte_extension() {
        let mut header = Header::new(111, 1, 2, 3);
        header.extension_profile = Some(0x1000);
        header.extensions = vec![Extension { id: 9, payload: vec![] }];
        let mut buf = Vec::new();
        header.marshal_to(&mut buf).unwrap();
        let (decoded, _) = Header::unmarshal(&buf).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn too_short_buffer_is_rejected() {
        let buf = [0u8; 11];
        assert!(matches!(Header::unmarshal(&buf), Err(Error::ErrRtpHeaderTooShort)));
    }

    #[test]
    fn csrc_count_mismatch_is_rejected() {
        let mut buf = vec![0x82, 0x60, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]; // cc = 2
        buf.extend_from_slice(&[0, 0, 0, 1]); // only one CSRC present
        assert!(matches!(Header::unmarshal(&buf), Err(Error::ErrRtpHeaderTooShort)));
    }
}
