//! Picture Loss Indication (RFC 4585 §6.3.1), PSFB FMT 1. Sent by a
//! receive stream when depacketization fails or a gap never resolves
//! (spec §4.7), rate-limited to once per 5 s by the caller.

use byteorder::{BigEndian, ByteOrder};

use streamer_shared::{Error, Result};

use crate::header::{Header, FMT_PLI, HEADER_LEN, PT_PSFB};

const PLI_LEN: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PictureLossIndication {
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
}

impl PictureLossIndication {
    pub fn marshal(&self) -> Vec<u8> {
        let header = Header::new(PT_PSFB, FMT_PLI, (HEADER_LEN + PLI_LEN) as u16 / 4 - 1);
        let mut out = Vec::with_capacity(HEADER_LEN + PLI_LEN);
        header.marshal_to(&mut out);
        out.extend_from_slice(&self.sender_ssrc.to_be_bytes());
        out.extend_from_slice(&self.media_ssrc.to_be_bytes());
        out
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        let header = Header::unmarshal(buf)?;
        if header.packet_type != PT_PSFB {
            return Err(Error::ErrRtcpWrongType(header.packet_type, PT_PSFB));
        }
        if header.count != FMT_PLI {
            return Err(Error::ErrRtcpWrongType(header.count, FMT_PLI));
        }
        let body = &buf[HEADER_LEN..];
        if body.len() < PLI_LEN {
            return Err(Error::ErrRtcpPacketTooShort);
        }
        Ok(Self {
            sender_ssrc: BigEndian::read_u32(&body[0..4]),
            media_ssrc: BigEndian::read_u32(&body[4..8]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let pli = PictureLossIndication { sender_ssrc: 11, media_ssrc: 22 };
        let wire = pli.marshal();
        assert_eq!(PictureLossIndication::unmarshal(&wire).unwrap(), pli);
    }
}
