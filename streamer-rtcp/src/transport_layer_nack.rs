//! Generic NACK (RFC 4585 §6.2.1), RTPFB FMT 1. Each FCI entry is a
//! 16-bit base packet id (PID) followed by a 16-bit bitmask (BLP) of up
//! to 16 additional lost packets immediately after it.

use byteorder::{BigEndian, ByteOrder};

use streamer_shared::{Error, Result};

use crate::header::{Header, FMT_NACK, HEADER_LEN, PT_RTPFB};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NackPair {
    pub packet_id: u16,
    /// Bit `i` (0 = least significant) set means sequence
    /// `packet_id + i + 1` is also missing.
    pub lost_packets: u16,
}

impl NackPair {
    /// The full recovered sequence set for this pair: the base PID plus,
    /// for each set bit `i` (0 = least significant) of `lost_packets`,
    /// `packet_id + i + 1` (RFC 4585 §6.2.1).
    pub fn sequence_numbers(&self) -> Vec<u16> {
        let mut out = vec![self.packet_id];
        for i in 0..16u16 {
            if self.lost_packets & (1 << i) != 0 {
                out.push(self.packet_id.wrapping_add(i + 1));
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportLayerNack {
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
    pub nacks: Vec<NackPair>,
}

impl TransportLayerNack {
    pub fn marshal(&self) -> Result<Vec<u8>> {
        let mut body = Vec::with_capacity(8 + self.nacks.len() * 4);
        body.extend_from_slice(&self.sender_ssrc.to_be_bytes());
        body.extend_from_slice(&self.media_ssrc.to_be_bytes());
        for pair in &self.nacks {
            body.extend_from_slice(&pair.packet_id.to_be_bytes());
            body.extend_from_slice(&pair.lost_packets.to_be_bytes());
        }
        let words = (HEADER_LEN + body.len()) / 4 - 1;
        let header = Header::new(PT_RTPFB, FMT_NACK, words as u16);
        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        header.marshal_to(&mut out);
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        let header = Header::unmarshal(buf)?;
        if header.packet_type != PT_RTPFB {
            return Err(Error::ErrRtcpWrongType(header.packet_type, PT_RTPFB));
        }
        if header.count != FMT_NACK {
            return Err(Error::ErrRtcpWrongType(header.count, FMT_NACK));
        }
        let body = &buf[HEADER_LEN..];
        if body.len() < 8 || (body.len() - 8) % 4 != 0 {
            return Err(Error::ErrRtcpPacketTooShort);
        }
        let sender_ssrc = BigEndian::read_u32(&body[0..4]);
        let media_ssrc = BigEndian::read_u32(&body[4..8]);
        let mut nacks = Vec::new();
        let mut offset = 8;
        while offset + 4 <= body.len() {
            nacks.push(NackPair {
                packet_id: BigEndian::read_u16(&body[offset..offset + 2]),
                lost_packets: BigEndian::read_u16(&body[offset + 2..offset + 4]),
            });
            offset += 4;
        }
        Ok(Self { sender_ssrc, media_ssrc, nacks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let nack = TransportLayerNack {
            sender_ssrc: 1,
            media_ssrc: 2,
            nacks: vec![NackPair { packet_id: 1002, lost_packets: 0x0001 }],
        };
        let wire = nack.marshal().unwrap();
        assert_eq!(TransportLayerNack::unmarshal(&wire).unwrap(), nack);
    }

    #[test]
    fn property_p2_recovered_set_matches_bitmap() {
        // base PID 1002, bit 0 set -> covers 1002+0+1 = 1003
        let pair = NackPair { packet_id: 1002, lost_packets: 0x0001 };
        assert_eq!(pair.sequence_numbers(), vec![1002, 1003]);
    }

    #[test]
    fn scenario_s4_nack_round_trip() {
        // receiver observed {1000,1001,1004}; only 1002 and 1003 are
        // missing; base PID=1002 plus bit 0 set covers 1003
        let nack = TransportLayerNack {
            sender_ssrc: 0xAAAA,
            media_ssrc: 0xBBBB,
            nacks: vec![NackPair { packet_id: 1002, lost_packets: 0x0001 }],
        };
        assert_eq!(nack.nacks[0].sequence_numbers(), vec![1002, 1003]);
        let wire = nack.marshal().unwrap();
        assert_eq!(TransportLayerNack::unmarshal(&wire).unwrap(), nack);
    }

    #[test]
    fn multiple_bitmap_bits_recover_multiple_sequences() {
        // bits 0 and 2 set -> covers base, base+1, base+3
        let pair = NackPair { packet_id: 50, lost_packets: 0b0000_0000_0000_0101 };
        assert_eq!(pair.sequence_numbers(), vec![50, 51, 53]);
    }
}
