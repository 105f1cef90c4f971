//! RTCP XR (RFC 3611). Only the two block types this workspace's RTT
//! estimation needs are modelled: Receiver Reference Time (BT=4) and
//! DLRR (BT=5); any other block type round-trips as opaque bytes.

use byteorder::{BigEndian, ByteOrder};

use streamer_shared::{Error, Result};

use crate::header::{Header, HEADER_LEN, PT_XR};

pub const BT_RRT: u8 = 4;
pub const BT_DLRR: u8 = 5;

const XR_BLOCK_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DlrrReport {
    pub ssrc: u32,
    /// Low 32 bits of the NTP timestamp from the RRT block that this
    /// report answers.
    pub last_rr: u32,
    /// Elapsed time since that RRT was received, in 1/65536-second
    /// units (same encoding as SR/RR's DLSR).
    pub delay_since_last_rr: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XrBlock {
    Rrt { ntp_timestamp: u64 },
    Dlrr { reports: Vec<DlrrReport> },
    Unknown { block_type: u8, raw: Vec<u8> },
}

impl XrBlock {
    fn marshal_to(&self, buf: &mut Vec<u8>) {
        match self {
            XrBlock::Rrt { ntp_timestamp } => {
                buf.push(BT_RRT);
                buf.push(0);
                buf.extend_from_slice(&2u16.to_be_bytes());
                buf.extend_from_slice(&ntp_timestamp.to_be_bytes());
            }
            XrBlock::Dlrr { reports } => {
                buf.push(BT_DLRR);
                buf.push(0);
                buf.extend_from_slice(&((reports.len() * 3) as u16).to_be_bytes());
                for r in reports {
                    buf.extend_from_slice(&r.ssrc.to_be_bytes());
                    buf.extend_from_slice(&r.last_rr.to_be_bytes());
                    buf.extend_from_slice(&r.delay_since_last_rr.to_be_bytes());
                }
            }
            XrBlock::Unknown { block_type, raw } => {
                buf.push(*block_type);
                buf.push(0);
                buf.extend_from_slice(&((raw.len() / 4) as u16).to_be_bytes());
                buf.extend_from_slice(raw);
            }
        }
    }

    fn unmarshal(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < XR_BLOCK_HEADER_LEN {
            return Err(Error::ErrRtcpPacketTooShort);
        }
        let block_type = buf[0];
        let len_words = BigEndian::read_u16(&buf[2..4]) as usize;
        let body_len = len_words * 4;
        if buf.len() < XR_BLOCK_HEADER_LEN + body_len {
            return Err(Error::ErrRtcpPacketTooShort);
        }
        let body = &buf[XR_BLOCK_HEADER_LEN..XR_BLOCK_HEADER_LEN + body_len];
        let block = match block_type {
            BT_RRT if body.len() >= 8 => XrBlock::Rrt {
                ntp_timestamp: BigEndian::read_u64(&body[0..8]),
            },
            BT_DLRR => {
                let mut reports = Vec::with_capacity(body.len() / 12);
                let mut offset = 0;
                while offset + 12 <= body.len() {
                    reports.push(DlrrReport {
                        ssrc: BigEndian::read_u32(&body[offset..offset + 4]),
                        last_rr: BigEndian::read_u32(&body[offset + 4..offset + 8]),
                        delay_since_last_rr: BigEndian::read_u32(&body[offset + 8..offset + 12]),
                    });
                    offset += 12;
                }
                XrBlock::Dlrr { reports }
            }
            other => XrBlock::Unknown { block_type: other, raw: body.to_vec() },
        };
        Ok((block, XR_BLOCK_HEADER_LEN + body_len))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedReport {
    pub sender_ssrc: u32,
    pub blocks: Vec<XrBlock>,
}

impl ExtendedReport {
    pub fn marshal(&self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.sender_ssrc.to_be_bytes());
        for block in &self.blocks {
            block.marshal_to(&mut body);
        }
        let words = (HEADER_LEN + body.len()) / 4 - 1;
        let header = Header::new(PT_XR, 0, words as u16);
        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        header.marshal_to(&mut out);
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        let header = Header::unmarshal(buf)?;
        if header.packet_type != PT_XR {
            return Err(Error::ErrRtcpWrongType(header.packet_type, PT_XR));
        }
        let body = &buf[HEADER_LEN..];
        if body.len() < 4 {
            return Err(Error::ErrRtcpPacketTooShort);
        }
        let sender_ssrc = BigEndian::read_u32(&body[0..4]);
        let mut blocks = Vec::new();
        let mut offset = 4;
        while offset < body.len() {
            let (block, consumed) = XrBlock::unmarshal(&body[offset..])?;
            blocks.push(block);
            offset += consumed;
        }
        Ok(Self { sender_ssrc, blocks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_rrt_block() {
        let xr = ExtendedReport {
            sender_ssrc: 1,
            blocks: vec![XrBlock::Rrt { ntp_timestamp: 0x1122_3344_5566_7788 }],
        };
        let wire = xr.marshal().unwrap();
        assert_eq!(ExtendedReport::unmarshal(&wire).unwrap(), xr);
    }

    #[test]
    fn round_trip_dlrr_block() {
        let xr = ExtendedReport {
            sender_ssrc: 2,
            blocks: vec![XrBlock::Dlrr {
                reports: vec![DlrrReport { ssrc: 9, last_rr: 10, delay_since_last_rr: 11 }],
            }],
        };
        let wire = xr.marshal().unwrap();
        assert_eq!(ExtendedReport::unmarshal(&wire).unwrap(), xr);
    }

    #[test]
    fn round_trip_both_blocks_together() {
        let xr = ExtendedReport {
            sender_ssrc: 3,
            blocks: vec![
                XrBlock::Rrt { ntp_timestamp: 42 },
                XrBlock::Dlrr { reports: vec![DlrrReport { ssrc: 1, last_rr: 2, delay_since_last_rr: 3 }] },
            ],
        };
        let wire = xr.marshal().unwrap();
        assert_eq!(ExtendedReport::unmarshal(&wire).unwrap(), xr);
    }
}
