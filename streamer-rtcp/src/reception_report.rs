//! The 24-byte report block carried inside SR and RR packets
//! (RFC 3550 §6.4.1/§6.4.2).

use byteorder::{BigEndian, ByteOrder};

use streamer_shared::{Error, Result};

pub const REPORT_BLOCK_LEN: usize = 24;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceptionReport {
    pub ssrc: u32,
    pub fraction_lost: u8,
    /// 24-bit cumulative lost count, stored widened.
    pub total_lost: u32,
    /// Extended highest sequence number received: cycles in the high 16
    /// bits, the plain sequence number in the low 16.
    pub last_sequence_number: u32,
    pub jitter: u32,
    /// Low 32 bits of the last SR's NTP timestamp.
    pub last_sender_report: u32,
    /// Delay since the last SR, in 1/65536-second units.
    pub delay_since_last_sender_report: u32,
}

impl ReceptionReport {
    pub fn marshal_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.ssrc.to_be_bytes());
        let cl = self.total_lost & 0x00FF_FFFF;
        buf.push(self.fraction_lost);
        buf.push(((cl >> 16) & 0xFF) as u8);
        buf.push(((cl >> 8) & 0xFF) as u8);
        buf.push((cl & 0xFF) as u8);
        buf.extend_from_slice(&self.last_sequence_number.to_be_bytes());
        buf.extend_from_slice(&self.jitter.to_be_bytes());
        buf.extend_from_slice(&self.last_sender_report.to_be_bytes());
        buf.extend_from_slice(&self.delay_since_last_sender_report.to_be_bytes());
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        if buf.len() < REPORT_BLOCK_LEN {
            return Err(Error::ErrRtcpPacketTooShort);
        }
        let total_lost = ((buf[5] as u32) << 16) | ((buf[6] as u32) << 8) | buf[7] as u32;
        Ok(Self {
            ssrc: BigEndian::read_u32(&buf[0..4]),
            fraction_lost: buf[4],
            total_lost,
            last_sequence_number: BigEndian::read_u32(&buf[8..12]),
            jitter: BigEndian::read_u32(&buf[12..16]),
            last_sender_report: BigEndian::read_u32(&buf[16..20]),
            delay_since_last_sender_report: BigEndian::read_u32(&buf[20..24]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let report = ReceptionReport {
            ssrc: 0xBC5E9A40,
            fraction_lost: 10,
            total_lost: 0x00FFEE,
            last_sequence_number: 0x0001_46E1,
            jitter: 273,
            last_sender_report: 0x1234_5678,
            delay_since_last_sender_report: 0x9ABC_DEF0,
        };
        let mut buf = Vec::new();
        report.marshal_to(&mut buf);
        assert_eq!(buf.len(), REPORT_BLOCK_LEN);
        assert_eq!(ReceptionReport::unmarshal(&buf).unwrap(), report);
    }
}
