use byteorder::{BigEndian, ByteOrder};

use streamer_shared::{Error, Result};

use crate::header::{Header, HEADER_LEN, PT_RR};
use crate::reception_report::{ReceptionReport, REPORT_BLOCK_LEN};

const RR_FIXED_LEN: usize = 4;

/// Receiver Report, built on the receive stream's periodic tick
/// (spec §4.7).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverReport {
    pub ssrc: u32,
    pub reports: Vec<ReceptionReport>,
}

impl ReceiverReport {
    pub fn marshal(&self) -> Result<Vec<u8>> {
        if self.reports.len() > 31 {
            return Err(Error::ErrRtcpTooManyReports);
        }
        let body_len = RR_FIXED_LEN + self.reports.len() * REPORT_BLOCK_LEN;
        let words = (HEADER_LEN + body_len) / 4 - 1;
        let header = Header::new(PT_RR, self.reports.len() as u8, words as u16);

        let mut out = Vec::with_capacity(HEADER_LEN + body_len);
        header.marshal_to(&mut out);
        out.extend_from_slice(&self.ssrc.to_be_bytes());
        for report in &self.reports {
            report.marshal_to(&mut out);
        }
        Ok(out)
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        let header = Header::unmarshal(buf)?;
        if header.packet_type != PT_RR {
            return Err(Error::ErrRtcpWrongType(header.packet_type, PT_RR));
        }
        if buf.len() < HEADER_LEN + RR_FIXED_LEN {
            return Err(Error::ErrRtcpPacketTooShort);
        }
        let body = &buf[HEADER_LEN..];
        let ssrc = BigEndian::read_u32(&body[0..4]);

        let mut reports = Vec::with_capacity(header.count as usize);
        let mut offset = RR_FIXED_LEN;
        for _ in 0..header.count {
            if body.len() < offset + REPORT_BLOCK_LEN {
                return Err(Error::ErrRtcpPacketTooShort);
            }
            reports.push(ReceptionReport::unmarshal(&body[offset..offset + REPORT_BLOCK_LEN])?);
            offset += REPORT_BLOCK_LEN;
        }
        Ok(Self { ssrc, reports })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let rr = ReceiverReport {
            ssrc: 42,
            reports: vec![ReceptionReport {
                ssrc: 7,
                fraction_lost: 1,
                total_lost: 2,
                last_sequence_number: 3,
                jitter: 4,
                last_sender_report: 5,
                delay_since_last_sender_report: 6,
            }],
        };
        let wire = rr.marshal().unwrap();
        assert_eq!(ReceiverReport::unmarshal(&wire).unwrap(), rr);
    }
}
