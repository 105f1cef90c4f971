use byteorder::{BigEndian, ByteOrder};

use streamer_shared::{Error, Result};

use crate::header::{Header, HEADER_LEN, PT_SR};
use crate::reception_report::{ReceptionReport, REPORT_BLOCK_LEN};

const SR_FIXED_LEN: usize = 20;

/// Sender Report, emitted every 500 ms by a send stream (spec §4.6).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderReport {
    pub ssrc: u32,
    pub ntp_time: u64,
    pub rtp_time: u32,
    pub packet_count: u32,
    pub octet_count: u32,
    pub reports: Vec<ReceptionReport>,
}

impl SenderReport {
    pub fn marshal(&self) -> Result<Vec<u8>> {
        if self.reports.len() > 31 {
            return Err(Error::ErrRtcpTooManyReports);
        }
        let body_len = SR_FIXED_LEN + self.reports.len() * REPORT_BLOCK_LEN;
        let words = (HEADER_LEN + body_len) / 4 - 1;
        let header = Header::new(PT_SR, self.reports.len() as u8, words as u16);

        let mut out = Vec::with_capacity(HEADER_LEN + body_len);
        header.marshal_to(&mut out);
        out.extend_from_slice(&self.ssrc.to_be_bytes());
        out.extend_from_slice(&self.ntp_time.to_be_bytes());
        out.extend_from_slice(&self.rtp_time.to_be_bytes());
        out.extend_from_slice(&self.packet_count.to_be_bytes());
        out.extend_from_slice(&self.octet_count.to_be_bytes());
        for report in &self.reports {
            report.marshal_to(&mut out);
        }
        Ok(out)
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        let header = Header::unmarshal(buf)?;
        if header.packet_type != PT_SR {
            return Err(Error::ErrRtcpWrongType(header.packet_type, PT_SR));
        }
        if buf.len() < HEADER_LEN + SR_FIXED_LEN {
            return Err(Error::ErrRtcpPacketTooShort);
        }
        let body = &buf[HEADER_LEN..];
        let ssrc = BigEndian::read_u32(&body[0..4]);
        let ntp_time = BigEndian::read_u64(&body[4..12]);
        let rtp_time = BigEndian::read_u32(&body[12..16]);
        let packet_count = BigEndian::read_u32(&body[16..20]);
        let octet_count = BigEndian::read_u32(&body[20..24]);

        let mut reports = Vec::with_capacity(header.count as usize);
        let mut offset = SR_FIXED_LEN;
        for _ in 0..header.count {
            if body.len() < offset + REPORT_BLOCK_LEN {
                return Err(Error::ErrRtcpPacketTooShort);
            }
            reports.push(ReceptionReport::unmarshal(&body[offset..offset + REPORT_BLOCK_LEN])?);
            offset += REPORT_BLOCK_LEN;
        }

        Ok(Self {
            ssrc,
            ntp_time,
            rtp_time,
            packet_count,
            octet_count,
            reports,
        })
    }
}
