use byteorder::{BigEndian, ByteOrder};

use streamer_shared::{Error, Result};

use crate::header::{Header, HEADER_LEN, PT_BYE};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Goodbye {
    pub sources: Vec<u32>,
    pub reason: Option<String>,
}

impl Goodbye {
    pub fn marshal(&self) -> Result<Vec<u8>> {
        if self.sources.len() > 31 {
            return Err(Error::ErrRtcpTooManyReports);
        }
        let mut body = Vec::new();
        for ssrc in &self.sources {
            body.extend_from_slice(&ssrc.to_be_bytes());
        }
        if let Some(reason) = &self.reason {
            if reason.len() > u8::MAX as usize {
                return Err(Error::ErrRtcpPacketTooShort);
            }
            body.push(reason.len() as u8);
            body.extend_from_slice(reason.as_bytes());
        }
        while body.len() % 4 != 0 {
            body.push(0);
        }
        let words = (HEADER_LEN + body.len()) / 4 - 1;
        let header = Header::new(PT_BYE, self.sources.len() as u8, words as u16);
        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        header.marshal_to(&mut out);
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        let header = Header::unmarshal(buf)?;
        if header.packet_type != PT_BYE {
            return Err(Error::ErrRtcpWrongType(header.packet_type, PT_BYE));
        }
        let body = &buf[HEADER_LEN..];
        let src_len = header.count as usize * 4;
        if body.len() < src_len {
            return Err(Error::ErrRtcpPacketTooShort);
        }
        let mut sources = Vec::with_capacity(header.count as usize);
        for i in 0..header.count as usize {
            sources.push(BigEndian::read_u32(&body[i * 4..i * 4 + 4]));
        }
        let mut reason = None;
        if body.len() > src_len {
            let len = body[src_len] as usize;
            let start = src_len + 1;
            if body.len() < start + len {
                return Err(Error::ErrRtcpPacketTooShort);
            }
            reason = Some(
                String::from_utf8(body[start..start + len].to_vec())
                    .map_err(|_| Error::ErrRtcpPacketTooShort)?,
            );
        }
        Ok(Self { sources, reason })
    }
}
