use byteorder::ByteOrder;
use streamer_shared::{Error, Result};

use crate::header::{Header, HEADER_LEN, PT_SDES};

pub const SDES_TYPE_CNAME: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesItem {
    pub item_type: u8,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesChunk {
    pub ssrc: u32,
    pub items: Vec<SdesItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceDescription {
    pub chunks: Vec<SdesChunk>,
}

impl SourceDescription {
    pub fn marshal(&self) -> Result<Vec<u8>> {
        if self.chunks.len() > 31 {
            return Err(Error::ErrRtcpTooManyReports);
        }
        let mut body = Vec::new();
        for chunk in &self.chunks {
            body.extend_from_slice(&chunk.ssrc.to_be_bytes());
            for item in &chunk.items {
                if item.text.len() > u8::MAX as usize {
                    return Err(Error::ErrRtcpPacketTooShort);
                }
                body.push(item.item_type);
                body.push(item.text.len() as u8);
                body.extend_from_slice(item.text.as_bytes());
            }
            body.push(0); // end-of-items marker
            while body.len() % 4 != 0 {
                body.push(0);
            }
        }
        let words = (HEADER_LEN + body.len()) / 4 - 1;
        let header = Header::new(PT_SDES, self.chunks.len() as u8, words as u16);
        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        header.marshal_to(&mut out);
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        let header = Header::unmarshal(buf)?;
        if header.packet_type != PT_SDES {
            return Err(Error::ErrRtcpWrongType(header.packet_type, PT_SDES));
        }
        let body = &buf[HEADER_LEN..];
        let mut chunks = Vec::with_capacity(header.count as usize);
        let mut offset = 0;
        for _ in 0..header.count {
            if body.len() < offset + 4 {
                return Err(Error::ErrRtcpPacketTooShort);
            }
            let ssrc = byteorder::BigEndian::read_u32(&body[offset..offset + 4]);
            offset += 4;
            let mut items = Vec::new();
            loop {
                if offset >= body.len() {
                    return Err(Error::ErrRtcpPacketTooShort);
                }
                let item_type = body[offset];
                offset += 1;
                if item_type == 0 {
                    break;
                }
                if offset >= body.len() {
                    return Err(Error::ErrRtcpPacketTooShort);
                }
                let len = body[offset] as usize;
                offset += 1;
                if body.len() < offset + len {
                    return Err(Error::ErrRtcpPacketTooShort);
                }
                let text = String::from_utf8(body[offset..offset + len].to_vec())
                    .map_err(|_| Error::ErrRtcpPacketTooShort)?;
                offset += len;
                items.push(SdesItem { item_type, text });
            }
            while offset % 4 != 0 {
                offset += 1;
            }
            chunks.push(SdesChunk { ssrc, items });
        }
        Ok(Self { chunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_cname() {
        let sdes = SourceDescription {
            chunks: vec![SdesChunk {
                ssrc: 0xAABBCCDD,
                items: vec![SdesItem {
                    item_type: SDES_TYPE_CNAME,
                    text: "user@host".to_string(),
                }],
            }],
        };
        let wire = sdes.marshal().unwrap();
        assert_eq!(wire.len() % 4, 0);
        assert_eq!(SourceDescription::unmarshal(&wire).unwrap(), sdes);
    }

    #[test]
    fn round_trip_multiple_chunks() {
        let sdes = SourceDescription {
            chunks: vec![
                SdesChunk { ssrc: 1, items: vec![SdesItem { item_type: 1, text: "a".into() }] },
                SdesChunk { ssrc: 2, items: vec![SdesItem { item_type: 1, text: "bb".into() }] },
            ],
        };
        let wire = sdes.marshal().unwrap();
        assert_eq!(SourceDescription::unmarshal(&wire).unwrap(), sdes);
    }
}
