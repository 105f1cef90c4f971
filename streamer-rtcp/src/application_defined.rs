use byteorder::{BigEndian, ByteOrder};

use streamer_shared::{Error, Result};

use crate::header::{Header, HEADER_LEN, PT_APP};

/// Application-defined RTCP packet (RFC 3550 §6.7). Carries a 4-byte
/// ASCII name plus an opaque data blob; this workspace doesn't interpret
/// any particular name, only round-trips the packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationDefined {
    pub subtype: u8,
    pub source_ssrc: u32,
    pub name: [u8; 4],
    pub data: Vec<u8>,
}

impl ApplicationDefined {
    pub fn marshal(&self) -> Result<Vec<u8>> {
        let mut body = Vec::with_capacity(8 + self.data.len());
        body.extend_from_slice(&self.source_ssrc.to_be_bytes());
        body.extend_from_slice(&self.name);
        body.extend_from_slice(&self.data);
        while body.len() % 4 != 0 {
            body.push(0);
        }
        let words = (HEADER_LEN + body.len()) / 4 - 1;
        let header = Header::new(PT_APP, self.subtype & 0x1F, words as u16);
        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        header.marshal_to(&mut out);
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        let header = Header::unmarshal(buf)?;
        if header.packet_type != PT_APP {
            return Err(Error::ErrRtcpWrongType(header.packet_type, PT_APP));
        }
        let body = &buf[HEADER_LEN..];
        if body.len() < 8 {
            return Err(Error::ErrRtcpPacketTooShort);
        }
        let mut name = [0u8; 4];
        name.copy_from_slice(&body[4..8]);
        Ok(Self {
            subtype: header.count,
            source_ssrc: BigEndian::read_u32(&body[0..4]),
            name,
            data: body[8..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let app = ApplicationDefined {
            subtype: 0,
            source_ssrc: 99,
            name: *b"test",
            data: vec![1, 2, 3, 4],
        };
        let wire = app.marshal().unwrap();
        assert_eq!(ApplicationDefined::unmarshal(&wire).unwrap(), app);
    }
}
