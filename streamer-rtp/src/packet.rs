//! A parsed RTP packet: header plus payload and any trailing padding.
//!
//! Lifecycle per spec: created on receive (`unmarshal`) or by the
//! packetizers in [`crate::h264`]/[`crate::opus`], then cloned into a
//! retransmit ring buffer by the send stream.

use streamer_shared::{Error, Result};

use crate::header::Header;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Vec<u8>,
    /// Count encoded in the trailing padding byte, 0 if the packet carries
    /// no padding. Kept separate from `payload` so a byte-for-byte
    /// round-trip doesn't need to special-case the P bit.
    pub padding_len: u8,
}

impl Packet {
    pub fn new(header: Header, payload: Vec<u8>) -> Self {
        Self {
            header,
            payload,
            padding_len: 0,
        }
    }

    pub fn marshal(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.header.marshal_size() + self.payload.len() + 4);
        let mut header = self.header.clone();
        header.padding = self.padding_len > 0;
        header.marshal_to(&mut out)?;
        out.extend_from_slice(&self.payload);
        if self.padding_len > 0 {
            if self.padding_len > 1 {
                out.resize(out.len() + self.padding_len as usize - 1, 0);
            }
            out.push(self.padding_len);
        }
        Ok(out)
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        let (header, header_len) = Header::unmarshal(buf)?;
        let mut payload_end = buf.len();
        let mut padding_len = 0u8;

        if header.padding {
            if payload_end == header_len {
                return Err(Error::ErrRtpHeaderTooShort);
            }
            let pad = buf[payload_end - 1];
            if pad == 0 || pad as usize > payload_end - header_len {
                return Err(Error::ErrRtpHeaderTooShort);
            }
            padding_len = pad;
            payload_end -= pad as usize;
        }

        Ok(Self {
            header,
            payload: buf[header_len..payload_end].to_vec(),
            padding_len,
        })
    }
}
