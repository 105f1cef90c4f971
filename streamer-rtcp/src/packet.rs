//! Compound-packet dispatch: a single UDP datagram may carry several
//! concatenated RTCP packets back to back (RFC 3550 §6.1).

use streamer_shared::{Error, Result};

use crate::application_defined::ApplicationDefined;
use crate::extended_report::ExtendedReport;
use crate::goodbye::Goodbye;
use crate::header::{Header, HEADER_LEN, PT_APP, PT_BYE, PT_PSFB, PT_RR, PT_RTPFB, PT_SDES, PT_SR, PT_XR};
use crate::picture_loss_indication::PictureLossIndication;
use crate::receiver_report::ReceiverReport;
use crate::sender_report::SenderReport;
use crate::source_description::SourceDescription;
use crate::transport_layer_nack::TransportLayerNack;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    SenderReport(SenderReport),
    ReceiverReport(ReceiverReport),
    SourceDescription(SourceDescription),
    Goodbye(Goodbye),
    ApplicationDefined(ApplicationDefined),
    Nack(TransportLayerNack),
    Pli(PictureLossIndication),
    ExtendedReport(ExtendedReport),
}

impl Packet {
    pub fn marshal(&self) -> Result<Vec<u8>> {
        match self {
            Packet::SenderReport(p) => p.marshal(),
            Packet::ReceiverReport(p) => p.marshal(),
            Packet::SourceDescription(p) => p.marshal(),
            Packet::Goodbye(p) => p.marshal(),
            Packet::ApplicationDefined(p) => p.marshal(),
            Packet::Nack(p) => p.marshal(),
            Packet::Pli(p) => Ok(p.marshal()),
            Packet::ExtendedReport(p) => p.marshal(),
        }
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        let header = Header::unmarshal(buf)?;
        match header.packet_type {
            PT_SR => Ok(Packet::SenderReport(SenderReport::unmarshal(buf)?)),
            PT_RR => Ok(Packet::ReceiverReport(ReceiverReport::unmarshal(buf)?)),
            PT_SDES => Ok(Packet::SourceDescription(SourceDescription::unmarshal(buf)?)),
            PT_BYE => Ok(Packet::Goodbye(Goodbye::unmarshal(buf)?)),
            PT_APP => Ok(Packet::ApplicationDefined(ApplicationDefined::unmarshal(buf)?)),
            PT_RTPFB => Ok(Packet::Nack(TransportLayerNack::unmarshal(buf)?)),
            PT_PSFB => Ok(Packet::Pli(PictureLossIndication::unmarshal(buf)?)),
            PT_XR => Ok(Packet::ExtendedReport(ExtendedReport::unmarshal(buf)?)),
            other => Err(Error::ErrRtcpWrongType(other, 0)),
        }
    }
}

/// Splits a compound RTCP datagram into its individual packets, each
/// located by its own header's `length` field.
pub fn unmarshal_compound(buf: &[u8]) -> Result<Vec<Packet>> {
    if buf.is_empty() {
        return Err(Error::ErrRtcpEmptyCompound);
    }
    let mut packets = Vec::new();
    let mut offset = 0;
    while offset < buf.len() {
        let header = Header::unmarshal(&buf[offset..])?;
        let len = header.packet_len();
        if buf.len() < offset + len {
            return Err(Error::ErrRtcpPacketTooShort);
        }
        packets.push(Packet::unmarshal(&buf[offset..offset + len])?);
        offset += len;
    }
    Ok(packets)
}

pub fn marshal_compound(packets: &[Packet]) -> Result<Vec<u8>> {
    if packets.is_empty() {
        return Err(Error::ErrRtcpEmptyCompound);
    }
    let mut out = Vec::new();
    for packet in packets {
        out.extend_from_slice(&packet.marshal()?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_sender_report() {
        let sr = SenderReport { ssrc: 1, ntp_time: 2, rtp_time: 3, packet_count: 4, octet_count: 5, reports: vec![] };
        let wire = sr.marshal().unwrap();
        assert_eq!(Packet::unmarshal(&wire).unwrap(), Packet::SenderReport(sr));
    }

    #[test]
    fn compound_packet_round_trip() {
        let sr = SenderReport { ssrc: 1, ntp_time: 2, rtp_time: 3, packet_count: 4, octet_count: 5, reports: vec![] };
        let bye = Goodbye { sources: vec![1], reason: None };
        let packets = vec![Packet::SenderReport(sr), Packet::Goodbye(bye)];

        let wire = marshal_compound(&packets).unwrap();
        let decoded = unmarshal_compound(&wire).unwrap();
        assert_eq!(decoded, packets);
    }

    #[test]
    fn empty_compound_is_rejected() {
        assert!(matches!(unmarshal_compound(&[]), Err(Error::ErrRtcpEmptyCompound)));
        assert!(matches!(marshal_compound(&[]), Err(Error::ErrRtcpEmptyCompound)));
    }
}
