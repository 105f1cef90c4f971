//! RTC receive stream (spec §4.7): demuxes RTX back onto the primary
//! sequence space, runs received RTP through the jitter buffer, turns
//! recovered packets into `MediaPacket`s, and builds the periodic
//! Receiver Report plus rate-limited PLI.

use std::time::{Duration, Instant};

use streamer_media::{AvType, ByteBuf, CodecType, FormatType, MediaPacket};
use streamer_rtcp::{PictureLossIndication, ReceptionReport};
use streamer_rtp::{H264Depacketizer, Header, Packet};
use streamer_shared::{Error, Result};

use crate::jitter_buffer::JitterBuffer;
use crate::kind::MediaKind;
use crate::nack_generator::NackGenerator;
use crate::seq_state::SequenceState;

pub struct ReceiveStream {
    ssrc: u32,
    payload_type: u8,
    rtx_ssrc: Option<u32>,
    rtx_payload_type: Option<u8>,
    clock_rate: u32,
    kind: MediaKind,
    codec: CodecType,
    seq_state: SequenceState,
    jitter: JitterBuffer,
    nack_gen: NackGenerator,
    h264: H264Depacketizer,
    last_pli: Option<Instant>,
    pli_rate_limit: Duration,
    epoch: Option<Instant>,
    last_transit: Option<i64>,
    jitter_estimate: f64,
}

impl ReceiveStream {
    pub fn new(
        ssrc: u32,
        payload_type: u8,
        rtx_ssrc: Option<u32>,
        rtx_payload_type: Option<u8>,
        clock_rate: u32,
        kind: MediaKind,
        codec: CodecType,
        jitter_timeout: Duration,
        loss_report_rate_limit: Duration,
        pli_rate_limit: Duration,
        nack_retry_max: u32,
        nack_pending_max: usize,
    ) -> Self {
        Self {
            ssrc,
            payload_type,
            rtx_ssrc,
            rtx_payload_type,
            clock_rate,
            kind,
            codec,
            seq_state: SequenceState::new(),
            jitter: JitterBuffer::new(jitter_timeout, loss_report_rate_limit),
            nack_gen: NackGenerator::new(nack_retry_max, nack_pending_max),
            h264: H264Depacketizer::new(),
            last_pli: None,
            pli_rate_limit,
            epoch: None,
            last_transit: None,
            jitter_estimate: 0.0,
        }
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// True if `ssrc` is this stream's primary SSRC or its paired RTX
    /// SSRC, i.e. an inbound packet carrying it belongs to this stream.
    pub fn owns_ssrc(&self, ssrc: u32) -> bool {
        ssrc == self.ssrc || Some(ssrc) == self.rtx_ssrc
    }

    /// Demuxes an inbound RTP packet addressed to either this stream's
    /// primary or RTX SSRC. RTX packets are rewritten onto the primary
    /// sequence space per spec §4.6: the outer SSRC/PT are swapped for
    /// the primary pair, and the leading two-byte original sequence
    /// number becomes the new RTP sequence number.
    pub fn handle_rtp(&mut self, mut packet: Packet, now: Instant) -> Result<(Vec<Packet>, bool)> {
        if Some(packet.header.ssrc) == self.rtx_ssrc {
            packet = self.demux_rtx(packet)?;
        }

        self.update_jitter(&packet, now);
        let seq = packet.header.sequence_number;
        self.seq_state.update(seq);
        self.nack_gen.on_receive(seq, now);

        let (delivered, loss) = self.jitter.insert(seq, packet, now);
        let pli = loss && self.rate_limited_pli(now);
        Ok((delivered, pli))
    }

    fn demux_rtx(&self, packet: Packet) -> Result<Packet> {
        if packet.payload.len() < 2 {
            return Err(Error::ErrRtpHeaderTooShort);
        }
        let original_seq = u16::from_be_bytes([packet.payload[0], packet.payload[1]]);
        let payload = packet.payload[2..packet.payload.len() - packet.padding_len as usize].to_vec();
        let header = Header::new(self.payload_type, original_seq, packet.header.timestamp, self.ssrc)
            .with_marker(packet.header.marker);
        Ok(Packet::new(header, payload))
    }

    /// Interarrival jitter estimate (spec §4.7), in milliseconds.
    /// `transit` is the arrival time minus the RTP timestamp, both
    /// expressed in milliseconds, measured from an arbitrary epoch fixed
    /// at the first packet this stream ever saw.
    fn update_jitter(&mut self, packet: &Packet, now: Instant) {
        let epoch = *self.epoch.get_or_insert(now);
        let arrival_ms = now.duration_since(epoch).as_secs_f64() * 1000.0;
        let rtp_ms = packet.header.timestamp as i64 * 1000 / self.clock_rate as i64;
        let transit = arrival_ms as i64 - rtp_ms;
        if let Some(last_transit) = self.last_transit {
            let d = (transit - last_transit).unsigned_abs() as f64;
            self.jitter_estimate += (d - self.jitter_estimate) / 8.0;
        }
        self.last_transit = Some(transit);
    }

    /// Depacketizes a run of jitter-buffer-delivered packets into media
    /// packets, in delivery order.
    pub fn depacketize(&mut self, packets: Vec<Packet>, now: Instant) -> Result<Vec<MediaPacket>> {
        let mut out = Vec::new();
        for packet in packets {
            let nals = match self.codec {
                CodecType::H264 | CodecType::H265 => self.h264.depacketize(&packet.payload, now)?,
                _ => vec![streamer_rtp::opus::depacketize(&packet.payload)],
            };
            for nal in nals {
                let mut media = MediaPacket::new();
                media.av_type = if self.kind == MediaKind::Video { AvType::Video } else { AvType::Audio };
                media.codec_type = self.codec;
                media.format_type = FormatType::Raw;
                media.dts = packet.header.timestamp as i64;
                media.pts = media.dts;
                media.buffer = ByteBuf::from_slice(&nal);
                out.push(media);
            }
        }
        Ok(out)
    }

    /// Periodic tick: drains jitter-buffer timeouts and due NACK
    /// requests together (spec §4.7/§4.8 share the same 10 ms cadence).
    pub fn tick(&mut self, now: Instant, rtt: Duration) -> (Vec<Packet>, bool, Vec<u16>) {
        let (delivered, loss) = self.jitter.tick(now);
        let due = self.nack_gen.tick(now, rtt);
        (delivered, loss && self.rate_limited_pli(now), due)
    }

    pub fn build_nack(&self, sender_ssrc: u32, due: &[u16]) -> Option<streamer_rtcp::TransportLayerNack> {
        NackGenerator::build_report(sender_ssrc, self.ssrc, due)
    }

    fn rate_limited_pli(&mut self, now: Instant) -> bool {
        match self.last_pli {
            Some(last) if now.duration_since(last) < self.pli_rate_limit => false,
            _ => {
                self.last_pli = Some(now);
                true
            }
        }
    }

    pub fn build_pli(&self, sender_ssrc: u32) -> PictureLossIndication {
        PictureLossIndication { sender_ssrc, media_ssrc: self.ssrc }
    }

    /// Builds this stream's Receiver Report block from the shared
    /// sequence-validity tracker (spec §4.6, RFC 3550 Appendix A.3).
    pub fn build_reception_report(&mut self) -> ReceptionReport {
        let (fraction_lost, total_lost, extended_highest) = self.seq_state.report_interval();
        ReceptionReport {
            ssrc: self.ssrc,
            fraction_lost,
            total_lost,
            last_sequence_number: extended_highest,
            jitter: self.jitter_estimate as u32,
            last_sender_report: 0,
            delay_since_last_sender_report: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamer_rtp::Header;

    fn stream() -> ReceiveStream {
        ReceiveStream::new(
            0xAAAA,
            106,
            Some(0xBBBB),
            Some(107),
            90_000,
            MediaKind::Video,
            CodecType::H264,
            Duration::from_millis(400),
            Duration::from_millis(500),
            Duration::from_secs(5),
            20,
            5000,
        )
    }

    fn single_nal_packet(seq: u16) -> Packet {
        let mut payload = vec![0x61];
        payload.extend(std::iter::repeat(0xCD).take(20));
        Packet::new(Header::new(106, seq, seq as u32 * 3000, 0xAAAA), payload)
    }

    #[test]
    fn in_order_packets_depacketize_into_annex_b_nals() {
        let mut stream = stream();
        let t0 = Instant::now();
        let (delivered, pli) = stream.handle_rtp(single_nal_packet(1), t0).unwrap();
        assert!(!pli);
        let media = stream.depacketize(delivered, t0).unwrap();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].codec_type, CodecType::H264);
        assert_eq!(&media[0].buffer.to_vec()[0..4], &[0, 0, 0, 1]);
    }

    #[test]
    fn reception_report_reflects_extended_highest_sequence() {
        let mut stream = stream();
        let t0 = Instant::now();
        stream.handle_rtp(single_nal_packet(5), t0).unwrap();
        stream.handle_rtp(single_nal_packet(6), t0).unwrap();
        let report = stream.build_reception_report();
        assert_eq!(report.last_sequence_number, 6);
        assert_eq!(report.ssrc, 0xAAAA);
    }

    #[test]
    fn gap_timeout_fires_a_rate_limited_pli() {
        let mut stream = stream();
        let t0 = Instant::now();
        stream.handle_rtp(single_nal_packet(1), t0).unwrap();
        stream.handle_rtp(single_nal_packet(3), t0).unwrap(); // seq 2 missing
        let (_, pli, _) = stream.tick(t0 + Duration::from_millis(420), Duration::from_millis(50));
        assert!(pli);
        let (_, pli_again, _) = stream.tick(t0 + Duration::from_millis(430), Duration::from_millis(50));
        assert!(!pli_again);
    }
}
