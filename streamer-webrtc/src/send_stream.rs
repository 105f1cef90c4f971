//! RTC send stream (spec §4.6): packetizes media into RTP, keeps a
//! retransmit ring buffer, answers NACK (optionally as RTX), and builds
//! the periodic Sender Report plus RTCP-XR DLRR contribution.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use streamer_media::{CodecType, MediaPacket};
use streamer_rtcp::{DlrrReport, ReceptionReport, SenderReport};
use streamer_rtp::h264::H264Packetizer;
use streamer_rtp::sequence::SequenceGenerator;
use streamer_rtp::{opus, Header, Packet};
use streamer_shared::{Result, SystemInstant};

use crate::kind::MediaKind;

const RING_SIZE: usize = 2048;
const RETRY_WARN_THRESHOLD: u32 = 5;
const RTT_THROTTLE_THRESHOLD: Duration = Duration::from_millis(10);

struct RingSlot {
    packet: Packet,
    last_resent_at: Option<Instant>,
}

/// One SSRC's outbound RTP state, plus its paired RTX SSRC/PT when RTX is
/// negotiated.
pub struct SendStream {
    ssrc: u32,
    rtx_ssrc: Option<u32>,
    payload_type: u8,
    rtx_payload_type: Option<u8>,
    clock_rate: u32,
    kind: MediaKind,
    codec: CodecType,
    seq_gen: SequenceGenerator,
    rtx_seq_gen: SequenceGenerator,
    h264: H264Packetizer,
    ring: Vec<Option<RingSlot>>,
    retry_counts: HashMap<u16, u32>,
    packets_sent: u32,
    octets_sent: u32,
    avg_rtt: Duration,
    last_xr_rrt: Option<(u64, Instant)>,
}

fn split_annex_b(data: &[u8]) -> Vec<&[u8]> {
    let mut nals = Vec::new();
    let mut i = 0;
    let mut start = None;
    while i + 3 <= data.len() {
        let is_start = data[i] == 0 && data[i + 1] == 0 && (data[i + 2] == 1 || (i + 4 <= data.len() && data[i + 2] == 0 && data[i + 3] == 1));
        if is_start {
            if let Some(s) = start {
                nals.push(&data[s..i]);
            }
            i += if data[i + 2] == 1 { 3 } else { 4 };
            start = Some(i);
        } else {
            i += 1;
        }
    }
    if let Some(s) = start {
        nals.push(&data[s..]);
    }
    nals
}

impl SendStream {
    pub fn new(
        ssrc: u32,
        rtx_ssrc: Option<u32>,
        payload_type: u8,
        rtx_payload_type: Option<u8>,
        clock_rate: u32,
        kind: MediaKind,
        codec: CodecType,
        mtu: usize,
    ) -> Self {
        Self {
            ssrc,
            rtx_ssrc,
            payload_type,
            rtx_payload_type,
            clock_rate,
            kind,
            codec,
            seq_gen: SequenceGenerator::new(),
            rtx_seq_gen: SequenceGenerator::new(),
            h264: H264Packetizer::new(mtu),
            ring: (0..RING_SIZE).map(|_| None).collect(),
            retry_counts: HashMap::new(),
            packets_sent: 0,
            octets_sent: 0,
            avg_rtt: Duration::ZERO,
            last_xr_rrt: None,
        }
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    fn rtp_timestamp(&self, dts_ms: i64) -> u32 {
        ((dts_ms as i128 * self.clock_rate as i128) / 1000) as u32
    }

    /// Packetizes one media packet into zero or more RTP packets, in
    /// transmission order, recording each in the retransmit ring. Audio
    /// sequence-header packets (the Opus identification header) are
    /// dropped per spec §9 Open Question 4 — they are never sent over RTP.
    pub fn send_media(&mut self, pkt: &MediaPacket, _now: Instant) -> Result<Vec<Packet>> {
        if self.kind == MediaKind::Audio && pkt.is_seq_hdr {
            return Ok(Vec::new());
        }
        let ts = self.rtp_timestamp(pkt.dts);
        let data = pkt.buffer.to_vec();

        let mut out = Vec::new();
        match self.codec {
            CodecType::H264 | CodecType::H265 => {
                if pkt.is_seq_hdr {
                    // AVCC/HVCC sequence header: feed its Annex-B framed
                    // NALs (SPS/PPS) to the packetizer without emitting.
                    for nal in split_annex_b(&data) {
                        self.h264.packetize(nal)?;
                    }
                    return Ok(Vec::new());
                }
                for nal in split_annex_b(&data) {
                    for fragment in self.h264.packetize(nal)? {
                        out.push(self.build_packet(fragment.payload, ts, fragment.marker));
                    }
                }
            }
            _ => {
                let (payload, marker) = opus::packetize(&data);
                out.push(self.build_packet(payload, ts, marker));
            }
        }

        for packet in &out {
            self.octets_sent += packet.payload.len() as u32;
            self.packets_sent += 1;
            self.ring[packet.header.sequence_number as usize % RING_SIZE] =
                Some(RingSlot { packet: packet.clone(), last_resent_at: None });
        }
        Ok(out)
    }

    fn build_packet(&mut self, payload: Vec<u8>, ts: u32, marker: bool) -> Packet {
        let seq = self.seq_gen.next();
        let header = Header::new(self.payload_type, seq, ts, self.ssrc).with_marker(marker);
        Packet::new(header, payload)
    }

    /// Answers a NACK: for each requested sequence still in the ring and
    /// not gated by the RTT-conditional throttle, resends it (rewrapped
    /// as RTX when negotiated).
    pub fn handle_nack(&mut self, requested: &[u16], now: Instant) -> Vec<Packet> {
        let min_gap = if self.avg_rtt > RTT_THROTTLE_THRESHOLD {
            self.avg_rtt / 2
        } else {
            self.avg_rtt
        };

        let mut out = Vec::new();
        for &seq in requested {
            let slot_idx = seq as usize % RING_SIZE;
            let Some(slot) = self.ring[slot_idx].as_mut() else { continue };
            if slot.packet.header.sequence_number != seq {
                continue; // ring slot was recycled by a newer sequence
            }
            if let Some(last) = slot.last_resent_at {
                if now.duration_since(last) < min_gap {
                    continue;
                }
            }
            slot.last_resent_at = Some(now);
            let original = slot.packet.clone();

            let count = self.retry_counts.entry(seq).or_insert(0);
            *count += 1;
            if *count > RETRY_WARN_THRESHOLD {
                log::warn!("seq {seq} retransmitted {count} times");
            }

            out.push(self.rewrap(&original, seq));
        }
        out
    }

    fn rewrap(&mut self, original: &Packet, original_seq: u16) -> Packet {
        match self.rtx_ssrc.zip(self.rtx_payload_type) {
            Some((rtx_ssrc, rtx_pt)) => {
                let mut payload = Vec::with_capacity(2 + original.payload.len());
                payload.extend_from_slice(&original_seq.to_be_bytes());
                payload.extend_from_slice(&original.payload);
                let header = Header::new(rtx_pt, self.rtx_seq_gen.next(), original.header.timestamp, rtx_ssrc)
                    .with_marker(original.header.marker);
                Packet::new(header, payload)
            }
            None => original.clone(),
        }
    }

    /// Builds the periodic Sender Report (spec §4.6, every 500 ms).
    pub fn build_sender_report(&self, sys: &SystemInstant, now: Instant) -> SenderReport {
        let ntp = sys.ntp(now);
        let now_ms = sys.duration_since_unix_epoch(now).as_millis() as u64;
        SenderReport {
            ssrc: self.ssrc,
            ntp_time: ntp,
            rtp_time: ((now_ms / 1000) * self.clock_rate as u64) as u32,
            packet_count: self.packets_sent,
            octet_count: self.octets_sent,
            reports: Vec::new(),
        }
    }

    /// Updates the smoothed RTT estimate from an inbound Receiver Report
    /// block addressed to this stream's SSRC.
    pub fn handle_receiver_report(&mut self, report: &ReceptionReport, sys: &SystemInstant, now: Instant) {
        if report.last_sender_report == 0 {
            return; // no SR has been received by the peer yet
        }
        let compact_now = compact_ntp(sys.ntp(now));
        let rtt_compact = compact_now
            .wrapping_sub(report.last_sender_report)
            .wrapping_sub(report.delay_since_last_sender_report);
        let rtt = compact_to_duration(rtt_compact);
        let rtt_secs = rtt.as_secs_f64();
        let avg_secs = self.avg_rtt.as_secs_f64() + (rtt_secs - self.avg_rtt.as_secs_f64()) / 4.0;
        self.avg_rtt = Duration::from_secs_f64(avg_secs.max(0.0));
    }

    pub fn avg_rtt(&self) -> Duration {
        self.avg_rtt
    }

    /// Records an inbound XR Receiver Reference Time block so a DLRR can
    /// be contributed to this stream's next XR report, as long as it
    /// stays within `validity` of the RRT's reception.
    pub fn on_xr_rrt(&mut self, ntp_timestamp: u64, now: Instant) {
        self.last_xr_rrt = Some((ntp_timestamp, now));
    }

    pub fn maybe_dlrr(&self, now: Instant, validity: Duration) -> Option<DlrrReport> {
        let (ntp, received_at) = self.last_xr_rrt?;
        if now.duration_since(received_at) > validity {
            return None;
        }
        let elapsed = now.duration_since(received_at);
        let delay_units = (elapsed.as_secs_f64() * 65536.0) as u32;
        Some(DlrrReport {
            ssrc: self.ssrc,
            last_rr: (ntp >> 16) as u32,
            delay_since_last_rr: delay_units,
        })
    }
}

fn compact_ntp(ntp: u64) -> u32 {
    ((ntp >> 16) & 0xFFFF_FFFF) as u32
}

fn compact_to_duration(val: u32) -> Duration {
    let secs = (val >> 16) as u64;
    let frac = (val & 0xFFFF) as f64 / 65536.0;
    Duration::from_secs(secs) + Duration::from_secs_f64(frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamer_media::ByteBuf;

    fn h264_stream() -> SendStream {
        SendStream::new(0x1111, Some(0x2222), 106, Some(107), 90_000, MediaKind::Video, CodecType::H264, 1200)
    }

    fn nal_packet(nal: &[u8], dts: i64, key_frame: bool) -> MediaPacket {
        let mut pkt = MediaPacket::new();
        pkt.av_type = streamer_media::AvType::Video;
        pkt.codec_type = CodecType::H264;
        pkt.format_type = streamer_media::FormatType::Raw;
        pkt.dts = dts;
        pkt.pts = dts;
        pkt.is_key_frame = key_frame;
        let mut framed = vec![0, 0, 0, 1];
        framed.extend_from_slice(nal);
        pkt.buffer = ByteBuf::from_slice(&framed);
        pkt
    }

    #[test]
    fn scenario_s2_key_frame_emits_stap_a_then_payload() {
        let mut stream = h264_stream();
        stream.send_media(&nal_packet(&[0x67, 0x42, 0x00], 0, false), Instant::now()).unwrap();
        stream.send_media(&nal_packet(&[0x68, 0xCE], 0, false), Instant::now()).unwrap();

        let mut keyframe = vec![0x65];
        keyframe.extend(std::iter::repeat(0xAB).take(160));
        let out = stream.send_media(&nal_packet(&keyframe, 1000, true), Instant::now()).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].header.payload_type, 106);
        assert_eq!(out[1].header.timestamp, 90_000);
        assert!(out[1].header.marker);
    }

    #[test]
    fn sequence_numbers_advance_across_packets() {
        let mut stream = h264_stream();
        let out1 = stream.send_media(&nal_packet(&[0x61, 1], 0, false), Instant::now()).unwrap();
        let out2 = stream.send_media(&nal_packet(&[0x61, 2], 40, false), Instant::now()).unwrap();
        assert_eq!(out1[0].header.sequence_number, 0);
        assert_eq!(out2[0].header.sequence_number, 1);
    }

    #[test]
    fn scenario_s4_nack_resend_prepends_original_sequence_for_rtx() {
        let mut stream = h264_stream();
        let t0 = Instant::now();
        let out = stream.send_media(&nal_packet(&[0x61, 9, 9, 9], 0, false), t0).unwrap();
        let original_seq = out[0].header.sequence_number;

        let resent = stream.handle_nack(&[original_seq], t0 + Duration::from_millis(50));
        assert_eq!(resent.len(), 1);
        assert_eq!(resent[0].header.ssrc, 0x2222);
        assert_eq!(resent[0].header.payload_type, 107);
        assert_eq!(&resent[0].payload[0..2], &original_seq.to_be_bytes());
    }

    #[test]
    fn nack_gate_blocks_a_too_soon_repeat_request() {
        let mut stream = h264_stream();
        stream.avg_rtt = Duration::from_millis(100);
        let t0 = Instant::now();
        let out = stream.send_media(&nal_packet(&[0x61, 1], 0, false), t0).unwrap();
        let seq = out[0].header.sequence_number;

        assert_eq!(stream.handle_nack(&[seq], t0 + Duration::from_millis(10)).len(), 1);
        // avg_rtt > 10ms, so the minimum gap is avg_rtt/2 = 50ms
        assert!(stream.handle_nack(&[seq], t0 + Duration::from_millis(30)).is_empty());
        assert_eq!(stream.handle_nack(&[seq], t0 + Duration::from_millis(70)).len(), 1);
    }

    #[test]
    fn opus_audio_sequence_header_is_not_transmitted() {
        let mut stream = SendStream::new(0x3333, None, 111, None, 48_000, MediaKind::Audio, CodecType::Opus, 1200);
        let mut hdr = MediaPacket::new();
        hdr.is_seq_hdr = true;
        hdr.buffer = ByteBuf::from_slice(b"opus-head");
        assert!(stream.send_media(&hdr, Instant::now()).unwrap().is_empty());
    }
}
