//! The session composition root (spec §3/§4.4): wires SDP negotiation,
//! ICE keepalive, the DTLS-SRTP handshake, and the send/receive streams
//! together behind a single sans-io `PeerConnection`. The caller owns
//! the UDP socket; this type only ever sees datagrams in and out.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use streamer_media::{CodecType, MediaPacket};
use streamer_rtcp::{marshal_compound, unmarshal_compound, Packet as RtcpPacket};
use streamer_rtp::Packet as RtpPacket;
use streamer_sdp::{Candidate, MediaDescription, SessionDescription};
use streamer_shared::util::{is_rtcp, match_dtls, match_srtp};
use streamer_shared::{Error, Result, SystemInstant};

use streamer_dtls::{DtlsEngine, Identity};
use streamer_ice::IceKeepalive;
use streamer_srtp::{MasterKeys, SrtpSession};

use crate::config::PeerConnectionConfig;
use crate::kind::MediaKind;
use crate::receive_stream::ReceiveStream;
use crate::send_stream::SendStream;
use crate::state::PeerConnectionState;

/// One outbound UDP datagram the caller must actually send.
#[derive(Debug)]
pub struct Transmit {
    pub payload: Vec<u8>,
    pub to: SocketAddr,
}

pub struct PeerConnection {
    config: PeerConnectionConfig,
    state: PeerConnectionState,
    sys: SystemInstant,
    identity: Identity,
    local_ufrag: String,
    local_pwd: String,
    remote_addr: Option<SocketAddr>,
    ice: Option<IceKeepalive>,
    dtls: Option<DtlsEngine>,
    srtp: Option<SrtpSession>,
    send_streams: HashMap<u32, SendStream>,
    recv_streams: HashMap<u32, ReceiveStream>,
    last_sr: HashMap<u32, Instant>,
    remote_video_ssrc: Option<u32>,
    remote_audio_ssrc: Option<u32>,
}

impl PeerConnection {
    pub fn new(config: PeerConnectionConfig) -> Result<Self> {
        let identity = Identity::generate()?;
        Ok(Self {
            config,
            state: PeerConnectionState::Init,
            sys: SystemInstant::now(),
            identity,
            local_ufrag: streamer_shared::util::math_rand_alpha_number(4),
            local_pwd: streamer_shared::util::math_rand_alpha_number(24),
            remote_addr: None,
            ice: None,
            dtls: None,
            srtp: None,
            send_streams: HashMap::new(),
            recv_streams: HashMap::new(),
            last_sr: HashMap::new(),
            remote_video_ssrc: None,
            remote_audio_ssrc: None,
        })
    }

    pub fn state(&self) -> PeerConnectionState {
        self.state
    }

    /// Negotiates against a remote offer/answer SDP (spec §3/§6), setting
    /// up the ICE keepalive and the receive-side streams for whatever
    /// media sections it names, then returns our answer SDP.
    pub fn negotiate(&mut self, remote_sdp: &str, local_candidate: Candidate) -> Result<String> {
        let remote = streamer_sdp::parse(remote_sdp)?;
        let remote_candidate = remote.candidate.as_ref().ok_or(Error::ErrSdpBadCandidate)?;
        self.remote_addr = Some(SocketAddr::new(remote_candidate.ip, remote_candidate.port));

        let priority = local_candidate.priority;
        self.ice = Some(IceKeepalive::new(
            self.remote_addr.unwrap(),
            remote.ice_ufrag.clone(),
            self.local_ufrag.clone(),
            remote.ice_pwd.clone(),
            priority,
        ));

        let expected_fingerprint = if remote.fingerprint_hex.is_empty() {
            None
        } else {
            Some(remote.fingerprint_hex.clone())
        };
        self.dtls = Some(DtlsEngine::new(&self.identity, expected_fingerprint)?);

        if let Some(video) = &remote.video {
            self.setup_receive_stream(video, MediaKind::Video)?;
        }
        if let Some(audio) = &remote.audio {
            self.setup_receive_stream(audio, MediaKind::Audio)?;
        }

        let answer = self.build_answer(&remote, local_candidate)?;
        self.state.advance(PeerConnectionState::SdpDone)?;
        Ok(answer)
    }

    fn setup_receive_stream(&mut self, media: &MediaDescription, kind: MediaKind) -> Result<()> {
        let Some(ssrc) = media.primary_ssrc() else { return Ok(()) };
        let payload_type = media.primary_payload_type().ok_or(Error::ErrSdpNoMatchingCodec("payload type".into()))?;
        let clock_rate = media.clock_rate().unwrap_or(90_000);
        let codec = codec_for(media);

        match kind {
            MediaKind::Video => self.remote_video_ssrc = Some(ssrc),
            MediaKind::Audio => self.remote_audio_ssrc = Some(ssrc),
        }

        let stream = ReceiveStream::new(
            ssrc,
            payload_type,
            media.rtx_ssrc(),
            media.rtx_payload_type(),
            clock_rate,
            kind,
            codec,
            kind.jitter_timeout(&self.config),
            self.config.loss_report_rate_limit,
            self.config.pli_rate_limit,
            self.config.nack_retry_max,
            self.config.nack_pending_max,
        );
        self.recv_streams.insert(ssrc, stream);
        Ok(())
    }

    fn build_answer(&self, remote: &SessionDescription, local_candidate: Candidate) -> Result<String> {
        let mut answer = SessionDescription::new();
        answer.ice_ufrag = self.local_ufrag.clone();
        answer.ice_pwd = self.local_pwd.clone();
        answer.fingerprint_algorithm = "sha-256".to_string();
        answer.fingerprint_hex = streamer_dtls::fingerprint_sha256(&self.identity.cert_der)?;
        answer.setup = "passive".to_string();
        answer.candidate = Some(local_candidate);
        answer.video = remote.video.clone();
        answer.audio = remote.audio.clone();
        Ok(streamer_sdp::emit(&answer))
    }

    /// Registers an outbound send stream for one negotiated media
    /// section, to be used once the DTLS-SRTP handshake completes.
    pub fn add_send_stream(
        &mut self,
        ssrc: u32,
        rtx_ssrc: Option<u32>,
        payload_type: u8,
        rtx_payload_type: Option<u8>,
        clock_rate: u32,
        kind: MediaKind,
        codec: CodecType,
    ) {
        let stream = SendStream::new(ssrc, rtx_ssrc, payload_type, rtx_payload_type, clock_rate, kind, codec, 1200);
        self.send_streams.insert(ssrc, stream);
    }

    pub fn poll_timeout(&self) -> Option<Instant> {
        self.ice.as_ref().and_then(|ice| ice.poll_timeout())
    }

    /// Drives all session timers forward: ICE retransmits, the DTLS
    /// handshake's own retransmit schedule, and the periodic Sender
    /// Report/NACK tick cadence for every stream.
    pub fn handle_timeout(&mut self, now: Instant) -> Result<Vec<Transmit>> {
        let mut out = Vec::new();
        if let Some(ice) = &mut self.ice {
            ice.handle_timeout(now);
            if ice.is_connected() && self.state == PeerConnectionState::SdpDone {
                self.state.advance(PeerConnectionState::StunDone)?;
            }
            while let Some((payload, to)) = ice.poll_transmit() {
                out.push(Transmit { payload, to });
            }
        }
        out.extend(self.drain_dtls_transmits()?);

        let mut due_wires = Vec::new();
        for (&ssrc, stream) in self.send_streams.iter() {
            let due = match self.last_sr.get(&ssrc) {
                None => true,
                Some(last) => now.duration_since(*last) >= self.config.sr_interval,
            };
            if !due || self.srtp.is_none() {
                continue;
            }
            let sr = stream.build_sender_report(&self.sys, now);
            let wire = marshal_compound(&[RtcpPacket::SenderReport(sr)])?;
            due_wires.push(wire);
        }
        for wire in due_wires {
            if let Some(datagram) = self.encrypt_rtcp(wire)? {
                out.push(datagram);
            }
        }
        for ssrc in self.send_streams.keys().copied().collect::<Vec<_>>() {
            self.last_sr.insert(ssrc, now);
        }

        Ok(out)
    }

    fn drain_dtls_transmits(&mut self) -> Result<Vec<Transmit>> {
        let mut out = Vec::new();
        let Some(remote) = self.remote_addr else { return Ok(out) };
        if let Some(dtls) = &mut self.dtls {
            while let Some(payload) = dtls.poll_transmit() {
                out.push(Transmit { payload, to: remote });
            }
            if dtls.is_established() && self.srtp.is_none() {
                self.establish_srtp()?;
            }
        }
        Ok(out)
    }

    fn establish_srtp(&mut self) -> Result<()> {
        let dtls = self.dtls.as_ref().ok_or(Error::ErrDtlsNotEstablished)?;
        let keys = dtls.export_srtp_keys(true)?;
        self.srtp = Some(SrtpSession::new(
            MasterKeys { master_key: keys.outbound.master_key, master_salt: keys.outbound.master_salt },
            MasterKeys { master_key: keys.inbound.master_key, master_salt: keys.inbound.master_salt },
        ));
        self.state.advance(PeerConnectionState::DtlsDone)
    }

    fn encrypt_rtcp(&mut self, mut wire: Vec<u8>) -> Result<Option<Transmit>> {
        let Some(remote) = self.remote_addr else { return Ok(None) };
        let Some(srtp) = &mut self.srtp else { return Ok(None) };
        srtp.protect(&mut wire)?;
        Ok(Some(Transmit { payload: wire, to: remote }))
    }

    /// Feeds one inbound datagram, demuxing it by its first byte per RFC
    /// 7983, and returns any media packets it decoded.
    pub fn handle_read(&mut self, from: SocketAddr, buf: &[u8], now: Instant) -> Result<Vec<MediaPacket>> {
        if match_dtls(buf) {
            if let Some(dtls) = &mut self.dtls {
                dtls.feed_bytes(buf)?;
                if dtls.is_established() && self.srtp.is_none() {
                    self.establish_srtp()?;
                }
            }
            return Ok(Vec::new());
        }

        if let Some(ice) = &mut self.ice {
            if !ice.is_connected() {
                let _ = ice.handle_read(from, buf);
            }
        }

        if match_srtp(buf) {
            return self.handle_srtp(buf, now);
        }
        if is_rtcp(buf) {
            return self.handle_srtcp(buf, now);
        }
        Ok(Vec::new())
    }

    fn handle_srtp(&mut self, buf: &[u8], now: Instant) -> Result<Vec<MediaPacket>> {
        let Some(srtp) = &mut self.srtp else { return Ok(Vec::new()) };
        let mut packet = buf.to_vec();
        if srtp.unprotect(&mut packet).is_err() {
            return Ok(Vec::new()); // spec §4.5: drop silently
        }
        let rtp = RtpPacket::unmarshal(&packet)?;
        let Some(primary_ssrc) = self
            .recv_streams
            .values()
            .find(|s| s.owns_ssrc(rtp.header.ssrc))
            .map(|s| s.ssrc())
        else {
            return Ok(Vec::new());
        };
        let stream = self.recv_streams.get_mut(&primary_ssrc).expect("just located by ssrc");
        let (delivered, _pli_due) = stream.handle_rtp(rtp, now)?;
        stream.depacketize(delivered, now)
    }

    fn handle_srtcp(&mut self, buf: &[u8], now: Instant) -> Result<Vec<MediaPacket>> {
        let Some(srtp) = &mut self.srtp else { return Ok(Vec::new()) };
        let mut packet = buf.to_vec();
        if srtp.unprotect(&mut packet).is_err() {
            return Ok(Vec::new());
        }
        let Ok(packets) = unmarshal_compound(&packet) else { return Ok(Vec::new()) };
        for rtcp in packets {
            match rtcp {
                RtcpPacket::ReceiverReport(rr) => {
                    for report in rr.reports {
                        if let Some(stream) = self.send_streams.get_mut(&report.ssrc) {
                            stream.handle_receiver_report(&report, &self.sys, now);
                        }
                    }
                }
                RtcpPacket::Nack(nack) => {
                    if let Some(stream) = self.send_streams.get_mut(&nack.media_ssrc) {
                        let seqs: Vec<u16> = nack.nacks.iter().flat_map(|p| p.sequence_numbers()).collect();
                        stream.handle_nack(&seqs, now);
                    }
                }
                RtcpPacket::ExtendedReport(xr) => {
                    // RRT carries no per-SSRC target (RFC 3611 §4.4): it
                    // timestamps the whole XR packet, so every send
                    // stream in the session gets the same reference point
                    // for its next DLRR contribution.
                    for block in xr.blocks {
                        if let streamer_rtcp::XrBlock::Rrt { ntp_timestamp } = block {
                            for stream in self.send_streams.values_mut() {
                                stream.on_xr_rrt(ntp_timestamp, now);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(Vec::new())
    }

    /// Packetizes and SRTP-protects one media packet for a registered
    /// send stream, ready for the caller to write to the socket.
    pub fn send_media(&mut self, ssrc: u32, media: &MediaPacket, now: Instant) -> Result<Vec<Transmit>> {
        let remote = self.remote_addr.ok_or(Error::ErrNoSendStream(ssrc))?;
        let stream = self.send_streams.get_mut(&ssrc).ok_or(Error::ErrNoSendStream(ssrc))?;
        let packets = stream.send_media(media, now)?;
        let Some(srtp) = &mut self.srtp else { return Ok(Vec::new()) };

        let mut out = Vec::with_capacity(packets.len());
        for packet in packets {
            let mut wire = packet.marshal()?;
            srtp.protect(&mut wire)?;
            out.push(Transmit { payload: wire, to: remote });
        }
        Ok(out)
    }

    pub fn close(&mut self) -> Result<()> {
        self.state.advance(PeerConnectionState::Closed)
    }
}

fn codec_for(media: &MediaDescription) -> CodecType {
    let Some(pt) = media.primary_payload_type() else { return CodecType::Unknown };
    match media.rtpmaps.iter().find(|r| r.payload_type == pt).map(|r| r.codec.to_ascii_lowercase()) {
        Some(codec) if codec == "h264" => CodecType::H264,
        Some(codec) if codec == "h265" => CodecType::H265,
        Some(codec) if codec == "opus" => CodecType::Opus,
        _ => CodecType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn local_candidate() -> Candidate {
        Candidate {
            foundation: "1".to_string(),
            component: 1,
            proto: "udp".to_string(),
            priority: 2_130_706_431,
            ip: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 9,
            typ: "host".to_string(),
        }
    }

    fn remote_offer() -> String {
        concat!(
            "v=0\n",
            "o=- 1 1 IN IP4 127.0.0.1\n",
            "s=-\n",
            "t=0 0\n",
            "m=video 9 UDP/TLS/RTP/SAVPF 106\n",
            "c=IN IP4 198.51.100.1\n",
            "a=rtpmap:106 H264/90000\n",
            "a=rtcp-fb:106 nack\n",
            "a=setup:active\n",
            "a=mid:0\n",
            "a=recvonly\n",
            "a=ice-ufrag:remoteufrag\n",
            "a=ice-pwd:remotepwd\n",
            "a=fingerprint:sha-256 AA:BB:CC\n",
            "a=candidate:1 1 udp 2130706431 198.51.100.1 9 typ host\n",
            "a=ssrc:555 cname:c\n",
            "a=rtcp-mux\n",
        )
        .to_string()
    }

    #[test]
    fn negotiate_creates_a_receive_stream_and_advances_state() {
        let mut pc = PeerConnection::new(PeerConnectionConfig::default()).unwrap();
        let answer = pc.negotiate(&remote_offer(), local_candidate()).unwrap();
        assert_eq!(pc.state(), PeerConnectionState::SdpDone);
        assert!(answer.contains("a=fingerprint:sha-256"));
        assert!(pc.recv_streams.contains_key(&555));
    }

    #[test]
    fn send_media_before_srtp_is_established_reports_no_send_stream() {
        let mut pc = PeerConnection::new(PeerConnectionConfig::default()).unwrap();
        pc.negotiate(&remote_offer(), local_candidate()).unwrap();
        let mut media = MediaPacket::new();
        media.buffer = streamer_media::ByteBuf::from_slice(&[0, 0, 0, 1, 0x65]);
        let err = pc.send_media(0x9999, &media, Instant::now()).unwrap_err();
        assert!(matches!(err, Error::ErrNoSendStream(0x9999)));
    }
}
