use std::net::IpAddr;

/// `a=rtpmap:<pt> <codec>/<clock-rate>[/<channels>]`
#[derive(Debug, Clone)]
pub struct RtpMapInfo {
    pub payload_type: u8,
    pub codec: String,
    pub clock_rate: u32,
    pub channels: Option<u8>,
}

/// `a=fmtp:<pt> <attr-string>`. `apt=<n>` marks an RTX payload type paired
/// with the primary payload type `n`.
#[derive(Debug, Clone)]
pub struct FmtpInfo {
    pub payload_type: u8,
    pub attr: String,
    pub rtx_for: Option<u8>,
}

impl FmtpInfo {
    pub fn new(payload_type: u8, attr: String) -> Self {
        let rtx_for = attr
            .split(';')
            .find_map(|kv| kv.trim().strip_prefix("apt="))
            .and_then(|v| v.parse::<u8>().ok());
        Self {
            payload_type,
            attr,
            rtx_for,
        }
    }
}

/// `a=rtcp-fb:<pt> <attr-string>`
#[derive(Debug, Clone)]
pub struct RtcpFbInfo {
    pub payload_type: u8,
    pub attr: String,
}

/// `a=extmap:<id> <uri>`
#[derive(Debug, Clone)]
pub struct ExtMapInfo {
    pub id: u8,
    pub uri: String,
}

/// `a=ssrc:<ssrc> cname:<cname>` plus the optional paired msid line.
#[derive(Debug, Clone, Default)]
pub struct SsrcInfo {
    pub ssrc: u32,
    pub cname: String,
    pub msid: Option<String>,
}

/// `a=candidate:<foundation> <component> <proto> <priority> <ip> <port> typ <type>`
#[derive(Debug, Clone)]
pub struct Candidate {
    pub foundation: String,
    pub component: u32,
    pub proto: String,
    pub priority: u32,
    pub ip: IpAddr,
    pub port: u16,
    pub typ: String,
}

/// One `m=` section (video or audio) and everything scoped to it.
#[derive(Debug, Clone, Default)]
pub struct MediaDescription {
    pub is_video: bool,
    pub payload_types: Vec<u8>,
    pub rtpmaps: Vec<RtpMapInfo>,
    pub fmtps: Vec<FmtpInfo>,
    pub rtcp_fbs: Vec<RtcpFbInfo>,
    pub extmaps: Vec<ExtMapInfo>,
    pub mid: Option<u8>,
    pub msid: Option<String>,
    pub direction: String,
    pub ssrcs: Vec<SsrcInfo>,
    pub ssrc_group_fid: Option<(u32, u32)>,
    pub rtcp_mux: bool,
    pub rtcp_rsize: bool,
}

impl MediaDescription {
    pub fn new(is_video: bool) -> Self {
        Self {
            is_video,
            direction: "sendonly".to_string(),
            ..Default::default()
        }
    }

    /// Primary payload type: the lowest payload type not marked as an RTX
    /// pairing in any `fmtp` line.
    pub fn primary_payload_type(&self) -> Option<u8> {
        self.payload_types
            .iter()
            .copied()
            .find(|pt| !self.fmtps.iter().any(|f| f.payload_type == *pt && f.rtx_for.is_some()))
    }

    pub fn rtx_payload_type(&self) -> Option<u8> {
        self.fmtps.iter().find_map(|f| f.rtx_for.map(|_| f.payload_type))
    }

    pub fn clock_rate(&self) -> Option<u32> {
        let pt = self.primary_payload_type()?;
        self.rtpmaps.iter().find(|r| r.payload_type == pt).map(|r| r.clock_rate)
    }

    pub fn nack_enabled(&self) -> bool {
        self.rtcp_fbs.iter().any(|fb| fb.attr.starts_with("nack") && !fb.attr.starts_with("nack pli"))
    }

    pub fn primary_ssrc(&self) -> Option<u32> {
        self.ssrc_group_fid
            .map(|(primary, _)| primary)
            .or_else(|| self.ssrcs.first().map(|s| s.ssrc))
    }

    pub fn rtx_ssrc(&self) -> Option<u32> {
        self.ssrc_group_fid.map(|(_, rtx)| rtx)
    }
}

/// A negotiated (or about-to-be-offered) WebRTC session description.
#[derive(Debug, Clone)]
pub struct SessionDescription {
    pub proto_version: String,
    pub session_id: String,
    pub session_name: String,
    pub video: Option<MediaDescription>,
    pub audio: Option<MediaDescription>,
    pub ice_ufrag: String,
    pub ice_pwd: String,
    pub fingerprint_algorithm: String,
    pub fingerprint_hex: String,
    pub setup: String,
    pub candidate: Option<Candidate>,
}

impl SessionDescription {
    pub fn new() -> Self {
        Self {
            proto_version: "0".to_string(),
            session_id: "0".to_string(),
            session_name: "cppstreamer".to_string(),
            video: None,
            audio: None,
            ice_ufrag: String::new(),
            ice_pwd: String::new(),
            fingerprint_algorithm: "sha-256".to_string(),
            fingerprint_hex: String::new(),
            setup: "passive".to_string(),
            candidate: None,
        }
    }
}

impl Default for SessionDescription {
    fn default() -> Self {
        Self::new()
    }
}
