#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::string::FromUtf8Error;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the cppstreamer-rs workspace.
///
/// Every crate in the workspace converts its own domain error into one of
/// these variants (or carries it as a boxed source), following the
/// teacher's flat, non-exhaustive enum style rather than nested error
/// trees per crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    // -- generic / io -------------------------------------------------
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("buffer too short")]
    ErrBufferTooShort,
    #[error("packet too big")]
    ErrPacketTooBig,
    #[error("utf8 error: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("address parse failed")]
    ErrAddressParseFailed,

    // -- kernel / factory (streamer-kernel) ---------------------------
    #[error("unknown streamer module: {0}")]
    ErrUnknownModule(String),
    #[error("unknown option: {0}")]
    ErrUnknownOption(String),
    #[error("streamer has no sink named {0}")]
    ErrNoSuchSink(String),
    #[error("streamer network already started")]
    ErrNetworkAlreadyStarted,

    // -- media (streamer-media) ---------------------------------------
    #[error("media packet has no payload")]
    ErrEmptyMediaPacket,
    #[error("unsupported codec type {0}")]
    ErrUnsupportedCodec(u8),

    // -- SDP (streamer-sdp) --------------------------------------------
    #[error("sdp: parse error at line {0}: {1}")]
    ErrSdpParse(usize, String),
    #[error("sdp: missing required attribute {0}")]
    ErrSdpMissingAttribute(&'static str),
    #[error("sdp: malformed candidate line")]
    ErrSdpBadCandidate,
    #[error("sdp: no matching payload type for codec {0}")]
    ErrSdpNoMatchingCodec(String),

    // -- ICE / STUN (streamer-ice) --------------------------------------
    #[error("stun: attribute not found")]
    ErrStunAttributeNotFound,
    #[error("stun: message integrity mismatch")]
    ErrStunIntegrityMismatch,
    #[error("stun: fingerprint mismatch")]
    ErrStunFingerprintMismatch,
    #[error("stun: unexpected message class")]
    ErrStunUnexpectedClass,
    #[error("stun: transaction {0:?} timed out")]
    ErrStunTransactionTimeout(SocketAddr),
    #[error("ice: no remote credentials set")]
    ErrIceNoRemoteCredentials,

    // -- DTLS (streamer-dtls) --------------------------------------------
    #[error("dtls: handshake failed: {0}")]
    ErrDtlsHandshake(String),
    #[error("dtls: handshake not yet complete")]
    ErrDtlsNotEstablished,
    #[error("dtls: certificate generation failed: {0}")]
    ErrDtlsCertGen(String),
    #[error("dtls: keying material export failed")]
    ErrDtlsKeyExport,
    #[error("dtls: unsupported srtp profile")]
    ErrDtlsNoSrtpProfile,

    // -- SRTP (streamer-srtp) ---------------------------------------------
    #[error("srtp: packet too short")]
    ErrSrtpTooShort,
    #[error("srtp: auth tag verification failed")]
    ErrSrtpAuthTagMismatch,
    #[error("srtp: replayed packet (seq {0})")]
    ErrSrtpReplayed(u16),
    #[error("srtp: no session keys for ssrc {0}")]
    ErrSrtpNoSession(u32),
    #[error("srtp: master key/salt has wrong length: got {0}, want {1}")]
    ErrSrtpKeyLength(usize, usize),

    // -- RTP (streamer-rtp) ------------------------------------------------
    #[error("rtp: header too short")]
    ErrRtpHeaderTooShort,
    #[error("rtp: rfc8285 one-byte extension id out of range")]
    ErrRtpExtensionOneByteIdRange,
    #[error("rtp: rfc8285 two-byte extension id out of range")]
    ErrRtpExtensionTwoByteIdRange,
    #[error("rtp: nalu type {0} is not handled")]
    ErrRtpNaluTypeNotHandled(u8),
    #[error("rtp: stap-a size {0} larger than buffer {1}")]
    ErrRtpStapASizeLargerThanBuffer(usize, usize),
    #[error("rtp: fu-a packet truncated")]
    ErrRtpFuATruncated,

    // -- RTCP (streamer-rtp::rtcp) ------------------------------------------
    #[error("rtcp: packet too short")]
    ErrRtcpPacketTooShort,
    #[error("rtcp: wrong packet type: got {0}, want {1}")]
    ErrRtcpWrongType(u8, u8),
    #[error("rtcp: bad version")]
    ErrRtcpBadVersion,
    #[error("rtcp: header too small")]
    ErrRtcpHeaderTooSmall,
    #[error("rtcp: too many report blocks")]
    ErrRtcpTooManyReports,
    #[error("rtcp: empty compound packet")]
    ErrRtcpEmptyCompound,

    // -- webrtc session (streamer-webrtc) ------------------------------------
    #[error("peer connection is in state {0:?}, expected {1:?}")]
    ErrPeerConnectionWrongState(&'static str, &'static str),
    #[error("signaling: unexpected response status {0}")]
    ErrSignalingBadStatus(u16),
    #[error("signaling: missing location header")]
    ErrSignalingMissingLocation,
    #[error("no send stream for ssrc {0}")]
    ErrNoSendStream(u32),
    #[error("no recv stream for ssrc {0}")]
    ErrNoRecvStream(u32),
}
