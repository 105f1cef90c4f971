//! The two media kinds a send/receive stream, jitter buffer, or NACK
//! generator instance is scoped to. Distinct from
//! `streamer_media::AvType`, which also carries `Metadata`/`Unknown` —
//! nothing in this crate's per-SSRC machinery needs those.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// Jitter-buffer delivery timeout per spec §4.7: 400 ms video, 100 ms
    /// audio.
    pub fn jitter_timeout(self, config: &crate::config::PeerConnectionConfig) -> std::time::Duration {
        match self {
            MediaKind::Video => config.video_jitter_timeout,
            MediaKind::Audio => config.audio_jitter_timeout,
        }
    }
}
