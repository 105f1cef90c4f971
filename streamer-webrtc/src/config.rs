//! Session-level tunables (spec §4.3, §4.4, §4.6–§4.8), constructed once
//! per [`crate::peer_connection::PeerConnection`], following
//! `rtc/src/peer/configuration.rs`'s plain-struct-with-defaults style.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PeerConnectionConfig {
    pub stun_interval: Duration,
    pub cert_validity_days: u32,
    pub video_jitter_timeout: Duration,
    pub audio_jitter_timeout: Duration,
    pub sr_interval: Duration,
    pub nack_tick_interval: Duration,
    pub nack_retry_max: u32,
    pub nack_pending_max: usize,
    pub pli_rate_limit: Duration,
    pub loss_report_rate_limit: Duration,
    pub xr_rrt_validity: Duration,
    pub rtx_enabled: bool,
}

impl Default for PeerConnectionConfig {
    fn default() -> Self {
        Self {
            stun_interval: Duration::from_millis(800),
            cert_validity_days: 365,
            video_jitter_timeout: Duration::from_millis(400),
            audio_jitter_timeout: Duration::from_millis(100),
            sr_interval: Duration::from_millis(500),
            nack_tick_interval: Duration::from_millis(10),
            nack_retry_max: 20,
            nack_pending_max: 5000,
            pli_rate_limit: Duration::from_secs(5),
            loss_report_rate_limit: Duration::from_millis(500),
            xr_rrt_validity: Duration::from_secs(5),
            rtx_enabled: false,
        }
    }
}
