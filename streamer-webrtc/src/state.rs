//! Session state machine (spec §3): a PeerConnection is always in exactly
//! one of `Init → SdpDone → StunDone → DtlsDone`, advancing only forward.
//! Failure or an explicit close may be reached from any state.

use streamer_shared::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    Init,
    SdpDone,
    StunDone,
    DtlsDone,
    Closed,
    Failed,
}

impl PeerConnectionState {
    fn rank(self) -> u8 {
        match self {
            PeerConnectionState::Init => 0,
            PeerConnectionState::SdpDone => 1,
            PeerConnectionState::StunDone => 2,
            PeerConnectionState::DtlsDone => 3,
            PeerConnectionState::Closed | PeerConnectionState::Failed => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PeerConnectionState::Init => "init",
            PeerConnectionState::SdpDone => "sdp_done",
            PeerConnectionState::StunDone => "stun_done",
            PeerConnectionState::DtlsDone => "dtls_done",
            PeerConnectionState::Closed => "closed",
            PeerConnectionState::Failed => "failed",
        }
    }

    /// Advances to `next`. Closing or failing is always permitted; any
    /// other transition must move exactly one step forward.
    pub fn advance(&mut self, next: PeerConnectionState) -> Result<()> {
        let allowed = matches!(next, PeerConnectionState::Closed | PeerConnectionState::Failed)
            || next.rank() == self.rank() + 1;
        if !allowed {
            return Err(Error::ErrPeerConnectionWrongState(self.as_str(), next.as_str()));
        }
        *self = next;
        Ok(())
    }
}
