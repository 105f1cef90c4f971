use std::net::SocketAddr;
use std::time::{Duration, Instant};

use rand::Rng;
use streamer_shared::{Error, Result};

use crate::message::{build_binding_request, parse_binding_success};

/// Fixed Binding-request cadence per spec §4.3. The session keeps
/// re-sending at this interval until the peer's reply is observed.
pub const RETRANSMIT_INTERVAL: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Connecting,
    Connected,
}

/// Drives STUN Binding-request keepalive toward a single negotiated
/// remote candidate. Sans-io: the caller owns the socket and feeds
/// received datagrams in via `handle_read`, drains outgoing datagrams via
/// `poll_transmit`, and drives time forward via `handle_timeout`/
/// `poll_timeout`, mirroring the `rtc-stun` client's poll/handle shape.
pub struct IceKeepalive {
    remote_addr: SocketAddr,
    remote_frag: String,
    local_frag: String,
    remote_password: String,
    priority: u32,
    state: State,
    last_sent_at: Option<Instant>,
    mapped_address: Option<SocketAddr>,
    pending_transmit: Option<(Vec<u8>, SocketAddr)>,
}

impl IceKeepalive {
    pub fn new(
        remote_addr: SocketAddr,
        remote_frag: impl Into<String>,
        local_frag: impl Into<String>,
        remote_password: impl Into<String>,
        priority: u32,
    ) -> Self {
        Self {
            remote_addr,
            remote_frag: remote_frag.into(),
            local_frag: local_frag.into(),
            remote_password: remote_password.into(),
            priority,
            state: State::Connecting,
            last_sent_at: None,
            mapped_address: None,
            pending_transmit: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == State::Connected
    }

    pub fn mapped_address(&self) -> Option<SocketAddr> {
        self.mapped_address
    }

    /// Advance time, issuing a fresh Binding request if the retransmit
    /// interval has elapsed and the session is not yet connected.
    pub fn handle_timeout(&mut self, now: Instant) {
        if self.state == State::Connected {
            return;
        }
        let due = match self.last_sent_at {
            None => true,
            Some(last) => now.duration_since(last) >= RETRANSMIT_INTERVAL,
        };
        if due {
            self.send_binding_request(now);
        }
    }

    /// Earliest instant `handle_timeout` should next be called.
    pub fn poll_timeout(&self) -> Option<Instant> {
        if self.state == State::Connected {
            return None;
        }
        self.last_sent_at.map(|last| last + RETRANSMIT_INTERVAL)
    }

    /// Drain the next datagram this driver wants transmitted.
    pub fn poll_transmit(&mut self) -> Option<(Vec<u8>, SocketAddr)> {
        self.pending_transmit.take()
    }

    /// Feed an inbound datagram observed from `from`. Transitions to
    /// `Connected` once a valid Binding success carrying the mapped
    /// address for this session's candidate is observed.
    pub fn handle_read(&mut self, from: SocketAddr, buf: &[u8]) -> Result<()> {
        if from != self.remote_addr {
            return Err(Error::ErrStunUnexpectedClass);
        }
        let success = parse_binding_success(buf)?;
        self.mapped_address = Some(success.mapped_address);
        self.state = State::Connected;
        Ok(())
    }

    fn send_binding_request(&mut self, now: Instant) {
        let mut transaction_id = [0u8; 12];
        rand::rng().fill(&mut transaction_id);
        let request = build_binding_request(
            transaction_id,
            &self.remote_frag,
            &self.local_frag,
            self.priority,
            &self.remote_password,
        );
        self.pending_transmit = Some((request, self.remote_addr));
        self.last_sent_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1)), 3478)
    }

    #[test]
    fn first_binding_request_carries_remote_colon_local_username() {
        let mut ice = IceKeepalive::new(addr(), "b", "a", "secret", 12345);
        ice.handle_timeout(Instant::now());
        let (datagram, to) = ice.poll_transmit().expect("a request should have been queued");
        assert_eq!(to, addr());

        // USERNAME is the first attribute after the 20-byte header.
        let attr_len = u16::from_be_bytes([datagram[22], datagram[23]]) as usize;
        let username = std::str::from_utf8(&datagram[24..24 + attr_len]).unwrap();
        assert_eq!(username, "b:a");
    }

    #[test]
    fn does_not_retransmit_before_the_interval_elapses() {
        let mut ice = IceKeepalive::new(addr(), "b", "a", "secret", 1);
        let t0 = Instant::now();
        ice.handle_timeout(t0);
        assert!(ice.poll_transmit().is_some());

        ice.handle_timeout(t0 + Duration::from_millis(100));
        assert!(ice.poll_transmit().is_none());
    }

    #[test]
    fn retransmits_once_the_interval_elapses() {
        let mut ice = IceKeepalive::new(addr(), "b", "a", "secret", 1);
        let t0 = Instant::now();
        ice.handle_timeout(t0);
        ice.poll_transmit();

        ice.handle_timeout(t0 + RETRANSMIT_INTERVAL);
        assert!(ice.poll_transmit().is_some());
    }

    #[test]
    fn unrelated_sender_is_rejected() {
        let mut ice = IceKeepalive::new(addr(), "b", "a", "secret", 1);
        let other = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)), 9999);
        assert!(ice.handle_read(other, &[0u8; 20]).is_err());
        assert!(!ice.is_connected());
    }
}
