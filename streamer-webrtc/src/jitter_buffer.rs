//! Per-stream reorder/loss-tolerant delivery buffer (spec §4.7). Holds
//! packets keyed by extended sequence number; consecutive runs are
//! forwarded immediately, and the rest are drained once they've waited
//! longer than the media kind's delivery timeout, at which point any gap
//! still open is declared lost.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use streamer_rtp::Packet;

use crate::seq_state::SequenceState;

struct Entry {
    packet: Packet,
    inserted_at: Instant,
}

pub struct JitterBuffer {
    timeout: Duration,
    loss_report_rate_limit: Duration,
    map: BTreeMap<u64, Entry>,
    seq_state: SequenceState,
    last_output: Option<u64>,
    last_loss_report: Option<Instant>,
}

impl JitterBuffer {
    pub fn new(timeout: Duration, loss_report_rate_limit: Duration) -> Self {
        Self {
            timeout,
            loss_report_rate_limit,
            map: BTreeMap::new(),
            seq_state: SequenceState::new(),
            last_output: None,
            last_loss_report: None,
        }
    }

    /// Inserts one packet, running it through the same sequence validity
    /// check as the receiver (spec §4.7), then draining whatever run of
    /// consecutive extended sequences that insertion completes. The first
    /// packet ever inserted seeds `last_output` one behind itself so it
    /// is delivered immediately, matching P5 for the no-loss case.
    /// Returns the packets now ready for depacketization and whether a
    /// "bad" sequence discontinuity warrants a rate-limited loss report.
    pub fn insert(&mut self, seq: u16, packet: Packet, now: Instant) -> (Vec<Packet>, bool) {
        let accepted = self.seq_state.update(seq);
        let extended = self.seq_state.extended_seq(seq);
        let was_initialized = self.seq_state.is_initialized();

        let mut loss = false;
        if !accepted && was_initialized && self.last_output.is_some() {
            loss = self.rate_limited_loss_report(now);
        }

        if self.last_output.is_none() {
            self.last_output = Some(extended.wrapping_sub(1));
        }
        self.map.insert(extended, Entry { packet, inserted_at: now });

        let delivered = self.drain_consecutive();
        (delivered, loss)
    }

    /// Periodic sweep: any entry older than `timeout` is forwarded even
    /// though earlier sequences are still missing, declaring those
    /// missing sequences lost (rate-limited to one report per window).
    pub fn tick(&mut self, now: Instant) -> (Vec<Packet>, bool) {
        let mut out = Vec::new();
        let mut gapped = false;
        loop {
            let Some((&key, entry)) = self.map.iter().next() else { break };
            if now.duration_since(entry.inserted_at) < self.timeout {
                break;
            }
            if let Some(last) = self.last_output {
                if key > last.wrapping_add(1) {
                    gapped = true;
                }
            }
            self.last_output = Some(key);
            out.push(self.map.remove(&key).unwrap().packet);
        }
        out.extend(self.drain_consecutive());
        let loss_report = gapped && self.rate_limited_loss_report(now);
        (out, loss_report)
    }

    fn drain_consecutive(&mut self) -> Vec<Packet> {
        let mut out = Vec::new();
        while let Some(last) = self.last_output {
            let want = last.wrapping_add(1);
            match self.map.remove(&want) {
                Some(entry) => {
                    self.last_output = Some(want);
                    out.push(entry.packet);
                }
                None => break,
            }
        }
        out
    }

    fn rate_limited_loss_report(&mut self, now: Instant) -> bool {
        match self.last_loss_report {
            Some(last) if now.duration_since(last) < self.loss_report_rate_limit => false,
            _ => {
                self.last_loss_report = Some(now);
                true
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamer_rtp::Header;

    fn pkt(seq: u16) -> Packet {
        Packet::new(Header::new(96, seq, seq as u32 * 90, 0x1234), vec![0xAB])
    }

    #[test]
    fn property_p5_in_order_arrivals_deliver_immediately_in_order() {
        let mut jb = JitterBuffer::new(Duration::from_millis(400), Duration::from_millis(500));
        let t0 = Instant::now();
        let (out, _) = jb.insert(10, pkt(10), t0);
        assert_eq!(out.len(), 1);
        let (out, _) = jb.insert(11, pkt(11), t0);
        assert_eq!(out[0].header.sequence_number, 11);
        assert!(jb.is_empty());
    }

    #[test]
    fn scenario_s5_gap_is_resolved_by_timeout() {
        let mut jb = JitterBuffer::new(Duration::from_millis(400), Duration::from_millis(500));
        let t0 = Instant::now();

        let (out10, _) = jb.insert(10, pkt(10), t0);
        assert_eq!(out10.len(), 1);
        let (out11, _) = jb.insert(11, pkt(11), t0 + Duration::from_millis(10));
        assert_eq!(out11.len(), 1);
        let (out13, loss13) = jb.insert(13, pkt(13), t0 + Duration::from_millis(20));
        assert!(out13.is_empty());
        assert!(!loss13); // seq 12 hasn't timed out yet, no report fired

        let (out, loss) = jb.tick(t0 + Duration::from_millis(420));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].header.sequence_number, 13);
        assert!(loss);
        assert!(jb.is_empty());
    }

    #[test]
    fn property_p6_loss_reports_are_rate_limited_to_one_per_window() {
        let mut jb = JitterBuffer::new(Duration::from_millis(50), Duration::from_millis(500));
        let t0 = Instant::now();
        jb.insert(1, pkt(1), t0);
        jb.insert(5, pkt(5), t0);
        let (_, first) = jb.tick(t0 + Duration::from_millis(60));
        assert!(first);

        jb.insert(20, pkt(20), t0 + Duration::from_millis(70));
        let (_, second) = jb.tick(t0 + Duration::from_millis(130));
        assert!(!second); // still inside the 500ms window since the first report
    }

    #[test]
    fn reorder_within_tolerance_still_delivers_in_sequence_order() {
        let mut jb = JitterBuffer::new(Duration::from_millis(400), Duration::from_millis(500));
        let t0 = Instant::now();
        let (out, _) = jb.insert(5, pkt(5), t0);
        assert_eq!(out.len(), 1);
        let (out, _) = jb.insert(7, pkt(7), t0);
        assert!(out.is_empty());
        let (out, _) = jb.insert(6, pkt(6), t0);
        assert_eq!(out.iter().map(|p| p.header.sequence_number).collect::<Vec<_>>(), vec![6, 7]);
    }
}
