//! Receive-side NACK generator (spec §4.8). Watches the sequence numbers
//! of an inbound stream, tracks gaps as pending losses, and periodically
//! emits RTPFB generic NACK reports (RFC 4585 §6.2.1) for entries that
//! have waited at least one RTT since their last request.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use streamer_rtcp::{NackPair, TransportLayerNack};

const MAX_GAP: u32 = 3000;

struct Pending {
    first_seen: Instant,
    last_sent: Option<Instant>,
    retries: u32,
}

/// Per-stream monitor over received sequence numbers. Sans-io: feed
/// observed sequences via `on_receive`/`on_recovered`, drive time forward
/// via `tick`, which returns the sequences due for a fresh NACK request.
pub struct NackGenerator {
    highest: Option<u16>,
    pending: HashMap<u16, Pending>,
    retry_max: u32,
    pending_max: usize,
}

impl NackGenerator {
    pub fn new(retry_max: u32, pending_max: usize) -> Self {
        Self {
            highest: None,
            pending: HashMap::new(),
            retry_max,
            pending_max,
        }
    }

    /// Records a newly observed sequence number, adding every sequence
    /// strictly between the previous highest and this one to the pending
    /// set. Out-of-order arrivals that resolve a pending entry clear it.
    pub fn on_receive(&mut self, seq: u16, now: Instant) {
        if self.pending.remove(&seq).is_some() {
            return;
        }
        let Some(highest) = self.highest else {
            self.highest = Some(seq);
            return;
        };
        let gap = seq.wrapping_sub(highest) as u32;
        if gap == 0 {
            return; // duplicate
        }
        if gap >= MAX_GAP {
            // large jump or reorder far behind: don't treat the whole
            // wraparound range as lost, just adopt the new high-water mark
            self.highest = Some(seq);
            return;
        }
        for missing in 1..gap {
            let missing_seq = highest.wrapping_add(missing as u16);
            self.pending.insert(missing_seq, Pending { first_seen: now, last_sent: None, retries: 0 });
        }
        self.highest = Some(seq);
        self.evict_overflow();
    }

    fn evict_overflow(&mut self) {
        while self.pending.len() > self.pending_max {
            if let Some(&oldest) = self
                .pending
                .iter()
                .min_by_key(|(_, p)| p.first_seen)
                .map(|(seq, _)| seq)
            {
                self.pending.remove(&oldest);
            } else {
                break;
            }
        }
    }

    /// Scans the pending set on the 10 ms periodic tick (spec §4.8),
    /// returning the sequences due for a(nother) NACK request: those
    /// never requested, or whose last request was at least `rtt` ago.
    /// Entries that have exceeded the retry ceiling are evicted instead
    /// of re-requested.
    pub fn tick(&mut self, now: Instant, rtt: Duration) -> Vec<u16> {
        let mut due = Vec::new();
        let mut evict = Vec::new();
        for (&seq, pending) in self.pending.iter_mut() {
            let is_due = match pending.last_sent {
                None => true,
                Some(last) => now.duration_since(last) >= rtt,
            };
            if !is_due {
                continue;
            }
            pending.retries += 1;
            if pending.retries > self.retry_max {
                evict.push(seq);
                continue;
            }
            pending.last_sent = Some(now);
            due.push(seq);
        }
        for seq in evict {
            self.pending.remove(&seq);
        }
        due.sort_unstable();
        due
    }

    /// Builds a `TransportLayerNack` from the sequences `tick` returned,
    /// or `None` if nothing is due. Groups consecutive runs into base-PID
    /// + bitmap pairs, each covering up to 16 sequences beyond its base.
    pub fn build_report(sender_ssrc: u32, media_ssrc: u32, due: &[u16]) -> Option<TransportLayerNack> {
        if due.is_empty() {
            return None;
        }
        Some(TransportLayerNack {
            sender_ssrc,
            media_ssrc,
            nacks: encode_pairs(due),
        })
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn encode_pairs(seqs: &[u16]) -> Vec<NackPair> {
    let mut pairs = Vec::new();
    let mut iter = seqs.iter().copied();
    let Some(mut base) = iter.next() else {
        return pairs;
    };
    let mut bitmap = 0u16;
    for seq in iter {
        let diff = seq.wrapping_sub(base);
        if diff >= 1 && diff <= 16 {
            bitmap |= 1 << (diff - 1);
        } else {
            pairs.push(NackPair { packet_id: base, lost_packets: bitmap });
            base = seq;
            bitmap = 0;
        }
    }
    pairs.push(NackPair { packet_id: base, lost_packets: bitmap });
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s4_gap_is_reported_with_base_pid_and_bitmap() {
        let mut gen = NackGenerator::new(20, 5000);
        let t0 = Instant::now();
        gen.on_receive(1000, t0);
        gen.on_receive(1001, t0);
        gen.on_receive(1004, t0); // 1002, 1003 missing

        let due = gen.tick(t0, Duration::from_millis(50));
        assert_eq!(due, vec![1002, 1003]);

        let report = NackGenerator::build_report(0xAAAA, 0xBBBB, &due).unwrap();
        assert_eq!(report.nacks, vec![NackPair { packet_id: 1002, lost_packets: 0x0001 }]);
    }

    #[test]
    fn recovered_sequence_is_cleared_before_the_next_tick() {
        let mut gen = NackGenerator::new(20, 5000);
        let t0 = Instant::now();
        gen.on_receive(10, t0);
        gen.on_receive(12, t0); // 11 missing
        gen.on_receive(11, t0); // arrives late, resolves the gap
        assert_eq!(gen.pending_len(), 0);
    }

    #[test]
    fn entries_are_not_re_requested_before_rtt_elapses() {
        let mut gen = NackGenerator::new(20, 5000);
        let t0 = Instant::now();
        gen.on_receive(1, t0);
        gen.on_receive(3, t0); // 2 missing
        let rtt = Duration::from_millis(100);
        assert_eq!(gen.tick(t0, rtt), vec![2]);
        assert!(gen.tick(t0 + Duration::from_millis(50), rtt).is_empty());
        assert_eq!(gen.tick(t0 + Duration::from_millis(100), rtt), vec![2]);
    }

    #[test]
    fn retry_ceiling_evicts_the_entry() {
        let mut gen = NackGenerator::new(2, 5000);
        let t0 = Instant::now();
        gen.on_receive(1, t0);
        gen.on_receive(3, t0);
        let rtt = Duration::from_millis(1);
        for i in 0..3 {
            gen.tick(t0 + rtt * i, rtt);
        }
        assert_eq!(gen.pending_len(), 0);
    }

    #[test]
    fn pending_set_evicts_oldest_once_over_capacity() {
        let mut gen = NackGenerator::new(20, 2);
        let t0 = Instant::now();
        gen.on_receive(0, t0);
        gen.on_receive(10, t0); // seqs 1..=9 missing, only 2 retained
        assert_eq!(gen.pending_len(), 2);
    }
}
