//! H.264 packetization (RFC 6184): STAP-A aggregation for SPS/PPS ahead
//! of a key frame, FU-A fragmentation for NALs larger than the MTU, and
//! the matching depacketizer.

use std::time::{Duration, Instant};

use byteorder::{BigEndian, ByteOrder};

use streamer_shared::{Error, Result};

const NAL_TYPE_SPS: u8 = 7;
const NAL_TYPE_PPS: u8 = 8;
const NAL_TYPE_SEI: u8 = 6;
const NAL_TYPE_IDR: u8 = 5;
const NAL_TYPE_STAP_A: u8 = 24;
const NAL_TYPE_FU_A: u8 = 28;

const FU_HEADER_START: u8 = 0x80;
const FU_HEADER_END: u8 = 0x40;

/// How long a partially-assembled FU-A accumulator is kept before being
/// dropped as stale (spec §4.7).
pub const FU_A_TIMEOUT: Duration = Duration::from_millis(600);

fn nal_type(nal: &[u8]) -> u8 {
    nal[0] & 0x1F
}

fn f_nri_bits(nal_header: u8) -> u8 {
    nal_header & 0xE0
}

/// One packetized unit: payload bytes plus whether the RTP marker bit
/// should be set on it.
pub struct Packetized {
    pub payload: Vec<u8>,
    pub marker: bool,
}

/// Stateful H.264 packetizer. Remembers the most recently seen SPS/PPS so
/// they can be re-emitted as a STAP-A ahead of the next key frame.
pub struct H264Packetizer {
    mtu: usize,
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
}

impl H264Packetizer {
    pub fn new(mtu: usize) -> Self {
        Self {
            mtu,
            sps: None,
            pps: None,
        }
    }

    /// Packetizes one Annex-B NAL unit (start code already stripped).
    /// Returns zero or more RTP payloads in transmission order.
    pub fn packetize(&mut self, nal: &[u8]) -> Result<Vec<Packetized>> {
        if nal.is_empty() {
            return Err(Error::ErrRtpHeaderTooShort);
        }
        match nal_type(nal) {
            NAL_TYPE_SEI => Ok(Vec::new()),
            NAL_TYPE_SPS => {
                self.sps = Some(nal.to_vec());
                Ok(Vec::new())
            }
            NAL_TYPE_PPS => {
                self.pps = Some(nal.to_vec());
                Ok(Vec::new())
            }
            NAL_TYPE_IDR => {
                let mut out = Vec::new();
                if let (Some(sps), Some(pps)) = (self.sps.clone(), self.pps.clone()) {
                    out.push(Packetized {
                        payload: build_stap_a(&sps, &pps)?,
                        marker: false,
                    });
                }
                out.extend(self.fragment(nal));
                Ok(out)
            }
            _ => Ok(self.fragment(nal)),
        }
    }

    fn fragment(&self, nal: &[u8]) -> Vec<Packetized> {
        if nal.len() <= self.mtu {
            return vec![Packetized {
                payload: nal.to_vec(),
                marker: true,
            }];
        }

        let fu_indicator = f_nri_bits(nal[0]) | NAL_TYPE_FU_A;
        let original_type = nal_type(nal);
        let data = &nal[1..];
        let chunk_size = self.mtu - 2;

        let mut out = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let end = (offset + chunk_size).min(data.len());
            let is_first = offset == 0;
            let is_last = end == data.len();

            let mut fu_header = original_type;
            if is_first {
                fu_header |= FU_HEADER_START;
            }
            if is_last {
                fu_header |= FU_HEADER_END;
            }

            let mut payload = Vec::with_capacity(2 + end - offset);
            payload.push(fu_indicator);
            payload.push(fu_header);
            payload.extend_from_slice(&data[offset..end]);

            out.push(Packetized {
                payload,
                marker: is_last,
            });
            offset = end;
        }
        out
    }
}

fn build_stap_a(sps: &[u8], pps: &[u8]) -> Result<Vec<u8>> {
    if sps.len() > u16::MAX as usize || pps.len() > u16::MAX as usize {
        return Err(Error::ErrRtpStapASizeLargerThanBuffer(sps.len().max(pps.len()), u16::MAX as usize));
    }
    let mut out = Vec::with_capacity(1 + 2 + sps.len() + 2 + pps.len());
    out.push(f_nri_bits(sps[0]) | NAL_TYPE_STAP_A);
    out.extend_from_slice(&(sps.len() as u16).to_be_bytes());
    out.extend_from_slice(sps);
    out.extend_from_slice(&(pps.len() as u16).to_be_bytes());
    out.extend_from_slice(pps);
    Ok(out)
}

fn annex_b(nal: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + nal.len());
    out.extend_from_slice(&[0, 0, 0, 1]);
    out.extend_from_slice(nal);
    out
}

/// Reassembles FU-A fragments and splits STAP-A aggregates back into the
/// single-NAL, Annex-B framed units the media pipeline expects.
pub struct H264Depacketizer {
    fu_started_at: Option<Instant>,
    fu_header_byte: Option<u8>,
    fu_data: Vec<u8>,
}

impl Default for H264Depacketizer {
    fn default() -> Self {
        Self::new()
    }
}

impl H264Depacketizer {
    pub fn new() -> Self {
        Self {
            fu_started_at: None,
            fu_header_byte: None,
            fu_data: Vec::new(),
        }
    }

    pub fn depacketize(&mut self, payload: &[u8], now: Instant) -> Result<Vec<Vec<u8>>> {
        if payload.is_empty() {
            return Err(Error::ErrRtpHeaderTooShort);
        }
        match nal_type(payload) {
            NAL_TYPE_STAP_A => self.depacketize_stap_a(payload),
            NAL_TYPE_FU_A => self.depacketize_fu_a(payload, now),
            1..=23 => Ok(vec![annex_b(payload)]),
            other => Err(Error::ErrRtpNaluTypeNotHandled(other)),
        }
    }

    fn depacketize_stap_a(&self, payload: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        let mut idx = 1;
        while idx + 2 <= payload.len() {
            let size = BigEndian::read_u16(&payload[idx..idx + 2]) as usize;
            idx += 2;
            if idx + size > payload.len() {
                return Err(Error::ErrRtpStapASizeLargerThanBuffer(size, payload.len() - idx));
            }
            out.push(annex_b(&payload[idx..idx + size]));
            idx += size;
        }
        Ok(out)
    }

    fn depacketize_fu_a(&mut self, payload: &[u8], now: Instant) -> Result<Vec<Vec<u8>>> {
        if payload.len() < 2 {
            return Err(Error::ErrRtpFuATruncated);
        }
        if let Some(started) = self.fu_started_at {
            if now.duration_since(started) > FU_A_TIMEOUT {
                self.reset();
            }
        }

        let fu_indicator = payload[0];
        let fu_header = payload[1];
        let start = fu_header & FU_HEADER_START != 0;
        let end = fu_header & FU_HEADER_END != 0;
        let original_type = fu_header & 0x1F;

        if start {
            self.reset();
            self.fu_started_at = Some(now);
            self.fu_header_byte = Some(f_nri_bits(fu_indicator) | original_type);
        } else if self.fu_header_byte.is_none() {
            // a continuation/end fragment with no preceding S fragment
            return Err(Error::ErrRtpFuATruncated);
        }

        self.fu_data.extend_from_slice(&payload[2..]);

        if end {
            let header_byte = self.fu_header_byte.take().ok_or(Error::ErrRtpFuATruncated)?;
            self.fu_started_at = None;
            let mut nal = Vec::with_capacity(1 + self.fu_data.len());
            nal.push(header_byte);
            nal.append(&mut self.fu_data);
            Ok(vec![annex_b(&nal)])
        } else {
            Ok(Vec::new())
        }
    }

    fn reset(&mut self) {
        self.fu_started_at = None;
        self.fu_header_byte = None;
        self.fu_data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sps() -> Vec<u8> {
        vec![0x67, 0x42, 0x00]
    }
    fn pps() -> Vec<u8> {
        vec![0x68, 0xCE]
    }

    #[test]
    fn scenario_s2_stap_a_precedes_key_frame() {
        let mut p = H264Packetizer::new(1200);
        p.packetize(&sps()).unwrap();
        p.packetize(&pps()).unwrap();

        let mut keyframe = vec![0x65];
        keyframe.extend(std::iter::repeat(0xAB).take(160));

        let out = p.packetize(&keyframe).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(
            out[0].payload,
            vec![0x78, 0x00, 0x03, 0x67, 0x42, 0x00, 0x00, 0x02, 0x68, 0xCE]
        );
        assert!(!out[0].marker);
        assert_eq!(out[1].payload, keyframe);
        assert!(out[1].marker);
    }

    #[test]
    fn sei_is_dropped() {
        let mut p = H264Packetizer::new(1200);
        let sei = vec![0x06, 0x01, 0x02];
        assert!(p.packetize(&sei).unwrap().is_empty());
    }

    #[test]
    fn scenario_s3_fu_a_split_has_expected_headers() {
        let mut p = H264Packetizer::new(1200);
        let mut nal = vec![0x65];
        nal.extend(std::iter::repeat(0xCD).take(2499));
        assert_eq!(nal.len(), 2500);

        let out = p.packetize(&nal).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].payload[0], 0x7C);
        assert_eq!(out[0].payload[1], 0x85);
        assert_eq!(out[1].payload[1], 0x05);
        assert_eq!(out[2].payload[1], 0x45);
        assert!(!out[0].marker && !out[1].marker && out[2].marker);
    }

    #[test]
    fn scenario_s3_fu_a_reassembles_to_original_nal() {
        let mut p = H264Packetizer::new(1200);
        let mut nal = vec![0x65];
        nal.extend(std::iter::repeat(0xCD).take(2499));

        let fragments = p.packetize(&nal).unwrap();
        let mut d = H264Depacketizer::new();
        let now = Instant::now();
        let mut reassembled = Vec::new();
        for frag in &fragments {
            reassembled.extend(d.depacketize(&frag.payload, now).unwrap());
        }
        assert_eq!(reassembled.len(), 1);
        let mut expected = vec![0, 0, 0, 1];
        expected.extend_from_slice(&nal);
        assert_eq!(reassembled[0], expected);
    }

    #[test]
    fn stap_a_splits_into_individual_annex_b_nals() {
        let payload = vec![0x78, 0x00, 0x03, 0x67, 0x42, 0x00, 0x00, 0x02, 0x68, 0xCE];
        let mut d = H264Depacketizer::new();
        let nals = d.depacketize(&payload, Instant::now()).unwrap();
        assert_eq!(nals, vec![
            vec![0, 0, 0, 1, 0x67, 0x42, 0x00],
            vec![0, 0, 0, 1, 0x68, 0xCE],
        ]);
    }

    #[test]
    fn stale_fu_a_accumulator_is_dropped_after_timeout() {
        let mut d = H264Depacketizer::new();
        let t0 = Instant::now();
        d.depacketize(&[0x7C, 0x85, 1, 2, 3], t0).unwrap();
        assert!(d.fu_started_at.is_some());

        let late = t0 + FU_A_TIMEOUT + Duration::from_millis(1);
        // an end fragment arriving after the timeout is rejected, not
        // spliced onto the stale accumulator
        let err = d.depacketize(&[0x7C, 0x45, 4, 5], late).unwrap_err();
        assert!(matches!(err, Error::ErrRtpFuATruncated));
    }

    #[test]
    fn single_nal_under_mtu_sets_marker() {
        let mut p = H264Packetizer::new(1200);
        let nal = vec![0x61, 1, 2, 3];
        let out = p.packetize(&nal).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].marker);
        assert_eq!(out[0].payload, nal);
    }
}
