//! Opus packetization: exactly one RTP packet per input packet (spec
//! §4.6). The Opus identification/sequence header carried ahead of the
//! first audio frame is metadata for the transport and is never handed
//! to this packetizer — callers filter it out before calling in.

/// Wraps one Opus frame as an RTP payload. Opus always sets the marker
/// bit since every packet completes a talkspurt frame.
pub fn packetize(frame: &[u8]) -> (Vec<u8>, bool) {
    (frame.to_vec(), true)
}

/// Opus depacketization is the identity transform: the payload already
/// is one complete Opus frame.
pub fn depacketize(payload: &[u8]) -> Vec<u8> {
    payload.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packetize_sets_marker_and_preserves_bytes() {
        let frame = vec![0xAA, 0xBB, 0xCC];
        let (payload, marker) = packetize(&frame);
        assert_eq!(payload, frame);
        assert!(marker);
    }

    #[test]
    fn depacketize_is_a_passthrough() {
        let payload = vec![1, 2, 3, 4];
        assert_eq!(depacketize(&payload), payload);
    }
}
