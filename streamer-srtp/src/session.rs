use streamer_shared::Result;

use crate::context::SrtpContext;
use crate::keys::MasterKeys;

/// The negotiated pair of SRTP contexts for one DTLS-SRTP session: one
/// key schedule for packets we send, one for packets we receive. Both
/// accept any SSRC (`ssrc_any_outbound`/`ssrc_any_inbound`), matching the
/// spec §4.5 policy — this crate does not bind contexts to individual
/// streams up front.
pub struct SrtpSession {
    outbound: SrtpContext,
    inbound: SrtpContext,
}

impl SrtpSession {
    pub fn new(outbound: MasterKeys, inbound: MasterKeys) -> Self {
        Self {
            outbound: SrtpContext::new(outbound),
            inbound: SrtpContext::new(inbound),
        }
    }

    pub fn protect(&mut self, packet: &mut Vec<u8>) -> Result<()> {
        self.outbound.protect(packet)
    }

    /// Decrypts and authenticates an inbound SRTP packet. Any failure
    /// (short packet, bad tag, replay) should be treated by the caller as
    /// "drop silently" per spec §4.5, not surfaced to the sender.
    pub fn unprotect(&mut self, packet: &mut Vec<u8>) -> Result<()> {
        self.inbound.unprotect(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(byte: u8) -> MasterKeys {
        MasterKeys {
            master_key: vec![byte; 16],
            master_salt: vec![byte.wrapping_add(1); 14],
        }
    }

    #[test]
    fn a_and_b_sessions_with_swapped_directions_interoperate() {
        let a_to_b = keys(1);
        let b_to_a = keys(2);

        let mut a = SrtpSession::new(a_to_b.clone(), b_to_a.clone());
        let mut b = SrtpSession::new(b_to_a, a_to_b);

        let mut packet = vec![0x80, 0x60, 0, 1, 0, 0, 0, 1, 0, 0, 0, 9];
        packet.extend_from_slice(b"hi");
        a.protect(&mut packet).unwrap();
        b.unprotect(&mut packet).unwrap();
        assert_eq!(&packet[12..], b"hi");
    }
}
