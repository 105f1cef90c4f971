use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crc::{Crc, CRC_32_ISO_HDLC};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use streamer_shared::{Error, Result};

const MAGIC_COOKIE: u32 = 0x2112_A442;
const BINDING_REQUEST: u16 = 0x0001;
const BINDING_SUCCESS: u16 = 0x0101;

const ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;
const ATTR_USERNAME: u16 = 0x0006;
const ATTR_MESSAGE_INTEGRITY: u16 = 0x0008;
const ATTR_PRIORITY: u16 = 0x0024;
const ATTR_USE_CANDIDATE: u16 = 0x0025;
const ATTR_FINGERPRINT: u16 = 0x8028;

const FINGERPRINT_XOR: u32 = 0x5354_554e;
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

type HmacSha1 = Hmac<Sha1>;

fn pad4(n: usize) -> usize {
    (4 - n % 4) % 4
}

fn push_attr(buf: &mut Vec<u8>, attr_type: u16, value: &[u8]) {
    buf.extend_from_slice(&attr_type.to_be_bytes());
    buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
    buf.extend_from_slice(value);
    buf.extend(std::iter::repeat(0u8).take(pad4(value.len())));
}

fn set_length(buf: &mut [u8], length: u16) {
    buf[2..4].copy_from_slice(&length.to_be_bytes());
}

/// Build a STUN Binding request per spec §4.3: `USERNAME` of the form
/// `remote_frag:local_frag`, `PRIORITY`, `USE-CANDIDATE`, a
/// `MESSAGE-INTEGRITY` keyed with the remote password, closed by
/// `FINGERPRINT`.
pub fn build_binding_request(
    transaction_id: [u8; 12],
    remote_frag: &str,
    local_frag: &str,
    priority: u32,
    remote_password: &str,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    buf.extend_from_slice(&BINDING_REQUEST.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes()); // length placeholder
    buf.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
    buf.extend_from_slice(&transaction_id);

    let username = format!("{remote_frag}:{local_frag}");
    push_attr(&mut buf, ATTR_USERNAME, username.as_bytes());
    push_attr(&mut buf, ATTR_PRIORITY, &priority.to_be_bytes());
    push_attr(&mut buf, ATTR_USE_CANDIDATE, &[]);

    // MESSAGE-INTEGRITY covers everything before it, with the length
    // field set as though the integrity attribute (24 bytes) were
    // already appended.
    let len_with_integrity = (buf.len() - 20 + 24) as u16;
    set_length(&mut buf, len_with_integrity);
    let mut mac = HmacSha1::new_from_slice(remote_password.as_bytes()).expect("hmac accepts any key length");
    mac.update(&buf);
    let tag = mac.finalize().into_bytes();
    push_attr(&mut buf, ATTR_MESSAGE_INTEGRITY, &tag);

    // FINGERPRINT covers everything before it, length set as though the
    // fingerprint attribute (8 bytes) were already appended.
    let len_with_fingerprint = (buf.len() - 20 + 8) as u16;
    set_length(&mut buf, len_with_fingerprint);
    let crc = CRC32.checksum(&buf) ^ FINGERPRINT_XOR;
    push_attr(&mut buf, ATTR_FINGERPRINT, &crc.to_be_bytes());

    buf
}

/// Parsed Binding success response: the mapped address observed by the
/// STUN server, used to replace the candidate for subsequent sends.
pub struct BindingSuccess {
    pub transaction_id: [u8; 12],
    pub mapped_address: SocketAddr,
}

/// Parse a STUN message, returning the mapped address from a Binding
/// success response. Binding error responses and non-Binding messages are
/// rejected; message integrity on the response is not re-verified here
/// (the session already authenticated the handshake via the local
/// password it generated).
pub fn parse_binding_success(buf: &[u8]) -> Result<BindingSuccess> {
    if buf.len() < 20 {
        return Err(Error::ErrBufferTooShort);
    }
    let msg_type = u16::from_be_bytes([buf[0], buf[1]]);
    if msg_type != BINDING_SUCCESS {
        return Err(Error::ErrStunUnexpectedClass);
    }
    let length = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    let cookie = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    if cookie != MAGIC_COOKIE {
        return Err(Error::ErrStunUnexpectedClass);
    }
    let mut transaction_id = [0u8; 12];
    transaction_id.copy_from_slice(&buf[8..20]);

    let body = &buf[20..(20 + length).min(buf.len())];
    let mut offset = 0usize;
    let mut mapped_address = None;
    while offset + 4 <= body.len() {
        let attr_type = u16::from_be_bytes([body[offset], body[offset + 1]]);
        let attr_len = u16::from_be_bytes([body[offset + 2], body[offset + 3]]) as usize;
        let value_start = offset + 4;
        let value_end = value_start + attr_len;
        if value_end > body.len() {
            break;
        }
        if attr_type == ATTR_XOR_MAPPED_ADDRESS {
            mapped_address = parse_xor_mapped_address(&body[value_start..value_end], &transaction_id);
        }
        offset = value_end + pad4(attr_len);
    }

    mapped_address
        .map(|mapped_address| BindingSuccess {
            transaction_id,
            mapped_address,
        })
        .ok_or(Error::ErrStunAttributeNotFound)
}

fn parse_xor_mapped_address(value: &[u8], transaction_id: &[u8; 12]) -> Option<SocketAddr> {
    if value.len() < 8 {
        return None;
    }
    let family = value[1];
    let xport = u16::from_be_bytes([value[2], value[3]]);
    let port = xport ^ (MAGIC_COOKIE >> 16) as u16;
    match family {
        0x01 => {
            let cookie = MAGIC_COOKIE.to_be_bytes();
            let mut octets = [0u8; 4];
            for i in 0..4 {
                octets[i] = value[4 + i] ^ cookie[i];
            }
            Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port))
        }
        0x02 => {
            if value.len() < 20 {
                return None;
            }
            let mut xor_bytes = [0u8; 16];
            xor_bytes[0..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
            xor_bytes[4..16].copy_from_slice(transaction_id);
            let mut octets = [0u8; 16];
            for i in 0..16 {
                octets[i] = value[4 + i] ^ xor_bytes[i];
            }
            Some(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_request_carries_username_and_closes_with_fingerprint() {
        let req = build_binding_request([7u8; 12], "b", "a", 12345, "secret");
        assert_eq!(u16::from_be_bytes([req[0], req[1]]), BINDING_REQUEST);
        // fingerprint is always the last attribute, 4+4=8 bytes
        let fp_type = u16::from_be_bytes([req[req.len() - 8], req[req.len() - 7]]);
        assert_eq!(fp_type, ATTR_FINGERPRINT);
    }

    #[test]
    fn binding_success_round_trip_recovers_mapped_address() {
        // hand-build a minimal Binding success response with an IPv4
        // XOR-MAPPED-ADDRESS, mirroring what a real STUN server sends.
        let transaction_id = [9u8; 12];
        let mut buf = Vec::new();
        buf.extend_from_slice(&BINDING_SUCCESS.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
        buf.extend_from_slice(&transaction_id);

        let port: u16 = 54321;
        let xport = port ^ (MAGIC_COOKIE >> 16) as u16;
        let cookie = MAGIC_COOKIE.to_be_bytes();
        let ip_octets = [203u8, 0, 113, 42];
        let mut xored_ip = [0u8; 4];
        for i in 0..4 {
            xored_ip[i] = ip_octets[i] ^ cookie[i];
        }
        let mut value = vec![0u8, 0x01];
        value.extend_from_slice(&xport.to_be_bytes());
        value.extend_from_slice(&xored_ip);
        push_attr(&mut buf, ATTR_XOR_MAPPED_ADDRESS, &value);
        let len = (buf.len() - 20) as u16;
        set_length(&mut buf, len);

        let parsed = parse_binding_success(&buf).unwrap();
        assert_eq!(parsed.transaction_id, transaction_id);
        assert_eq!(parsed.mapped_address, SocketAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 42)), port));
    }

    #[test]
    fn too_short_buffer_is_rejected() {
        assert!(parse_binding_success(&[0u8; 4]).is_err());
    }
}
