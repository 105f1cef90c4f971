//! Signaling call sequences for WHIP/WHEP ingest/egress and the
//! mediasoup broadcaster (spec §6). The actual HTTP(S) client is out of
//! scope (spec §2 Non-goals) and lives behind the `HttpTransport` trait;
//! this module owns the request shapes, not the wire transport.

use serde::{Deserialize, Serialize};
use streamer_shared::{Error, Result};

/// A pluggable HTTP(S) client. Implementations do the actual socket and
/// TLS work; this crate only ever sees request/response bodies.
pub trait HttpTransport {
    fn post(&mut self, url: &str, content_type: &str, body: &[u8]) -> Result<HttpResponse>;
    fn patch(&mut self, url: &str, content_type: &str, body: &[u8]) -> Result<HttpResponse>;
}

pub struct HttpResponse {
    pub status: u16,
    pub location: Option<String>,
    pub body: Vec<u8>,
}

fn ok_body(resp: &HttpResponse) -> Result<&[u8]> {
    if !(200..300).contains(&resp.status) {
        return Err(Error::ErrSignalingBadStatus(resp.status));
    }
    Ok(&resp.body)
}

/// WHIP publish (spec §6): POST the SDP offer, get back an SDP answer
/// plus the resource `Location` used for later teardown.
pub fn whip_publish(transport: &mut dyn HttpTransport, url: &str, offer_sdp: &str) -> Result<(String, String)> {
    let resp = transport.post(url, "application/sdp", offer_sdp.as_bytes())?;
    let answer = ok_body(&resp)?.to_vec();
    let location = resp.location.ok_or(Error::ErrSignalingMissingLocation)?;
    Ok((String::from_utf8_lossy(&answer).into_owned(), location))
}

/// WHEP play (spec §6): identical shape to WHIP, recv-only direction.
pub fn whep_play(transport: &mut dyn HttpTransport, url: &str, offer_sdp: &str) -> Result<(String, String)> {
    whip_publish(transport, url, offer_sdp)
}

#[derive(Debug, Serialize)]
struct CreateBroadcasterRequest<'a> {
    id: &'a str,
    #[serde(rename = "displayName")]
    display_name: &'a str,
    device: BroadcasterDevice<'a>,
}

#[derive(Debug, Serialize)]
struct BroadcasterDevice<'a> {
    name: &'a str,
    version: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct Broadcaster {
    pub id: String,
}

#[derive(Debug, Serialize)]
struct CreateTransportRequest {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct WebrtcTransport {
    pub id: String,
    #[serde(rename = "iceParameters")]
    pub ice_parameters: serde_json::Value,
    #[serde(rename = "iceCandidates")]
    pub ice_candidates: serde_json::Value,
    #[serde(rename = "dtlsParameters")]
    pub dtls_parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ConnectTransportRequest {
    #[serde(rename = "dtlsParameters")]
    dtls_parameters: DtlsFingerprint,
}

#[derive(Debug, Serialize)]
struct DtlsFingerprint {
    role: &'static str,
    fingerprints: Vec<Fingerprint>,
}

#[derive(Debug, Serialize)]
struct Fingerprint {
    algorithm: &'static str,
    value: String,
}

#[derive(Debug, Serialize)]
pub struct ProduceRequest {
    pub kind: &'static str,
    #[serde(rename = "rtpParameters")]
    pub rtp_parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct Producer {
    pub id: String,
}

/// Runs the mediasoup broadcaster four-step sequence (spec §6): create
/// broadcaster, create transport, connect with the local DTLS
/// fingerprint, then produce one track per `produce_requests` entry.
pub fn mediasoup_publish(
    transport_client: &mut dyn HttpTransport,
    base_url: &str,
    room_id: &str,
    display_name: &str,
    dtls_fingerprint_hex: &str,
    produce_requests: &[ProduceRequest],
) -> Result<(Broadcaster, WebrtcTransport, Vec<Producer>)> {
    let broadcaster_url = format!("{base_url}/rooms/{room_id}/broadcasters");
    let create_req = CreateBroadcasterRequest {
        id: display_name,
        display_name,
        device: BroadcasterDevice { name: "streamer", version: env!("CARGO_PKG_VERSION") },
    };
    let body = serde_json::to_vec(&create_req).map_err(|_| Error::ErrSignalingBadStatus(0))?;
    let resp = transport_client.post(&broadcaster_url, "application/json", &body)?;
    let broadcaster: Broadcaster =
        serde_json::from_slice(ok_body(&resp)?).map_err(|_| Error::ErrSignalingBadStatus(resp.status))?;

    let transport_url = format!("{broadcaster_url}/{}/transports", broadcaster.id);
    let body = serde_json::to_vec(&CreateTransportRequest { kind: "webrtc" }).map_err(|_| Error::ErrSignalingBadStatus(0))?;
    let resp = transport_client.post(&transport_url, "application/json", &body)?;
    let webrtc_transport: WebrtcTransport =
        serde_json::from_slice(ok_body(&resp)?).map_err(|_| Error::ErrSignalingBadStatus(resp.status))?;

    let connect_url = format!("{transport_url}/{}/connect", webrtc_transport.id);
    let connect_req = ConnectTransportRequest {
        dtls_parameters: DtlsFingerprint {
            role: "client",
            fingerprints: vec![Fingerprint { algorithm: "sha-256", value: dtls_fingerprint_hex.to_string() }],
        },
    };
    let body = serde_json::to_vec(&connect_req).map_err(|_| Error::ErrSignalingBadStatus(0))?;
    transport_client.post(&connect_url, "application/json", &body)?;

    let produce_url = format!("{transport_url}/{}/produce", webrtc_transport.id);
    let mut producers = Vec::with_capacity(produce_requests.len());
    for req in produce_requests {
        let body = serde_json::to_vec(req).map_err(|_| Error::ErrSignalingBadStatus(0))?;
        let resp = transport_client.post(&produce_url, "application/json", &body)?;
        let producer: Producer =
            serde_json::from_slice(ok_body(&resp)?).map_err(|_| Error::ErrSignalingBadStatus(resp.status))?;
        producers.push(producer);
    }

    Ok((broadcaster, webrtc_transport, producers))
}
