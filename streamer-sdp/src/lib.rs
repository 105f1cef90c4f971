#![warn(rust_2018_idioms)]

mod emit;
mod model;
mod parse;

pub use emit::emit;
pub use model::{
    Candidate, ExtMapInfo, FmtpInfo, MediaDescription, RtcpFbInfo, RtpMapInfo, SessionDescription,
    SsrcInfo,
};
pub use parse::parse;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_answer() -> String {
        concat!(
            "v=0\n",
            "o=- 123456 2 IN IP4 127.0.0.1\n",
            "s=cppstreamer\n",
            "t=0 0\n",
            "a=extmap-allow-mixed\n",
            "a=msid-semantic: WMS\n",
            "a=group:BUNDLE 0 1\n",
            "m=video 9 UDP/TLS/RTP/SAVPF 106 107\n",
            "c=IN IP4 0.0.0.0\n",
            "a=rtpmap:106 H264/90000\n",
            "a=rtpmap:107 rtx/90000\n",
            "a=fmtp:106 level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f\n",
            "a=fmtp:107 apt=106\n",
            "a=rtcp:9 IN IP4 0.0.0.0\n",
            "a=rtcp-fb:106 nack\n",
            "a=rtcp-fb:106 nack pli\n",
            "a=setup:passive\n",
            "a=mid:0\n",
            "a=sendonly\n",
            "a=ice-ufrag:abcd\n",
            "a=ice-pwd:secretpwd\n",
            "a=fingerprint:sha-256 AA:BB:CC\n",
            "a=ssrc-group:FID 111 222\n",
            "a=ssrc:111 cname:streamcname\n",
            "a=rtcp-mux\n",
            "a=rtcp-rsize\n",
            "m=audio 9 UDP/TLS/RTP/SAVPF 111\n",
            "c=IN IP4 0.0.0.0\n",
            "a=rtpmap:111 opus/48000/2\n",
            "a=fmtp:111 minptime=10;useinbandfec=1\n",
            "a=rtcp:9 IN IP4 0.0.0.0\n",
            "a=setup:passive\n",
            "a=mid:1\n",
            "a=sendonly\n",
            "a=ssrc:333 cname:streamcname\n",
            "a=rtcp-mux\n",
        )
        .to_string()
    }

    #[test]
    fn parses_video_and_audio_sections() {
        let sdp = parse(&sample_answer()).unwrap();
        let video = sdp.video.unwrap();
        assert_eq!(video.payload_types, vec![106, 107]);
        assert_eq!(video.primary_payload_type(), Some(106));
        assert_eq!(video.rtx_payload_type(), Some(107));
        assert_eq!(video.clock_rate(), Some(90000));
        assert!(video.nack_enabled());
        assert_eq!(video.ssrc_group_fid, Some((111, 222)));

        let audio = sdp.audio.unwrap();
        assert_eq!(audio.clock_rate(), Some(48000));
        assert_eq!(sdp.ice_ufrag, "abcd");
        assert_eq!(sdp.ice_pwd, "secretpwd");
        assert_eq!(sdp.fingerprint_algorithm, "sha-256");
        assert_eq!(sdp.fingerprint_hex, "AA:BB:CC");
    }

    #[test]
    fn roundtrip_through_parse_emit_parse_preserves_negotiated_fields() {
        let first = parse(&sample_answer()).unwrap();
        let text = emit(&first);
        let second = parse(&text).unwrap();

        let v1 = first.video.as_ref().unwrap();
        let v2 = second.video.as_ref().unwrap();
        assert_eq!(v1.ssrc_group_fid, v2.ssrc_group_fid);
        assert_eq!(v1.primary_payload_type(), v2.primary_payload_type());
        assert_eq!(v1.clock_rate(), v2.clock_rate());
        assert_eq!(v1.direction, v2.direction);

        assert_eq!(first.ice_ufrag, second.ice_ufrag);
        assert_eq!(first.ice_pwd, second.ice_pwd);
        assert_eq!(first.fingerprint_algorithm, second.fingerprint_algorithm);
        assert_eq!(first.fingerprint_hex, second.fingerprint_hex);
    }

    #[test]
    fn rtx_ssrc_group_orders_primary_before_rtx() {
        let sdp = parse(&sample_answer()).unwrap();
        let video = sdp.video.unwrap();
        let (primary, rtx) = video.ssrc_group_fid.unwrap();
        assert_eq!(primary, 111);
        assert_eq!(rtx, 222);
    }
}
