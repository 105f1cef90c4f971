use std::fmt::Write as _;

use crate::model::{MediaDescription, SessionDescription};

/// Emit a negotiated [`SessionDescription`] back to SDP text, in the fixed
/// order spec §4.2 requires: version, origin, session name, timing, basic
/// attrs, then video block, then audio block.
pub fn emit(session: &SessionDescription) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "v={}", session.proto_version);
    let _ = writeln!(out, "o=- {} 2 IN IP4 127.0.0.1", session.session_id);
    let _ = writeln!(out, "s={}", session.session_name);
    let _ = writeln!(out, "t=0 0");

    let has_video = session.video.is_some();
    let has_audio = session.audio.is_some();
    out.push_str("a=extmap-allow-mixed\n");
    out.push_str("a=msid-semantic: WMS\n");
    out.push_str("a=group:BUNDLE");
    let mut index = 0;
    if has_video {
        let _ = write!(out, " {index}");
        index += 1;
    }
    if has_audio {
        let _ = write!(out, " {index}");
    }
    out.push('\n');

    if let Some(video) = &session.video {
        emit_media(&mut out, session, video);
    }
    if let Some(audio) = &session.audio {
        emit_media(&mut out, session, audio);
    }
    out
}

fn emit_media(out: &mut String, session: &SessionDescription, md: &MediaDescription) {
    let kind = if md.is_video { "video" } else { "audio" };
    let _ = write!(out, "m={kind} 9 UDP/TLS/RTP/SAVPF");
    for pt in &md.payload_types {
        let _ = write!(out, " {pt}");
    }
    out.push('\n');
    out.push_str("c=IN IP4 0.0.0.0\n");

    for rtpmap in &md.rtpmaps {
        let _ = write!(out, "a=rtpmap:{} {}/{}", rtpmap.payload_type, rtpmap.codec, rtpmap.clock_rate);
        if let Some(ch) = rtpmap.channels {
            let _ = write!(out, "/{ch}");
        }
        out.push('\n');
    }
    for fmtp in &md.fmtps {
        let _ = writeln!(out, "a=fmtp:{} {}", fmtp.payload_type, fmtp.attr);
    }
    out.push_str("a=rtcp:9 IN IP4 0.0.0.0\n");
    for fb in &md.rtcp_fbs {
        let _ = writeln!(out, "a=rtcp-fb:{} {}", fb.payload_type, fb.attr);
    }
    for ext in &md.extmaps {
        let _ = writeln!(out, "a=extmap:{} {}", ext.id, ext.uri);
    }

    let _ = writeln!(out, "a=setup:{}", session.setup);
    if let Some(mid) = md.mid {
        let _ = writeln!(out, "a=mid:{mid}");
    }
    if let Some(msid) = &md.msid {
        let _ = writeln!(out, "a=msid:{msid}");
    }
    let _ = writeln!(out, "a={}", md.direction);

    if !session.ice_ufrag.is_empty() {
        let _ = writeln!(out, "a=ice-ufrag:{}", session.ice_ufrag);
    }
    if !session.ice_pwd.is_empty() {
        let _ = writeln!(out, "a=ice-pwd:{}", session.ice_pwd);
    }
    if !session.fingerprint_hex.is_empty() {
        let _ = writeln!(out, "a=fingerprint:{} {}", session.fingerprint_algorithm, session.fingerprint_hex);
    }

    if let Some((primary, rtx)) = md.ssrc_group_fid {
        let _ = writeln!(out, "a=ssrc-group:FID {primary} {rtx}");
    }
    for ssrc in &md.ssrcs {
        if !ssrc.cname.is_empty() {
            let _ = writeln!(out, "a=ssrc:{} cname:{}", ssrc.ssrc, ssrc.cname);
        }
        if let Some(msid) = &ssrc.msid {
            let _ = writeln!(out, "a=ssrc:{} msid:{}", ssrc.ssrc, msid);
        }
    }
    if md.rtcp_mux {
        out.push_str("a=rtcp-mux\n");
    }
    if md.rtcp_rsize {
        out.push_str("a=rtcp-rsize\n");
    }
}
