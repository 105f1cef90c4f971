use std::net::IpAddr;

use streamer_shared::{Error, Result};

use crate::model::{Candidate, ExtMapInfo, FmtpInfo, MediaDescription, RtcpFbInfo, RtpMapInfo, SessionDescription, SsrcInfo};

/// Parse an SDP offer or answer into a [`SessionDescription`].
///
/// Unrecognized lines are ignored (a real signaling peer emits attributes
/// this engine does not act on, e.g. `a=sctp-port`); only the lines named
/// in spec §4.2 are interpreted.
pub fn parse(sdp: &str) -> Result<SessionDescription> {
    let mut session = SessionDescription::new();
    let mut current: Option<MediaDescription> = None;
    let mut video: Option<MediaDescription> = None;
    let mut audio: Option<MediaDescription> = None;

    for (lineno, raw_line) in sdp.lines().enumerate() {
        let line = raw_line.trim_end_matches('\r').trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("v=") {
            session.proto_version = rest.to_string();
            continue;
        }
        if let Some(rest) = line.strip_prefix("s=") {
            session.session_name = rest.to_string();
            continue;
        }
        if let Some(rest) = line.strip_prefix("o=") {
            if let Some(id) = rest.split_whitespace().nth(1) {
                session.session_id = id.to_string();
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("m=") {
            if let Some(md) = current.take() {
                if md.is_video {
                    video = Some(md);
                } else {
                    audio = Some(md);
                }
            }
            let mut md = parse_m(rest, lineno)?;
            // media-scoped ice/fingerprint fall back to session-level
            // when emitted once at the top (BUNDLE-style); per-media
            // lines below override.
            md.direction = "sendonly".to_string();
            current = Some(md);
            continue;
        }
        if line.starts_with("a=") {
            parse_attribute(line, lineno, &mut session, current.as_mut())?;
            continue;
        }
        // c=, t=, other unhandled lines are intentionally ignored.
    }

    if let Some(md) = current.take() {
        if md.is_video {
            video = Some(md);
        } else {
            audio = Some(md);
        }
    }

    session.video = video;
    session.audio = audio;
    Ok(session)
}

fn parse_m(rest: &str, lineno: usize) -> Result<MediaDescription> {
    let mut parts = rest.split_whitespace();
    let kind = parts
        .next()
        .ok_or_else(|| Error::ErrSdpParse(lineno, "empty m= line".to_string()))?;
    let is_video = match kind {
        "video" => true,
        "audio" => false,
        other => return Err(Error::ErrSdpParse(lineno, format!("unsupported media type {other}"))),
    };
    // skip port and proto
    let payload_types = parts
        .skip(2)
        .filter_map(|p| p.parse::<u8>().ok())
        .collect();
    Ok(MediaDescription {
        is_video,
        payload_types,
        ..MediaDescription::new(is_video)
    })
}

fn parse_attribute(
    line: &str,
    lineno: usize,
    session: &mut SessionDescription,
    media: Option<&mut MediaDescription>,
) -> Result<()> {
    let body = &line[2..];
    if let Some(rest) = body.strip_prefix("ice-ufrag:") {
        session.ice_ufrag = rest.trim().to_string();
        return Ok(());
    }
    if let Some(rest) = body.strip_prefix("ice-pwd:") {
        session.ice_pwd = rest.trim().to_string();
        return Ok(());
    }
    if let Some(rest) = body.strip_prefix("fingerprint:") {
        let mut it = rest.trim().splitn(2, ' ');
        session.fingerprint_algorithm = it.next().unwrap_or_default().to_string();
        session.fingerprint_hex = it.next().unwrap_or_default().to_string();
        return Ok(());
    }
    if let Some(rest) = body.strip_prefix("setup:") {
        session.setup = rest.trim().to_string();
        return Ok(());
    }
    if let Some(rest) = body.strip_prefix("candidate:") {
        if let Some(c) = parse_candidate(rest, lineno)? {
            session.candidate = Some(c);
        }
        return Ok(());
    }

    let md = match media {
        Some(md) => md,
        None => return Ok(()),
    };

    if let Some(rest) = body.strip_prefix("rtpmap:") {
        md.rtpmaps.push(parse_rtpmap(rest, lineno)?);
    } else if let Some(rest) = body.strip_prefix("fmtp:") {
        md.fmtps.push(parse_fmtp(rest, lineno)?);
    } else if let Some(rest) = body.strip_prefix("rtcp-fb:") {
        md.rtcp_fbs.push(parse_rtcp_fb(rest, lineno)?);
    } else if let Some(rest) = body.strip_prefix("extmap:") {
        md.extmaps.push(parse_extmap(rest, lineno)?);
    } else if let Some(rest) = body.strip_prefix("mid:") {
        md.mid = rest.trim().parse::<u8>().ok();
    } else if let Some(rest) = body.strip_prefix("msid:") {
        md.msid = Some(rest.trim().to_string());
    } else if body == "sendonly" || body == "recvonly" || body == "sendrecv" || body == "inactive" {
        md.direction = body.to_string();
    } else if let Some(rest) = body.strip_prefix("ssrc-group:FID ") {
        let mut it = rest.split_whitespace();
        let primary = it.next().and_then(|s| s.parse::<u32>().ok());
        let rtx = it.next().and_then(|s| s.parse::<u32>().ok());
        if let (Some(p), Some(r)) = (primary, rtx) {
            md.ssrc_group_fid = Some((p, r));
        }
    } else if let Some(rest) = body.strip_prefix("ssrc:") {
        parse_ssrc(rest, md);
    } else if body == "rtcp-mux" {
        md.rtcp_mux = true;
    } else if body == "rtcp-rsize" {
        md.rtcp_rsize = true;
    }
    Ok(())
}

fn parse_rtpmap(rest: &str, lineno: usize) -> Result<RtpMapInfo> {
    let mut it = rest.trim().splitn(2, ' ');
    let pt = it
        .next()
        .and_then(|s| s.parse::<u8>().ok())
        .ok_or_else(|| Error::ErrSdpParse(lineno, "bad rtpmap payload type".to_string()))?;
    let codec_spec = it.next().unwrap_or_default();
    let mut parts = codec_spec.split('/');
    let codec = parts.next().unwrap_or_default().to_string();
    let clock_rate = parts.next().and_then(|s| s.parse::<u32>().ok()).unwrap_or(0);
    let channels = parts.next().and_then(|s| s.parse::<u8>().ok());
    Ok(RtpMapInfo {
        payload_type: pt,
        codec,
        clock_rate,
        channels,
    })
}

fn parse_fmtp(rest: &str, lineno: usize) -> Result<FmtpInfo> {
    let mut it = rest.trim().splitn(2, ' ');
    let pt = it
        .next()
        .and_then(|s| s.parse::<u8>().ok())
        .ok_or_else(|| Error::ErrSdpParse(lineno, "bad fmtp payload type".to_string()))?;
    let attr = it.next().unwrap_or_default().to_string();
    Ok(FmtpInfo::new(pt, attr))
}

fn parse_rtcp_fb(rest: &str, lineno: usize) -> Result<RtcpFbInfo> {
    let mut it = rest.trim().splitn(2, ' ');
    let pt = it
        .next()
        .and_then(|s| s.parse::<u8>().ok())
        .ok_or_else(|| Error::ErrSdpParse(lineno, "bad rtcp-fb payload type".to_string()))?;
    let attr = it.next().unwrap_or_default().to_string();
    Ok(RtcpFbInfo { payload_type: pt, attr })
}

fn parse_extmap(rest: &str, lineno: usize) -> Result<ExtMapInfo> {
    let mut it = rest.trim().splitn(2, ' ');
    let id = it
        .next()
        .and_then(|s| s.parse::<u8>().ok())
        .ok_or_else(|| Error::ErrSdpParse(lineno, "bad extmap id".to_string()))?;
    let uri = it.next().unwrap_or_default().trim().to_string();
    Ok(ExtMapInfo { id, uri })
}

fn parse_ssrc(rest: &str, md: &mut MediaDescription) {
    let mut it = rest.trim().splitn(2, ' ');
    let ssrc: u32 = match it.next().and_then(|s| s.parse().ok()) {
        Some(s) => s,
        None => return,
    };
    let attr = it.next().unwrap_or_default();
    let entry = md.ssrcs.iter_mut().find(|s| s.ssrc == ssrc);
    let entry = match entry {
        Some(e) => e,
        None => {
            md.ssrcs.push(SsrcInfo {
                ssrc,
                ..Default::default()
            });
            md.ssrcs.last_mut().unwrap()
        }
    };
    if let Some(cname) = attr.strip_prefix("cname:") {
        entry.cname = cname.to_string();
    } else if let Some(msid) = attr.strip_prefix("msid:") {
        entry.msid = Some(msid.to_string());
    }
}

fn parse_candidate(rest: &str, lineno: usize) -> Result<Option<Candidate>> {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() < 6 {
        return Err(Error::ErrSdpBadCandidate);
    }
    let ip: IpAddr = fields[4]
        .parse()
        .map_err(|_| Error::ErrSdpParse(lineno, "bad candidate ip".to_string()))?;
    let port: u16 = fields[5]
        .parse()
        .map_err(|_| Error::ErrSdpParse(lineno, "bad candidate port".to_string()))?;
    let typ = fields
        .iter()
        .position(|f| *f == "typ")
        .and_then(|i| fields.get(i + 1))
        .unwrap_or(&"host")
        .to_string();
    Ok(Some(Candidate {
        foundation: fields[0].to_string(),
        component: fields[1].parse().unwrap_or(1),
        proto: fields[2].to_string(),
        priority: fields[3].parse().unwrap_or(0),
        ip,
        port,
        typ,
    }))
}
