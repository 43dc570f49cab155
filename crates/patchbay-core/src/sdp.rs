// ── SDP secondary-stream filter ──
//
// ST 2022-7 senders describe their redundant legs as extra media
// sections tied together by `a=group:DUP <mid> <mid> ...`. Receivers
// without a second interface reject such files, so everything after the
// first MID of each DUP group is cut out before staging.

use std::collections::HashSet;

/// Remove all but the first media section of every `a=group:DUP` group.
///
/// Session-level lines are kept verbatim. Output uses CRLF line endings
/// with a trailing CRLF.
pub fn remove_secondary_streams(sdp: &str) -> String {
    let dropped: HashSet<&str> = sdp
        .lines()
        .filter_map(|line| line.strip_prefix("a=group:DUP"))
        .flat_map(|mids| mids.split_whitespace().skip(1))
        .collect();

    let mut kept: Vec<&str> = Vec::new();
    let mut section: Vec<&str> = Vec::new();
    let mut section_mid: Option<&str> = None;

    for line in sdp.lines() {
        if line.starts_with("m=") {
            flush(&mut kept, &mut section, section_mid.take(), &dropped);
        }
        if let Some(mid) = line.strip_prefix("a=mid:") {
            section_mid = Some(mid.trim());
        }
        section.push(line);
    }
    flush(&mut kept, &mut section, section_mid, &dropped);

    let mut out = kept.join("\r\n");
    out.push_str("\r\n");
    out
}

fn flush<'a>(
    kept: &mut Vec<&'a str>,
    section: &mut Vec<&'a str>,
    mid: Option<&str>,
    dropped: &HashSet<&str>,
) {
    if mid.is_none_or(|m| !dropped.contains(m)) {
        kept.append(section);
    } else {
        section.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DUP_SDP: &str = "v=0\r\n\
o=- 1 1 IN IP4 10.0.0.1\r\n\
s=CAM1\r\n\
t=0 0\r\n\
a=group:DUP 1 2\r\n\
m=video 5004 RTP/AVP 96\r\n\
c=IN IP4 239.0.0.1/32\r\n\
a=mid:1\r\n\
m=video 5004 RTP/AVP 96\r\n\
c=IN IP4 239.1.0.1/32\r\n\
a=mid:2\r\n";

    #[test]
    fn keeps_only_first_dup_leg() {
        let out = remove_secondary_streams(DUP_SDP);
        assert_eq!(
            out,
            "v=0\r\n\
o=- 1 1 IN IP4 10.0.0.1\r\n\
s=CAM1\r\n\
t=0 0\r\n\
a=group:DUP 1 2\r\n\
m=video 5004 RTP/AVP 96\r\n\
c=IN IP4 239.0.0.1/32\r\n\
a=mid:1\r\n"
        );
        assert!(!out.contains("239.1.0.1"));
    }

    #[test]
    fn sdp_without_groups_only_normalizes_line_endings() {
        let sdp = "v=0\ns=plain\nm=audio 5004 RTP/AVP 97\na=rtpmap:97 L24/48000/2\n";
        assert_eq!(
            remove_secondary_streams(sdp),
            "v=0\r\ns=plain\r\nm=audio 5004 RTP/AVP 97\r\na=rtpmap:97 L24/48000/2\r\n"
        );
    }

    #[test]
    fn sections_without_mid_are_kept() {
        let sdp = "v=0\r\na=group:DUP a b\r\nm=video 1 RTP/AVP 96\r\nm=video 2 RTP/AVP 96\r\na=mid:b\r\n";
        assert_eq!(
            remove_secondary_streams(sdp),
            "v=0\r\na=group:DUP a b\r\nm=video 1 RTP/AVP 96\r\n"
        );
    }
}
