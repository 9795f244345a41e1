//! Transcript fetcher seam: track selection and payload normalization.
//!
//! Whatever shape the timed-text endpoint hands back (JSON3 events or legacy XML
//! `<text>` nodes) is normalized here into [`Segment`]s. Nothing outside this module
//! and [`crate::youtube`] sees the raw upstream shape.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::FetchError;
use crate::transcript::{Segment, Transcript};
use crate::video_id::VideoId;

/// English variants, tried in order. Within one code a manual track beats a generated one.
pub const ENGLISH_LANGUAGE_CODES: &[&str] = &["en", "en-US", "en-GB"];

/// Upstream transcript source. Implemented by [`crate::youtube::YouTubeFetcher`]; tests supply mocks.
#[async_trait::async_trait]
pub trait TranscriptFetcher: Send + Sync {
    async fn fetch(&self, video_id: &VideoId) -> Result<Transcript, FetchError>;
}

/// One caption track listed for a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTrack {
    pub language_code: String,
    pub base_url: String,
    pub is_generated: bool,
}

/// Best track for the first of `codes` that has any: manual first, then generated.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], codes: &[&str]) -> Option<&'a CaptionTrack> {
    codes.iter().find_map(|code| {
        let mut matching = tracks.iter().filter(|t| t.language_code == *code);
        let first = matching.next()?;
        if !first.is_generated {
            return Some(first);
        }
        Some(matching.find(|t| !t.is_generated).unwrap_or(first))
    })
}

pub fn select_english_track(tracks: &[CaptionTrack]) -> Option<&CaptionTrack> {
    select_track(tracks, ENGLISH_LANGUAGE_CODES)
}

#[derive(Debug, Deserialize)]
struct Json3Payload {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    #[serde(default)]
    t_start_ms: Option<f64>,
    #[serde(default)]
    d_duration_ms: Option<f64>,
    #[serde(default)]
    segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Normalize a timed-text body into segments. Accepts JSON3 or XML; blank lines are dropped.
pub fn normalize_payload(body: &str) -> Result<Vec<Segment>, FetchError> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') {
        normalize_json3(trimmed)
    } else if trimmed.starts_with('<') {
        Ok(normalize_xml(trimmed))
    } else if trimmed.is_empty() {
        Err(FetchError::Upstream("empty transcript payload".to_string()))
    } else {
        Err(FetchError::Upstream("unrecognized transcript payload".to_string()))
    }
}

fn normalize_json3(body: &str) -> Result<Vec<Segment>, FetchError> {
    let payload: Json3Payload = serde_json::from_str(body)
        .map_err(|e| FetchError::Upstream(format!("transcript payload parse: {}", e)))?;
    Ok(payload
        .events
        .into_iter()
        .filter_map(|ev| {
            let text: String = ev.segs?.into_iter().map(|s| s.utf8).collect();
            let text = text.replace('\n', " ");
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            Some(Segment::new(
                text,
                ev.t_start_ms.unwrap_or(0.0) / 1000.0,
                ev.d_duration_ms.unwrap_or(0.0) / 1000.0,
            ))
        })
        .collect())
}

fn text_node_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<text\b([^>]*)>(.*?)</text>"#).expect("static regex")
    })
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(\w+)="([^"]*)""#).expect("static regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

fn normalize_xml(body: &str) -> Vec<Segment> {
    text_node_re()
        .captures_iter(body)
        .filter_map(|caps| {
            let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let raw = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let mut start = 0.0;
            let mut duration = 0.0;
            for a in attr_re().captures_iter(attrs) {
                match &a[1] {
                    "start" => start = a[2].parse().unwrap_or(0.0),
                    "dur" => duration = a[2].parse().unwrap_or(0.0),
                    _ => {}
                }
            }
            // Entities can be double-encoded (`&amp;#39;`), so unescape, strip tags, unescape again.
            let once = unescape_entities(raw);
            let stripped = tag_re().replace_all(&once, "");
            let text = unescape_entities(&stripped).replace('\n', " ");
            let text = text.trim();
            (!text.is_empty()).then(|| Segment::new(text, start, duration))
        })
        .collect()
}

fn unescape_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').filter(|&end| end <= 10) {
            Some(end) => {
                let entity = &tail[1..end];
                match decode_entity(entity) {
                    Some(c) => out.push(c),
                    None => out.push_str(&tail[..=end]),
                }
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(code: &str, generated: bool) -> CaptionTrack {
        CaptionTrack {
            language_code: code.to_string(),
            base_url: format!("https://example.com/{}", code),
            is_generated: generated,
        }
    }

    #[test]
    fn english_selection_follows_code_order() {
        let tracks = vec![track("en-GB", false), track("de", false), track("en-US", true)];
        assert_eq!(select_english_track(&tracks).unwrap().language_code, "en-US");

        let tracks = vec![track("en-GB", false), track("en", true)];
        assert_eq!(select_english_track(&tracks).unwrap().language_code, "en");
    }

    #[test]
    fn generated_track_is_eligible() {
        let tracks = vec![track("fr", false), track("en", true)];
        let picked = select_english_track(&tracks).unwrap();
        assert!(picked.is_generated);
    }

    #[test]
    fn manual_track_beats_generated_for_same_code() {
        let mut asr = track("en", true);
        asr.base_url = "https://example.com/asr".into();
        let tracks = vec![asr, track("en", false), track("en-US", false)];
        let picked = select_english_track(&tracks).unwrap();
        assert_eq!(picked.language_code, "en");
        assert!(!picked.is_generated);
        assert_eq!(picked.base_url, "https://example.com/en");
    }

    #[test]
    fn no_english_track() {
        let tracks = vec![track("fr", false), track("en-AU", false)];
        assert!(select_english_track(&tracks).is_none());
        assert!(select_english_track(&[]).is_none());
    }

    #[test]
    fn json3_events_become_segments() {
        let body = r#"{"wireMagic":"pb3","events":[
            {"tStartMs":0,"dDurationMs":1500,"segs":[{"utf8":"Never gonna "},{"utf8":"give you up"}]},
            {"tStartMs":1500,"dDurationMs":10,"aAppend":1,"segs":[{"utf8":"\n"}]},
            {"tStartMs":1500,"dDurationMs":2000},
            {"tStartMs":3500,"dDurationMs":1250,"segs":[{"utf8":"let you\ndown"}]}
        ]}"#;
        let segs = normalize_payload(body).unwrap();
        assert_eq!(
            segs,
            vec![
                Segment::new("Never gonna give you up", 0.0, 1.5),
                Segment::new("let you down", 3.5, 1.25),
            ]
        );
    }

    #[test]
    fn xml_text_nodes_become_segments() {
        let body = r##"<?xml version="1.0" encoding="utf-8" ?><transcript>
            <text start="0.5" dur="1.25">Tom &amp;amp; Jerry&amp;#39;s</text>
            <text start="1.75" dur="2">  </text>
            <text start="3.75" dur="0.5"><font color="#E5E5E5">hi</font> there</text>
        </transcript>"##;
        let segs = normalize_payload(body).unwrap();
        assert_eq!(
            segs,
            vec![
                Segment::new("Tom & Jerry's", 0.5, 1.25),
                Segment::new("hi there", 3.75, 0.5),
            ]
        );
    }

    #[test]
    fn garbage_payload_is_upstream_error() {
        assert!(matches!(normalize_payload(""), Err(FetchError::Upstream(_))));
        assert!(matches!(normalize_payload("nope"), Err(FetchError::Upstream(_))));
        assert!(matches!(normalize_payload("{not json"), Err(FetchError::Upstream(_))));
    }

    #[test]
    fn entity_decoding() {
        assert_eq!(unescape_entities("a &lt;b&gt; &#39;c&#x27; &unknown; & d"), "a <b> 'c' &unknown; & d");
    }
}
