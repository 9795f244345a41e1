//! Video ID resolution: long-form URL, short link, or raw ID.
//!
//! Anything without a YouTube domain marker is taken as a raw ID and passed through
//! unchanged. The ID format itself is not validated; a malformed ID simply misses
//! upstream and surfaces as an unavailable transcript.

use serde::{Deserialize, Serialize};
use url::Url;

const LONG_FORM_MARKER: &str = "youtube.com";
const SHORT_LINK_MARKER: &str = "youtu.be";

/// Canonical video identifier used as the cache key and the upstream lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve user input into a [`VideoId`]. `None` means the input cannot name a video:
/// empty input, a long-form URL without `v`, a short link without a path, or an unparsable URL.
pub fn resolve(input: &str) -> Option<VideoId> {
    if input.is_empty() {
        return None;
    }
    if !input.contains(LONG_FORM_MARKER) && !input.contains(SHORT_LINK_MARKER) {
        return Some(VideoId(input.to_string()));
    }

    let url = parse_lenient(input)?;
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

    if host.contains(LONG_FORM_MARKER) {
        return url
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
            .map(VideoId);
    }
    if host.contains(SHORT_LINK_MARKER) {
        let id = url.path().trim_start_matches('/');
        return (!id.is_empty()).then(|| VideoId(id.to_string()));
    }

    // Marker appears somewhere other than the host, e.g. in a query string.
    Some(VideoId(input.to_string()))
}

/// Scheme-less inputs such as `youtu.be/abc` are parsed as https.
fn parse_lenient(input: &str) -> Option<Url> {
    let trimmed = input.trim();
    if trimmed.contains("://") {
        Url::parse(trimmed).ok()
    } else {
        Url::parse(&format!("https://{}", trimmed)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Option<String> {
        resolve(s).map(VideoId::into_string)
    }

    #[test]
    fn long_form_url() {
        assert_eq!(id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn long_form_url_ignores_other_params() {
        assert_eq!(id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(
            id("https://m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&list=PL1").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn long_form_without_v_is_invalid() {
        assert_eq!(id("https://www.youtube.com/channel/UC123"), None);
        assert_eq!(id("https://www.youtube.com/watch?v="), None);
    }

    #[test]
    fn short_link_uses_path() {
        assert_eq!(id("https://youtu.be/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(id("https://youtu.be/_NuH3D4SN-c?si=VSFea_rMwtaiR8Q7").as_deref(), Some("_NuH3D4SN-c"));
    }

    #[test]
    fn short_link_without_path_is_invalid() {
        assert_eq!(id("https://youtu.be/"), None);
    }

    #[test]
    fn scheme_less_urls() {
        assert_eq!(id("youtu.be/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(id("www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn raw_ids_pass_through_unchanged() {
        assert_eq!(id("dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(id("some-random-string").as_deref(), Some("some-random-string"));
        assert_eq!(id(" spaced ").as_deref(), Some(" spaced "));
    }

    #[test]
    fn marker_outside_host_passes_through() {
        let raw = "https://example.com/?ref=youtube.com";
        assert_eq!(id(raw).as_deref(), Some(raw));
    }

    #[test]
    fn empty_is_invalid() {
        assert_eq!(id(""), None);
    }
}
