//! YouTube transcript client (InnerTube player API + timed-text).
//!
//! Flow: watch page -> `INNERTUBE_API_KEY` -> player response -> caption track list ->
//! English track -> timed-text body (JSON3) -> [`normalize_payload`].

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::config::ProxySettings;
use crate::error::FetchError;
use crate::fetcher::{normalize_payload, select_english_track, CaptionTrack, TranscriptFetcher};
use crate::transcript::Transcript;
use crate::video_id::VideoId;

const WATCH_URL: &str = "https://www.youtube.com/watch";
const INNERTUBE_PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player";
const INNERTUBE_CLIENT_NAME: &str = "ANDROID";
const INNERTUBE_CLIENT_VERSION: &str = "20.10.38";

pub struct YouTubeFetcher {
    client: reqwest::Client,
}

impl YouTubeFetcher {
    /// Client with a request timeout and, when configured, all traffic through `proxy`.
    pub fn new(timeout: Duration, proxy: Option<&ProxySettings>) -> Result<Self, FetchError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US"),
        );
        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout);
        if let Some(p) = proxy {
            let proxy = reqwest::Proxy::all(&p.url)
                .map_err(|e| FetchError::Upstream(format!("proxy config: {}", e)))?
                .basic_auth(&p.username, &p.password);
            builder = builder.proxy(proxy);
            tracing::info!(target: "ytscribe::fetch", proxy = %p.url, "upstream egress via proxy");
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Upstream(format!("http client: {}", e)))?;
        Ok(Self { client })
    }

    /// All caption tracks listed for `video_id`.
    pub async fn list_tracks(&self, video_id: &VideoId) -> Result<Vec<CaptionTrack>, FetchError> {
        let html = self.fetch_watch_page(video_id).await?;
        let api_key = extract_api_key(&html)?;
        let player = self.fetch_player(video_id, &api_key).await?;
        parse_caption_tracks(&player)
    }

    async fn fetch_watch_page(&self, video_id: &VideoId) -> Result<String, FetchError> {
        let res = self
            .client
            .get(WATCH_URL)
            .query(&[("v", video_id.as_str())])
            .send()
            .await
            .map_err(|e| FetchError::Upstream(format!("watch page request: {}", e)))?;
        check_status(&res)?;
        res.text()
            .await
            .map_err(|e| FetchError::Upstream(format!("watch page read: {}", e)))
    }

    async fn fetch_player(
        &self,
        video_id: &VideoId,
        api_key: &str,
    ) -> Result<serde_json::Value, FetchError> {
        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": INNERTUBE_CLIENT_NAME,
                    "clientVersion": INNERTUBE_CLIENT_VERSION,
                }
            },
            "videoId": video_id.as_str(),
        });
        let res = self
            .client
            .post(INNERTUBE_PLAYER_URL)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| FetchError::Upstream(format!("player request: {}", e)))?;
        check_status(&res)?;
        res.json()
            .await
            .map_err(|e| FetchError::Upstream(format!("player response parse: {}", e)))
    }

    async fn fetch_track(&self, track: &CaptionTrack) -> Result<String, FetchError> {
        if track.base_url.contains("&exp=xpe") {
            return Err(FetchError::Upstream(
                "transcript track requires a PO token".to_string(),
            ));
        }
        let url = json3_url(&track.base_url);
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Upstream(format!("timed-text request: {}", e)))?;
        check_status(&res)?;
        res.text()
            .await
            .map_err(|e| FetchError::Upstream(format!("timed-text read: {}", e)))
    }
}

#[async_trait::async_trait]
impl TranscriptFetcher for YouTubeFetcher {
    async fn fetch(&self, video_id: &VideoId) -> Result<Transcript, FetchError> {
        let tracks = self.list_tracks(video_id).await?;
        let track = select_english_track(&tracks).ok_or_else(|| {
            FetchError::NotAvailable(format!("no English transcript for {}", video_id))
        })?;
        let body = self.fetch_track(track).await?;
        let segments = normalize_payload(&body)?;
        tracing::info!(
            target: "ytscribe::fetch",
            video_id = %video_id,
            language = %track.language_code,
            generated = track.is_generated,
            segments = segments.len(),
            "transcript fetched"
        );
        Ok(Transcript::new(segments))
    }
}

fn check_status(res: &reqwest::Response) -> Result<(), FetchError> {
    let status = res.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::Upstream(
            "YouTube is rate limiting requests from this IP (HTTP 429)".to_string(),
        ));
    }
    if !status.is_success() {
        return Err(FetchError::Upstream(format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown error")
        )));
    }
    Ok(())
}

fn api_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("static regex")
    })
}

pub(crate) fn extract_api_key(html: &str) -> Result<String, FetchError> {
    if html.contains("class=\"g-recaptcha\"") {
        return Err(FetchError::Upstream(
            "request blocked by YouTube (captcha)".to_string(),
        ));
    }
    api_key_re()
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| FetchError::Upstream("watch page unparsable: no InnerTube API key".to_string()))
}

/// Caption tracks from an InnerTube player response.
/// No caption renderer, or an empty track list, means transcripts are disabled.
pub(crate) fn parse_caption_tracks(player: &serde_json::Value) -> Result<Vec<CaptionTrack>, FetchError> {
    check_playability(player)?;

    let tracks: Vec<CaptionTrack> = player
        .get("captions")
        .and_then(|c| c.get("playerCaptionsTracklistRenderer"))
        .and_then(|r| r.get("captionTracks"))
        .and_then(|t| t.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|t| {
                    let language_code = t.get("languageCode")?.as_str()?.to_string();
                    let base_url = t.get("baseUrl")?.as_str()?.to_string();
                    let is_generated = t.get("kind").and_then(|k| k.as_str()) == Some("asr");
                    Some(CaptionTrack {
                        language_code,
                        base_url,
                        is_generated,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    if tracks.is_empty() {
        return Err(FetchError::NotAvailable(
            "transcripts are disabled for this video".to_string(),
        ));
    }
    Ok(tracks)
}

fn check_playability(player: &serde_json::Value) -> Result<(), FetchError> {
    let Some(ps) = player.get("playabilityStatus") else {
        return Ok(());
    };
    let status = ps.get("status").and_then(|s| s.as_str()).unwrap_or("OK");
    if status == "OK" {
        return Ok(());
    }
    let reason = ps.get("reason").and_then(|r| r.as_str()).unwrap_or("no reason given");
    Err(FetchError::Upstream(format!("video unplayable ({}): {}", status, reason)))
}

/// Force the JSON3 timed-text format on a track URL.
fn json3_url(base_url: &str) -> String {
    match url::Url::parse(base_url) {
        Ok(mut u) => {
            let pairs: Vec<(String, String)> = u
                .query_pairs()
                .filter(|(k, _)| k != "fmt")
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            u.query_pairs_mut().clear().extend_pairs(pairs).append_pair("fmt", "json3");
            u.to_string()
        }
        Err(_) => format!("{}&fmt=json3", base_url),
    }
}
