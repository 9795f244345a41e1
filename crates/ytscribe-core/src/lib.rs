//! ytscribe core library.
//! Cached, token-authenticated English transcripts for YouTube videos.

pub mod auth;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod service;
pub mod store;
pub mod transcript;
pub mod video_id;
pub mod youtube;

pub use auth::{bearer_token, generate_token, TokenAuthenticator};
pub use config::{GatewayConfig, ProxySettings};
pub use error::{FetchError, ServiceError, StoreError};
pub use fetcher::{CaptionTrack, TranscriptFetcher, ENGLISH_LANGUAGE_CODES};
pub use service::{SimpleTranscriptResponse, TranscriptResponse, TranscriptService};
pub use store::{TranscriptCache, TranscriptStore};
pub use transcript::{Segment, Source, Transcript};
pub use video_id::{resolve as resolve_video_id, VideoId};
pub use youtube::YouTubeFetcher;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
