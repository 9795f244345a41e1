//! Request orchestrator: authenticate -> resolve -> cache -> fetch on miss -> cache write.
//!
//! Concurrent misses for the same video ID share one in-flight fetch. The first request
//! spawns it and registers a shared handle; later requests await that handle and get the
//! same result, success or failure. The spawned task owns the fetch and the cache write,
//! so a dropped request does not cancel them, and every waiter is bounded by the one
//! upstream timeout.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;

use crate::auth::TokenAuthenticator;
use crate::error::{FetchError, ServiceError};
use crate::fetcher::TranscriptFetcher;
use crate::store::{TranscriptCache, TranscriptStore};
use crate::transcript::{Source, Transcript};
use crate::video_id::{self, VideoId};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

type InflightFetch = Shared<BoxFuture<'static, Result<(Transcript, Source), ServiceError>>>;

/// Segment-array response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptResponse {
    pub video_id: String,
    pub transcript: Transcript,
    pub source: Source,
}

/// Flattened-text response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleTranscriptResponse {
    pub video_id: String,
    pub transcript: String,
    pub source: Source,
}

#[derive(Clone)]
pub struct TranscriptService {
    store: TranscriptStore,
    cache: Arc<dyn TranscriptCache>,
    auth: TokenAuthenticator,
    fetcher: Arc<dyn TranscriptFetcher>,
    inflight: Arc<DashMap<String, InflightFetch>>,
    fetch_timeout: Duration,
}

impl TranscriptService {
    pub fn new(store: TranscriptStore, fetcher: Arc<dyn TranscriptFetcher>) -> Self {
        Self {
            auth: TokenAuthenticator::new(store.clone()),
            cache: Arc::new(store.clone()),
            store,
            fetcher,
            inflight: Arc::new(DashMap::new()),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Serve transcripts from `cache` instead of the store's own tree. Tokens stay in the store.
    pub fn with_cache(mut self, cache: Arc<dyn TranscriptCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }

    pub fn authenticator(&self) -> &TokenAuthenticator {
        &self.auth
    }

    /// Credential check alone, off the async workers.
    pub async fn authorize(&self, credential: Option<&str>) -> Result<(), ServiceError> {
        let auth = self.auth.clone();
        let credential = credential.map(str::to_string);
        blocking(move || auth.authenticate(credential.as_deref())).await?
    }

    pub async fn get_transcript(
        &self,
        credential: Option<&str>,
        raw_id: &str,
    ) -> Result<TranscriptResponse, ServiceError> {
        let (video_id, transcript, source) = self.resolve_transcript(credential, raw_id).await?;
        Ok(TranscriptResponse {
            video_id: video_id.into_string(),
            transcript,
            source,
        })
    }

    /// Same pipeline as [`Self::get_transcript`], with segment texts joined by single spaces.
    pub async fn get_transcript_flattened(
        &self,
        credential: Option<&str>,
        raw_id: &str,
    ) -> Result<SimpleTranscriptResponse, ServiceError> {
        let (video_id, transcript, source) = self.resolve_transcript(credential, raw_id).await?;
        Ok(SimpleTranscriptResponse {
            video_id: video_id.into_string(),
            transcript: transcript.flatten(),
            source,
        })
    }

    async fn resolve_transcript(
        &self,
        credential: Option<&str>,
        raw_id: &str,
    ) -> Result<(VideoId, Transcript, Source), ServiceError> {
        self.authorize(credential).await?;

        let video_id = video_id::resolve(raw_id).ok_or(ServiceError::InvalidVideoId)?;

        if let Some(cached) = self.cached(&video_id).await? {
            tracing::info!(target: "ytscribe::service", video_id = %video_id, source = %Source::Cache, "cache hit");
            return Ok((video_id, cached, Source::Cache));
        }

        let (transcript, source) = self.join_or_start_fetch(&video_id).await?;
        Ok((video_id, transcript, source))
    }

    async fn cached(&self, video_id: &VideoId) -> Result<Option<Transcript>, ServiceError> {
        let cache = Arc::clone(&self.cache);
        let key = video_id.as_str().to_string();
        Ok(blocking(move || cache.get_transcript(&key)).await??)
    }

    /// Await the in-flight fetch for `video_id`, starting one if there is none.
    /// Only the request that started it reports [`Source::Fetched`]; joiners report the cache.
    async fn join_or_start_fetch(&self, video_id: &VideoId) -> Result<(Transcript, Source), ServiceError> {
        let (inflight, leader) = match self.inflight.entry(video_id.as_str().to_string()) {
            Entry::Occupied(e) => (e.get().clone(), false),
            Entry::Vacant(e) => {
                let this = self.clone();
                let id = video_id.clone();
                let task = tokio::spawn(async move {
                    let result = this.fetch_once(&id).await;
                    this.inflight.remove(id.as_str());
                    result
                });
                let shared = async move {
                    task.await
                        .map_err(|e| ServiceError::Internal(format!("fetch task failed: {}", e)))?
                }
                .boxed()
                .shared();
                e.insert(shared.clone());
                (shared, true)
            }
        };

        let (transcript, source) = inflight.await?;
        if leader {
            Ok((transcript, source))
        } else {
            tracing::debug!(target: "ytscribe::service", video_id = %video_id, "joined in-flight fetch");
            Ok((transcript, Source::Cache))
        }
    }

    /// Body of the shared fetch task. A previous task may have filled the cache between
    /// this request's miss and the task starting, so look once more before going upstream.
    async fn fetch_once(&self, video_id: &VideoId) -> Result<(Transcript, Source), ServiceError> {
        if let Some(cached) = self.cached(video_id).await? {
            return Ok((cached, Source::Cache));
        }
        self.fetch_and_store(video_id).await.map(|t| (t, Source::Fetched))
    }

    async fn fetch_and_store(&self, video_id: &VideoId) -> Result<Transcript, ServiceError> {
        tracing::info!(target: "ytscribe::service", video_id = %video_id, "cache miss, fetching upstream");
        let transcript = match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(video_id)).await {
            Ok(Ok(t)) => t,
            Ok(Err(e)) => {
                tracing::warn!(target: "ytscribe::service", video_id = %video_id, error = %e, "upstream fetch failed");
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(target: "ytscribe::service", video_id = %video_id, "upstream fetch timed out");
                return Err(FetchError::Upstream(format!(
                    "upstream fetch timed out after {}s",
                    self.fetch_timeout.as_secs_f64()
                ))
                .into());
            }
        };
        if transcript.is_empty() {
            tracing::warn!(target: "ytscribe::service", video_id = %video_id, "upstream returned an empty transcript");
        }

        // A failed write is logged; the fetched transcript is still returned.
        let cache = Arc::clone(&self.cache);
        let key = video_id.as_str().to_string();
        let value = transcript.clone();
        let write = match blocking(move || cache.put_transcript(&key, &value)).await {
            Ok(res) => res.map_err(ServiceError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = write {
            tracing::error!(target: "ytscribe::service", video_id = %video_id, error = %e, "failed to cache transcript");
        }
        Ok(transcript)
    }
}

/// Run a sled call off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::Internal(format!("store task failed: {}", e)))
}
