//! Sled-backed persistent store: transcript cache and API token set.
//!
//! Two trees in one database:
//! - `transcripts`: video ID -> JSON array of segments (upsert, last writer wins)
//! - `api_tokens`: token -> empty value (set membership)
//!
//! Every write is flushed before returning so entries survive a restart.
//! Calls are synchronous; async callers go through `spawn_blocking`.

use std::path::Path;

use crate::error::StoreError;
use crate::transcript::Transcript;

pub const DEFAULT_DB_PATH: &str = "./data/transcripts";

const TRANSCRIPTS_TREE: &str = "transcripts";
const TOKENS_TREE: &str = "api_tokens";

/// Handle to the transcript/token database. Cheap to clone; clones share the same sled instance.
#[derive(Clone)]
pub struct TranscriptStore {
    db: sled::Db,
    transcripts: sled::Tree,
    tokens: sled::Tree,
}

impl TranscriptStore {
    /// Open (or create) the store at `path`, falling back to [`DEFAULT_DB_PATH`].
    pub fn open(path: Option<impl AsRef<Path>>) -> Result<Self, StoreError> {
        let p = path
            .map(|x| x.as_ref().to_path_buf())
            .unwrap_or_else(|| Path::new(DEFAULT_DB_PATH).to_path_buf());
        let db = sled::open(p)?;
        Self::from_db(db)
    }

    /// Throwaway in-memory store; nothing touches disk.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        let transcripts = db.open_tree(TRANSCRIPTS_TREE)?;
        let tokens = db.open_tree(TOKENS_TREE)?;
        Ok(Self {
            db,
            transcripts,
            tokens,
        })
    }

    /// Cached transcript for `video_id`, if any. An entry that no longer decodes counts
    /// as a miss; the next successful fetch overwrites it.
    pub fn get_transcript(&self, video_id: &str) -> Result<Option<Transcript>, StoreError> {
        let Some(bytes) = self.transcripts.get(video_id.as_bytes())? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(transcript) => Ok(Some(transcript)),
            Err(e) => {
                tracing::warn!(
                    target: "ytscribe::store",
                    video_id = video_id,
                    error = %e,
                    "undecodable cache entry, treating as miss"
                );
                Ok(None)
            }
        }
    }

    /// Upsert: replaces any existing entry for `video_id`.
    pub fn put_transcript(&self, video_id: &str, transcript: &Transcript) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(transcript)?;
        let prev = self.transcripts.insert(video_id.as_bytes(), payload)?;
        self.db.flush()?;
        tracing::debug!(
            target: "ytscribe::store",
            video_id = video_id,
            segments = transcript.len(),
            action = if prev.is_some() { "UPDATE" } else { "INSERT" },
            "transcript cached"
        );
        Ok(())
    }

    pub fn is_token_valid(&self, token: &str) -> Result<bool, StoreError> {
        if token.is_empty() {
            return Ok(false);
        }
        Ok(self.tokens.contains_key(token.as_bytes())?)
    }

    /// Insert-if-absent. Re-adding an existing token is a no-op.
    pub fn add_token(&self, token: &str) -> Result<(), StoreError> {
        let empty: &[u8] = &[];
        // Err(CompareAndSwapError) only means the token already exists.
        let _ = self
            .tokens
            .compare_and_swap(token.as_bytes(), None as Option<&[u8]>, Some(empty))?;
        self.db.flush()?;
        Ok(())
    }

    pub fn has_any_token(&self) -> Result<bool, StoreError> {
        Ok(self.tokens.first()?.is_some())
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn transcript_count(&self) -> usize {
        self.transcripts.len()
    }
}

/// Transcript lookup and write-back as seen by the request pipeline.
pub trait TranscriptCache: Send + Sync {
    fn get_transcript(&self, video_id: &str) -> Result<Option<Transcript>, StoreError>;
    fn put_transcript(&self, video_id: &str, transcript: &Transcript) -> Result<(), StoreError>;
}

impl TranscriptCache for TranscriptStore {
    fn get_transcript(&self, video_id: &str) -> Result<Option<Transcript>, StoreError> {
        TranscriptStore::get_transcript(self, video_id)
    }

    fn put_transcript(&self, video_id: &str, transcript: &Transcript) -> Result<(), StoreError> {
        TranscriptStore::put_transcript(self, video_id, transcript)
    }
}
