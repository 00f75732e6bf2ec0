//! Synthesized audio cache with in-flight request sharing.
//!
//! Clips are keyed by `(segment index, voice)`.  At most one request per key
//! is outstanding at any time: a second caller for a key that is already
//! being fetched awaits the same shared future instead of issuing a new
//! request.
//!
//! ```text
//! fetch(key) ─┬─ ready?    ──▶ clip
//!             ├─ pending?  ──▶ await shared future
//!             └─ otherwise ──▶ spawn gateway request, register as pending
//!                               └─ on success: store (unless cleared since)
//! ```
//!
//! [`AudioCache::clear`] bumps an epoch so requests that were started before
//! the clear can still resolve for their waiters but never repopulate the
//! cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;

use crate::audio::{AudioClip, PcmFormat};
use crate::gateway::{GatewayError, SynthesisGateway, SynthesisRequest};

// ---------------------------------------------------------------------------
// FetchError
// ---------------------------------------------------------------------------

/// Why a clip could not be produced.  `Clone` so one failure can be handed
/// to every waiter of a shared request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The backend's message, unchanged.
    #[error("{0}")]
    Gateway(String),

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("segment {0} has no text")]
    EmptyText(usize),

    #[error("no segment at index {0}")]
    InvalidIndex(usize),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<GatewayError> for FetchError {
    fn from(e: GatewayError) -> Self {
        FetchError::Gateway(e.to_string())
    }
}

pub type FetchResult = Result<Arc<AudioClip>, FetchError>;

type PendingFetch = Shared<BoxFuture<'static, FetchResult>>;

enum Lookup {
    Ready(Arc<AudioClip>),
    Pending(PendingFetch),
}

// ---------------------------------------------------------------------------
// AudioCache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub index: usize,
    pub voice: String,
}

impl CacheKey {
    pub fn new(index: usize, voice: impl Into<String>) -> Self {
        Self {
            index,
            voice: voice.into(),
        }
    }
}

#[derive(Default)]
struct CacheInner {
    ready: HashMap<CacheKey, Arc<AudioClip>>,
    pending: HashMap<CacheKey, PendingFetch>,
    epoch: u64,
}

/// Clips that are ready plus requests that are still running.
#[derive(Default)]
pub struct AudioCache {
    inner: Mutex<CacheInner>,
}

impl AudioCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<AudioClip>> {
        self.lock().ready.get(key).cloned()
    }

    /// `true` if the key is ready or being fetched.
    pub fn is_known(&self, key: &CacheKey) -> bool {
        let inner = self.lock();
        inner.ready.contains_key(key) || inner.pending.contains_key(key)
    }

    /// Number of ready clips.
    pub fn len(&self) -> usize {
        self.lock().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every clip and forget running requests.
    ///
    /// Returns how many ready clips were released.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.pending.clear();
        let released = inner.ready.len();
        inner.ready.clear();
        if released > 0 {
            log::debug!("audio cache cleared ({released} clip(s) released)");
        }
        released
    }

    /// Record the outcome of a request started in `epoch`.
    fn settle(&self, key: &CacheKey, epoch: u64, result: &FetchResult) {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            log::debug!("discarding clip for segment {} from before a cache clear", key.index);
            return;
        }
        inner.pending.remove(key);
        if let Ok(clip) = result {
            // A concurrent writer may have stored the key first; keep theirs.
            inner
                .ready
                .entry(key.clone())
                .or_insert_with(|| Arc::clone(clip));
        }
    }
}

// ---------------------------------------------------------------------------
// AudioFetcher
// ---------------------------------------------------------------------------

/// Gateway plus cache: produces clips, sharing requests per key.
#[derive(Clone)]
pub struct AudioFetcher {
    gateway: Arc<dyn SynthesisGateway>,
    cache: Arc<AudioCache>,
    default_rate: u32,
}

impl AudioFetcher {
    pub fn new(gateway: Arc<dyn SynthesisGateway>, default_rate: u32) -> Self {
        Self {
            gateway,
            cache: Arc::new(AudioCache::new()),
            default_rate,
        }
    }

    pub fn cache(&self) -> &AudioCache {
        &self.cache
    }

    /// Produce the clip for `key`, speaking `text`.
    ///
    /// Must be polled inside a tokio runtime: new requests are spawned so
    /// they keep running when every waiter goes away.
    pub async fn fetch(&self, key: CacheKey, text: String) -> FetchResult {
        match self.lookup_or_start(key, text) {
            Lookup::Ready(clip) => Ok(clip),
            Lookup::Pending(pending) => pending.await,
        }
    }

    fn lookup_or_start(&self, key: CacheKey, text: String) -> Lookup {
        let mut inner = self.cache.lock();
        if let Some(clip) = inner.ready.get(&key) {
            return Lookup::Ready(Arc::clone(clip));
        }
        if let Some(pending) = inner.pending.get(&key) {
            log::debug!("joining running request for segment {}", key.index);
            return Lookup::Pending(pending.clone());
        }
        let pending = self.start(key.clone(), text, inner.epoch);
        inner.pending.insert(key, pending.clone());
        Lookup::Pending(pending)
    }

    fn start(&self, key: CacheKey, text: String, epoch: u64) -> PendingFetch {
        log::debug!("synthesizing segment {} with voice {}", key.index, key.voice);
        let gateway = Arc::clone(&self.gateway);
        let cache = Arc::clone(&self.cache);
        let default_rate = self.default_rate;

        let task = tokio::spawn(async move {
            let result = synthesize(gateway.as_ref(), &key, text, default_rate).await;
            if let Err(e) = &result {
                log::warn!("synthesis of segment {} failed: {e}", key.index);
            }
            cache.settle(&key, epoch, &result);
            result
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(FetchError::Internal(e.to_string())))
        }
        .boxed()
        .shared()
    }
}

/// One gateway round trip: request, base64 decode, WAV wrap.
async fn synthesize(
    gateway: &dyn SynthesisGateway,
    key: &CacheKey,
    text: String,
    default_rate: u32,
) -> FetchResult {
    if text.trim().is_empty() {
        return Err(FetchError::EmptyText(key.index));
    }

    let response = gateway
        .synthesize(&SynthesisRequest::new(text.trim(), key.voice.as_str()))
        .await?;
    let pcm = BASE64
        .decode(response.audio.trim())
        .map_err(|e| FetchError::Decode(e.to_string()))?;
    let format = PcmFormat::from_mime(&response.mime_type, default_rate);
    let clip = AudioClip::from_pcm(&pcm, format).map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok(Arc::new(clip))
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
