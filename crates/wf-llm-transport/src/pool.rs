//! Hybrid pool: prefers the persistent transport, falls back to HTTP, and
//! rate-limits reconnection attempts. Grounded on
//! `original_source/llm_web_agent/llm/connection_pool.py`
//! (`LLMConnectionPool`), translated from a lazily-constructed singleton
//! into an explicitly constructed, `Arc`-shared pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::info;
use wf_core_types::WayfinderError;

use crate::http::{HttpConfig, HttpTransport};
use crate::persistent::{PersistentConfig, PersistentTransport};
use crate::types::{CompletionRequest, CompletionResponse};
use crate::LlmTransport;

const RETRY_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
pub struct PoolStats {
    pub websocket_calls: u64,
    pub http_fallback_calls: u64,
}

pub struct TransportPool {
    persistent: Option<Arc<PersistentTransport>>,
    http: Arc<HttpTransport>,
    last_ws_attempt: Mutex<Option<Instant>>,
    websocket_calls: AtomicU64,
    http_fallback_calls: AtomicU64,
}

impl TransportPool {
    /// `persistent_config: None` disables the WebSocket path entirely and
    /// the pool always uses HTTP (still a valid configuration, e.g. for a
    /// provider with no realtime endpoint).
    pub fn new(http_config: HttpConfig, persistent_config: Option<PersistentConfig>) -> Result<Self, WayfinderError> {
        let http = Arc::new(HttpTransport::new(http_config)?);
        let persistent = persistent_config.map(|cfg| Arc::new(PersistentTransport::spawn(cfg)));
        Ok(Self {
            persistent,
            http,
            last_ws_attempt: Mutex::new(None),
            websocket_calls: AtomicU64::new(0),
            http_fallback_calls: AtomicU64::new(0),
        })
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            websocket_calls: self.websocket_calls.load(Ordering::Relaxed),
            http_fallback_calls: self.http_fallback_calls.load(Ordering::Relaxed),
        }
    }

    /// Whether the persistent transport is worth trying right now: present,
    /// connected, or not in its post-failure cooldown window.
    fn websocket_eligible(&self) -> bool {
        let Some(persistent) = &self.persistent else { return false };
        if persistent.is_ready() {
            return true;
        }
        let mut last = self.last_ws_attempt.lock();
        match *last {
            Some(at) if at.elapsed() < RETRY_COOLDOWN => false,
            _ => {
                *last = Some(Instant::now());
                true
            }
        }
    }

    pub async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, WayfinderError> {
        if self.websocket_eligible() {
            if let Some(persistent) = &self.persistent {
                match persistent.complete(request.clone()).await {
                    Ok(response) => {
                        self.websocket_calls.fetch_add(1, Ordering::Relaxed);
                        return Ok(response);
                    }
                    Err(err) => {
                        info!(?err, "websocket LLM transport failed, falling back to HTTP");
                    }
                }
            }
        }

        self.http_fallback_calls.fetch_add(1, Ordering::Relaxed);
        self.http.complete(request).await
    }
}
