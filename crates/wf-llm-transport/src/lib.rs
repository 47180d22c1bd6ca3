//! LLM transport layer (spec §4.1): one [`LlmTransport`] trait, an
//! HTTP implementation, a persistent WebSocket implementation with
//! correlation-id demultiplexing, and a pool that prefers the latter and
//! falls back to the former.

pub mod http;
pub mod persistent;
pub mod pool;
pub mod types;

use async_trait::async_trait;
use wf_core_types::WayfinderError;

pub use pool::TransportPool;
pub use types::{CompletionRequest, CompletionResponse, Message, Role, Usage};

#[async_trait]
pub trait LlmTransport: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, WayfinderError>;

    /// Whether this transport is currently usable without attempting a call.
    /// The pool uses this to decide whether to try the persistent transport
    /// or go straight to HTTP (spec §4.1 "fall back to HTTP ... with no
    /// added latency once the WebSocket is known-down").
    fn is_ready(&self) -> bool {
        true
    }
}
