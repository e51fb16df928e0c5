//! Backend readiness handle.
//!
//! A [`BackendSession`] is built once by the composition root and shared by
//! reference with every request. It replaces a process-wide "client ready"
//! flag: readiness is set at most once and never cleared.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use docverify_core::{CredentialStatus, GenerationBackend};

/// Owns a backend and its one-time readiness state.
#[derive(Clone)]
pub struct BackendSession {
    backend: Arc<dyn GenerationBackend>,
    ready: Arc<OnceCell<()>>,
}

impl BackendSession {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            ready: Arc::new(OnceCell::new()),
        }
    }

    /// Prepare the backend and mark the session ready.
    ///
    /// Idempotent: once ready, later calls return `true` without touching the
    /// backend. A failed preparation leaves the session not ready so a later
    /// call may retry. Concurrent callers share a single preparation.
    pub async fn initialize(&self) -> bool {
        let result = self
            .ready
            .get_or_try_init(|| async {
                self.backend.prepare().await.map_err(|e| {
                    warn!(
                        backend = self.backend.backend_name(),
                        error = %e,
                        "Backend preparation failed"
                    );
                    e
                })?;
                info!(backend = self.backend.backend_name(), "Backend session ready");
                Ok::<(), docverify_core::Error>(())
            })
            .await;
        result.is_ok()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    pub fn backend(&self) -> &dyn GenerationBackend {
        self.backend.as_ref()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.backend_name()
    }

    pub fn credential_status(&self) -> CredentialStatus {
        self.backend.credential_status()
    }
}
