//! Session-level operations over the multiplexer capability.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::ShimError;
use crate::tmux::{Multiplexer, PaneState, TmuxError};

/// Maps multiplexer primitives onto session semantics and the error taxonomy
#[derive(Clone)]
pub struct SessionDriver {
    mux: Arc<dyn Multiplexer>,
}

impl SessionDriver {
    pub fn new(mux: Arc<dyn Multiplexer>) -> Self {
        Self { mux }
    }

    pub async fn create(
        &self,
        session_id: &str,
        command: &str,
        detached: bool,
    ) -> Result<(), ShimError> {
        self.mux
            .new_session(session_id, command, detached)
            .await
            .map_err(|source| ShimError::SessionCreate {
                session_id: session_id.to_string(),
                source,
            })?;
        info!(session_id, detached, "session created");
        Ok(())
    }

    /// A multiplexer that cannot answer reports the session as missing
    pub async fn pane_state(&self, session_id: &str) -> PaneState {
        match self.mux.pane_state(session_id).await {
            Ok(state) => state,
            Err(e) => {
                debug!(session_id, error = %e, "liveness check failed");
                PaneState::Missing
            }
        }
    }

    /// Alive means the agent process is still running, not merely that its pane remains
    pub async fn is_alive(&self, session_id: &str) -> bool {
        self.pane_state(session_id).await.is_running()
    }

    pub async fn capture(&self, session_id: &str, tail_lines: u32) -> Result<String, ShimError> {
        self.mux
            .capture_pane(session_id, tail_lines)
            .await
            .map_err(|source| ShimError::Capture {
                session_id: session_id.to_string(),
                source,
            })
    }

    /// Type `text` literally, then press Enter
    pub async fn send(&self, session_id: &str, text: &str) -> Result<(), ShimError> {
        let send_err = |source| ShimError::Send {
            session_id: session_id.to_string(),
            source,
        };

        if !self.is_alive(session_id).await {
            return Err(send_err(TmuxError::NoSuchSession(session_id.to_string())));
        }
        if !text.is_empty() {
            self.mux
                .send_keys(session_id, text, true)
                .await
                .map_err(send_err)?;
        }
        self.mux
            .send_keys(session_id, "Enter", false)
            .await
            .map_err(send_err)?;
        debug!(session_id, chars = text.len(), "input sent");
        Ok(())
    }

    /// Idempotent: a session that is already gone counts as killed
    pub async fn kill(&self, session_id: &str) -> Result<(), ShimError> {
        match self.mux.kill_session(session_id).await {
            Ok(()) => {
                info!(session_id, "session killed");
                Ok(())
            }
            Err(TmuxError::NoSuchSession(_)) => {
                debug!(session_id, "session already gone");
                Ok(())
            }
            Err(source) => Err(ShimError::Kill {
                session_id: session_id.to_string(),
                source,
            }),
        }
    }

    /// Session names starting with `prefix`
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>, ShimError> {
        let names = self.mux.list_sessions().await.map_err(ShimError::List)?;
        Ok(names
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .collect())
    }
}

/// Exclusive ownership of a live session until it is killed.
///
/// `release` kills the session exactly once. A lease dropped without being
/// released (an early return or a panic in the owner) still schedules the
/// kill on the current runtime.
pub struct SessionLease {
    driver: SessionDriver,
    session_id: String,
    released: bool,
}

impl SessionLease {
    pub fn new(driver: SessionDriver, session_id: impl Into<String>) -> Self {
        Self {
            driver,
            session_id: session_id.into(),
            released: false,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn driver(&self) -> &SessionDriver {
        &self.driver
    }

    /// Kill the session. Failures are logged, never returned.
    pub async fn release(mut self) {
        self.released = true;
        if let Err(e) = self.driver.kill(&self.session_id).await {
            warn!(session_id = %self.session_id, error = %e, "cleanup kill failed");
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let driver = self.driver.clone();
        let session_id = std::mem::take(&mut self.session_id);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = driver.kill(&session_id).await {
                        warn!(session_id, error = %e, "cleanup kill failed");
                    }
                });
            }
            Err(_) => warn!(session_id, "no runtime to clean up session"),
        }
    }
}
