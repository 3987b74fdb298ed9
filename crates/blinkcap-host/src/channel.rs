use std::sync::Arc;

use blinkcap_core::{CaptureError, CaptureMode};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::collaborators::Collaborators;
use crate::config::Config;
use crate::session::{CaptureSession, SessionConfig};

pub const CAPTURE_SELFIE: &str = "captureSelfie";
pub const CAPTURE_SINGLE_SIGNATURE: &str = "captureSingleSignature";
pub const CAPTURE_DUAL_SIGNATURE: &str = "captureDualSignature";

/// Reply sent back over the host bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResponse {
    Success { payload: String },
    Error { code: String, message: String },
    NotImplemented,
}

impl From<CaptureError> for MethodResponse {
    fn from(e: CaptureError) -> Self {
        MethodResponse::Error {
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

fn mode_for(method: &str) -> Option<CaptureMode> {
    match method {
        CAPTURE_SELFIE => Some(CaptureMode::Selfie),
        CAPTURE_SINGLE_SIGNATURE => Some(CaptureMode::SingleSignature),
        CAPTURE_DUAL_SIGNATURE => Some(CaptureMode::DualSignature),
        _ => None,
    }
}

/// Shared state accessible by method handlers.
pub struct AppState {
    pub config: Config,
    pub collaborators: Collaborators,
}

/// Method-channel bridge between the host application and capture sessions.
///
/// One session runs at a time; the state lock is held for its whole
/// lifetime, so a concurrent request sees the lock taken and gets `BUSY`.
pub struct MethodChannel {
    state: Arc<Mutex<AppState>>,
    active: ActiveSlot,
}

impl MethodChannel {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        Self {
            state: Arc::new(Mutex::new(AppState {
                config,
                collaborators,
            })),
            active: std::sync::Mutex::new(None),
        }
    }

    /// Handle one method call and wait for its result.
    pub async fn handle(&self, method: &str) -> MethodResponse {
        let Some(mode) = mode_for(method) else {
            tracing::debug!(method, "unknown method");
            return MethodResponse::NotImplemented;
        };
        tracing::info!(method, "capture requested");

        let Ok(mut state) = self.state.try_lock() else {
            tracing::warn!(method, "capture rejected, another session is active");
            return CaptureError::SessionBusy.into();
        };

        let config = SessionConfig::from(&state.config);
        let (session, handle) = CaptureSession::new(mode, config);
        let _active = ActiveSession::register(&self.active, handle.canceller());

        session.run(&mut state.collaborators).await;
        let result = handle.result().await;
        drop(state);

        match result {
            Ok(payload) => MethodResponse::Success { payload },
            Err(e) => e.into(),
        }
    }

    /// Cancel the running session, if any. Returns whether one was running.
    pub fn cancel_active(&self) -> bool {
        match lock_slot(&self.active).clone() {
            Some(token) => {
                tracing::info!("cancelling active capture session");
                token.cancel();
                true
            }
            None => false,
        }
    }
}

type ActiveSlot = std::sync::Mutex<Option<CancellationToken>>;

fn lock_slot(slot: &ActiveSlot) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Publishes the running session's cancel token and clears it on drop,
/// including when the caller abandons [`MethodChannel::handle`] mid-session.
struct ActiveSession<'a> {
    slot: &'a ActiveSlot,
}

impl<'a> ActiveSession<'a> {
    fn register(slot: &'a ActiveSlot, token: CancellationToken) -> Self {
        *lock_slot(slot) = Some(token);
        Self { slot }
    }
}

impl Drop for ActiveSession<'_> {
    fn drop(&mut self) {
        *lock_slot(self.slot) = None;
    }
}
