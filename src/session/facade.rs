//! Caller-facing session facade
//!
//! Owns the session store and initializer, and exposes the three fields a
//! UI binds to: the current session, an `is_initializing` flag, and the
//! last terminal error message (remediation text, shown verbatim). Every
//! terminal state updates exactly one of `session`/`error`.

use super::backend::{MessagingBackend, Session};
use super::initializer::{InitError, SessionInitializer};
use super::store::SessionStore;
use crate::config::{InitOptions, SessionConfig};
use crate::signer::Signer;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FacadeStatus {
    initializing: bool,
    error: Option<String>,
}

/// Caller-facing facade over the initializer.
///
/// Clones share status and store, so one facade can be handed to several
/// event handlers; concurrent `initialize` calls serialize through the
/// store lock instead of producing duplicate sessions.
#[derive(Clone)]
pub struct SessionFacade<B: MessagingBackend> {
    initializer: SessionInitializer<B>,
    status: Arc<Mutex<FacadeStatus>>,
}

impl<B: MessagingBackend> SessionFacade<B> {
    pub fn new(backend: B, config: SessionConfig) -> Self {
        Self {
            initializer: SessionInitializer::new(backend, SessionStore::new(), config),
            status: Arc::new(Mutex::new(FacadeStatus::default())),
        }
    }

    /// Initialize (or reuse) the session.
    ///
    /// Safe to call repeatedly, including concurrently. On failure the
    /// error message is retained for `error()` until the next call.
    pub async fn initialize(
        &self,
        signer: &dyn Signer,
        options: &InitOptions,
    ) -> Result<Arc<Session>, InitError> {
        {
            let mut status = self
                .status
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            status.initializing = true;
            status.error = None;
        }

        let result = self.initializer.initialize(signer, options).await;

        let mut status = self
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        status.initializing = false;
        if let Err(ref e) = result {
            status.error = Some(e.to_string());
        }
        result
    }

    /// Current live session, if any.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.initializer.store().get()
    }

    /// Whether an initialize call is currently in flight through this facade.
    pub fn is_initializing(&self) -> bool {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .initializing
    }

    /// Remediation message from the last failed initialize, if any.
    pub fn error(&self) -> Option<String> {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .error
            .clone()
    }

    /// Drop the stored session. The next `initialize` starts clean.
    pub fn close(&self) {
        self.initializer.store().clear();
    }
}
