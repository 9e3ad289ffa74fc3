//! Client Initializer
//!
//! Drives session creation as an explicit state machine:
//!
//! ```text
//! Idle -> Locking -> Creating -> Success
//!                       |-> SlotLimitError -> Revoking -> Waiting -> Creating
//!                       |-> TransientDbError -> Waiting -> Locking
//!                       `-> FatalError
//! ```
//!
//! Both cycles are bounded: slot-limit recovery by `max_retries`
//! revoke-and-retry cycles with exponential backoff, the transient path by
//! `max_transient_retries` full restarts. Retries are explicit loops with
//! awaited sleeps, never recursion, and the store lock is released on every
//! exit path.

use super::backend::{BackendError, CreateOptions, Env, MessagingBackend, Session};
use super::installations::{self, InstallationError};
use super::store::SessionStore;
use crate::config::{InitOptions, SessionConfig};
use crate::signer::Signer;
use std::sync::Arc;
use tokio::time::sleep;

/// Terminal initialization errors surfaced to callers.
///
/// Recoverable conditions (lock contention, slot-limit within budget,
/// transient storage within budget) are handled internally and never
/// appear here. Messages carry the remediation text the UI shows verbatim.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// Slot-limit recovery budget exhausted
    #[error(
        "Maximum number of installations reached: still at the limit after \
         {attempts} revocation attempt(s). Revoke installations from another \
         device, then try connecting again."
    )]
    SlotLimitExhausted { attempts: u32 },

    /// Transient storage retry budget exhausted
    #[error(
        "Local storage kept failing after {attempts} attempt(s): {last_error}. \
         Clear the local messaging database or restart the application, then \
         try again."
    )]
    TransientStorageExhausted { attempts: u32, last_error: String },

    /// Corrupt installation record from the backend; never retried
    #[error("Invalid installation data: {0}")]
    InvalidInstallation(String),

    /// Any other failure; never retried
    #[error(
        "Failed to initialize messaging session: {0}. Make sure you are using \
         the same wallet that created the original installations."
    )]
    Fatal(String),
}

/// Outcome of one locked creation attempt
enum AttemptError {
    /// Release the lock, wait, restart the whole attempt
    Transient(String),
    /// Release the lock, surface to the caller
    Terminal(InitError),
}

/// Session initializer state machine.
///
/// Cloning shares the store (and the backend handle), so concurrent
/// `initialize` calls from different tasks serialize through one lock.
#[derive(Clone)]
pub struct SessionInitializer<B: MessagingBackend> {
    backend: B,
    store: SessionStore,
    config: SessionConfig,
}

impl<B: MessagingBackend> SessionInitializer<B> {
    /// Create an initializer over an explicit store.
    ///
    /// The store is passed in (not created here) so the composition root
    /// decides its lifetime and sharing.
    pub fn new(backend: B, store: SessionStore, config: SessionConfig) -> Self {
        Self {
            backend,
            store,
            config,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Initialize (or reuse) the process-wide session.
    ///
    /// Idempotent: a live session for the requested environment is returned
    /// without any backend call. Concurrent callers serialize through the
    /// store lock and all observe the same session.
    pub async fn initialize(
        &self,
        signer: &dyn Signer,
        options: &InitOptions,
    ) -> Result<Arc<Session>, InitError> {
        let env = options.env.unwrap_or(self.config.env);
        let mut transient_retries = 0u32;

        loop {
            // Locking: wait out any in-flight initialization instead of
            // racing it, re-checking the slot so we pick up its result.
            loop {
                if let Some(existing) = self.reuse(env)? {
                    return Ok(existing);
                }
                if self.store.try_lock() {
                    break;
                }
                tracing::debug!("initialization lock held, waiting");
                sleep(self.config.lock_retry_interval).await;
            }

            // The previous holder may have stored a session between our
            // last check and the lock acquisition.
            match self.reuse(env) {
                Ok(Some(existing)) => {
                    self.store.unlock();
                    return Ok(existing);
                }
                Ok(None) => {}
                Err(e) => {
                    self.store.unlock();
                    return Err(e);
                }
            }

            match self.create_with_recovery(signer, env, options.force_registration).await {
                Ok(session) => {
                    let session = Arc::new(session);
                    self.store.set(Arc::clone(&session));
                    self.store.unlock();
                    tracing::info!(
                        inbox_id = %session.inbox_id(),
                        installation = %session.installation_id(),
                        env = %env,
                        "session initialized"
                    );
                    return Ok(session);
                }
                Err(AttemptError::Transient(message)) => {
                    self.store.unlock();
                    if transient_retries >= self.config.max_transient_retries {
                        return Err(InitError::TransientStorageExhausted {
                            attempts: transient_retries,
                            last_error: message,
                        });
                    }
                    transient_retries += 1;
                    tracing::warn!(
                        attempt = transient_retries,
                        "transient storage error, restarting initialization: {message}"
                    );
                    sleep(self.config.lock_retry_interval).await;
                }
                Err(AttemptError::Terminal(err)) => {
                    self.store.unlock();
                    tracing::error!("session initialization failed: {err}");
                    return Err(err);
                }
            }
        }
    }

    /// Idempotent-reuse check. A live session for another environment is an
    /// error: the caller must close it first, we never hold two.
    fn reuse(&self, env: Env) -> Result<Option<Arc<Session>>, InitError> {
        match self.store.get() {
            Some(existing) if existing.env() == env => {
                tracing::debug!(env = %env, "reusing existing session");
                Ok(Some(existing))
            }
            Some(existing) => Err(InitError::Fatal(format!(
                "a session already exists for environment '{}'; close it before \
                 initializing against '{}'",
                existing.env(),
                env
            ))),
            None => Ok(None),
        }
    }

    /// One locked creation episode: cheap reattach first, then full
    /// registration with bounded slot-limit recovery.
    async fn create_with_recovery(
        &self,
        signer: &dyn Signer,
        env: Env,
        force_registration: bool,
    ) -> Result<Session, AttemptError> {
        if !force_registration {
            // Cheap path: reattach an existing registration without
            // consuming a slot. Best effort; any failure falls through to
            // full registration unclassified.
            match self
                .backend
                .create_session(
                    signer,
                    &CreateOptions {
                        env,
                        skip_installation_registration: true,
                    },
                )
                .await
            {
                Ok(session) => {
                    tracing::info!(
                        installation = %session.installation_id(),
                        "reattached existing registration"
                    );
                    return Ok(session);
                }
                Err(e) => {
                    tracing::debug!("no registration to reattach, registering: {e}");
                }
            }
        }

        let mut retry_count = 0u32;
        loop {
            match self
                .backend
                .create_session(
                    signer,
                    &CreateOptions {
                        env,
                        skip_installation_registration: false,
                    },
                )
                .await
            {
                Ok(session) => {
                    tracing::info!(
                        installation = %session.installation_id(),
                        "installation registered"
                    );
                    return Ok(session);
                }
                Err(BackendError::SlotLimit(message)) => {
                    if retry_count >= self.config.max_retries {
                        return Err(AttemptError::Terminal(InitError::SlotLimitExhausted {
                            attempts: retry_count,
                        }));
                    }
                    tracing::warn!(
                        retry = retry_count,
                        "installation limit reached, attempting revocation: {message}"
                    );
                    self.recover_slot(signer, env).await?;

                    let backoff = self.config.backoff_for(retry_count);
                    tracing::debug!(backoff_ms = backoff.as_millis() as u64, "backing off");
                    sleep(backoff).await;
                    retry_count += 1;
                }
                Err(BackendError::TransientStorage(message)) => {
                    return Err(AttemptError::Transient(message));
                }
                Err(other) => {
                    return Err(AttemptError::Terminal(InitError::Fatal(other.to_string())));
                }
            }
        }
    }

    /// Slot-limit recovery: probe for the inbox id without consuming a
    /// slot, list installations, revoke only the oldest. Any failure here
    /// is terminal; retrying revocation against a misbehaving backend
    /// risks destroying more sibling sessions.
    async fn recover_slot(&self, signer: &dyn Signer, env: Env) -> Result<(), AttemptError> {
        let probe = self
            .backend
            .create_session(
                signer,
                &CreateOptions {
                    env,
                    skip_installation_registration: true,
                },
            )
            .await
            .map_err(|e| {
                AttemptError::Terminal(InitError::Fatal(format!(
                    "could not resolve inbox id for revocation: {e}"
                )))
            })?;
        let inbox_id = probe.inbox_id().clone();

        let installations = installations::list_installations(&self.backend, &inbox_id, env)
            .await
            .map_err(map_recovery_error)?;

        installations::revoke_oldest(&self.backend, signer, &inbox_id, &installations, env)
            .await
            .map_err(map_recovery_error)?;

        Ok(())
    }
}

fn map_recovery_error(err: InstallationError) -> AttemptError {
    match err {
        InstallationError::Invalid(message) => {
            AttemptError::Terminal(InitError::InvalidInstallation(message))
        }
        InstallationError::NoneFound => AttemptError::Terminal(InitError::Fatal(
            "no installations found to revoke".to_string(),
        )),
        InstallationError::Backend(e) => AttemptError::Terminal(InitError::Fatal(e.to_string())),
    }
}
