//! Messaging Backend Trait Abstractions
//!
//! The backend adapter is the ONLY layer allowed to interpret raw backend
//! failures. It maps them into `BackendError` variants here, so the
//! initializer state machine branches on tags, never on free-text messages.

use crate::signer::Signer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend environment a session is created against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Env {
    #[default]
    Dev,
    Production,
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Env::Dev => write!(f, "dev"),
            Env::Production => write!(f, "production"),
        }
    }
}

/// Backend inbox identifier for an identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InboxId(pub String);

impl fmt::Display for InboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Installation (session slot) identifier, hex-encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstallationId(pub String);

impl InstallationId {
    /// Hex-encode raw credential bytes into an id
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }
}

impl fmt::Display for InstallationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One registered session slot for an identity.
///
/// `bytes` is the opaque credential the backend requires for revocation;
/// `id` is its hex rendering. `created_at_ns` is backend-reported creation
/// time, used only for logging (ordering is trusted from the backend).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub id: InstallationId,
    pub bytes: Vec<u8>,
    pub created_at_ns: u64,
}

/// Remote inbox state for one identity: its registered installations,
/// oldest first as reported by the backend.
#[derive(Debug, Clone)]
pub struct InboxState {
    pub inbox_id: InboxId,
    pub installations: Vec<Installation>,
}

/// Authenticated session handle, tagged with the environment it was
/// created against. Opaque to callers; shared as `Arc<Session>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    inbox_id: InboxId,
    installation_id: InstallationId,
    env: Env,
}

impl Session {
    pub fn new(inbox_id: InboxId, installation_id: InstallationId, env: Env) -> Self {
        Self {
            inbox_id,
            installation_id,
            env,
        }
    }

    pub fn inbox_id(&self) -> &InboxId {
        &self.inbox_id
    }

    pub fn installation_id(&self) -> &InstallationId {
        &self.installation_id
    }

    pub fn env(&self) -> Env {
        self.env
    }
}

/// Options for one session creation attempt
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub env: Env,

    /// Reuse an existing registration instead of consuming a new slot.
    /// Cheaper, and cannot trigger the slot limit; fails if this device
    /// has no prior registration.
    pub skip_installation_registration: bool,
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Backend errors, classified at the adapter boundary.
///
/// Only `SlotLimit` and `TransientStorage` are recoverable; the
/// initializer treats every other variant as fatal.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// Identity has reached its maximum registered installations
    #[error("Installation limit reached: {0}")]
    SlotLimit(String),

    /// Local storage/database fault (lock contention, filesystem access)
    #[error("Storage error: {0}")]
    TransientStorage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Messaging backend abstraction.
///
/// Production implementations wrap the real backend SDK and classify its
/// failures into `BackendError` variants. `MockBackend` replaces it in
/// tests with scripted outcomes.
#[async_trait]
pub trait MessagingBackend: Clone + Send + Sync {
    /// Create (or with `skip_installation_registration`, reattach) a session
    /// for the signer's identity
    async fn create_session(
        &self,
        signer: &dyn Signer,
        options: &CreateOptions,
    ) -> BackendResult<Session>;

    /// Query remote inbox state for the given inbox ids.
    /// Installations are returned oldest first.
    async fn inbox_state(&self, inbox_ids: &[InboxId], env: Env) -> BackendResult<Vec<InboxState>>;

    /// Revoke the given installations for an identity.
    ///
    /// Irreversible remote state change. Courier only ever passes a single
    /// installation per call (oldest-first recovery).
    async fn revoke_installations(
        &self,
        signer: &dyn Signer,
        inbox_id: &InboxId,
        installation_bytes: &[Vec<u8>],
        env: Env,
    ) -> BackendResult<()>;
}
