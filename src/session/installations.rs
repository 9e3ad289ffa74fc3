//! Installation Inspector & Revoker
//!
//! Queries the backend for an identity's registered installations and, in
//! the slot-limit recovery path, revokes exactly one: the oldest. Never
//! more, never speculatively. Destroying sibling installations would kill
//! live sessions on the user's other devices.

use super::backend::{BackendError, Env, InboxId, Installation, MessagingBackend};
use crate::signer::Signer;

/// Result type for installation operations
pub type InstallationResult<T> = Result<T, InstallationError>;

/// Installation inspection/revocation errors
#[derive(Debug, thiserror::Error)]
pub enum InstallationError {
    /// Malformed installation record from the backend. Fatal to the
    /// caller: retrying against corrupt data would loop.
    #[error("Invalid installation data: {0}")]
    Invalid(String),

    /// Identity has no registered installations to revoke
    #[error("No installations found to revoke")]
    NoneFound,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// List the registered installations for an identity, oldest first.
///
/// Ordering is the backend's creation order; no client-side re-sort.
pub async fn list_installations<B: MessagingBackend>(
    backend: &B,
    inbox_id: &InboxId,
    env: Env,
) -> InstallationResult<Vec<Installation>> {
    let states = backend.inbox_state(std::slice::from_ref(inbox_id), env).await?;
    let state = states
        .into_iter()
        .find(|s| &s.inbox_id == inbox_id)
        .ok_or_else(|| InstallationError::Invalid(format!("no inbox state for {inbox_id}")))?;

    tracing::debug!(
        inbox_id = %inbox_id,
        count = state.installations.len(),
        "fetched installation list"
    );
    Ok(state.installations)
}

/// Revoke the single oldest installation.
///
/// Validates the victim before touching the backend: a malformed id or
/// empty credential aborts WITHOUT issuing the revoke call, so corrupt
/// backend data can never trigger an irreversible revocation.
pub async fn revoke_oldest<B: MessagingBackend>(
    backend: &B,
    signer: &dyn Signer,
    inbox_id: &InboxId,
    installations: &[Installation],
    env: Env,
) -> InstallationResult<()> {
    let oldest = installations.first().ok_or(InstallationError::NoneFound)?;
    validate_installation(oldest)?;

    tracing::warn!(
        inbox_id = %inbox_id,
        installation = %oldest.id,
        created_at_ns = oldest.created_at_ns,
        "revoking oldest installation"
    );

    backend
        .revoke_installations(signer, inbox_id, std::slice::from_ref(&oldest.bytes), env)
        .await?;

    tracing::info!(installation = %oldest.id, "revocation complete");
    Ok(())
}

/// Check that an installation record is safe to act on.
fn validate_installation(installation: &Installation) -> InstallationResult<()> {
    if installation.bytes.is_empty() {
        return Err(InstallationError::Invalid(format!(
            "installation {} has empty credential bytes",
            installation.id
        )));
    }
    if !is_well_formed_id(&installation.id.0) {
        return Err(InstallationError::Invalid(format!(
            "installation id is not well-formed hex: {:?}",
            installation.id.0
        )));
    }
    Ok(())
}

/// A well-formed installation id is non-empty hex, optionally 0x-prefixed,
/// with an even number of digits.
fn is_well_formed_id(id: &str) -> bool {
    let digits = id.strip_prefix("0x").unwrap_or(id);
    !digits.is_empty() && digits.len() % 2 == 0 && digits.chars().all(|c| c.is_ascii_hexdigit())
}
