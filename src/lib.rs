//! Courier - Resilient Messaging Session Bootstrap
//!
//! A client-side library for establishing authenticated sessions against a
//! messaging backend that caps the number of registered installations
//! (session slots) per identity.
//!
//! Key principles:
//! - At most one live session per process, serialized through a lock
//! - Slot-limit exhaustion recovered by revoking the OLDEST installation only
//! - Bounded retries everywhere (no unbounded recovery loops)
//! - Backend errors classified into tagged variants at the adapter boundary,
//!   never by sniffing free-text messages in the state machine

pub mod config;
pub mod session;
pub mod signer;

pub use config::{InitOptions, SessionConfig};
pub use session::backend::{
    BackendError, BackendResult, CreateOptions, Env, InboxId, InboxState, Installation,
    InstallationId, MessagingBackend, Session,
};
pub use session::facade::SessionFacade;
pub use session::initializer::{InitError, SessionInitializer};
pub use session::mock::MockBackend;
pub use session::store::SessionStore;
pub use signer::{Identifier, Signer, SignerError, StaticSigner};
