//! Session Initialization Module
//!
//! Implements the bounded-resource session bootstrap protocol:
//! - one live session per process, guarded by a non-blocking lock
//! - slot-limit recovery via oldest-first installation revocation
//! - bounded exponential backoff between recovery cycles
//!
//! The concrete backend is reached through `backend::MessagingBackend`;
//! `mock::MockBackend` stands in for it in tests.

pub mod backend;
pub mod facade;
pub mod initializer;
pub mod installations;
pub mod mock;
pub mod store;

pub use backend::{BackendError, BackendResult, Env, MessagingBackend, Session};
pub use facade::SessionFacade;
pub use initializer::{InitError, SessionInitializer};
pub use mock::MockBackend;
pub use store::SessionStore;
