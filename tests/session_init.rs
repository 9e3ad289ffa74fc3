//! Session initialization integration tests
//!
//! End-to-end coverage of the bootstrap protocol against `MockBackend`:
//! idempotent reuse, lock serialization, bounded slot-limit recovery,
//! oldest-first revocation, transient-error backoff, and the malformed
//! installation guard.

use courier::{
    BackendError, Env, Identifier, InboxId, InitError, InitOptions, Installation, InstallationId,
    MockBackend, SessionConfig, SessionFacade, SessionInitializer, SessionStore, StaticSigner,
};
use std::sync::Arc;
use std::time::Duration;

const ADDR: &str = "0xabcdef0123456789abcdef0123456789abcdef01";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn signer() -> StaticSigner {
    StaticSigner::new(Identifier::parse(ADDR).unwrap(), 1)
}

fn fast_config() -> SessionConfig {
    SessionConfig {
        env: Env::Dev,
        max_retries: 3,
        max_transient_retries: 5,
        lock_retry_interval: Duration::from_millis(5),
        backoff_base: Duration::from_millis(1),
    }
}

fn inbox() -> InboxId {
    InboxId(format!("inbox-{ADDR}"))
}

fn install(byte: u8, created_at_ns: u64) -> Installation {
    Installation {
        id: InstallationId(format!("0x{:02x}", byte)),
        bytes: vec![byte],
        created_at_ns,
    }
}

fn slot_limit() -> BackendError {
    BackendError::SlotLimit("already registered 5/5 installations".to_string())
}

/// Repeated initialize returns the same session with exactly
/// one backend create call.
#[tokio::test]
async fn idempotent_reuse() {
    init_tracing();
    let backend = MockBackend::new();
    let facade = SessionFacade::new(backend.clone(), fast_config());

    let first = facade
        .initialize(&signer(), &InitOptions::default())
        .await
        .unwrap();
    let calls_after_first = backend.full_create_calls() + backend.skip_create_calls();

    let second = facade
        .initialize(&signer(), &InitOptions::default())
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        backend.full_create_calls() + backend.skip_create_calls(),
        calls_after_first,
        "reuse must not touch the backend"
    );
    assert_eq!(backend.full_create_calls(), 1);
}

/// Concurrent initialize calls serialize through the lock;
/// one create call, both callers observe the same session.
#[tokio::test]
async fn lock_serialization() {
    init_tracing();
    let backend = MockBackend::new();
    backend.set_create_delay(Duration::from_millis(30));
    let init = SessionInitializer::new(backend.clone(), SessionStore::new(), fast_config());

    let a = {
        let init = init.clone();
        tokio::spawn(async move { init.initialize(&signer(), &InitOptions::default()).await })
    };
    let b = {
        let init = init.clone();
        tokio::spawn(async move { init.initialize(&signer(), &InitOptions::default()).await })
    };

    let session_a = a.await.unwrap().unwrap();
    let session_b = b.await.unwrap().unwrap();

    assert!(Arc::ptr_eq(&session_a, &session_b));
    assert_eq!(backend.full_create_calls(), 1);
    assert!(!init.store().is_locked());
}

/// A backend that always reports slot-limit-exceeded gets at
/// most three revoke-and-retry cycles, then a fatal error.
#[tokio::test]
async fn slot_limit_recovery_bound() {
    init_tracing();
    let backend = MockBackend::new();
    backend.set_skip_default(None); // probe resolves the inbox id
    backend.set_full_default(Some(slot_limit()));
    backend.set_installations(
        inbox(),
        (0u8..5).map(|i| install(i, i as u64 + 1)).collect(),
    );
    let init = SessionInitializer::new(backend.clone(), SessionStore::new(), fast_config());

    let options = InitOptions {
        force_registration: true,
        ..Default::default()
    };
    let result = init.initialize(&signer(), &options).await;

    match result {
        Err(InitError::SlotLimitExhausted { attempts }) => assert_eq!(attempts, 3),
        other => panic!("expected SlotLimitExhausted, got {other:?}"),
    }
    assert_eq!(backend.revoke_calls(), 3);
    assert_eq!(backend.full_create_calls(), 4);
    assert!(init.store().get().is_none());
    assert!(!init.store().is_locked());
}

/// Recovery revokes only the oldest installation, one revoke
/// call per cycle, never the siblings.
#[tokio::test]
async fn oldest_first_revocation() {
    init_tracing();
    let backend = MockBackend::new();
    backend.set_skip_default(None);
    backend.push_full_result(Err(slot_limit()));
    backend.set_installations(
        inbox(),
        vec![
            install(0xa1, 1),
            install(0xb2, 2),
            install(0xc3, 3),
            install(0xd4, 4),
            install(0xe5, 5),
        ],
    );
    let init = SessionInitializer::new(backend.clone(), SessionStore::new(), fast_config());

    let options = InitOptions {
        force_registration: true,
        ..Default::default()
    };
    init.initialize(&signer(), &options).await.unwrap();

    assert_eq!(backend.revoke_calls(), 1);
    assert_eq!(backend.revoked_installations(), vec![vec![0xa1]]);

    // Siblings untouched.
    let remaining = backend.installations(&inbox());
    assert_eq!(remaining.len(), 4);
    assert_eq!(remaining[0].bytes, vec![0xb2]);
}

/// Across multiple recovery cycles the victim is always whatever is oldest
/// at that point, exactly one per cycle.
#[tokio::test]
async fn oldest_first_across_cycles() {
    init_tracing();
    let backend = MockBackend::new();
    backend.set_skip_default(None);
    backend.push_full_result(Err(slot_limit()));
    backend.push_full_result(Err(slot_limit()));
    backend.set_installations(
        inbox(),
        vec![install(0x01, 1), install(0x02, 2), install(0x03, 3)],
    );
    let init = SessionInitializer::new(backend.clone(), SessionStore::new(), fast_config());

    let options = InitOptions {
        force_registration: true,
        ..Default::default()
    };
    init.initialize(&signer(), &options).await.unwrap();

    assert_eq!(backend.revoke_calls(), 2);
    assert_eq!(
        backend.revoked_installations(),
        vec![vec![0x01], vec![0x02]]
    );
}

/// Two transient storage failures then success resolves to a
/// session, and the lock is never left held between attempts.
#[tokio::test]
async fn transient_error_backoff() {
    init_tracing();
    let backend = MockBackend::new();
    backend.push_full_result(Err(BackendError::TransientStorage(
        "database is locked".to_string(),
    )));
    backend.push_full_result(Err(BackendError::TransientStorage(
        "database is locked".to_string(),
    )));
    let init = SessionInitializer::new(backend.clone(), SessionStore::new(), fast_config());

    let session = init
        .initialize(&signer(), &InitOptions::default())
        .await
        .unwrap();

    assert_eq!(session.env(), Env::Dev);
    assert_eq!(backend.full_create_calls(), 3);
    assert!(!init.store().is_locked());
    assert!(Arc::ptr_eq(&init.store().get().unwrap(), &session));
}

/// While a transient restart is waiting, the lock must be free so other
/// callers are not starved.
#[tokio::test]
async fn transient_restart_releases_lock() {
    init_tracing();
    let backend = MockBackend::new();
    backend.push_full_result(Err(BackendError::TransientStorage(
        "database is locked".to_string(),
    )));
    let config = SessionConfig {
        lock_retry_interval: Duration::from_millis(50),
        ..fast_config()
    };
    let init = SessionInitializer::new(backend.clone(), SessionStore::new(), config);

    let store = init.store().clone();
    let task = {
        let init = init.clone();
        tokio::spawn(async move { init.initialize(&signer(), &InitOptions::default()).await })
    };

    // Sample the lock during the restart wait window.
    tokio::time::sleep(Duration::from_millis(25)).await;
    assert!(!store.is_locked(), "lock held during transient backoff");

    task.await.unwrap().unwrap();
}

/// A malformed installation record aborts recovery before the
/// backend revoke endpoint is ever called.
#[tokio::test]
async fn invalid_installation_guard() {
    init_tracing();
    let backend = MockBackend::new();
    backend.set_skip_default(None);
    backend.set_full_default(Some(slot_limit()));
    backend.set_installations(
        inbox(),
        vec![
            Installation {
                id: InstallationId("0xabc".to_string()), // odd-length hex
                bytes: vec![0x01],
                created_at_ns: 1,
            },
            install(0x02, 2),
        ],
    );
    let init = SessionInitializer::new(backend.clone(), SessionStore::new(), fast_config());

    let options = InitOptions {
        force_registration: true,
        ..Default::default()
    };
    let result = init.initialize(&signer(), &options).await;

    assert!(matches!(result, Err(InitError::InvalidInstallation(_))));
    assert_eq!(backend.revoke_calls(), 0);
    assert!(backend.revoked_installations().is_empty());
    assert!(!init.store().is_locked());
}

/// Remediation text reaches the facade verbatim for UI binding.
#[tokio::test]
async fn facade_surfaces_slot_limit_remediation() {
    init_tracing();
    let backend = MockBackend::new();
    backend.set_skip_default(None);
    backend.set_full_default(Some(slot_limit()));
    backend.set_installations(
        inbox(),
        (0u8..5).map(|i| install(i, i as u64 + 1)).collect(),
    );
    let facade = SessionFacade::new(backend, fast_config());

    let options = InitOptions {
        force_registration: true,
        ..Default::default()
    };
    let result = facade.initialize(&signer(), &options).await;

    assert!(result.is_err());
    let message = facade.error().unwrap();
    assert!(message.contains("Maximum number of installations"));
    assert!(facade.session().is_none());
    assert!(!facade.is_initializing());
}
