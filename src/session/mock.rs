//! Mock Messaging Backend for Testing
//!
//! Provides `MockBackend` so the initializer state machine can be tested
//! without a real backend. Outcomes are scripted per call (FIFO), with a
//! configurable default once a script runs dry, plus counters and captured
//! revocations for assertions.

use super::backend::*;
use crate::signer::Signer;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock messaging backend for testing
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

struct MockState {
    /// Scripted outcomes for skip-registration create calls
    skip_results: VecDeque<BackendResult<Session>>,
    /// Scripted outcomes for full-registration create calls
    full_results: VecDeque<BackendResult<Session>>,
    /// Default once `skip_results` is empty (None = auto success)
    skip_default: Option<BackendError>,
    /// Default once `full_results` is empty (None = auto success)
    full_default: Option<BackendError>,
    installations: HashMap<InboxId, Vec<Installation>>,
    revoked: Vec<Vec<u8>>,
    skip_create_calls: u32,
    full_create_calls: u32,
    inbox_state_calls: u32,
    revoke_calls: u32,
    next_installation: u64,
    create_delay: Option<Duration>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            skip_results: VecDeque::new(),
            full_results: VecDeque::new(),
            // New device: nothing to reattach until a test says otherwise.
            skip_default: Some(BackendError::Protocol(
                "no existing installation to reattach".to_string(),
            )),
            full_default: None,
            installations: HashMap::new(),
            revoked: Vec::new(),
            skip_create_calls: 0,
            full_create_calls: 0,
            inbox_state_calls: 0,
            revoke_calls: 0,
            next_installation: 0,
            create_delay: None,
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create new mock backend
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Queue an outcome for the next skip-registration create call
    pub fn push_skip_result(&self, result: BackendResult<Session>) {
        self.state.lock().unwrap().skip_results.push_back(result);
    }

    /// Queue an outcome for the next full-registration create call
    pub fn push_full_result(&self, result: BackendResult<Session>) {
        self.state.lock().unwrap().full_results.push_back(result);
    }

    /// Default skip-create behavior once the script is empty
    /// (None = auto-generated success)
    pub fn set_skip_default(&self, error: Option<BackendError>) {
        self.state.lock().unwrap().skip_default = error;
    }

    /// Default full-create behavior once the script is empty
    /// (None = auto-generated success)
    pub fn set_full_default(&self, error: Option<BackendError>) {
        self.state.lock().unwrap().full_default = error;
    }

    /// Seed the remote installation list for an inbox
    pub fn set_installations(&self, inbox_id: InboxId, installations: Vec<Installation>) {
        self.state
            .lock()
            .unwrap()
            .installations
            .insert(inbox_id, installations);
    }

    /// Delay every create call (for interleaving tests)
    pub fn set_create_delay(&self, delay: Duration) {
        self.state.lock().unwrap().create_delay = Some(delay);
    }

    /// Credential bytes passed to revoke, in call order
    pub fn revoked_installations(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().revoked.clone()
    }

    /// Remaining installations for an inbox
    pub fn installations(&self, inbox_id: &InboxId) -> Vec<Installation> {
        self.state
            .lock()
            .unwrap()
            .installations
            .get(inbox_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn skip_create_calls(&self) -> u32 {
        self.state.lock().unwrap().skip_create_calls
    }

    pub fn full_create_calls(&self) -> u32 {
        self.state.lock().unwrap().full_create_calls
    }

    pub fn inbox_state_calls(&self) -> u32 {
        self.state.lock().unwrap().inbox_state_calls
    }

    pub fn revoke_calls(&self) -> u32 {
        self.state.lock().unwrap().revoke_calls
    }

    fn auto_session(state: &mut MockState, identity: &str, env: Env) -> Session {
        let installation = state.next_installation;
        state.next_installation += 1;
        Session::new(
            InboxId(format!("inbox-{identity}")),
            InstallationId::from_bytes(&installation.to_be_bytes()),
            env,
        )
    }
}

#[async_trait]
impl MessagingBackend for MockBackend {
    async fn create_session(
        &self,
        signer: &dyn Signer,
        options: &CreateOptions,
    ) -> BackendResult<Session> {
        let identity = signer
            .identifier()
            .await
            .map_err(|e| BackendError::Protocol(e.to_string()))?;

        let delay = self.state.lock().unwrap().create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if options.skip_installation_registration {
            state.skip_create_calls += 1;
            if let Some(result) = state.skip_results.pop_front() {
                return result;
            }
            match state.skip_default.clone() {
                Some(err) => Err(err),
                None => Ok(Self::auto_session(&mut state, identity.as_str(), options.env)),
            }
        } else {
            state.full_create_calls += 1;
            if let Some(result) = state.full_results.pop_front() {
                return result;
            }
            match state.full_default.clone() {
                Some(err) => Err(err),
                None => Ok(Self::auto_session(&mut state, identity.as_str(), options.env)),
            }
        }
    }

    async fn inbox_state(&self, inbox_ids: &[InboxId], _env: Env) -> BackendResult<Vec<InboxState>> {
        let mut state = self.state.lock().unwrap();
        state.inbox_state_calls += 1;

        Ok(inbox_ids
            .iter()
            .map(|inbox_id| InboxState {
                inbox_id: inbox_id.clone(),
                installations: state.installations.get(inbox_id).cloned().unwrap_or_default(),
            })
            .collect())
    }

    async fn revoke_installations(
        &self,
        _signer: &dyn Signer,
        inbox_id: &InboxId,
        installation_bytes: &[Vec<u8>],
        _env: Env,
    ) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap();
        state.revoke_calls += 1;

        for bytes in installation_bytes {
            state.revoked.push(bytes.clone());
        }
        if let Some(remote) = state.installations.get_mut(inbox_id) {
            remote.retain(|install| !installation_bytes.contains(&install.bytes));
        }
        Ok(())
    }
}
