use ordering::{EditCommand, EditorState, OrderingProfile, Sequence, ValidationGate};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use crate::{
    offered_actions, resolve, Action, ContainerId, PendingSync, PermissionCheck, RemoteStore,
    Result, SyncConfig, SyncCoordinator, SyncError, SyncReport, SyncState,
};

/// Shared handle to one editing session.
///
/// Clones share the same coordinator. The lock is only held for the
/// synchronous begin/complete steps, never across the remote call, so state
/// stays readable while a mutation is in flight and a second mutation issued
/// meanwhile fails with [`SyncError::SyncBusy`].
///
/// Remote confirmation runs on its own task, so a mutation always resolves
/// even when the future awaiting it is dropped.
pub struct EditorSession<R: RemoteStore> {
    remote: Arc<R>,
    coordinator: Arc<Mutex<SyncCoordinator>>,
    config: SyncConfig,
}

impl<R: RemoteStore> Clone for EditorSession<R> {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
            coordinator: self.coordinator.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R: RemoteStore + 'static> EditorSession<R> {
    /// Fetches the container's sequence and starts a session over it.
    pub async fn open(
        remote: Arc<R>,
        container: ContainerId,
        profile: OrderingProfile,
        config: SyncConfig,
    ) -> Result<Self> {
        let sequence = fetch(remote.as_ref(), &container, &config).await?;

        info!(container = %container, items = sequence.len(), "editing session opened");
        Ok(Self::with_state(remote, container, profile, EditorState::new(sequence), config))
    }

    /// Starts a session over state the caller already holds.
    pub fn with_state(
        remote: Arc<R>,
        container: ContainerId,
        profile: OrderingProfile,
        state: EditorState,
        config: SyncConfig,
    ) -> Self {
        Self {
            remote,
            coordinator: Arc::new(Mutex::new(SyncCoordinator::new(container, profile, state))),
            config,
        }
    }

    pub fn container(&self) -> ContainerId {
        self.coordinator.lock().container().clone()
    }

    pub fn profile(&self) -> OrderingProfile {
        *self.coordinator.lock().profile()
    }

    /// Current local state, optimistic changes included.
    pub fn state(&self) -> EditorState {
        self.coordinator.lock().state().clone()
    }

    pub fn sync_state(&self) -> SyncState {
        self.coordinator.lock().sync_state()
    }

    pub fn last_outcome(&self) -> Option<SyncState> {
        self.coordinator.lock().last_outcome()
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// Applies `command` optimistically and confirms it with the remote.
    /// On remote failure the pre-mutation state is back in place when this returns.
    pub async fn apply(&self, command: EditCommand) -> Result<SyncReport> {
        let begun = self.coordinator.lock().begin(&command)?;
        match begun {
            Some(pending) => self.confirm(pending).await,
            None => Ok(SyncReport::local(command.name())),
        }
    }

    /// Validates, then sends the terminal save for records that carry a correct order.
    pub async fn save<Rec>(&self, gate: &ValidationGate<Rec>, record: &Rec) -> Result<SyncReport> {
        let begun = self.coordinator.lock().begin_save(gate, record)?;
        match begun {
            Some(pending) => self.confirm(pending).await,
            None => Ok(SyncReport::local("save")),
        }
    }

    /// Refetches the container and replaces local state with it, e.g. after a
    /// report came back `stale`.
    pub async fn refresh(&self) -> Result<()> {
        let container = self.container();
        let sequence = fetch(self.remote.as_ref(), &container, &self.config).await?;

        self.coordinator.lock().refresh(sequence)?;
        info!(container = %container, "editing session refreshed");
        Ok(())
    }

    async fn confirm(&self, pending: PendingSync) -> Result<SyncReport> {
        let remote = self.remote.clone();
        let coordinator = self.coordinator.clone();
        let timeout = self.config.remote_timeout();
        let ticket = pending.ticket();

        let task = tokio::spawn(async move {
            let container = coordinator.lock().container().clone();
            let outcome = resolve(remote.as_ref(), &container, &pending, timeout).await;
            let report = coordinator.lock().complete(pending, outcome);
            report
        });

        task.await.map_err(|e| SyncError::RemoteUnreachable {
            reason: format!("sync task for ticket {} failed: {}", ticket, e),
            restored: false,
        })?
    }

    /// Actions to offer for this session under permission `scope`.
    pub fn offered_actions(&self, permissions: &dyn PermissionCheck, scope: &str) -> Vec<Action> {
        offered_actions(permissions, scope, &self.profile())
    }
}

/// Fetch outside any mutation; nothing to restore on failure.
async fn fetch<R: RemoteStore + ?Sized>(
    remote: &R,
    container: &ContainerId,
    config: &SyncConfig,
) -> Result<Sequence> {
    tokio::time::timeout(config.remote_timeout(), remote.fetch_sequence(container))
        .await
        .map_err(|_| SyncError::RemoteUnreachable {
            reason: format!("no answer within {} ms", config.remote_timeout_ms),
            restored: false,
        })?
        .map_err(|e| SyncError::from_remote(e, false))
}
