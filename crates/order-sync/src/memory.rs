/// In-process system of record
/// Backs tests and offline runs; faults and delays can be injected per call
use async_trait::async_trait;
use ordering::{Item, ItemId, Sequence};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::oneshot;
use tracing::debug;

use crate::{Ack, ContainerId, InsertAck, RemoteError, RemoteStore, ReorderAck};

/// Failure to inject into the next remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    Reject(String),
    Unreachable(String),
}

/// Record of a call the remote received
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Fetch(ContainerId),
    Reorder(ContainerId, Vec<ItemId>),
    Insert(ContainerId, ItemId),
    Remove(ContainerId, ItemId),
    Correspondence(ContainerId, Vec<ItemId>),
}

#[derive(Default)]
struct Store {
    containers: HashMap<ContainerId, Vec<Item>>,
    correct_orders: HashMap<ContainerId, Vec<ItemId>>,
    faults: VecDeque<Fault>,
    fetch_fault: Option<Fault>,
    canonical_override: Option<Vec<ItemId>>,
    assigned_identity: Option<ItemId>,
    held: Option<oneshot::Receiver<()>>,
    calls: Vec<RemoteCall>,
}

#[derive(Default)]
pub struct MemoryRemote {
    store: Mutex<Store>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(container: impl Into<ContainerId>, items: Vec<Item>) -> Self {
        let remote = Self::new();
        remote.seed(container, items);
        remote
    }

    /// Replaces what the remote holds for `container`.
    pub fn seed(&self, container: impl Into<ContainerId>, items: Vec<Item>) {
        self.store.lock().containers.insert(container.into(), items);
    }

    pub fn items(&self, container: &ContainerId) -> Vec<Item> {
        self.store
            .lock()
            .containers
            .get(container)
            .cloned()
            .unwrap_or_default()
    }

    pub fn ids(&self, container: &ContainerId) -> Vec<ItemId> {
        self.items(container).iter().map(|item| item.id).collect()
    }

    pub fn correct_order(&self, container: &ContainerId) -> Option<Vec<ItemId>> {
        self.store.lock().correct_orders.get(container).cloned()
    }

    /// Queues a failure for the next call; several queued faults fire in order.
    pub fn fail_next(&self, fault: Fault) {
        self.store.lock().faults.push_back(fault);
    }

    /// Fails the next fetch only; other calls go through.
    pub fn fail_next_fetch(&self, fault: Fault) {
        self.store.lock().fetch_fault = Some(fault);
    }

    /// The next accepted reorder reports `order` as canonical instead of the stored order.
    pub fn override_canonical_order(&self, order: Vec<ItemId>) {
        self.store.lock().canonical_override = Some(order);
    }

    /// The next accepted insert stores the item under `id`.
    pub fn assign_next_identity(&self, id: ItemId) {
        self.store.lock().assigned_identity = Some(id);
    }

    /// Holds the next call open until the returned sender fires or is dropped.
    pub fn hold_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.store.lock().held = Some(rx);
        tx
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.store.lock().calls.clone()
    }

    async fn enter(&self, call: RemoteCall) -> Result<(), RemoteError> {
        debug!(?call, "memory remote call");
        let held = {
            let mut store = self.store.lock();
            store.calls.push(call);
            store.held.take()
        };
        if let Some(rx) = held {
            let _ = rx.await;
        }
        match self.store.lock().faults.pop_front() {
            Some(fault) => Err(fault.into()),
            None => Ok(()),
        }
    }
}

impl From<Fault> for RemoteError {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::Reject(reason) => RemoteError::Rejected(reason),
            Fault::Unreachable(reason) => RemoteError::Unreachable(reason),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn fetch_sequence(&self, container: &ContainerId) -> Result<Sequence, RemoteError> {
        self.enter(RemoteCall::Fetch(container.clone())).await?;
        let items = {
            let mut store = self.store.lock();
            if let Some(fault) = store.fetch_fault.take() {
                return Err(fault.into());
            }
            store
                .containers
                .get(container)
                .cloned()
                .ok_or_else(|| RemoteError::Rejected(format!("unknown container {}", container)))?
        };
        Sequence::from_items(items).map_err(|e| RemoteError::Rejected(e.to_string()))
    }

    /// Listed items take the given order; items the caller did not list keep
    /// their relative order after them (last writer wins).
    async fn persist_reorder(
        &self,
        container: &ContainerId,
        order: &[ItemId],
    ) -> Result<ReorderAck, RemoteError> {
        self.enter(RemoteCall::Reorder(container.clone(), order.to_vec()))
            .await?;
        let mut store = self.store.lock();
        let Some(items) = store.containers.get(container) else {
            return Ok(rejected_reorder(format!("unknown container {}", container)));
        };

        let listed: HashSet<_> = order.iter().copied().collect();
        if listed.len() != order.len() {
            return Ok(rejected_reorder("order lists an item twice".to_string()));
        }
        let mut reordered = Vec::with_capacity(items.len());
        for id in order {
            match items.iter().find(|item| item.id == *id) {
                Some(item) => reordered.push(item.clone()),
                None => return Ok(rejected_reorder(format!("unknown item {}", id))),
            }
        }
        reordered.extend(items.iter().filter(|item| !listed.contains(&item.id)).cloned());

        let stored: Vec<ItemId> = reordered.iter().map(|item| item.id).collect();
        store.containers.insert(container.clone(), reordered);
        let canonical = store.canonical_override.take().unwrap_or(stored);

        Ok(ReorderAck {
            accepted: true,
            canonical_order: Some(canonical),
            error: None,
        })
    }

    async fn persist_insert(
        &self,
        container: &ContainerId,
        item: &Item,
        at: Option<usize>,
    ) -> Result<InsertAck, RemoteError> {
        self.enter(RemoteCall::Insert(container.clone(), item.id))
            .await?;
        let mut store = self.store.lock();
        let identity = store.assigned_identity.take().unwrap_or(item.id);
        let items = store.containers.entry(container.clone()).or_default();

        if items.iter().any(|existing| existing.id == identity) {
            return Ok(InsertAck {
                identity,
                error: Some(format!("item {} already exists", identity)),
            });
        }

        let at = at.map_or(items.len(), |at| at.min(items.len()));
        items.insert(at, Item::with_id(identity, item.payload.clone()));
        Ok(InsertAck {
            identity,
            error: None,
        })
    }

    async fn persist_remove(&self, container: &ContainerId, id: ItemId) -> Result<Ack, RemoteError> {
        self.enter(RemoteCall::Remove(container.clone(), id)).await?;
        let mut store = self.store.lock();
        let Some(items) = store.containers.get_mut(container) else {
            return Ok(Ack::rejected(format!("unknown container {}", container)));
        };
        let Some(idx) = items.iter().position(|item| item.id == id) else {
            return Ok(Ack::rejected(format!("unknown item {}", id)));
        };
        items.remove(idx);
        if let Some(order) = store.correct_orders.get_mut(container) {
            order.retain(|other| *other != id);
        }
        Ok(Ack::accepted())
    }

    async fn persist_correspondence(
        &self,
        container: &ContainerId,
        order: &[ItemId],
    ) -> Result<Ack, RemoteError> {
        self.enter(RemoteCall::Correspondence(container.clone(), order.to_vec()))
            .await?;
        let mut store = self.store.lock();
        let Some(items) = store.containers.get(container) else {
            return Ok(Ack::rejected(format!("unknown container {}", container)));
        };
        if let Some(unknown) = order.iter().find(|id| !items.iter().any(|item| item.id == **id)) {
            return Ok(Ack::rejected(format!("unknown item {}", unknown)));
        }
        store.correct_orders.insert(container.clone(), order.to_vec());
        Ok(Ack::accepted())
    }
}

fn rejected_reorder(reason: String) -> ReorderAck {
    ReorderAck {
        accepted: false,
        canonical_order: None,
        error: Some(reason),
    }
}
