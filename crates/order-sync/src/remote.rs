/// Remote boundary
/// The system of record as seen by the editor: one fetch and four persist calls
use async_trait::async_trait;
use ordering::{Item, ItemId, Sequence};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ContainerId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The remote answered and refused the change
    #[error("rejected: {0}")]
    Rejected(String),

    /// Transport failure, server error, or timeout
    #[error("unreachable: {0}")]
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Ack {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            error: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            error: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderAck {
    pub accepted: bool,
    /// Order the remote asserts is authoritative after the write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_order: Option<Vec<ItemId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAck {
    pub identity: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_sequence(&self, container: &ContainerId) -> Result<Sequence, RemoteError>;

    async fn persist_reorder(
        &self,
        container: &ContainerId,
        order: &[ItemId],
    ) -> Result<ReorderAck, RemoteError>;

    async fn persist_insert(
        &self,
        container: &ContainerId,
        item: &Item,
        at: Option<usize>,
    ) -> Result<InsertAck, RemoteError>;

    async fn persist_remove(&self, container: &ContainerId, id: ItemId)
        -> Result<Ack, RemoteError>;

    /// Only meaningful for records that carry a correct order.
    async fn persist_correspondence(
        &self,
        container: &ContainerId,
        order: &[ItemId],
    ) -> Result<Ack, RemoteError>;
}

/// Canonical remote representation of a mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum RemoteRequest {
    /// Full identity order after a move
    Reorder { order: Vec<ItemId> },
    Insert {
        item: Item,
        #[serde(default)]
        at: Option<usize>,
    },
    Remove { id: ItemId },
    Correspondence { order: Vec<ItemId> },
}

impl RemoteRequest {
    pub fn name(&self) -> &'static str {
        match self {
            RemoteRequest::Reorder { .. } => "persist_reorder",
            RemoteRequest::Insert { .. } => "persist_insert",
            RemoteRequest::Remove { .. } => "persist_remove",
            RemoteRequest::Correspondence { .. } => "persist_correspondence",
        }
    }
}

/// What an accepted request came back with
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteReply {
    Reordered { canonical_order: Option<Vec<ItemId>> },
    Inserted { identity: ItemId },
    Removed,
    CorrespondenceSaved,
    /// Full sequence fetched because the remote's answer did not fit local state
    Refetched { sequence: Sequence },
    /// The write was accepted but the follow-up refetch failed
    Unreconciled { reason: String },
}

/// Issues `request` and folds the acknowledgement into a reply or a rejection.
pub async fn dispatch<R: RemoteStore + ?Sized>(
    remote: &R,
    container: &ContainerId,
    request: &RemoteRequest,
) -> Result<RemoteReply, RemoteError> {
    match request {
        RemoteRequest::Reorder { order } => {
            let ack = remote.persist_reorder(container, order).await?;
            if !ack.accepted {
                return Err(rejection(ack.error));
            }
            Ok(RemoteReply::Reordered {
                canonical_order: ack.canonical_order,
            })
        }
        RemoteRequest::Insert { item, at } => {
            let ack = remote.persist_insert(container, item, *at).await?;
            if let Some(reason) = ack.error {
                return Err(RemoteError::Rejected(reason));
            }
            Ok(RemoteReply::Inserted {
                identity: ack.identity,
            })
        }
        RemoteRequest::Remove { id } => {
            let ack = remote.persist_remove(container, *id).await?;
            if !ack.accepted {
                return Err(rejection(ack.error));
            }
            Ok(RemoteReply::Removed)
        }
        RemoteRequest::Correspondence { order } => {
            let ack = remote.persist_correspondence(container, order).await?;
            if !ack.accepted {
                return Err(rejection(ack.error));
            }
            Ok(RemoteReply::CorrespondenceSaved)
        }
    }
}

fn rejection(error: Option<String>) -> RemoteError {
    RemoteError::Rejected(error.unwrap_or_else(|| "rejected without reason".to_string()))
}
