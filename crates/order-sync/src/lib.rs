/// Optimistic synchronization for orderable collections
/// Applies edits locally first, confirms them against a remote system of record, rolls back on failure
use ordering::{OrderingError, Violation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod config;
pub use config::*;

mod remote;
pub use remote::*;

mod coordinator;
pub use coordinator::*;

mod session;
pub use session::*;

mod capabilities;
pub use capabilities::*;

mod memory;
pub use memory::*;

mod http;
pub use http::*;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Ordering(#[from] OrderingError),

    #[error("another change is still being saved")]
    SyncBusy,

    #[error("unknown or stale sync ticket: {0}")]
    UnknownTicket(TicketId),

    #[error("remote rejected the change: {reason}")]
    RemoteRejected { reason: String, restored: bool },

    #[error("remote unreachable: {reason}")]
    RemoteUnreachable { reason: String, restored: bool },

    #[error("cannot save: {0}")]
    Invalid(#[from] Violation),

    #[error("validation gate is for a different record type than this session")]
    ProfileMismatch,

    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Whether local state was put back to its pre-mutation snapshot.
    pub fn restored(&self) -> bool {
        match self {
            SyncError::RemoteRejected { restored, .. }
            | SyncError::RemoteUnreachable { restored, .. } => *restored,
            _ => false,
        }
    }

    pub(crate) fn from_remote(error: RemoteError, restored: bool) -> Self {
        match error {
            RemoteError::Rejected(reason) => SyncError::RemoteRejected { reason, restored },
            RemoteError::Unreachable(reason) => SyncError::RemoteUnreachable { reason, restored },
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Remote identifier of the record owning a sequence (a lesson, a question)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(pub String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ContainerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifies one in-flight mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub uuid::Uuid);

impl TicketId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Pending,
    Committed,
    RolledBack,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Pending => write!(f, "pending"),
            Self::Committed => write!(f, "committed"),
            Self::RolledBack => write!(f, "rolled_back"),
        }
    }
}
