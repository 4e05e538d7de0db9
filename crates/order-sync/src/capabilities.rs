/// Permission checks for offering editing actions
/// The core trusts its caller; these only decide what the caller offers
use ordering::OrderingProfile;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub trait PermissionCheck: Send + Sync {
    fn has_permission(&self, path: &str) -> bool;
}

impl<F> PermissionCheck for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn has_permission(&self, path: &str) -> bool {
        self(path)
    }
}

/// Fixed set of granted permission paths
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    granted: HashSet<String>,
}

impl StaticPermissions {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            granted: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn grant(&mut self, path: impl Into<String>) {
        self.granted.insert(path.into());
    }
}

impl PermissionCheck for StaticPermissions {
    fn has_permission(&self, path: &str) -> bool {
        self.granted.contains(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Reorder,
    Insert,
    Remove,
    EditOrder,
    Save,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Reorder,
        Action::Insert,
        Action::Remove,
        Action::EditOrder,
        Action::Save,
    ];

    pub fn verb(&self) -> &'static str {
        match self {
            Action::Reorder => "reorder",
            Action::Insert => "insert",
            Action::Remove => "remove",
            Action::EditOrder => "edit_order",
            Action::Save => "save",
        }
    }

    /// Permission path for this action under `scope`, e.g. `questions/42/reorder`.
    pub fn permission_path(&self, scope: &str) -> String {
        format!("{}/{}", scope.trim_end_matches('/'), self.verb())
    }
}

/// Actions the caller may offer for a record under `scope`.
pub fn offered_actions(
    permissions: &dyn PermissionCheck,
    scope: &str,
    profile: &OrderingProfile,
) -> Vec<Action> {
    Action::ALL
        .into_iter()
        .filter(|action| *action != Action::EditOrder || profile.requires_order)
        .filter(|action| permissions.has_permission(&action.permission_path(scope)))
        .collect()
}
