use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashSet, fmt};
use uuid::Uuid;

use crate::{OrderingError, Result};

/// Stable identity of one item, never reused or reassigned by the core
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// Caller data; never inspected here
    #[serde(default)]
    pub payload: Value,
}

impl Item {
    pub fn new(payload: Value) -> Self {
        Self {
            id: ItemId::new(),
            payload,
        }
    }

    pub fn with_id(id: ItemId, payload: Value) -> Self {
        Self { id, payload }
    }
}

/// Ordered items with pairwise distinct identities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Item>", into = "Vec<Item>")]
pub struct Sequence {
    items: Vec<Item>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<Item>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(item.id) {
                return Err(OrderingError::DuplicateIdentity(item.id));
            }
        }
        Ok(Self { items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    /// Identities in item order
    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id).collect()
    }

    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// True when `order` names every item exactly once.
    pub fn is_permutation(&self, order: &[ItemId]) -> bool {
        if order.len() != self.items.len() {
            return false;
        }
        let mut seen = HashSet::with_capacity(order.len());
        order.iter().all(|id| self.contains(*id) && seen.insert(*id))
    }

    /// The same items laid out in `order`, or `None` if `order` is not a permutation.
    pub fn arranged(&self, order: &[ItemId]) -> Option<Self> {
        if !self.is_permutation(order) {
            return None;
        }
        let items = order
            .iter()
            .filter_map(|id| self.get(*id).cloned())
            .collect();
        Some(Self { items })
    }

    /// Replaces the identity of one item, keeping its position and payload.
    pub fn rekeyed(&self, from: ItemId, to: ItemId) -> Result<Self> {
        if from == to {
            return Ok(self.clone());
        }
        if self.contains(to) {
            return Err(OrderingError::DuplicateIdentity(to));
        }
        let idx = self
            .position(from)
            .ok_or(OrderingError::UnknownIdentity(from))?;
        let mut items = self.items.clone();
        items[idx].id = to;
        Ok(Self { items })
    }

    pub(crate) fn with_moved(&self, from: usize, to: usize) -> Self {
        let mut items = self.items.clone();
        let item = items.remove(from);
        items.insert(to, item);
        Self { items }
    }

    pub(crate) fn with_inserted(&self, item: Item, at: usize) -> Self {
        let mut items = self.items.clone();
        items.insert(at, item);
        Self { items }
    }

    pub(crate) fn without(&self, id: ItemId) -> Self {
        let items = self
            .items
            .iter()
            .filter(|item| item.id != id)
            .cloned()
            .collect();
        Self { items }
    }
}

impl TryFrom<Vec<Item>> for Sequence {
    type Error = OrderingError;

    fn try_from(items: Vec<Item>) -> Result<Self> {
        Self::from_items(items)
    }
}

impl From<Sequence> for Vec<Item> {
    fn from(sequence: Sequence) -> Self {
        sequence.items
    }
}
