/// Orderable-collection editing core
/// Identity-stable sequences, correct-order maps, and the pure edits over them
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod sequence;
pub use sequence::*;
mod correspondence;
pub use correspondence::*;
mod commands;
pub use commands::*;
mod validation;
pub use validation::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderingError {
    #[error("unknown identity: {0}")]
    UnknownIdentity(ItemId),
    #[error("identity already present: {0}")]
    DuplicateIdentity(ItemId),
    #[error("sequence must keep at least {minimum} item(s), has {actual}")]
    MinimumSizeViolation { minimum: usize, actual: usize },
    #[error("cannot capture an order from an empty sequence")]
    EmptySequence,
    #[error("this record type has no correct order")]
    OrderNotSupported,
}

pub type Result<T> = std::result::Result<T, OrderingError>;

/// Per record type ordering policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingProfile {
    /// Fewest items a sequence may be left with
    #[serde(default = "default_min_items")]
    pub min_items: usize,

    /// Whether a complete correct order must exist before saving
    #[serde(default)]
    pub requires_order: bool,
}

fn default_min_items() -> usize {
    1
}

impl OrderingProfile {
    /// Units inside a lesson: ordered, no correct answer order.
    pub const fn lesson_units() -> Self {
        Self {
            min_items: 1,
            requires_order: false,
        }
    }

    /// Options of an item-reordering question: the correct order is required.
    pub const fn reorder_question() -> Self {
        Self {
            min_items: 1,
            requires_order: true,
        }
    }

    pub fn with_min_items(mut self, min_items: usize) -> Self {
        self.min_items = min_items;
        self
    }
}

impl Default for OrderingProfile {
    fn default() -> Self {
        Self::lesson_units()
    }
}

/// Everything one editing session owns: the sequence and, when present, its correct order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorState {
    pub sequence: Sequence,
    #[serde(default)]
    pub order: Option<CorrespondenceMap>,
}

impl EditorState {
    pub fn new(sequence: Sequence) -> Self {
        Self {
            sequence,
            order: None,
        }
    }

    pub fn with_order(mut self, order: CorrespondenceMap) -> Self {
        self.order = Some(order);
        self
    }

    /// Correct order, or an empty one when none has been started.
    pub fn order_or_empty(&self) -> CorrespondenceMap {
        self.order.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_presets() {
        assert!(!OrderingProfile::lesson_units().requires_order);
        assert!(OrderingProfile::reorder_question().requires_order);
        assert_eq!(OrderingProfile::default().min_items, 1);
        assert_eq!(
            OrderingProfile::reorder_question().with_min_items(2).min_items,
            2
        );
    }

    #[test]
    fn test_profile_deserialize_defaults() {
        let profile: OrderingProfile = serde_json::from_str("{}").unwrap();
        assert_eq!(profile, OrderingProfile::lesson_units());
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let a = Item::with_id(ItemId::from_u128(1), serde_json::json!({ "text": "A" }));
        let b = Item::with_id(ItemId::from_u128(2), serde_json::json!({ "text": "B" }));
        let sequence = Sequence::from_items(vec![a, b]).unwrap();
        let order = capture_order(&sequence).unwrap();
        let state = EditorState::new(sequence).with_order(order);

        let json = serde_json::to_string(&state).unwrap();
        let parsed: EditorState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_state_rejects_duplicate_items() {
        let json = r#"{
            "sequence": [
                { "id": "00000000-0000-0000-0000-000000000001", "payload": null },
                { "id": "00000000-0000-0000-0000-000000000001", "payload": null }
            ]
        }"#;
        assert!(serde_json::from_str::<EditorState>(json).is_err());
    }
}
