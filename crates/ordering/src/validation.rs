/// Pre-save validation gate
/// Runs only before a terminal save, never during intermediate edits
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{EditorState, ItemId, OrderingProfile};

/// First invariant a record failed, with enough context for a precise message
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    #[error("required field `{field}` is missing")]
    MissingField { field: String },

    #[error("correct order is incomplete: {actual} of {expected} items placed")]
    IncompleteOrder {
        expected: usize,
        actual: usize,
        missing: Vec<ItemId>,
    },

    #[error("at least {minimum} item(s) required, found {actual}")]
    MinimumSizeViolation { minimum: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(Violation),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }

    pub fn into_result(self) -> std::result::Result<(), Violation> {
        match self {
            Verdict::Valid => Ok(()),
            Verdict::Invalid(violation) => Err(violation),
        }
    }
}

type FieldPredicate<R> = Box<dyn Fn(&R) -> bool + Send + Sync>;

struct RequiredField<R> {
    name: String,
    present: FieldPredicate<R>,
}

/// Checks, in order: required fields, correct-order completeness, minimum size.
pub struct ValidationGate<R = ()> {
    profile: OrderingProfile,
    fields: Vec<RequiredField<R>>,
}

impl<R> ValidationGate<R> {
    pub fn new(profile: OrderingProfile) -> Self {
        Self {
            profile,
            fields: Vec::new(),
        }
    }

    /// Declares a field of the owning record that must be present to save.
    pub fn require(
        mut self,
        name: impl Into<String>,
        present: impl Fn(&R) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fields.push(RequiredField {
            name: name.into(),
            present: Box::new(present),
        });
        self
    }

    pub fn profile(&self) -> &OrderingProfile {
        &self.profile
    }

    pub fn check(&self, record: &R, state: &EditorState) -> Verdict {
        if let Some(field) = self.fields.iter().find(|f| !(f.present)(record)) {
            return Verdict::Invalid(Violation::MissingField {
                field: field.name.clone(),
            });
        }

        if self.profile.requires_order {
            let order = state.order_or_empty();
            if !order.is_complete(&state.sequence) {
                return Verdict::Invalid(Violation::IncompleteOrder {
                    expected: state.sequence.len(),
                    actual: order.placed(&state.sequence),
                    missing: order.missing(&state.sequence),
                });
            }
        }

        if state.sequence.len() < self.profile.min_items {
            return Verdict::Invalid(Violation::MinimumSizeViolation {
                minimum: self.profile.min_items,
                actual: state.sequence.len(),
            });
        }

        Verdict::Valid
    }
}

impl ValidationGate<()> {
    pub fn check_state(&self, state: &EditorState) -> Verdict {
        self.check(&(), state)
    }
}
