use serde::{Deserialize, Serialize};

use crate::{
    CorrespondenceMap, EditorState, Item, ItemId, OrderingError, OrderingProfile, Result,
    Sequence,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditCommand {
    Move {
        from: usize,
        to: usize,
    },
    Insert {
        item: Item,
        #[serde(default)]
        at: Option<usize>,
    },
    Remove {
        id: ItemId,
    },
    CaptureOrder,
    BeginManualOrder,
    Pick {
        id: ItemId,
    },
    ClearOrder,
}

impl EditCommand {
    pub fn name(&self) -> &'static str {
        match self {
            EditCommand::Move { .. } => "move",
            EditCommand::Insert { .. } => "insert",
            EditCommand::Remove { .. } => "remove",
            EditCommand::CaptureOrder => "capture_order",
            EditCommand::BeginManualOrder => "begin_manual_order",
            EditCommand::Pick { .. } => "pick",
            EditCommand::ClearOrder => "clear_order",
        }
    }

    /// Edits to the correct order. They stay local until the order is saved.
    pub fn is_order_edit(&self) -> bool {
        matches!(
            self,
            EditCommand::CaptureOrder
                | EditCommand::BeginManualOrder
                | EditCommand::Pick { .. }
                | EditCommand::ClearOrder
        )
    }

    pub fn is_local_only(&self) -> bool {
        self.is_order_edit()
    }
}

/// Applies `command` to `state`, returning the new state. `state` is left untouched on error.
pub fn apply_command(
    state: &EditorState,
    command: &EditCommand,
    profile: &OrderingProfile,
) -> Result<EditorState> {
    if command.is_order_edit() && !profile.requires_order {
        return Err(OrderingError::OrderNotSupported);
    }
    match command {
        EditCommand::Move { from, to } => Ok(move_item(state, *from, *to)),
        EditCommand::Insert { item, at } => insert_item(state, item.clone(), *at),
        EditCommand::Remove { id } => remove_item(state, *id, profile),
        EditCommand::CaptureOrder => Ok(EditorState {
            sequence: state.sequence.clone(),
            order: Some(capture_order(&state.sequence)?),
        }),
        EditCommand::BeginManualOrder => Ok(EditorState {
            sequence: state.sequence.clone(),
            order: Some(begin_manual_order()),
        }),
        EditCommand::Pick { id } => Ok(EditorState {
            sequence: state.sequence.clone(),
            order: Some(pick(&state.sequence, &state.order_or_empty(), *id)?),
        }),
        EditCommand::ClearOrder => Ok(EditorState {
            sequence: state.sequence.clone(),
            order: Some(clear_order()),
        }),
    }
}

/// Relocates the item at `from` to `to`. `to` is clamped to the last position;
/// an out-of-range `from` or an unchanged position is a no-op. The correct
/// order holds identities, so it carries over as is.
pub fn move_item(state: &EditorState, from: usize, to: usize) -> EditorState {
    let len = state.sequence.len();
    if from >= len {
        return state.clone();
    }
    let target = std::cmp::min(to, len - 1);
    if target == from {
        return state.clone();
    }
    EditorState {
        sequence: state.sequence.with_moved(from, target),
        order: state.order.clone(),
    }
}

/// Appends `item`, or inserts it at `at` (clamped to the end). Never touches the correct order.
pub fn insert_item(state: &EditorState, item: Item, at: Option<usize>) -> Result<EditorState> {
    if state.sequence.contains(item.id) {
        return Err(OrderingError::DuplicateIdentity(item.id));
    }
    let len = state.sequence.len();
    let at = at.map_or(len, |at| std::cmp::min(at, len));
    Ok(EditorState {
        sequence: state.sequence.with_inserted(item, at),
        order: state.order.clone(),
    })
}

/// Deletes `id` and strips it from the correct order.
pub fn remove_item(
    state: &EditorState,
    id: ItemId,
    profile: &OrderingProfile,
) -> Result<EditorState> {
    if !state.sequence.contains(id) {
        return Err(OrderingError::UnknownIdentity(id));
    }
    let len = state.sequence.len();
    if len <= profile.min_items {
        return Err(OrderingError::MinimumSizeViolation {
            minimum: profile.min_items,
            actual: len,
        });
    }
    Ok(EditorState {
        sequence: state.sequence.without(id),
        order: state.order.as_ref().map(|order| order.without(id)),
    })
}

/// A complete correct order equal to the current item order.
pub fn capture_order(sequence: &Sequence) -> Result<CorrespondenceMap> {
    if sequence.is_empty() {
        return Err(OrderingError::EmptySequence);
    }
    Ok(CorrespondenceMap::from_ids(sequence.ids()))
}

pub fn begin_manual_order() -> CorrespondenceMap {
    CorrespondenceMap::new()
}

/// Appends `id` to `order`; picking an identity twice is a no-op.
pub fn pick(
    sequence: &Sequence,
    order: &CorrespondenceMap,
    id: ItemId,
) -> Result<CorrespondenceMap> {
    if !sequence.contains(id) {
        return Err(OrderingError::UnknownIdentity(id));
    }
    Ok(order.with_pick(id))
}

pub fn clear_order() -> CorrespondenceMap {
    CorrespondenceMap::new()
}
