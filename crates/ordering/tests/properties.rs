/// Property tests for the edit operations
use ordering::*;
use proptest::prelude::*;
use std::collections::HashSet;

fn state_with(len: usize) -> EditorState {
    let items = (0..len)
        .map(|n| Item::with_id(ItemId::from_u128(n as u128 + 1), serde_json::json!(n)))
        .collect();
    EditorState::new(Sequence::from_items(items).unwrap())
}

/// A sequence of 1..12 items plus a shuffled subset of its identities as the correct order.
fn state_and_order() -> impl Strategy<Value = EditorState> {
    (1usize..12)
        .prop_flat_map(|len| {
            let ids: Vec<usize> = (0..len).collect();
            (Just(len), Just(ids).prop_shuffle(), 0..=len)
        })
        .prop_map(|(len, shuffled, keep)| {
            let state = state_with(len);
            let order = shuffled[..keep]
                .iter()
                .map(|n| ItemId::from_u128(*n as u128 + 1))
                .collect();
            state.with_order(CorrespondenceMap::from_ids(order))
        })
}

proptest! {
    #[test]
    fn move_preserves_set_and_count(state in state_and_order(), from in 0usize..14, to in 0usize..14) {
        let moved = move_item(&state, from, to);
        let before: HashSet<_> = state.sequence.ids().into_iter().collect();
        let after: HashSet<_> = moved.sequence.ids().into_iter().collect();
        prop_assert_eq!(before, after);
        prop_assert_eq!(moved.sequence.len(), state.sequence.len());
    }

    #[test]
    fn move_preserves_order_references(state in state_and_order(), from in 0usize..14, to in 0usize..14) {
        let moved = move_item(&state, from, to);
        let order = state.order.as_ref().unwrap();
        let moved_order = moved.order.as_ref().unwrap();
        for id in order.ids() {
            prop_assert_eq!(moved_order.ids().iter().filter(|other| *other == id).count(), 1);
        }
        prop_assert_eq!(moved_order, order);
    }

    #[test]
    fn remove_strips_references(state in state_and_order(), pick in 0usize..12) {
        prop_assume!(state.sequence.len() > 1);
        let target = state.sequence.ids()[pick % state.sequence.len()];
        let removed = remove_item(&state, target, &OrderingProfile::default()).unwrap();

        let order = removed.order.unwrap();
        prop_assert!(!order.contains(target));
        let expected: Vec<_> = state
            .order
            .unwrap()
            .ids()
            .iter()
            .copied()
            .filter(|id| *id != target)
            .collect();
        prop_assert_eq!(order.ids(), expected.as_slice());
    }

    #[test]
    fn capture_is_identity_permutation(state in state_and_order(), from in 0usize..14, to in 0usize..14) {
        let moved = move_item(&state, from, to);
        let order = capture_order(&moved.sequence).unwrap();
        let dereferenced: Vec<_> = order
            .ids()
            .iter()
            .map(|id| moved.sequence.get(*id).unwrap().clone())
            .collect();
        prop_assert_eq!(dereferenced.as_slice(), moved.sequence.items());
        prop_assert!(order.is_complete(&moved.sequence));
    }
}

#[test]
fn validation_blocks_incomplete_commit() {
    let gate = ValidationGate::new(OrderingProfile::reorder_question());
    let state = state_with(3);
    let ids = state.sequence.ids();

    let partial = state
        .clone()
        .with_order(CorrespondenceMap::from_ids(ids[..2].to_vec()));
    assert!(matches!(
        gate.check_state(&partial),
        Verdict::Invalid(Violation::IncompleteOrder { expected: 3, actual: 2, .. })
    ));

    let full = state.with_order(CorrespondenceMap::from_ids(vec![ids[2], ids[0], ids[1]]));
    assert_eq!(gate.check_state(&full), Verdict::Valid);
}
