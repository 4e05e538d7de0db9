/// Sync coordinator
/// One in-flight mutation at a time: snapshot, optimistic apply, remote confirmation, commit or rollback
use chrono::{DateTime, Utc};
use ordering::{
    apply_command, EditCommand, EditorState, ItemId, OrderingProfile, Sequence, ValidationGate,
};
use std::{collections::HashSet, time::Duration};
use tracing::{debug, info, warn};

use crate::{
    dispatch, ContainerId, RemoteError, RemoteReply, RemoteRequest, RemoteStore, Result,
    SyncError, SyncState, TicketId,
};

/// State captured before an optimistic apply
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub state: EditorState,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    fn capture(state: &EditorState) -> Self {
        Self {
            state: state.clone(),
            captured_at: Utc::now(),
        }
    }
}

/// Ticket for a mutation that has been applied locally and awaits the remote
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSync {
    ticket: TicketId,
    command: &'static str,
    request: RemoteRequest,
    optimistic_ids: Vec<ItemId>,
}

impl PendingSync {
    pub fn ticket(&self) -> TicketId {
        self.ticket
    }

    pub fn command(&self) -> &'static str {
        self.command
    }

    pub fn request(&self) -> &RemoteRequest {
        &self.request
    }

    /// True when `order` names exactly the identities held locally after the optimistic apply.
    pub fn matches_local(&self, order: &[ItemId]) -> bool {
        if order.len() != self.optimistic_ids.len() {
            return false;
        }
        let local: HashSet<_> = self.optimistic_ids.iter().collect();
        let remote: HashSet<_> = order.iter().collect();
        local == remote && remote.len() == order.len()
    }

    /// Whether an accepted `reply` cannot be folded into local state without a full refetch:
    /// a canonical order naming other items, or an assigned identity already held locally.
    fn needs_refetch(&self, reply: &RemoteReply) -> bool {
        match (reply, &self.request) {
            (
                RemoteReply::Reordered {
                    canonical_order: Some(order),
                },
                _,
            ) => !self.matches_local(order),
            (RemoteReply::Inserted { identity }, RemoteRequest::Insert { item, .. }) => {
                *identity != item.id && self.optimistic_ids.contains(identity)
            }
            _ => false,
        }
    }
}

/// Result of a mutation that went through the coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub command: &'static str,
    /// `None` when the command stayed local
    pub ticket: Option<TicketId>,
    /// `Committed` after a remote confirmation, `Idle` for local-only commands
    pub outcome: SyncState,
    /// Whether the remote's answer changed local state beyond the optimistic apply
    pub reconciled: bool,
    /// The remote accepted the change but local state could not be brought in
    /// line with it; a refresh is due
    pub stale: bool,
}

impl SyncReport {
    /// Report for a command that never left this process.
    pub fn local(command: &'static str) -> Self {
        Self {
            command,
            ticket: None,
            outcome: SyncState::Idle,
            reconciled: false,
            stale: false,
        }
    }
}

enum Reconciled {
    Unchanged,
    Changed,
    Deferred,
}

struct InFlight {
    ticket: TicketId,
    command: &'static str,
    snapshot: Snapshot,
}

pub struct SyncCoordinator {
    container: ContainerId,
    profile: OrderingProfile,
    state: EditorState,
    sync_state: SyncState,
    last_outcome: Option<SyncState>,
    in_flight: Option<InFlight>,
}

impl SyncCoordinator {
    pub fn new(container: ContainerId, profile: OrderingProfile, state: EditorState) -> Self {
        Self {
            container,
            profile,
            state,
            sync_state: SyncState::Idle,
            last_outcome: None,
            in_flight: None,
        }
    }

    pub fn container(&self) -> &ContainerId {
        &self.container
    }

    pub fn profile(&self) -> &OrderingProfile {
        &self.profile
    }

    /// Local state, including any optimistic change still in flight
    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync_state
    }

    /// How the most recent remote round trip ended (`Committed` or `RolledBack`)
    pub fn last_outcome(&self) -> Option<SyncState> {
        self.last_outcome
    }

    /// Snapshot held for the in-flight mutation
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.in_flight.as_ref().map(|f| &f.snapshot)
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.sync_state != SyncState::Idle {
            debug!(container = %self.container, state = %self.sync_state, "mutation rejected while busy");
            return Err(SyncError::SyncBusy);
        }
        Ok(())
    }

    /// Applies `command` locally. Returns the ticket to confirm with the
    /// remote, or `None` when the command has no remote effect (local-only
    /// edits and no-op moves). Structural errors leave state untouched.
    pub fn begin(&mut self, command: &EditCommand) -> Result<Option<PendingSync>> {
        self.ensure_idle()?;

        let next = apply_command(&self.state, command, &self.profile)?;

        let request = if command.is_local_only() {
            None
        } else {
            remote_request(command, &self.state, &next)
        };

        let Some(request) = request else {
            debug!(container = %self.container, command = command.name(), "applied locally");
            self.state = next;
            return Ok(None);
        };

        Ok(Some(self.enter_pending(command.name(), request, next)))
    }

    /// Runs `gate` and, for records that carry a correct order, prepares the
    /// terminal save of that order. Returns `None` when there is nothing to send.
    pub fn begin_save<R>(&mut self, gate: &ValidationGate<R>, record: &R) -> Result<Option<PendingSync>> {
        self.ensure_idle()?;

        if gate.profile() != &self.profile {
            return Err(SyncError::ProfileMismatch);
        }
        gate.check(record, &self.state).into_result()?;

        if !self.profile.requires_order {
            return Ok(None);
        }

        let request = RemoteRequest::Correspondence {
            order: self.state.order_or_empty().ids().to_vec(),
        };
        let unchanged = self.state.clone();
        Ok(Some(self.enter_pending("save", request, unchanged)))
    }

    fn enter_pending(
        &mut self,
        command: &'static str,
        request: RemoteRequest,
        next: EditorState,
    ) -> PendingSync {
        let ticket = TicketId::new();
        let snapshot = Snapshot::capture(&self.state);

        self.state = next;
        self.sync_state = SyncState::Pending;
        self.in_flight = Some(InFlight {
            ticket,
            command,
            snapshot,
        });

        debug!(
            container = %self.container,
            ticket = %ticket,
            command,
            request = request.name(),
            "sync pending"
        );

        PendingSync {
            ticket,
            command,
            request,
            optimistic_ids: self.state.sequence.ids(),
        }
    }

    /// Resolves the in-flight mutation with the remote's answer: commits and
    /// reconciles on success, restores the snapshot on failure.
    pub fn complete(
        &mut self,
        pending: PendingSync,
        outcome: std::result::Result<RemoteReply, RemoteError>,
    ) -> Result<SyncReport> {
        let in_flight = match self.in_flight.take() {
            Some(f) if f.ticket == pending.ticket => f,
            other => {
                self.in_flight = other;
                return Err(SyncError::UnknownTicket(pending.ticket));
            }
        };

        let reply = match outcome {
            Ok(reply) => reply,
            Err(error) => {
                self.state = in_flight.snapshot.state;
                self.transition(SyncState::RolledBack, in_flight.ticket);
                self.transition(SyncState::Idle, in_flight.ticket);
                self.last_outcome = Some(SyncState::RolledBack);
                warn!(
                    container = %self.container,
                    ticket = %in_flight.ticket,
                    command = in_flight.command,
                    error = %error,
                    "sync failed, local state restored"
                );
                return Err(SyncError::from_remote(error, true));
            }
        };

        let reconciled = self.reconcile(reply, &in_flight.snapshot.state);
        self.transition(SyncState::Committed, in_flight.ticket);
        self.transition(SyncState::Idle, in_flight.ticket);
        self.last_outcome = Some(SyncState::Committed);

        let report = SyncReport {
            command: in_flight.command,
            ticket: Some(in_flight.ticket),
            outcome: SyncState::Committed,
            reconciled: matches!(reconciled, Reconciled::Changed),
            stale: matches!(reconciled, Reconciled::Deferred),
        };
        info!(
            container = %self.container,
            ticket = %in_flight.ticket,
            command = in_flight.command,
            reconciled = report.reconciled,
            stale = report.stale,
            "sync committed"
        );
        Ok(report)
    }

    fn transition(&mut self, next: SyncState, ticket: TicketId) {
        debug!(container = %self.container, ticket = %ticket, from = %self.sync_state, to = %next, "sync transition");
        self.sync_state = next;
    }

    /// Folds an accepted reply into local state. The remote is authoritative on
    /// conflict; what cannot be folded in is left for the next refresh.
    fn reconcile(&mut self, reply: RemoteReply, before: &EditorState) -> Reconciled {
        match reply {
            RemoteReply::Reordered {
                canonical_order: Some(order),
            } => {
                if order == self.state.sequence.ids() {
                    return Reconciled::Unchanged;
                }
                match self.state.sequence.arranged(&order) {
                    Some(sequence) => {
                        self.state.sequence = sequence;
                        Reconciled::Changed
                    }
                    None => {
                        warn!(container = %self.container, "canonical order does not match local items");
                        Reconciled::Deferred
                    }
                }
            }
            RemoteReply::Reordered {
                canonical_order: None,
            }
            | RemoteReply::Removed
            | RemoteReply::CorrespondenceSaved => Reconciled::Unchanged,
            RemoteReply::Inserted { identity } => {
                let Some(local) = self.inserted_since(before) else {
                    return Reconciled::Unchanged;
                };
                if local == identity {
                    return Reconciled::Unchanged;
                }
                match self.state.sequence.rekeyed(local, identity) {
                    Ok(sequence) => {
                        self.state.order = self
                            .state
                            .order
                            .as_ref()
                            .map(|order| order.rekeyed(local, identity));
                        self.state.sequence = sequence;
                        Reconciled::Changed
                    }
                    Err(e) => {
                        warn!(container = %self.container, error = %e, "assigned identity conflicts with local items");
                        Reconciled::Deferred
                    }
                }
            }
            RemoteReply::Refetched { sequence } => {
                self.adopt(sequence);
                Reconciled::Changed
            }
            RemoteReply::Unreconciled { reason } => {
                warn!(container = %self.container, %reason, "change accepted but refetch failed");
                Reconciled::Deferred
            }
        }
    }

    /// Replaces the sequence with the remote's, dropping correct-order references
    /// to items that are gone.
    fn adopt(&mut self, sequence: Sequence) {
        self.state.order = self
            .state
            .order
            .as_ref()
            .map(|order| order.retained_in(&sequence));
        self.state.sequence = sequence;
    }

    /// Takes a freshly fetched sequence as the new local state. Only while idle.
    pub fn refresh(&mut self, sequence: Sequence) -> Result<()> {
        self.ensure_idle()?;
        debug!(container = %self.container, items = sequence.len(), "local state refreshed");
        self.adopt(sequence);
        Ok(())
    }

    /// Identity present now but absent from `before`.
    fn inserted_since(&self, before: &EditorState) -> Option<ItemId> {
        self.state
            .sequence
            .iter()
            .map(|item| item.id)
            .find(|id| !before.sequence.contains(*id))
    }

    /// Begin, confirm with `remote` under `timeout`, complete.
    pub async fn apply<R: RemoteStore + ?Sized>(
        &mut self,
        command: &EditCommand,
        remote: &R,
        timeout: Duration,
    ) -> Result<SyncReport> {
        let Some(pending) = self.begin(command)? else {
            return Ok(SyncReport::local(command.name()));
        };
        let outcome = resolve(remote, &self.container, &pending, timeout).await;
        self.complete(pending, outcome)
    }
}

/// Sends the pending request. Failing or exceeding `timeout` here means the
/// change did not land. Once the remote has accepted it, a reply that does not
/// fit local state is followed by a refetch, and a failed refetch only defers
/// reconciliation.
pub async fn resolve<R: RemoteStore + ?Sized>(
    remote: &R,
    container: &ContainerId,
    pending: &PendingSync,
    timeout: Duration,
) -> std::result::Result<RemoteReply, RemoteError> {
    let reply = tokio::time::timeout(timeout, dispatch(remote, container, pending.request()))
        .await
        .map_err(|_| timed_out(timeout))??;

    if !pending.needs_refetch(&reply) {
        return Ok(reply);
    }

    debug!(container = %container, ticket = %pending.ticket(), "remote answer does not fit local state, refetching");
    let refetched = match tokio::time::timeout(timeout, remote.fetch_sequence(container)).await {
        Ok(Ok(sequence)) => RemoteReply::Refetched { sequence },
        Ok(Err(error)) => RemoteReply::Unreconciled {
            reason: error.to_string(),
        },
        Err(_) => RemoteReply::Unreconciled {
            reason: timed_out(timeout).to_string(),
        },
    };
    Ok(refetched)
}

fn timed_out(timeout: Duration) -> RemoteError {
    RemoteError::Unreachable(format!("no answer within {} ms", timeout.as_millis()))
}

/// Remote form of a command, judged against the state before and after it.
/// Correct-order edits go out only through the save.
fn remote_request(
    command: &EditCommand,
    before: &EditorState,
    after: &EditorState,
) -> Option<RemoteRequest> {
    match command {
        EditCommand::Move { .. } => {
            let order = after.sequence.ids();
            if order == before.sequence.ids() {
                None
            } else {
                Some(RemoteRequest::Reorder { order })
            }
        }
        EditCommand::Insert { item, .. } => Some(RemoteRequest::Insert {
            item: item.clone(),
            at: after.sequence.position(item.id),
        }),
        EditCommand::Remove { id } => Some(RemoteRequest::Remove { id: *id }),
        EditCommand::CaptureOrder
        | EditCommand::BeginManualOrder
        | EditCommand::Pick { .. }
        | EditCommand::ClearOrder => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordering::{capture_order, Item, OrderingError, Violation};
    use serde_json::json;

    fn id(n: u128) -> ItemId {
        ItemId::from_u128(n)
    }

    fn sequence(ids: &[u128]) -> Sequence {
        Sequence::from_items(
            ids.iter()
                .map(|n| Item::with_id(id(*n), json!({ "text": format!("option {}", n) })))
                .collect(),
        )
        .unwrap()
    }

    fn question(ids: &[u128]) -> SyncCoordinator {
        let seq = sequence(ids);
        let order = capture_order(&seq).unwrap();
        SyncCoordinator::new(
            ContainerId::from("question-1"),
            OrderingProfile::reorder_question(),
            EditorState::new(seq).with_order(order),
        )
    }

    #[test]
    fn test_optimistic_apply_is_visible_while_pending() {
        let mut coordinator = question(&[1, 2, 3]);
        let pending = coordinator
            .begin(&EditCommand::Move { from: 0, to: 2 })
            .unwrap()
            .unwrap();

        assert_eq!(coordinator.sync_state(), SyncState::Pending);
        assert_eq!(coordinator.state().sequence.ids(), vec![id(2), id(3), id(1)]);
        assert_eq!(
            pending.request(),
            &RemoteRequest::Reorder {
                order: vec![id(2), id(3), id(1)]
            }
        );
        assert_eq!(
            coordinator.snapshot().unwrap().state.sequence.ids(),
            vec![id(1), id(2), id(3)]
        );
    }

    #[test]
    fn test_commit_returns_to_idle() {
        let mut coordinator = question(&[1, 2, 3]);
        let pending = coordinator
            .begin(&EditCommand::Move { from: 0, to: 2 })
            .unwrap()
            .unwrap();
        let ticket = pending.ticket();

        let report = coordinator
            .complete(
                pending,
                Ok(RemoteReply::Reordered {
                    canonical_order: None,
                }),
            )
            .unwrap();

        assert_eq!(report.ticket, Some(ticket));
        assert_eq!(report.outcome, SyncState::Committed);
        assert!(!report.reconciled);
        assert_eq!(coordinator.sync_state(), SyncState::Idle);
        assert_eq!(coordinator.last_outcome(), Some(SyncState::Committed));
        assert!(coordinator.snapshot().is_none());
        assert_eq!(coordinator.state().sequence.ids(), vec![id(2), id(3), id(1)]);
    }

    #[test]
    fn test_rollback_is_exact() {
        let mut coordinator = question(&[1, 2, 3]);
        let before = coordinator.state().clone();

        let pending = coordinator
            .begin(&EditCommand::Remove { id: id(2) })
            .unwrap()
            .unwrap();
        assert_eq!(coordinator.state().order.as_ref().unwrap().ids(), &[id(1), id(3)]);

        let err = coordinator
            .complete(pending, Err(RemoteError::Unreachable("connection reset".into())))
            .unwrap_err();

        assert!(matches!(err, SyncError::RemoteUnreachable { restored: true, .. }));
        assert_eq!(coordinator.state(), &before);
        assert_eq!(coordinator.sync_state(), SyncState::Idle);
        assert_eq!(coordinator.last_outcome(), Some(SyncState::RolledBack));
    }

    #[test]
    fn test_busy_rejection_leaves_pending_unaffected() {
        let mut coordinator = question(&[1, 2, 3]);
        let pending = coordinator
            .begin(&EditCommand::Move { from: 2, to: 0 })
            .unwrap()
            .unwrap();
        let optimistic = coordinator.state().clone();

        let busy = coordinator.begin(&EditCommand::Remove { id: id(1) });
        assert!(matches!(busy, Err(SyncError::SyncBusy)));
        let busy_local = coordinator.begin(&EditCommand::Pick { id: id(1) });
        assert!(matches!(busy_local, Err(SyncError::SyncBusy)));
        assert_eq!(coordinator.state(), &optimistic);

        coordinator
            .complete(
                pending,
                Ok(RemoteReply::Reordered {
                    canonical_order: Some(vec![id(3), id(1), id(2)]),
                }),
            )
            .unwrap();
        assert_eq!(coordinator.state().sequence.ids(), vec![id(3), id(1), id(2)]);
    }

    #[test]
    fn test_structural_errors_do_not_enter_pending() {
        let mut coordinator = question(&[1]);
        let before = coordinator.state().clone();

        let err = coordinator.begin(&EditCommand::Remove { id: id(1) }).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Ordering(OrderingError::MinimumSizeViolation { .. })
        ));
        let err = coordinator.begin(&EditCommand::Remove { id: id(4) }).unwrap_err();
        assert!(matches!(err, SyncError::Ordering(OrderingError::UnknownIdentity(_))));

        assert_eq!(coordinator.sync_state(), SyncState::Idle);
        assert_eq!(coordinator.state(), &before);
    }

    #[test]
    fn test_stale_ticket_rejected() {
        let mut coordinator = question(&[1, 2, 3]);
        let first = coordinator
            .begin(&EditCommand::Move { from: 0, to: 1 })
            .unwrap()
            .unwrap();
        let stale = first.clone();
        coordinator.complete(first, Ok(RemoteReply::Reordered { canonical_order: None })).unwrap();

        let err = coordinator.complete(stale, Ok(RemoteReply::Removed)).unwrap_err();
        assert!(matches!(err, SyncError::UnknownTicket(_)));
        assert_eq!(coordinator.sync_state(), SyncState::Idle);
    }

    #[test]
    fn test_local_only_and_noop_commands_skip_remote() {
        let mut coordinator = question(&[1, 2, 3]);

        assert!(coordinator.begin(&EditCommand::Move { from: 1, to: 1 }).unwrap().is_none());
        assert!(coordinator.begin(&EditCommand::BeginManualOrder).unwrap().is_none());
        assert!(coordinator.begin(&EditCommand::Pick { id: id(3) }).unwrap().is_none());

        assert_eq!(coordinator.sync_state(), SyncState::Idle);
        assert_eq!(coordinator.state().order.as_ref().unwrap().ids(), &[id(3)]);
    }

    #[test]
    fn test_order_edits_stay_local_until_save() {
        let mut coordinator = question(&[1, 2, 3]);
        for command in [
            EditCommand::ClearOrder,
            EditCommand::Pick { id: id(2) },
            EditCommand::CaptureOrder,
        ] {
            assert!(coordinator.begin(&command).unwrap().is_none());
        }
        assert_eq!(coordinator.sync_state(), SyncState::Idle);
        assert_eq!(coordinator.state().order.as_ref().unwrap().ids(), &[id(1), id(2), id(3)]);

        let mut lesson = SyncCoordinator::new(
            ContainerId::from("lesson-7"),
            OrderingProfile::lesson_units(),
            EditorState::new(sequence(&[1, 2])),
        );
        let err = lesson.begin(&EditCommand::CaptureOrder).unwrap_err();
        assert!(matches!(err, SyncError::Ordering(OrderingError::OrderNotSupported)));
        assert!(lesson.state().order.is_none());
    }

    #[test]
    fn test_insert_adopts_assigned_identity() {
        let mut coordinator = question(&[1, 2]);
        let local = Item::with_id(id(10), json!({ "text": "new" }));
        let pending = coordinator
            .begin(&EditCommand::Insert {
                item: local,
                at: Some(1),
            })
            .unwrap()
            .unwrap();
        assert_eq!(
            pending.request(),
            &RemoteRequest::Insert {
                item: Item::with_id(id(10), json!({ "text": "new" })),
                at: Some(1)
            }
        );

        let report = coordinator
            .complete(pending, Ok(RemoteReply::Inserted { identity: id(99) }))
            .unwrap();
        assert!(report.reconciled);
        assert_eq!(coordinator.state().sequence.ids(), vec![id(1), id(99), id(2)]);
    }

    #[test]
    fn test_refetch_prunes_order() {
        let mut coordinator = question(&[1, 2, 3]);
        let pending = coordinator
            .begin(&EditCommand::Move { from: 0, to: 2 })
            .unwrap()
            .unwrap();

        let report = coordinator
            .complete(
                pending,
                Ok(RemoteReply::Refetched {
                    sequence: sequence(&[3, 2, 4]),
                }),
            )
            .unwrap();
        assert!(report.reconciled);
        assert_eq!(coordinator.state().sequence.ids(), vec![id(3), id(2), id(4)]);
        assert_eq!(coordinator.state().order.as_ref().unwrap().ids(), &[id(2), id(3)]);
    }

    #[test]
    fn test_save_runs_gate_first() {
        let mut coordinator = question(&[1, 2, 3]);
        let gate = ValidationGate::new(OrderingProfile::reorder_question());

        coordinator.begin(&EditCommand::BeginManualOrder).unwrap();
        coordinator.begin(&EditCommand::Pick { id: id(2) }).unwrap();

        let err = coordinator.begin_save(&gate, &()).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Invalid(Violation::IncompleteOrder { expected: 3, actual: 1, .. })
        ));
        assert_eq!(coordinator.sync_state(), SyncState::Idle);

        coordinator.begin(&EditCommand::Pick { id: id(3) }).unwrap();
        coordinator.begin(&EditCommand::Pick { id: id(1) }).unwrap();
        let pending = coordinator.begin_save(&gate, &()).unwrap().unwrap();
        assert_eq!(
            pending.request(),
            &RemoteRequest::Correspondence {
                order: vec![id(2), id(3), id(1)]
            }
        );
        assert_eq!(coordinator.sync_state(), SyncState::Pending);
    }

    #[test]
    fn test_save_without_order_sends_nothing() {
        let mut coordinator = SyncCoordinator::new(
            ContainerId::from("lesson-7"),
            OrderingProfile::lesson_units(),
            EditorState::new(sequence(&[1, 2])),
        );
        let gate = ValidationGate::new(OrderingProfile::lesson_units());
        assert!(coordinator.begin_save(&gate, &()).unwrap().is_none());
        assert!(coordinator.state().order.is_none());
        assert_eq!(coordinator.sync_state(), SyncState::Idle);
    }

    #[test]
    fn test_accepted_change_survives_failed_refetch() {
        let mut coordinator = question(&[1, 2, 3]);
        let pending = coordinator
            .begin(&EditCommand::Move { from: 0, to: 2 })
            .unwrap()
            .unwrap();

        let report = coordinator
            .complete(
                pending,
                Ok(RemoteReply::Unreconciled {
                    reason: "unreachable: connection reset".into(),
                }),
            )
            .unwrap();
        assert_eq!(report.outcome, SyncState::Committed);
        assert!(report.stale);
        assert!(!report.reconciled);
        assert_eq!(coordinator.state().sequence.ids(), vec![id(2), id(3), id(1)]);
        assert_eq!(coordinator.last_outcome(), Some(SyncState::Committed));

        coordinator.refresh(sequence(&[2, 3, 1, 4])).unwrap();
        assert_eq!(coordinator.state().sequence.ids(), vec![id(2), id(3), id(1), id(4)]);
        assert_eq!(coordinator.state().order.as_ref().unwrap().ids(), &[id(1), id(2), id(3)]);
    }

    #[test]
    fn test_refresh_waits_for_idle() {
        let mut coordinator = question(&[1, 2, 3]);
        coordinator
            .begin(&EditCommand::Remove { id: id(3) })
            .unwrap()
            .unwrap();
        assert!(matches!(
            coordinator.refresh(sequence(&[1, 2, 3])),
            Err(SyncError::SyncBusy)
        ));
    }

    #[test]
    fn test_insert_identity_conflict_needs_refetch() {
        let mut coordinator = question(&[1, 2]);
        let pending = coordinator
            .begin(&EditCommand::Insert {
                item: Item::with_id(id(10), json!(null)),
                at: None,
            })
            .unwrap()
            .unwrap();

        assert!(pending.needs_refetch(&RemoteReply::Inserted { identity: id(2) }));
        assert!(!pending.needs_refetch(&RemoteReply::Inserted { identity: id(99) }));
        assert!(!pending.needs_refetch(&RemoteReply::Inserted { identity: id(10) }));

        // without a refetch the conflict is committed as stale, never rolled back
        let report = coordinator
            .complete(pending, Ok(RemoteReply::Inserted { identity: id(2) }))
            .unwrap();
        assert!(report.stale);
        assert_eq!(coordinator.state().sequence.ids(), vec![id(1), id(2), id(10)]);
    }

    #[test]
    fn test_save_rejects_gate_for_other_profile() {
        let mut coordinator = question(&[1, 2, 3]);
        coordinator.begin(&EditCommand::ClearOrder).unwrap();
        let gate = ValidationGate::new(OrderingProfile::lesson_units());

        let err = coordinator.begin_save(&gate, &()).unwrap_err();
        assert!(matches!(err, SyncError::ProfileMismatch));
        assert_eq!(coordinator.sync_state(), SyncState::Idle);
    }

    #[test]
    fn test_pending_matches_local() {
        let mut coordinator = question(&[1, 2, 3]);
        let pending = coordinator
            .begin(&EditCommand::Move { from: 0, to: 1 })
            .unwrap()
            .unwrap();
        assert!(pending.matches_local(&[id(3), id(1), id(2)]));
        assert!(!pending.matches_local(&[id(1), id(2)]));
        assert!(!pending.matches_local(&[id(1), id(1), id(2)]));
        assert!(!pending.matches_local(&[id(1), id(2), id(4)]));
    }
}
