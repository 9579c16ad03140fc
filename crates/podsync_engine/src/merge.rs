//! Merging remote changes with the local pending log.

use podsync_protocol::{
    ChangeKind, ConflictNote, LogicalTime, PendingChange, RemoteChangeKind,
    RemoteSubscriptionChange, Winner,
};
use podsync_store::SubscriptionSnapshot;
use std::collections::BTreeMap;
use tracing::debug;

/// Outcome of merging remote subscription changes into local state.
#[derive(Debug, Clone)]
pub struct SubscriptionMerge {
    /// The snapshot with remote changes applied.
    pub snapshot: SubscriptionSnapshot,
    /// Pending changes that survived the merge, still to be sent.
    pub retained: Vec<PendingChange>,
    /// Logical times of pending changes a remote change overrode.
    pub discarded: Vec<LogicalTime>,
    /// One note per contradiction resolved, whichever side won.
    pub conflicts: Vec<ConflictNote>,
    /// Feeds the remote newly subscribed.
    pub added: usize,
    /// Feeds the remote newly unsubscribed.
    pub removed: usize,
}

/// Merges fetched remote subscription changes against the committed
/// snapshot and the local pending changes.
///
/// Remote changes apply in remote order. A pending local change for a URL
/// the remote also touched is a contradiction only when the two disagree
/// on direction; agreement passes through silently. Contradictions resolve
/// by last-writer-wins over logical time, with ties to the remote, and
/// every resolution leaves a [`ConflictNote`]. A losing local change is
/// discarded without transmission; a winning one stays retained and goes
/// out in the send step.
pub fn merge_subscriptions(
    base: &SubscriptionSnapshot,
    remote: &[RemoteSubscriptionChange],
    pending: &[PendingChange],
) -> SubscriptionMerge {
    let mut snapshot = base.clone();
    let mut added = 0;
    let mut removed = 0;

    // Last remote change per URL decides contradictions.
    let mut last_remote: BTreeMap<&str, &RemoteSubscriptionChange> = BTreeMap::new();
    for change in remote {
        match change.kind {
            RemoteChangeKind::Subscribed => {
                if !snapshot.is_subscribed(&change.url) {
                    added += 1;
                }
                snapshot.subscribe(&change.url, change.timestamp);
            }
            RemoteChangeKind::Unsubscribed => {
                if snapshot.is_subscribed(&change.url) {
                    removed += 1;
                }
                snapshot.unsubscribe(&change.url, change.timestamp);
            }
        }
        last_remote.insert(change.url.as_str(), change);
    }

    let mut retained = Vec::new();
    let mut discarded = Vec::new();
    let mut conflicts = Vec::new();

    for local in pending {
        let Some(url) = local.kind.subscription_url() else {
            retained.push(local.clone());
            continue;
        };
        let Some(remote_change) = last_remote.get(url) else {
            retained.push(local.clone());
            continue;
        };

        let contradicts = matches!(
            (&local.kind, remote_change.kind),
            (ChangeKind::Subscribe(_), RemoteChangeKind::Unsubscribed)
                | (ChangeKind::Unsubscribe(_), RemoteChangeKind::Subscribed)
        );
        if !contradicts {
            // Both sides agree; the remote already reflects the outcome,
            // the diff step will drop the redundant local change.
            retained.push(local.clone());
            continue;
        }

        let note = ConflictNote::new(url, local.seq, remote_change.timestamp);
        debug!(
            url,
            local_seq = %local.seq,
            remote_time = %remote_change.timestamp,
            winner = ?note.winner,
            "resolved subscription conflict"
        );
        match note.winner {
            Winner::Remote => discarded.push(local.seq),
            Winner::Local => retained.push(local.clone()),
        }
        conflicts.push(note);
    }

    SubscriptionMerge {
        snapshot,
        retained,
        discarded,
        conflicts,
        added,
        removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podsync_protocol::ChangeLog;

    const X: &str = "https://feeds.example.org/x.xml";
    const Y: &str = "https://feeds.example.org/y.xml";

    #[test]
    fn remote_changes_apply_in_order() {
        let remote = vec![
            RemoteSubscriptionChange::subscribed(X, LogicalTime::new(1)),
            RemoteSubscriptionChange::subscribed(Y, LogicalTime::new(2)),
            RemoteSubscriptionChange::unsubscribed(X, LogicalTime::new(3)),
        ];

        let merge = merge_subscriptions(&SubscriptionSnapshot::new(), &remote, &[]);
        assert!(!merge.snapshot.is_subscribed(X));
        assert!(merge.snapshot.is_subscribed(Y));
        assert_eq!(merge.added, 2);
        assert_eq!(merge.removed, 1);
        assert!(merge.conflicts.is_empty());
    }

    #[test]
    fn older_local_unsubscribe_loses_to_newer_remote_subscribe() {
        let mut base = SubscriptionSnapshot::new();
        base.subscribe(X, LogicalTime::new(0));

        let mut log = ChangeLog::new();
        for _ in 0..5 {
            log.append(ChangeKind::Subscribe(Y.into()));
        }
        let local = log.append(ChangeKind::Unsubscribe(X.into()));
        assert_eq!(local.seq, LogicalTime::new(5));

        let remote = vec![RemoteSubscriptionChange::subscribed(X, LogicalTime::new(7))];
        let merge = merge_subscriptions(&base, &remote, &[local.clone()]);

        assert!(merge.snapshot.is_subscribed(X));
        assert_eq!(merge.discarded, vec![local.seq]);
        assert!(merge.retained.is_empty());
        assert_eq!(merge.conflicts.len(), 1);
        assert_eq!(merge.conflicts[0].winner, Winner::Remote);
    }

    #[test]
    fn newer_local_change_survives_the_merge() {
        let mut base = SubscriptionSnapshot::new();
        base.subscribe(X, LogicalTime::new(0));

        let local = PendingChange {
            seq: LogicalTime::new(9),
            kind: ChangeKind::Unsubscribe(X.into()),
        };
        let remote = vec![RemoteSubscriptionChange::subscribed(X, LogicalTime::new(7))];
        let merge = merge_subscriptions(&base, &remote, &[local.clone()]);

        assert_eq!(merge.retained, vec![local]);
        assert!(merge.discarded.is_empty());
        assert_eq!(merge.conflicts.len(), 1);
        assert_eq!(merge.conflicts[0].winner, Winner::Local);
    }

    #[test]
    fn tie_goes_to_remote() {
        let local = PendingChange {
            seq: LogicalTime::new(7),
            kind: ChangeKind::Subscribe(X.into()),
        };
        let remote = vec![RemoteSubscriptionChange::unsubscribed(X, LogicalTime::new(7))];
        let merge = merge_subscriptions(&SubscriptionSnapshot::new(), &remote, &[local.clone()]);

        assert_eq!(merge.discarded, vec![local.seq]);
        assert_eq!(merge.conflicts[0].winner, Winner::Remote);
    }

    #[test]
    fn agreement_is_not_a_conflict() {
        let local = PendingChange {
            seq: LogicalTime::new(2),
            kind: ChangeKind::Subscribe(X.into()),
        };
        let remote = vec![RemoteSubscriptionChange::subscribed(X, LogicalTime::new(5))];
        let merge = merge_subscriptions(&SubscriptionSnapshot::new(), &remote, &[local.clone()]);

        assert!(merge.conflicts.is_empty());
        assert_eq!(merge.retained, vec![local]);
        assert!(merge.snapshot.is_subscribed(X));
    }

    #[test]
    fn untouched_pending_changes_are_retained() {
        let local = PendingChange {
            seq: LogicalTime::new(1),
            kind: ChangeKind::Subscribe(Y.into()),
        };
        let remote = vec![RemoteSubscriptionChange::subscribed(X, LogicalTime::new(3))];
        let merge = merge_subscriptions(&SubscriptionSnapshot::new(), &remote, &[local.clone()]);

        assert_eq!(merge.retained, vec![local]);
        assert!(merge.conflicts.is_empty());
    }

    #[test]
    fn last_remote_change_per_url_decides() {
        // Remote subscribes then unsubscribes; local subscribe at t1 loses
        // against the final unsubscribe at t4.
        let local = PendingChange {
            seq: LogicalTime::new(1),
            kind: ChangeKind::Subscribe(X.into()),
        };
        let remote = vec![
            RemoteSubscriptionChange::subscribed(X, LogicalTime::new(3)),
            RemoteSubscriptionChange::unsubscribed(X, LogicalTime::new(4)),
        ];
        let merge = merge_subscriptions(&SubscriptionSnapshot::new(), &remote, &[local.clone()]);

        assert_eq!(merge.discarded, vec![local.seq]);
        assert!(!merge.snapshot.is_subscribed(X));
    }
}
