//! Diff computation: the minimal payload to send upstream.

use podsync_protocol::{ChangeKind, EpisodeAction, PendingChange, SubscriptionDiff};
use podsync_store::SubscriptionSnapshot;
use std::collections::BTreeMap;

/// Computes the minimal subscription add/remove lists from the pending
/// changes, collapsed against a baseline snapshot.
///
/// Pending changes replay in order and only the net effect per URL
/// survives: subscribe-then-unsubscribe nets to nothing, and a change
/// whose outcome the baseline already reflects is dropped. Payload size
/// is therefore bounded by distinct URLs touched, not event count.
///
/// The baseline must be the post-merge snapshot, so the diff reflects
/// what the remote does not yet know.
#[must_use]
pub fn subscription_diff(
    pending: &[PendingChange],
    baseline: &SubscriptionSnapshot,
) -> SubscriptionDiff {
    let mut desired: BTreeMap<&str, bool> = BTreeMap::new();
    for change in pending {
        match &change.kind {
            ChangeKind::Subscribe(url) => {
                desired.insert(url, true);
            }
            ChangeKind::Unsubscribe(url) => {
                desired.insert(url, false);
            }
            ChangeKind::Action(_) => {}
        }
    }

    let mut diff = SubscriptionDiff::default();
    for (url, want) in desired {
        let have = baseline.is_subscribed(url);
        if want && !have {
            diff.add.insert(url.to_string());
        } else if !want && have {
            diff.remove.insert(url.to_string());
        }
    }
    diff
}

/// Computes the outgoing episode actions, in timestamp order.
///
/// No collapsing: every action is a discrete fact and the remote log is
/// append-only, so all of them must be transmitted.
#[must_use]
pub fn action_diff(pending: &[PendingChange]) -> Vec<EpisodeAction> {
    pending
        .iter()
        .filter_map(|change| match &change.kind {
            ChangeKind::Action(action) => Some(action.clone()),
            _ => None,
        })
        .collect()
}
