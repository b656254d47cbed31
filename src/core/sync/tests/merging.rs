use std::time::Duration;

use tokio::time::Instant;

use crate::core::sync::{Mirror, Snapshot, merge};

fn snapshot_at(items: &[u32], received_at: Instant) -> Snapshot<u32> {
    Snapshot {
        items: items.to_vec(),
        received_at,
    }
}

#[tokio::test(start_paused = true)]
async fn remote_wins_without_local_intent() {
    let remote = snapshot_at(&[1, 2], Instant::now());
    assert_eq!(merge(&[9], &remote, None), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn local_wins_until_a_later_snapshot() {
    let earlier = snapshot_at(&[1], Instant::now());
    tokio::time::sleep(Duration::from_millis(5)).await;
    let intent = Instant::now();
    let same = snapshot_at(&[2], intent);
    let later = snapshot_at(&[3], intent + Duration::from_millis(1));

    assert_eq!(merge(&[7], &earlier, Some(intent)), vec![7]);
    assert_eq!(merge(&[7], &same, Some(intent)), vec![7], "ties keep local");
    assert_eq!(merge(&[7], &later, Some(intent)), vec![3]);
}

#[tokio::test(start_paused = true)]
async fn mirror_keeps_optimistic_state_through_stale_poll() {
    let mut mirror = Mirror::<u32>::default();
    let in_flight = Instant::now();
    tokio::time::sleep(Duration::from_millis(10)).await;

    mirror.apply(|items| items.push(42));
    assert!(!mirror.reconcile(snapshot_at(&[], in_flight)));
    assert_eq!(mirror.items(), &[42]);
    assert_eq!(mirror.last_synced_at(), None);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(mirror.reconcile(Snapshot::now(vec![42, 43])));
    assert_eq!(mirror.items(), &[42, 43]);
    assert!(mirror.last_synced_at().is_some());
}

#[tokio::test(start_paused = true)]
async fn server_adjustments_are_not_intents() {
    let mut mirror = Mirror::<u32>::default();
    mirror.items_mut().push(1);
    assert_eq!(mirror.last_intent_at(), None);
    assert!(mirror.reconcile(Snapshot::now(vec![2])));
    assert_eq!(mirror.items(), &[2]);
}
