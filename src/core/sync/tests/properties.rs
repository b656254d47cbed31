use std::collections::HashSet;

use proptest::prelude::*;
use serde_json::json;
use tokio::runtime::Runtime;

use super::{harness, ok};
use crate::core::api::{Column, Note, Task};
use crate::core::sync::{Reconcile, Snapshot, TaskBoard, sort_notes};

fn column_strategy() -> impl Strategy<Value = Column> {
    prop::sample::select(Column::ALL.to_vec())
}

fn moves_strategy() -> impl Strategy<Value = Vec<(usize, Column)>> {
    prop::collection::vec((0usize..6, column_strategy()), 1..40)
}

fn note_strategy() -> impl Strategy<Value = Note> {
    (any::<bool>(), 1i64..2_000_000_000, "[a-z]{1,6}").prop_map(|(pinned, secs, id)| {
        let updated = chrono::DateTime::from_timestamp(secs, 0)
            .map(|d| d.to_rfc3339())
            .unwrap_or_default();
        serde_json::from_value(json!({
            "id": id,
            "pinned": pinned,
            "updated_at": updated,
        }))
        .unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        .. ProptestConfig::default()
    })]

    /// Any sequence of moves leaves every task in exactly one column.
    #[test]
    fn moves_never_duplicate_or_drop_tasks(moves in moves_strategy()) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let (_recorder, gateway, client) = harness(ok());
            let board = TaskBoard::new(gateway, client);
            let seed: Vec<Task> = (0..6)
                .map(|i| serde_json::from_value(json!({"id": format!("t{}", i), "title": "t"})).unwrap())
                .collect();
            board.reconcile(Snapshot::now(seed));

            for (index, column) in &moves {
                board.move_task(&format!("t{}", index), *column).unwrap();
            }

            let mut seen = HashSet::new();
            for column in Column::ALL {
                for task in board.column(column) {
                    assert!(seen.insert(task.id.clone()), "{} listed twice", task.id);
                }
            }
            assert_eq!(seen.len(), 6);
            assert_eq!(board.counts().values().sum::<usize>(), 6);
        });
    }

    /// Pinned notes precede unpinned ones; within a group newer comes first.
    #[test]
    fn note_order_is_pinned_then_recent(mut notes in prop::collection::vec(note_strategy(), 0..30)) {
        prop_assert!(notes.iter().all(|n| n.updated_millis() > 0));
        sort_notes(&mut notes);
        for pair in notes.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.pinned || !b.pinned);
            if a.pinned == b.pinned {
                prop_assert!(a.updated_millis() >= b.updated_millis());
            }
        }
    }
}
