//! Property tests for task tag storage and the store wire codec.
//!
//! 1. Any tag set of trimmed, non-blank tags survives encode then decode.
//! 2. Arbitrary stored strings never panic `tags::decode`.
//! 3. Task records survive the `Task` <-> `TaskRecord` conversion.
//! 4. Random bytes never panic the wire decoder.

use std::collections::BTreeSet;

use kanban_proto::model::{BoardId, ColumnId, Task, TaskId, TaskRecord, Timestamp, UserId};
use kanban_proto::{tags, wire};
use proptest::prelude::*;

/// Strategy for tags that already satisfy the storage normal form.
fn arb_tag() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9 _-]{0,15}[a-z0-9]|[a-z0-9]"
}

fn arb_tag_set() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(arb_tag(), 0..8)
}

fn arb_task() -> impl Strategy<Value = Task> {
    (
        "[a-z0-9]{1,12}",
        "[^\x00]{1,64}",
        any::<u32>(),
        any::<bool>(),
        arb_tag_set(),
        any::<u32>(),
        prop::option::of(any::<u32>()),
    )
        .prop_map(|(id, title, position, completed, tags, created, due)| Task {
            id: TaskId::from(id.as_str()),
            title,
            description: None,
            column_id: ColumnId::from("col_todo"),
            board_id: BoardId::from("board"),
            owner_id: UserId::from("user"),
            position,
            due_date: due.map(|d| Timestamp::from_millis(u64::from(d))),
            completed,
            tags,
            created_at: Timestamp::from_millis(u64::from(created)),
            updated_at: Timestamp::from_millis(u64::from(created) + 1),
        })
}

proptest! {
    /// Normalized tag sets survive storage encoding unchanged.
    #[test]
    fn tag_set_round_trip(set in arb_tag_set()) {
        let encoded = tags::encode(&set);
        prop_assert_eq!(tags::decode(Some(&encoded)), set);
    }

    /// Whatever is stored, decoding returns a set of trimmed, non-blank tags.
    #[test]
    fn decode_arbitrary_string_no_panic(raw in ".*") {
        let decoded = tags::decode(Some(&raw));
        for tag in &decoded {
            prop_assert!(!tag.is_empty());
            prop_assert_eq!(tag.trim(), tag.as_str());
        }
    }

    /// Converting a task to its stored record and back preserves it.
    #[test]
    fn task_record_conversion_preserves_task(task in arb_task()) {
        let record = TaskRecord::from(&task);
        prop_assert_eq!(Task::from(record), task);
    }

    /// Random bytes never cause a panic in the wire decoder.
    #[test]
    fn random_bytes_decode_no_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = wire::decode(&bytes);
    }
}
