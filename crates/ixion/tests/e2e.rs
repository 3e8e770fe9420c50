// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end integration tests for the complete Ixion pipeline.
//!
//! Each test creates an isolated TestHarness with a temp SQLite database
//! and drives the full dispatcher. Tests are independent and
//! order-insensitive. The literal scenarios follow the engine's
//! external contract; the property tests cover its invariants.

use ixion_test_utils::TestHarness;
use proptest::prelude::*;
use serde_json::{json, Value};

// ---- Scenario 1: create + back-ref read ----

#[test]
fn create_then_back_ref_read() {
    let harness = TestHarness::builder().build().unwrap();
    let response = harness.submit(json!([
        ["Cookie/set", {"create": {"c1": {"type": "chocolate", "delicious": "yes"}}}, "a"],
        ["Cookie/get", {"#ids": {
            "resultOf": "a", "name": "Cookie/set", "path": "/created/c1/id"
        }}, "b"]
    ]));

    let id = TestHarness::created_id(&response[0], "c1");
    assert_eq!(response[0][1]["oldState"], json!("0"));
    assert_eq!(response[0][1]["newState"], json!("1"));

    assert_eq!(response[1][0], json!("Cookie/get"));
    assert_eq!(response[1][1]["list"][0]["id"], json!(id));
    assert_eq!(response[1][1]["state"], json!("1"));
    assert_eq!(response[1][2], json!("b"));
}

// ---- Scenario 2: duplicate creation id ----

#[test]
fn duplicate_creation_ids_resolve_to_the_first_sentence() {
    let harness = TestHarness::builder().build().unwrap();
    let response = harness.submit(json!([
        ["Cookie/set", {"create": {"c1": {"type": "first"}}}, "a"],
        ["Cookie/set", {"create": {"c1": {"type": "second"}}}, "b"],
        ["Cookie/get", {"#ids": {
            "resultOf": "a", "name": "Cookie/set", "path": "/created/c1/id"
        }}, "c"]
    ]));

    // The second set succeeds; only the creation-id log is poisoned.
    assert!(response[1][1]["created"]
        .as_object()
        .unwrap()
        .contains_key("c1"));

    // Back-reference resolution by path uses the first matching sentence.
    let first_id = TestHarness::created_id(&response[0], "c1");
    assert_eq!(response[2][1]["list"][0]["id"], json!(first_id));

    // A `#c1` creation reference, by contrast, now fails the call.
    let poisoned = harness.submit(json!([
        ["Cookie/set", {"create": {"c1": {"type": "third"}}}, "x"],
        ["Cookie/set", {"create": {"c1": {"type": "fourth"}}}, "y"],
        ["Cookie/get", {"ids": ["#c1"]}, "z"]
    ]));
    assert_eq!(poisoned[2][0], json!("error"));
    assert_eq!(poisoned[2][1]["type"], json!("duplicateCreationId"));
}

// ---- Scenario 3: unknown method ----

#[test]
fn unknown_method_answers_with_one_error_sentence() {
    let harness = TestHarness::builder().build().unwrap();
    let response = harness.submit(json!([["Nope/nope", {}, "a"]]));
    assert_eq!(response, json!([["error", {"type": "unknownMethod"}, "a"]]));
}

// ---- Scenario 4: malformed back-reference ----

#[test]
fn malformed_back_ref_is_a_result_reference_error() {
    let harness = TestHarness::builder().build().unwrap();
    let response = harness.submit(json!([
        ["Cookie/get", {"#ids": {"resultOf": "x", "name": "Cookie/set"}}, "a"]
    ]));
    assert_eq!(
        response,
        json!([["error", {
            "type": "resultReference",
            "description": "malformed ResultReference"
        }, "a"]])
    );
}

// ---- Scenario 5: changes resync ----

#[test]
fn stale_since_state_requires_resync() {
    let harness = TestHarness::builder().build().unwrap();

    // Record a (low=100, high=200) window for the account directly.
    let conn = harness.engine.database().connect().unwrap();
    conn.execute(
        "INSERT INTO states (accountId, type, lowestModSeq, highestModSeq)
         VALUES (?1, 'Cookie', 100, 200)",
        [&harness.account_id],
    )
    .unwrap();

    let response = harness.submit(json!([
        ["Cookie/changes", {"sinceState": "50"}, "a"]
    ]));
    assert_eq!(response[0][0], json!("error"));
    assert_eq!(response[0][1]["type"], json!("cannotCalculateChanges"));
    assert_eq!(response[0][2], json!("a"));
}

// ---- Scenario 6: ifInState mismatch ----

#[test]
fn if_in_state_mismatch_rejects_without_mutation() {
    let harness = TestHarness::builder().build().unwrap();
    let response = harness.submit(json!([
        ["Cookie/set", {"ifInState": "999", "create": {"c1": {"type": "x"}}}, "a"]
    ]));
    assert_eq!(response[0][0], json!("error"));
    assert_eq!(response[0][1]["type"], json!("stateMismatch"));

    let after = harness.submit(json!([["Cookie/get", {}, "g"]]));
    assert_eq!(after[0][1]["list"], json!([]));
    assert_eq!(after[0][1]["state"], json!("0"));
}

// ---- Invariants ----

/// highestModSeq is non-decreasing, with equality iff the request
/// performed no mutation of the type.
#[test]
fn state_advances_iff_the_request_mutates() {
    let harness = TestHarness::builder().build().unwrap();

    let r1 = harness.submit(json!([
        ["Cookie/set", {"create": {"c1": {"type": "a"}}}, "a"]
    ]));
    assert_eq!(r1[0][1]["newState"], json!("1"));

    // Reads do not advance.
    let r2 = harness.submit(json!([["Cookie/get", {}, "g"]]));
    assert_eq!(r2[0][1]["state"], json!("1"));

    // A failed set does not advance.
    let r3 = harness.submit(json!([
        ["Cookie/set", {"create": {"c2": {"type": ""}}}, "a"]
    ]));
    assert_eq!(r3[0][1]["newState"], json!("1"));

    // A successful mutation advances by exactly one.
    let r4 = harness.submit(json!([
        ["Cookie/set", {"create": {"c3": {"type": "b"}}}, "a"]
    ]));
    assert_eq!(r4[0][1]["newState"], json!("2"));
}

/// Rows inserted by a request carry modSeqCreated == modSeqChanged ==
/// the request's resulting highestModSeq.
#[test]
fn inserted_rows_are_stamped_with_the_final_state() {
    let harness = TestHarness::builder().build().unwrap();
    let response = harness.submit(json!([
        ["Cookie/set", {"create": {
            "c1": {"type": "one"},
            "c2": {"type": "two"}
        }}, "a"]
    ]));
    let new_state: i64 = response[0][1]["newState"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    let conn = harness.engine.database().connect().unwrap();
    let mut stmt = conn
        .prepare("SELECT modSeqCreated, modSeqChanged FROM cookie")
        .unwrap();
    let stamps: Vec<(i64, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .map(Result::unwrap)
        .collect();

    assert_eq!(stamps.len(), 2);
    for (created, changed) in stamps {
        assert_eq!(created, new_state);
        assert_eq!(changed, new_state);
    }
}

/// A no-op /set is idempotent: oldState == newState, nothing written.
#[test]
fn no_op_set_is_idempotent() {
    let harness = TestHarness::builder().build().unwrap();
    harness.submit(json!([
        ["Cookie/set", {"create": {"c1": {"type": "existing"}}}, "a"]
    ]));

    let response = harness.submit(json!([
        ["Cookie/set", {"create": {}, "update": {}, "destroy": []}, "b"]
    ]));
    assert_eq!(response[0][1]["oldState"], json!("1"));
    assert_eq!(response[0][1]["newState"], json!("1"));

    let after = harness.submit(json!([["Cookie/get", {}, "g"]]));
    assert_eq!(after[0][1]["list"].as_array().unwrap().len(), 1);
}

/// Destroying a row frees its unique tuple for reuse.
#[test]
fn logical_destroy_frees_unique_tuples() {
    let harness = TestHarness::builder().build().unwrap();
    let first = harness.submit(json!([
        ["Cookie/set", {"create": {"c1": {"type": "singleton"}}}, "a"]
    ]));
    let id = TestHarness::created_id(&first[0], "c1");

    let blocked = harness.submit(json!([
        ["Cookie/set", {"create": {"c2": {"type": "singleton"}}}, "b"]
    ]));
    assert_eq!(
        blocked[0][1]["notCreated"]["c2"]["type"],
        json!("alreadyExists")
    );

    harness.submit(json!([["Cookie/set", {"destroy": [id]}, "c"]]));
    let retry = harness.submit(json!([
        ["Cookie/set", {"create": {"c3": {"type": "singleton"}}}, "d"]
    ]));
    assert!(retry[0][1]["notCreated"].as_object().unwrap().is_empty());
}

/// Two /set calls on one type within one request share one state bump.
#[test]
fn one_request_bumps_state_exactly_once_per_type() {
    let harness = TestHarness::builder().build().unwrap();
    let response = harness.submit(json!([
        ["Cookie/set", {"create": {"c1": {"type": "one"}}}, "a"],
        ["Cookie/set", {"create": {"c2": {"type": "two"}}}, "b"]
    ]));
    assert_eq!(response[0][1]["newState"], json!("1"));
    assert_eq!(response[1][1]["newState"], json!("1"));

    // The next request sees exactly 1, not 2.
    let after = harness.submit(json!([["Cookie/get", {}, "g"]]));
    assert_eq!(after[0][1]["state"], json!("1"));
}

// ---- Property tests ----

/// One path segment of a generated document.
#[derive(Debug, Clone)]
enum Seg {
    Key(String),
    Index(usize),
}

fn seg_strategy() -> impl Strategy<Value = Seg> {
    prop_oneof![
        // Keys exercise the escape rules: `~` and `/` are legal in keys.
        "[a-z~/]{1,8}".prop_map(Seg::Key),
        (0usize..4).prop_map(Seg::Index),
    ]
}

/// Build a document with `marker` embedded at the given path, plus the
/// pointer string that addresses it.
fn build_doc(segments: &[Seg], marker: &Value) -> (Value, String) {
    let mut doc = marker.clone();
    for seg in segments.iter().rev() {
        doc = match seg {
            Seg::Key(key) => json!({ key.clone(): doc }),
            Seg::Index(index) => {
                let mut items = vec![Value::Null; index + 1];
                items[*index] = doc;
                Value::Array(items)
            }
        };
    }
    let mut pointer = String::new();
    for seg in segments {
        pointer.push('/');
        match seg {
            Seg::Key(key) => {
                pointer.push_str(&key.replace('~', "~0").replace('/', "~1"));
            }
            Seg::Index(index) => pointer.push_str(&index.to_string()),
        }
    }
    (doc, pointer)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Star-free pointers resolve back to the embedded value.
    #[test]
    fn pointer_round_trips_star_free_paths(
        segments in prop::collection::vec(seg_strategy(), 1..6),
        marker in "[a-z]{1,12}",
    ) {
        let marker = json!(marker);
        let (doc, pointer) = build_doc(&segments, &marker);
        let resolved = ixion_core::resolve_pointer(&doc, &pointer).unwrap();
        prop_assert_eq!(resolved, marker);
    }
}

proptest! {
    // Each case opens its own temp database; keep the count modest.
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// However many records one request creates, every inserted row is
    /// stamped with the single resulting state.
    #[test]
    fn batched_creates_share_one_state(count in 1usize..6) {
        let harness = TestHarness::builder().build().unwrap();
        let mut create = serde_json::Map::new();
        for i in 0..count {
            create.insert(
                format!("c{i}"),
                json!({"type": format!("flavor-{i}")}),
            );
        }
        let response = harness.submit(json!([
            ["Cookie/set", {"create": create}, "a"]
        ]));
        prop_assert_eq!(&response[0][1]["newState"], &json!("1"));

        let conn = harness.engine.database().connect().unwrap();
        let distinct: i64 = conn
            .query_row(
                "SELECT COUNT(DISTINCT modSeqCreated) FROM cookie",
                [],
                |row| row.get(0),
            )
            .unwrap();
        prop_assert_eq!(distinct, 1);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM cookie", [], |row| row.get(0))
            .unwrap();
        prop_assert_eq!(rows as usize, count);
    }
}
