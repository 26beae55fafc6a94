//! Multi-document scenarios: persistence, forks, merges, sync and change
//! history.

use pretty_assertions::assert_eq;
use serde_json::json;
use tracing_subscriber::EnvFilter;
use utsushi_crdt::{
    CrdtError, Datatype, Document, HostValue, ObjType, SyncState, api, decode_change,
};

// ============================================================================
// Shared test setup
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn doc(actor: &str) -> Document {
    init_tracing();
    Document::create(Some(actor)).unwrap()
}

/// Exchange sync messages until neither side has anything to send.
fn sync(a: &mut Document, b: &mut Document) -> (SyncState, SyncState) {
    let mut a_state = SyncState::new();
    let mut b_state = SyncState::new();
    for _ in 0..16 {
        let to_b = a.generate_sync_message(&mut a_state);
        if let Some(msg) = &to_b {
            b.receive_sync_message(&mut b_state, msg).unwrap();
        }
        let to_a = b.generate_sync_message(&mut b_state);
        if let Some(msg) = &to_a {
            a.receive_sync_message(&mut a_state, msg).unwrap();
        }
        if to_b.is_none() && to_a.is_none() {
            return (a_state, b_state);
        }
    }
    panic!("sync did not converge");
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_save_load_name() {
    let mut original = doc("aa01");
    original.root_proxy().set("name", &"Alice".into()).unwrap();
    let bytes = original.save();

    let loaded = Document::load(&bytes, None).unwrap();
    let name = loaded.get("_root", "name", None).unwrap().unwrap();
    assert_eq!(name.as_pair(), ("str", &HostValue::from("Alice")));
    assert_eq!(
        loaded.materialize(None, None).unwrap(),
        HostValue::from(json!({"name": "Alice"}))
    );
}

#[test]
fn test_load_with_actor_override() {
    let mut original = doc("aa01");
    original.put("_root", "k", &1.0.into(), None).unwrap();
    let loaded = Document::load(&original.save(), Some("bb02")).unwrap();
    assert_eq!(loaded.actor_id(), "bb02");
}

#[test]
fn test_out_of_range_int_hint_leaves_document_unchanged() {
    let mut a = doc("aa01");
    let err = a.put("_root", "x", &1e30.into(), Some(Datatype::Int)).unwrap_err();
    assert!(matches!(err, CrdtError::KindMismatch { expected: Datatype::Int, .. }));
    assert_eq!(a.get("_root", "x", None).unwrap(), None);
    assert_eq!(a.pending_ops(), 0);
}

// ============================================================================
// Forks and merges
// ============================================================================

#[test]
fn test_conflict_visible_after_merge() {
    let mut a = doc("aa01");
    a.put("_root", "x", &0.0.into(), None).unwrap();
    let mut b = a.fork(Some("bb02"), None).unwrap();

    a.put("_root", "x", &"from a".into(), None).unwrap();
    b.put("_root", "x", &"from b".into(), None).unwrap();
    let patches = a.merge_with_patches(&mut b).unwrap();
    assert!(!patches.is_empty());

    let all = a.get_all("_root", "x", None).unwrap();
    assert_eq!(all.len(), 2);
    let winner = a.get("_root", "x", None).unwrap().unwrap();
    assert!(all.contains(&winner));

    b.merge(&mut a).unwrap();
    assert_eq!(b.get("_root", "x", None).unwrap(), Some(winner));
}

#[test]
fn test_concurrent_list_appends_keep_both() {
    let mut a = doc("aa01");
    a.put_object("_root", "items", ObjType::List).unwrap();
    let mut b = a.clone_doc(Some("bb02")).unwrap();

    a.root_proxy()
        .get("items")
        .unwrap()
        .unwrap()
        .into_list()
        .unwrap()
        .push(&["from a".into()])
        .unwrap();
    b.root_proxy()
        .get("items")
        .unwrap()
        .unwrap()
        .into_list()
        .unwrap()
        .push(&["from b".into()])
        .unwrap();

    a.merge(&mut b).unwrap();
    let items = a.materialize(None, None).unwrap();
    let items = items.as_object().unwrap().entries["items"].as_array().unwrap().items.clone();
    assert_eq!(items.len(), 2);
    assert!(items.contains(&HostValue::from("from a")));
    assert!(items.contains(&HostValue::from("from b")));
}

#[test]
fn test_concurrent_increments_sum() {
    let mut a = doc("aa01");
    a.put("_root", "hits", &0.0.into(), Some(Datatype::Counter)).unwrap();
    let mut b = a.fork(Some("bb02"), None).unwrap();
    a.increment("_root", "hits", 2).unwrap();
    b.increment("_root", "hits", 3).unwrap();
    a.merge(&mut b).unwrap();

    let hits = a.get("_root", "hits", None).unwrap().unwrap();
    assert_eq!(hits.as_pair(), ("counter", &HostValue::from(5.0)));
}

#[test]
fn test_forked_facades_are_independent() {
    let mut a = doc("aa01");
    let mut b = a.fork(None, None).unwrap();
    b.put("_root", "only_b", &true.into(), None).unwrap();
    assert!(a.keys("_root", None).unwrap().is_empty());
    assert_ne!(a.handle(), b.handle());
}

// ============================================================================
// Sync
// ============================================================================

#[test]
fn test_sync_round_trip() {
    let mut a = doc("aa01");
    let mut b = doc("bb02");
    a.root_proxy().set("from_a", &json!({"n": 1}).into()).unwrap();
    b.root_proxy().set("from_b", &json!([1, 2]).into()).unwrap();

    let (a_state, b_state) = sync(&mut a, &mut b);
    assert_eq!(a.heads(), b.heads());
    assert_eq!(
        a.materialize(None, None).unwrap(),
        b.materialize(None, None).unwrap()
    );

    let heads = a.heads();
    let shared = a_state.shared_heads();
    assert!(shared.iter().all(|h| heads.contains(&h.to_hex())));
    assert!(b_state.their_heads().is_some());
}

#[test]
fn test_sync_patches_follow_received_changes() {
    let mut a = doc("aa01");
    let mut b = doc("bb02");
    a.put("_root", "greeting", &"hi".into(), None).unwrap();

    let mut a_state = SyncState::new();
    let mut b_state = SyncState::new();
    let mut patches = Vec::new();
    for _ in 0..16 {
        let to_b = a.generate_sync_message(&mut a_state);
        if let Some(msg) = &to_b {
            patches.extend(b.receive_sync_message_with_patches(&mut b_state, msg).unwrap());
        }
        let to_a = b.generate_sync_message(&mut b_state);
        if let Some(msg) = &to_a {
            a.receive_sync_message(&mut a_state, msg).unwrap();
        }
        if to_b.is_none() && to_a.is_none() {
            break;
        }
    }

    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].action(), "put");
    // The cursor has not moved, so the same change is still pending.
    assert_eq!(b.diff_incremental().len(), 1);
}

#[test]
fn test_sync_state_survives_encoding() {
    let mut a = doc("aa01");
    let mut b = doc("bb02");
    a.put("_root", "k", &1.0.into(), None).unwrap();
    let (a_state, _) = sync(&mut a, &mut b);

    let restored = api::decode_sync_state(&api::encode_sync_state(&a_state)).unwrap();
    assert_eq!(restored.shared_heads(), a_state.shared_heads());
}

#[test]
fn test_receive_garbage_sync_message() {
    let mut a = doc("aa01");
    let mut state = SyncState::new();
    let err = a.receive_sync_message(&mut state, b"\x00garbage").unwrap_err();
    assert!(matches!(err, CrdtError::Load(_)));
}

// ============================================================================
// Change history
// ============================================================================

#[test]
fn test_decoded_changes_chain_per_actor() {
    let mut a = doc("aa01");
    a.put("_root", "v", &1.0.into(), None).unwrap();
    let first = a.commit(Some("one"), Some(1_000)).unwrap();
    a.put("_root", "v", &2.0.into(), None).unwrap();
    let second = a.commit(Some("two"), Some(2_000)).unwrap();

    let changes = a.get_changes(&[]).unwrap();
    let decoded = changes.iter().map(|c| decode_change(c).unwrap()).collect::<Vec<_>>();
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[0].hash.to_hex(), first);
    assert_eq!(decoded[1].hash.to_hex(), second);
    assert!(decoded[1].seq > decoded[0].seq);
    assert!(decoded[1].deps.contains(&decoded[0].hash));
    assert_eq!(decoded[1].message, "two");
    assert_eq!(decoded[1].time, 2_000);

    let wire = serde_json::to_value(&decoded[0]).unwrap();
    assert_eq!(wire["startOp"], json!(1));
    assert_eq!(wire["actor"], json!("aa01"));
}

#[test]
fn test_decoded_change_without_message() {
    let mut a = doc("aa01");
    a.put("_root", "v", &1.0.into(), None).unwrap();
    a.commit(None, None).unwrap();

    let change = decode_change(&a.get_last_local_change().unwrap()).unwrap();
    assert_eq!(change.message, "");
    let wire = serde_json::to_value(&change).unwrap();
    assert_eq!(wire["message"], json!(""));
}

#[test]
fn test_missing_deps_reported() {
    let mut a = doc("aa01");
    a.put("_root", "v", &1.0.into(), None).unwrap();
    let first = a.commit(None, None).unwrap();
    a.put("_root", "v", &2.0.into(), None).unwrap();
    a.commit(None, None).unwrap();

    let changes = a.get_changes(&[]).unwrap();
    let mut b = doc("bb02");
    b.apply_changes([&changes[1]]).unwrap();
    assert_eq!(b.get_missing_deps(&[]).unwrap(), vec![first]);

    b.apply_changes([&changes[0]]).unwrap();
    assert!(b.get_missing_deps(&[]).unwrap().is_empty());
    assert_eq!(b.heads(), a.heads());
}

#[test]
fn test_changes_since_heads() {
    let mut a = doc("aa01");
    a.put("_root", "v", &1.0.into(), None).unwrap();
    let then = a.heads();
    a.put("_root", "w", &2.0.into(), None).unwrap();
    let newer = a.get_changes(&then).unwrap();
    assert_eq!(newer.len(), 1);
}

// ============================================================================
// Stubs
// ============================================================================

#[test]
fn test_stub_surface_degrades_predictably() {
    let mut a = doc("aa01");
    a.put("_root", "k", &1.0.into(), None).unwrap();
    let heads = a.heads();
    assert!(a.save_bundle(&heads).unwrap_err().is_not_implemented());

    let last = decode_change(&a.get_last_local_change().unwrap()).unwrap();
    assert!(api::encode_change(&last).unwrap_err().is_not_implemented());
    assert!(a.get_changes_meta(&heads).is_empty());
    assert_eq!(a.get_change_meta_by_hash(&heads[0]), None);
    assert_eq!(a.stats().num_ops, 0);
}
