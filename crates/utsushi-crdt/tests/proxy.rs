//! Proxy transparency: writes through a proxy read back as plain values.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use tracing_subscriber::EnvFilter;
use utsushi_crdt::{Config, CrdtError, Document, FallbackPolicy, HostKey, HostValue, proxy};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn doc() -> Document {
    init_tracing();
    Document::create(None).unwrap()
}

#[test]
fn test_deep_assign_materializes_equal() {
    let input = HostValue::from(json!({
        "title": "plan",
        "count": 3,
        "ratio": 0.5,
        "neg": -2,
        "archived": false,
        "nothing": null,
        "steps": [
            {"name": "a", "subtasks": [[1, 2], []]},
            {"name": "b", "meta": {}},
        ],
    }));

    let mut doc = doc();
    doc.root_proxy().set("plan", &input).unwrap();

    let snapshot = doc.materialize(None, None).unwrap();
    assert_eq!(snapshot.as_object().unwrap().entries["plan"], input);
}

#[test]
fn test_proxy_reads_match_materialize() {
    let mut doc = doc();
    doc.root_proxy().set("xs", &json!([{"k": "v"}, 2]).into()).unwrap();

    let via_materialize = doc.materialize(None, None).unwrap();
    let mut root = doc.root_proxy();
    let mut xs = root.get("xs").unwrap().unwrap().into_list().unwrap();
    let second = xs.get(1usize).unwrap().unwrap().into_value().unwrap();
    assert_eq!(second, HostValue::from(2.0));
    let first = xs.get(0usize).unwrap().unwrap().into_map().unwrap().to_value().unwrap();
    assert_eq!(first, via_materialize.as_object().unwrap().entries["xs"].as_array().unwrap().items[0]);
}

#[test]
fn test_assignment_copies_rather_than_links() {
    let mut doc = doc();
    let shared = HostValue::from(json!({"v": 1}));
    {
        let mut root = doc.root_proxy();
        root.set("a", &shared).unwrap();
        root.set("b", &shared).unwrap();
        let mut a = root.get("a").unwrap().unwrap().into_map().unwrap();
        a.set("v", &2.0.into()).unwrap();
    }
    assert_eq!(
        doc.materialize(None, None).unwrap(),
        HostValue::from(json!({"a": {"v": 2}, "b": {"v": 1}}))
    );
}

#[test]
fn test_overwrite_replaces_node() {
    let mut doc = doc();
    let mut root = doc.root_proxy();
    root.set("x", &json!({"old": true}).into()).unwrap();
    root.set("x", &json!([1]).into()).unwrap();
    assert!(root.get("x").unwrap().unwrap().into_list().is_some());
    root.set("x", &"flat".into()).unwrap();
    assert_eq!(root.get("x").unwrap().unwrap().into_value(), Some(HostValue::from("flat")));
}

#[test]
fn test_keys_reflect_engine_state() {
    let mut doc = doc();
    let mut root = doc.root_proxy();
    root.set("a", &1.0.into()).unwrap();
    root.set("b", &HostValue::Null).unwrap();
    root.set("c", &HostValue::Undefined).unwrap();
    assert_eq!(root.keys().unwrap(), vec!["a", "b", "c"]);
    root.delete("a").unwrap();
    assert_eq!(root.keys().unwrap(), vec!["b", "c"]);
    assert!(root.has("c").unwrap());
}

#[test]
fn test_index_keys_on_maps_stringify() {
    let mut doc = doc();
    let mut root = doc.root_proxy();
    root.set(7usize, &"seven".into()).unwrap();
    assert!(root.has("7").unwrap());
    assert_eq!(root.keys().unwrap(), vec!["7"]);
}

#[test]
fn test_symbols_never_reach_engine() {
    let mut doc = doc();
    let mut root = doc.root_proxy();
    assert!(!root.set(HostKey::Symbol("toStringTag".into()), &"x".into()).unwrap());
    drop(root);
    assert_eq!(doc.pending_ops(), 0);
}

#[test]
fn test_list_truncate_then_push() {
    let mut doc = doc();
    let mut root = doc.root_proxy();
    root.set("xs", &json!([1, 2, 3]).into()).unwrap();
    let mut xs = root.get("xs").unwrap().unwrap().into_list().unwrap();
    xs.set_len(1).unwrap();
    assert_eq!(xs.push(&["x".into(), json!([true]).into()]).unwrap(), 3);
    assert_eq!(xs.to_value().unwrap(), HostValue::from(json!([1, "x", [true]])));
}

#[test]
fn test_reopen_materialized_list() {
    let mut doc = doc();
    doc.root_proxy().set("xs", &json!([1]).into()).unwrap();
    let snapshot = doc.materialize(None, None).unwrap();
    let meta = snapshot.as_object().unwrap().entries["xs"].meta().unwrap().clone();
    assert_eq!(meta.handle, doc.handle());

    let mut xs = proxy::open(&mut doc, &meta.object, vec!["xs".into()])
        .unwrap()
        .into_list()
        .unwrap();
    xs.push(&[2.0.into()]).unwrap();
    assert_eq!(doc.materialize(None, None).unwrap(), HostValue::from(json!({"xs": [1, 2]})));
}

#[test]
fn test_opaque_values_follow_fallback_policy() {
    let mut lossy = doc();
    lossy.root_proxy().set("f", &HostValue::Opaque("[Function f]".into())).unwrap();
    assert_eq!(
        lossy.materialize(None, None).unwrap(),
        HostValue::from(json!({"f": "[Function f]"}))
    );

    let mut strict = doc().with_config(Config {
        unrepresentable: FallbackPolicy::Reject,
        ..Config::default()
    });
    let err = strict
        .root_proxy()
        .set("f", &HostValue::Opaque("[Function f]".into()))
        .unwrap_err();
    assert!(matches!(err, CrdtError::Unrepresentable(_)));
}

fn json_leaf() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::from),
        (-1_000_000i64..1_000_000).prop_map(serde_json::Value::from),
        "[a-z ]{0,8}".prop_map(serde_json::Value::from),
    ]
}

fn json_tree() -> impl Strategy<Value = serde_json::Value> {
    json_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::from),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_transparency_for_arbitrary_trees(tree in json_tree()) {
        let input = HostValue::from(tree);
        let mut doc = Document::create(None).unwrap();
        doc.root_proxy().set("v", &input).unwrap();
        let got = doc.get("_root", "v", None).unwrap();
        prop_assert!(got.is_some());
        let snapshot = doc.materialize(None, None).unwrap();
        prop_assert_eq!(&snapshot.as_object().unwrap().entries["v"], &input);
    }
}
