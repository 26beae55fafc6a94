//! Engine patch → host patch record translation.
//!
//! Order is preserved exactly: no reordering, deduplication or batching.
//! Consumers fold the records in sequence and rely on earlier records having
//! created the containers later ones write into.

use indexmap::IndexMap;
use tracing::warn;
use utsushi_types::{Datatype, HostValue, MarkRecord, Patch, Prop, TaggedValue};

use crate::codec::{empty_container, from_scalar};
use crate::engine::{EngineAction, EngineMark, EngineProp, EnginePatch};

fn prop(p: EngineProp) -> Prop {
    match p {
        EngineProp::Key(k) => Prop::Key(k),
        EngineProp::Index(i) => Prop::Index(i as usize),
    }
}

/// Host value and datatype carried by a put or insert.
///
/// A new object arrives as an empty container of its kind so that later
/// records in the same batch can fill it.
fn patch_value(value: &TaggedValue) -> (Datatype, HostValue) {
    match value {
        TaggedValue::Object { kind, .. } => (Datatype::from(*kind), empty_container(*kind)),
        TaggedValue::Scalar(s) => (s.datatype(), from_scalar(s)),
    }
}

fn mark_record(mark: EngineMark) -> MarkRecord {
    MarkRecord {
        start: mark.start as usize,
        end: mark.end as usize,
        name: mark.name,
        value: from_scalar(&mark.value),
    }
}

/// Translate one engine patch.
pub fn translate(patch: EnginePatch) -> Patch {
    let mut path: Vec<Prop> = patch.path.into_iter().map(|el| prop(el.prop)).collect();

    match patch.action {
        EngineAction::Put { prop: p, value, .. } => {
            let (datatype, value) = patch_value(&value);
            path.push(prop(p));
            Patch::Put { path, value, datatype }
        }
        EngineAction::Insert { index, values } => {
            path.push(Prop::Index(index as usize));
            let mut datatype = None;
            let values = values
                .iter()
                .map(|v| {
                    let (dt, host) = patch_value(v);
                    datatype.get_or_insert(dt);
                    host
                })
                .collect();
            Patch::Insert { path, values, datatype }
        }
        EngineAction::SpliceText { index, value, marks } => {
            path.push(Prop::Index(index as usize));
            let marks = if marks.is_empty() {
                None
            } else {
                Some(
                    marks
                        .iter()
                        .map(|(name, v)| (name.clone(), from_scalar(v)))
                        .collect::<IndexMap<_, _>>(),
                )
            };
            Patch::Splice { path, value, marks }
        }
        EngineAction::Increment { prop: p, value } => {
            path.push(prop(p));
            Patch::Inc { path, value: value as f64 }
        }
        EngineAction::Conflict { prop: p } => {
            path.push(prop(p));
            Patch::Conflict { path }
        }
        EngineAction::DeleteMap { key } => {
            path.push(Prop::Key(key));
            Patch::Del { path, length: None }
        }
        EngineAction::DeleteSeq { index, length } => {
            path.push(Prop::Index(index as usize));
            Patch::Del { path, length: Some(length as usize) }
        }
        EngineAction::Marks { marks } => Patch::Mark {
            path,
            marks: marks.into_iter().map(mark_record).collect(),
        },
        EngineAction::Other => {
            warn!(?path, "untranslatable patch action");
            Patch::Unknown { path }
        }
    }
}

/// Translate a batch, preserving order.
pub fn translate_all(patches: Vec<EnginePatch>) -> Vec<Patch> {
    patches.into_iter().map(translate).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PathElement;
    use crate::ids::root;
    use pretty_assertions::assert_eq;
    use utsushi_types::{ObjId, ObjType, ScalarValue};

    fn at(path: &[EngineProp], action: EngineAction) -> EnginePatch {
        EnginePatch {
            obj: root(),
            path: path
                .iter()
                .map(|p| PathElement { obj: root(), prop: p.clone() })
                .collect(),
            action,
        }
    }

    fn key(k: &str) -> EngineProp {
        EngineProp::Key(k.to_string())
    }

    #[test]
    fn test_put_scalar() {
        let patch = translate(at(
            &[],
            EngineAction::Put {
                prop: key("name"),
                value: TaggedValue::Scalar(ScalarValue::Str("Alice".into())),
                conflict: false,
            },
        ));
        assert_eq!(
            patch,
            Patch::Put { path: vec!["name".into()], value: "Alice".into(), datatype: Datatype::Str }
        );
    }

    #[test]
    fn test_put_object_is_empty_container() {
        let patch = translate(at(
            &[key("todos")],
            EngineAction::Put {
                prop: EngineProp::Index(0),
                value: TaggedValue::Object { kind: ObjType::Map, id: ObjId::from_bytes(vec![9]) },
                conflict: false,
            },
        ));
        assert_eq!(
            patch,
            Patch::Put {
                path: vec!["todos".into(), 0usize.into()],
                value: HostValue::object(),
                datatype: Datatype::Map,
            }
        );
    }

    #[test]
    fn test_insert_keeps_order_and_start_index() {
        let patch = translate(at(
            &[key("xs")],
            EngineAction::Insert {
                index: 2,
                values: vec![
                    TaggedValue::Scalar(ScalarValue::Uint(1)),
                    TaggedValue::Scalar(ScalarValue::Uint(2)),
                ],
            },
        ));
        assert_eq!(
            patch,
            Patch::Insert {
                path: vec!["xs".into(), 2usize.into()],
                values: vec![1.0.into(), 2.0.into()],
                datatype: Some(Datatype::Uint),
            }
        );
    }

    #[test]
    fn test_splice_marks_only_when_present() {
        let plain = translate(at(
            &[key("t")],
            EngineAction::SpliceText { index: 0, value: "hi".into(), marks: vec![] },
        ));
        assert!(matches!(plain, Patch::Splice { marks: None, .. }));

        let marked = translate(at(
            &[key("t")],
            EngineAction::SpliceText {
                index: 0,
                value: "hi".into(),
                marks: vec![("bold".into(), ScalarValue::Boolean(true))],
            },
        ));
        match marked {
            Patch::Splice { marks: Some(marks), .. } => assert_eq!(marks["bold"], HostValue::Bool(true)),
            other => panic!("expected marked splice, got {other:?}"),
        }
    }

    #[test]
    fn test_deletes() {
        let map_del = translate(at(&[], EngineAction::DeleteMap { key: "a".into() }));
        assert_eq!(map_del, Patch::Del { path: vec!["a".into()], length: None });

        let seq_del = translate(at(&[key("xs")], EngineAction::DeleteSeq { index: 1, length: 3 }));
        assert_eq!(seq_del, Patch::Del { path: vec!["xs".into(), 1usize.into()], length: Some(3) });
    }

    #[test]
    fn test_inc_conflict_mark() {
        let inc = translate(at(&[], EngineAction::Increment { prop: key("n"), value: 5 }));
        assert_eq!(inc, Patch::Inc { path: vec!["n".into()], value: 5.0 });

        let conflict = translate(at(&[], EngineAction::Conflict { prop: key("x") }));
        assert_eq!(conflict, Patch::Conflict { path: vec!["x".into()] });

        let mark = translate(at(
            &[key("t")],
            EngineAction::Marks {
                marks: vec![EngineMark {
                    start: 0,
                    end: 3,
                    name: "bold".into(),
                    value: ScalarValue::Boolean(true),
                }],
            },
        ));
        assert_eq!(
            mark,
            Patch::Mark {
                path: vec!["t".into()],
                marks: vec![MarkRecord { start: 0, end: 3, name: "bold".into(), value: true.into() }],
            }
        );
    }

    #[test]
    fn test_unknown_action_does_not_abort_batch() {
        let batch = translate_all(vec![
            at(&[], EngineAction::Other),
            at(&[], EngineAction::DeleteMap { key: "a".into() }),
        ]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].action(), "unknown");
        assert_eq!(batch[1].action(), "del");
    }
}
