//! Patch records: the change notifications consumers fold into snapshots.
//!
//! Serialized with an `action` tag, so a record reads on the wire as
//! `{"action":"put","path":["name"],"value":"Alice","datatype":"str"}`.

use indexmap::IndexMap;
use serde::Serialize;

use crate::prop::Prop;
use crate::tagged::Datatype;
use crate::value::HostValue;

/// One formatting mark over a text range.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkRecord {
    pub start: usize,
    pub end: usize,
    pub name: String,
    pub value: HostValue,
}

/// One document change, located by a path from the root.
///
/// For `insert`, `splice` and sequence `del`, the last path element is the
/// start index inside the target sequence.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Patch {
    /// A key or index now holds `value`. Object values arrive as empty
    /// containers of the new kind; later records fill them.
    Put {
        path: Vec<Prop>,
        value: HostValue,
        datatype: Datatype,
    },
    Insert {
        path: Vec<Prop>,
        values: Vec<HostValue>,
        #[serde(skip_serializing_if = "Option::is_none")]
        datatype: Option<Datatype>,
    },
    /// Map deletes carry no `length`; sequence deletes always do.
    Del {
        path: Vec<Prop>,
        #[serde(skip_serializing_if = "Option::is_none")]
        length: Option<usize>,
    },
    Splice {
        path: Vec<Prop>,
        value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        marks: Option<IndexMap<String, HostValue>>,
    },
    Inc {
        path: Vec<Prop>,
        value: f64,
    },
    Mark {
        path: Vec<Prop>,
        marks: Vec<MarkRecord>,
    },
    /// Concurrent writes left more than one value at `path`.
    Conflict { path: Vec<Prop> },
    /// An engine action with no translation. Consumers should skip it.
    Unknown { path: Vec<Prop> },
}

impl Patch {
    pub fn path(&self) -> &[Prop] {
        match self {
            Patch::Put { path, .. }
            | Patch::Insert { path, .. }
            | Patch::Del { path, .. }
            | Patch::Splice { path, .. }
            | Patch::Inc { path, .. }
            | Patch::Mark { path, .. }
            | Patch::Conflict { path }
            | Patch::Unknown { path } => path,
        }
    }

    /// The wire name of the action.
    pub fn action(&self) -> &'static str {
        match self {
            Patch::Put { .. } => "put",
            Patch::Insert { .. } => "insert",
            Patch::Del { .. } => "del",
            Patch::Splice { .. } => "splice",
            Patch::Inc { .. } => "inc",
            Patch::Mark { .. } => "mark",
            Patch::Conflict { .. } => "conflict",
            Patch::Unknown { .. } => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_put_wire_shape() {
        let patch = Patch::Put {
            path: vec!["name".into()],
            value: "Alice".into(),
            datatype: Datatype::Str,
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"action": "put", "path": ["name"], "value": "Alice", "datatype": "str"})
        );
    }

    #[test]
    fn test_del_length_omitted_for_maps() {
        let map_del = Patch::Del { path: vec!["a".into()], length: None };
        let seq_del = Patch::Del { path: vec!["xs".into(), 2usize.into()], length: Some(3) };
        assert_eq!(
            serde_json::to_value(&map_del).unwrap(),
            json!({"action": "del", "path": ["a"]})
        );
        assert_eq!(
            serde_json::to_value(&seq_del).unwrap(),
            json!({"action": "del", "path": ["xs", 2], "length": 3})
        );
    }

    #[test]
    fn test_splice_marks_omitted_when_absent() {
        let patch = Patch::Splice { path: vec!["t".into(), 0usize.into()], value: "hi".into(), marks: None };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"action": "splice", "path": ["t", 0], "value": "hi"})
        );
    }

    #[test]
    fn test_splice_marks_keep_order() {
        let marks: IndexMap<String, HostValue> =
            [("link".to_string(), "x".into()), ("bold".to_string(), true.into())].into_iter().collect();
        let patch = Patch::Splice { path: vec!["t".into(), 0usize.into()], value: "hi".into(), marks: Some(marks) };
        let v = serde_json::to_value(&patch).unwrap();
        assert_eq!(v["marks"], json!({"link": "x", "bold": true}));
        let keys: Vec<_> = v["marks"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["link", "bold"]);
    }

    #[test]
    fn test_path_and_action() {
        let patch = Patch::Conflict { path: vec!["x".into()] };
        assert_eq!(patch.action(), "conflict");
        assert_eq!(patch.path(), &[Prop::Key("x".into())]);
    }
}
