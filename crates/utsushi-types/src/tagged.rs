//! The engine's tagged value model.
//!
//! Every value read from or written to a document is either a reference to a
//! nested object (map, list or text) or a scalar carrying one of nine kinds.
//! [`Datatype`] names both families with the strings host code already uses
//! (`"str"`, `"uint"`, `"map"`, ...), so a read can be reported as a tagged
//! pair like `("str", "Alice")`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::ObjId;
use crate::value::HostValue;

/// Kind of a nested object node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ObjType {
    #[default]
    #[strum(serialize = "map", serialize = "table")]
    Map,
    List,
    Text,
}

impl ObjType {
    /// Parse from string (case-insensitive). `table` is accepted as a map.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjType::Map => "map",
            ObjType::List => "list",
            ObjType::Text => "text",
        }
    }

    /// Whether elements are addressed by index.
    pub fn is_sequence(&self) -> bool {
        matches!(self, ObjType::List | ObjType::Text)
    }
}

impl std::fmt::Display for ObjType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Datatype tag of a value: an object kind or a scalar kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Datatype {
    Map,
    List,
    Text,
    #[strum(serialize = "str", serialize = "string")]
    Str,
    Int,
    Uint,
    #[strum(serialize = "f64", serialize = "float")]
    F64,
    #[strum(serialize = "boolean", serialize = "bool")]
    Boolean,
    Null,
    Bytes,
    Timestamp,
    Counter,
    Unknown,
}

impl Datatype {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Datatype::Map => "map",
            Datatype::List => "list",
            Datatype::Text => "text",
            Datatype::Str => "str",
            Datatype::Int => "int",
            Datatype::Uint => "uint",
            Datatype::F64 => "f64",
            Datatype::Boolean => "boolean",
            Datatype::Null => "null",
            Datatype::Bytes => "bytes",
            Datatype::Timestamp => "timestamp",
            Datatype::Counter => "counter",
            Datatype::Unknown => "unknown",
        }
    }

    /// The object kind, for `map`/`list`/`text`.
    pub fn obj_type(&self) -> Option<ObjType> {
        match self {
            Datatype::Map => Some(ObjType::Map),
            Datatype::List => Some(ObjType::List),
            Datatype::Text => Some(ObjType::Text),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        self.obj_type().is_some()
    }
}

impl From<ObjType> for Datatype {
    fn from(t: ObjType) -> Self {
        match t {
            ObjType::Map => Datatype::Map,
            ObjType::List => Datatype::List,
            ObjType::Text => Datatype::Text,
        }
    }
}

impl std::fmt::Display for Datatype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar as the engine stores it.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    Str(String),
    Int(i64),
    Uint(u64),
    F64(f64),
    Boolean(bool),
    Null,
    Bytes(Vec<u8>),
    /// Epoch milliseconds.
    Timestamp(i64),
    Counter(i64),
    /// A kind this binding does not know. Carried through untouched.
    Unknown { type_code: u8, bytes: Vec<u8> },
}

impl ScalarValue {
    pub fn datatype(&self) -> Datatype {
        match self {
            ScalarValue::Str(_) => Datatype::Str,
            ScalarValue::Int(_) => Datatype::Int,
            ScalarValue::Uint(_) => Datatype::Uint,
            ScalarValue::F64(_) => Datatype::F64,
            ScalarValue::Boolean(_) => Datatype::Boolean,
            ScalarValue::Null => Datatype::Null,
            ScalarValue::Bytes(_) => Datatype::Bytes,
            ScalarValue::Timestamp(_) => Datatype::Timestamp,
            ScalarValue::Counter(_) => Datatype::Counter,
            ScalarValue::Unknown { .. } => Datatype::Unknown,
        }
    }

    pub fn is_counter(&self) -> bool {
        matches!(self, ScalarValue::Counter(_))
    }
}

/// A value read from the engine: a nested object or a scalar.
#[derive(Clone, Debug, PartialEq)]
pub enum TaggedValue {
    Object { kind: ObjType, id: ObjId },
    Scalar(ScalarValue),
}

impl TaggedValue {
    pub fn datatype(&self) -> Datatype {
        match self {
            TaggedValue::Object { kind, .. } => Datatype::from(*kind),
            TaggedValue::Scalar(s) => s.datatype(),
        }
    }

    pub fn as_object(&self) -> Option<(ObjType, &ObjId)> {
        match self {
            TaggedValue::Object { kind, id } => Some((*kind, id)),
            TaggedValue::Scalar(_) => None,
        }
    }
}

/// Tagged-pair form of a read: the datatype plus the decoded host value.
///
/// Object values decode to their reference token as a string.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FullValue {
    pub datatype: Datatype,
    pub value: HostValue,
}

impl FullValue {
    pub fn new(datatype: Datatype, value: HostValue) -> Self {
        Self { datatype, value }
    }

    /// `(datatype string, value)`.
    pub fn as_pair(&self) -> (&'static str, &HostValue) {
        (self.datatype.as_str(), &self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datatype_strings_roundtrip() {
        for dt in [
            Datatype::Map,
            Datatype::List,
            Datatype::Text,
            Datatype::Str,
            Datatype::Int,
            Datatype::Uint,
            Datatype::F64,
            Datatype::Boolean,
            Datatype::Null,
            Datatype::Bytes,
            Datatype::Timestamp,
            Datatype::Counter,
            Datatype::Unknown,
        ] {
            assert_eq!(Datatype::from_str(dt.as_str()), Some(dt));
        }
    }

    #[test]
    fn test_datatype_aliases() {
        assert_eq!(Datatype::from_str("STRING"), Some(Datatype::Str));
        assert_eq!(Datatype::from_str("bool"), Some(Datatype::Boolean));
        assert_eq!(Datatype::from_str("nope"), None);
        assert_eq!(ObjType::from_str("table"), Some(ObjType::Map));
    }

    #[test]
    fn test_datatype_obj_type() {
        assert_eq!(Datatype::List.obj_type(), Some(ObjType::List));
        assert_eq!(Datatype::Counter.obj_type(), None);
        assert!(ObjType::Text.is_sequence());
        assert!(!ObjType::Map.is_sequence());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Datatype::F64).unwrap(), "\"f64\"");
        assert_eq!(serde_json::to_string(&ObjType::List).unwrap(), "\"list\"");
    }
}
