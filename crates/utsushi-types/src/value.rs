//! Plain host values: the shape application code reads and writes.
//!
//! [`HostValue`] mirrors a dynamically typed host runtime: one number type,
//! dates as epoch milliseconds, byte buffers, arrays and string-keyed objects.
//! [`HostValue::Opaque`] stands in for host values the document model cannot
//! represent (functions, class instances); writing one goes through the lossy
//! string fallback.
//!
//! Materialized arrays and objects carry a [`NodeMeta`] naming the document
//! handle and object they came from. Metadata is invisible to equality: two
//! trees are equal when their structure and scalars are equal.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

use crate::ids::ObjRef;

/// Process-unique identity of one document facade.
///
/// Two materialized values with the same `HandleId` came from the same facade
/// instance. Assigned from a monotonically increasing counter; never reused.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(u64);

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

impl HandleId {
    /// Allocate the next identity.
    pub fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Backing-document annotation on a materialized node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMeta {
    /// Facade that produced the node.
    pub handle: HandleId,
    /// Object the node was read from; re-resolve it to mutate via a proxy.
    pub object: ObjRef,
}

/// A plain array, optionally annotated.
#[derive(Clone, Debug, Default)]
pub struct HostArray {
    pub items: Vec<HostValue>,
    pub meta: Option<NodeMeta>,
}

/// A plain string-keyed object, optionally annotated. Key order is insertion order.
#[derive(Clone, Debug, Default)]
pub struct HostObject {
    pub entries: IndexMap<String, HostValue>,
    pub meta: Option<NodeMeta>,
}

impl PartialEq for HostArray {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl PartialEq for HostObject {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

/// A host-language value.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum HostValue {
    /// Absent value. Reads of unknown scalar kinds decode to this.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Epoch milliseconds.
    Date(i64),
    Array(HostArray),
    Object(HostObject),
    /// A host value with no document representation, carried as its display form.
    Opaque(String),
}

impl HostValue {
    /// Empty array.
    pub fn array() -> Self {
        HostValue::Array(HostArray::default())
    }

    /// Empty object.
    pub fn object() -> Self {
        HostValue::Object(HostObject::default())
    }

    /// Short type name, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
            HostValue::Bytes(_) => "bytes",
            HostValue::Date(_) => "date",
            HostValue::Array(_) => "array",
            HostValue::Object(_) => "object",
            HostValue::Opaque(_) => "opaque",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, HostValue::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&HostArray> {
        match self {
            HostValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HostObject> {
        match self {
            HostValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Node annotation, if this is an annotated array or object.
    pub fn meta(&self) -> Option<&NodeMeta> {
        match self {
            HostValue::Array(a) => a.meta.as_ref(),
            HostValue::Object(o) => o.meta.as_ref(),
            _ => None,
        }
    }

    /// Attach (or replace) the node annotation. No-op on scalars.
    pub fn set_meta(&mut self, meta: NodeMeta) {
        match self {
            HostValue::Array(a) => a.meta = Some(meta),
            HostValue::Object(o) => o.meta = Some(meta),
            _ => {}
        }
    }

    /// Whether two values were materialized from the same document facade.
    ///
    /// Compares handle identities, never object identity. Unannotated values
    /// are never the same document as anything.
    pub fn is_same_document(&self, other: &HostValue) -> bool {
        match (self.meta(), other.meta()) {
            (Some(a), Some(b)) => a.handle == b.handle,
            _ => false,
        }
    }

    /// Host truthiness: `false`, `0`, `NaN`, `""`, null and undefined are falsy.
    pub fn truthy(&self) -> bool {
        match self {
            HostValue::Undefined | HostValue::Null => false,
            HostValue::Bool(b) => *b,
            HostValue::Number(n) => *n != 0.0 && !n.is_nan(),
            HostValue::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Host string coercion, used by the `str` kind and the lossy fallback.
    pub fn to_display_string(&self) -> String {
        match self {
            HostValue::Undefined => "undefined".to_string(),
            HostValue::Null => "null".to_string(),
            HostValue::Bool(b) => b.to_string(),
            HostValue::Number(n) => format_number(*n),
            HostValue::String(s) => s.clone(),
            HostValue::Bytes(b) => b.iter().map(u8::to_string).collect::<Vec<_>>().join(","),
            HostValue::Date(ms) => ms.to_string(),
            HostValue::Array(a) => a
                .items
                .iter()
                .map(|v| match v {
                    HostValue::Undefined | HostValue::Null => String::new(),
                    other => other.to_display_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            HostValue::Object(_) => "[object Object]".to_string(),
            HostValue::Opaque(s) => s.clone(),
        }
    }

    /// Convert to JSON. Dates become epoch-ms numbers, bytes become number
    /// arrays, undefined and non-finite numbers become null.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            HostValue::Undefined | HostValue::Null => J::Null,
            HostValue::Bool(b) => J::Bool(*b),
            HostValue::Number(n) => number_to_json(*n),
            HostValue::String(s) | HostValue::Opaque(s) => J::String(s.clone()),
            HostValue::Bytes(b) => J::Array(b.iter().map(|x| J::from(*x)).collect()),
            HostValue::Date(ms) => J::from(*ms),
            HostValue::Array(a) => J::Array(a.items.iter().map(HostValue::to_json).collect()),
            HostValue::Object(o) => J::Object(
                o.entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.is_finite() && n.abs() <= (1u64 << 53) as f64 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

// ── Conversions ─────────────────────────────────────────────────────────────

impl From<serde_json::Value> for HostValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match v {
            J::Null => HostValue::Null,
            J::Bool(b) => HostValue::Bool(b),
            J::Number(n) => HostValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            J::String(s) => HostValue::String(s),
            J::Array(items) => HostValue::Array(HostArray {
                items: items.into_iter().map(HostValue::from).collect(),
                meta: None,
            }),
            J::Object(map) => HostValue::Object(HostObject {
                entries: map.into_iter().map(|(k, v)| (k, HostValue::from(v))).collect(),
                meta: None,
            }),
        }
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::String(s)
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(n)
    }
}

impl From<i64> for HostValue {
    fn from(n: i64) -> Self {
        HostValue::Number(n as f64)
    }
}

impl From<i32> for HostValue {
    fn from(n: i32) -> Self {
        HostValue::Number(f64::from(n))
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(items: Vec<HostValue>) -> Self {
        HostValue::Array(HostArray { items, meta: None })
    }
}

impl From<IndexMap<String, HostValue>> for HostValue {
    fn from(entries: IndexMap<String, HostValue>) -> Self {
        HostValue::Object(HostObject { entries, meta: None })
    }
}

impl Serialize for HostValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HostValue::Undefined | HostValue::Null => serializer.serialize_none(),
            HostValue::Bool(b) => serializer.serialize_bool(*b),
            HostValue::Number(n) => number_to_json(*n).serialize(serializer),
            HostValue::String(s) | HostValue::Opaque(s) => serializer.serialize_str(s),
            HostValue::Bytes(b) => {
                let mut seq = serializer.serialize_seq(Some(b.len()))?;
                for byte in b {
                    seq.serialize_element(byte)?;
                }
                seq.end()
            }
            HostValue::Date(ms) => serializer.serialize_i64(*ms),
            HostValue::Array(a) => {
                let mut seq = serializer.serialize_seq(Some(a.items.len()))?;
                for item in &a.items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            HostValue::Object(o) => {
                let mut map = serializer.serialize_map(Some(o.entries.len()))?;
                for (k, v) in &o.entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}
