//! Live, mutable views over document nodes.
//!
//! A proxy is a borrowed `(document, object, path)` triple. It holds no state
//! of its own: every read goes to the engine, every write becomes one or more
//! primitive operations. Navigation builds a fresh proxy per step and nothing
//! here is ever cached.
//!
//! ```text
//! root_proxy() ── get("todos") ──► Resolved::List ── get(0) ──► Resolved::Map
//!                                                          └─► Resolved::Value
//! ```
//!
//! Text nodes are leaves: resolving one yields its current string.
//!
//! Keys arrive as [`HostKey`]. Symbol keys have no storage in the document and
//! resolve to nothing without an engine call.

use tracing::debug;
use utsushi_types::{HostKey, HostValue, ObjId, ObjRef, ObjType, Prop, TaggedValue};

use crate::codec::{Tagged, from_scalar, to_tagged};
use crate::config::GrowthPolicy;
use crate::document::Document;
use crate::ids::{obj_id, obj_ref};
use crate::{CrdtError, Result};

/// Outcome of resolving a key: a plain value or a nested view.
pub enum Resolved<'d> {
    Value(HostValue),
    Map(MapProxy<'d>),
    List(ListProxy<'d>),
}

impl<'d> Resolved<'d> {
    pub fn as_value(&self) -> Option<&HostValue> {
        match self {
            Resolved::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<HostValue> {
        match self {
            Resolved::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_map(self) -> Option<MapProxy<'d>> {
        match self {
            Resolved::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<ListProxy<'d>> {
        match self {
            Resolved::List(l) => Some(l),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Resolved<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolved::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Resolved::Map(m) => std::fmt::Debug::fmt(m, f),
            Resolved::List(l) => std::fmt::Debug::fmt(l, f),
        }
    }
}

/// Classify the node behind `obj` and build the matching view.
///
/// This is how a materialized node is turned back into something writable:
/// pass the [`ObjRef`] from its [`utsushi_types::NodeMeta`].
pub fn open<'d>(doc: &'d mut Document, obj: &ObjRef, path: Vec<Prop>) -> Result<Resolved<'d>> {
    let id = obj_id(obj);
    let kind = doc.engine().object_type(&id)?;
    node(doc, id, kind, path)
}

fn node(doc: &mut Document, id: ObjId, kind: ObjType, path: Vec<Prop>) -> Result<Resolved<'_>> {
    Ok(match kind {
        ObjType::Text => Resolved::Value(HostValue::String(doc.engine().text(&id, None)?)),
        ObjType::List => Resolved::List(ListProxy { doc, obj: id, path }),
        ObjType::Map => Resolved::Map(MapProxy { doc, obj: id, path }),
    })
}

fn resolve<'d>(doc: &'d mut Document, obj: &ObjId, path: &[Prop], prop: Prop) -> Result<Option<Resolved<'d>>> {
    let Some(value) = doc.engine().get(obj, &prop, None)? else {
        return Ok(None);
    };
    Ok(Some(match value {
        TaggedValue::Scalar(s) => Resolved::Value(from_scalar(&s)),
        TaggedValue::Object { kind, id } => {
            let mut path = path.to_vec();
            path.push(prop);
            node(doc, id, kind, path)?
        }
    }))
}

// ── Writes ──────────────────────────────────────────────────────────────────

/// Assign `value` at `prop` of `obj`, deep-copying arrays and objects into
/// fresh nodes. A list index equal to the length appends.
fn assign(doc: &mut Document, obj: &ObjId, container: ObjType, prop: &Prop, value: &HostValue) -> Result<()> {
    let tagged = to_tagged(value, None, doc.config())?;
    let append_at = match (container, prop) {
        (ObjType::List, Prop::Index(i)) if *i == doc.engine().length(obj, None)? => Some(*i),
        _ => None,
    };

    let engine = doc.engine_mut();
    match tagged {
        Tagged::Scalar(scalar) => match append_at {
            Some(i) => engine.insert(obj, i, &scalar),
            None => engine.put(obj, prop, &scalar),
        },
        Tagged::Object(kind) => {
            let child = match append_at {
                Some(i) => engine.insert_object(obj, i, kind)?,
                None => engine.put_object(obj, prop, kind)?,
            };
            fill(doc, &child, kind, value)
        }
    }
}

/// Copy the own properties of `value` into the freshly created `child`.
fn fill(doc: &mut Document, child: &ObjId, kind: ObjType, value: &HostValue) -> Result<()> {
    match value {
        HostValue::Object(object) => {
            for (key, v) in &object.entries {
                assign(doc, child, kind, &Prop::Key(key.clone()), v)?;
            }
        }
        HostValue::Array(array) => {
            for (i, v) in array.items.iter().enumerate() {
                assign(doc, child, kind, &Prop::Index(i), v)?;
            }
        }
        _ => {}
    }
    Ok(())
}

// ============================================================================
// MapProxy
// ============================================================================

/// Object-like view over a map node.
pub struct MapProxy<'d> {
    doc: &'d mut Document,
    obj: ObjId,
    path: Vec<Prop>,
}

impl<'d> MapProxy<'d> {
    pub(crate) fn new(doc: &'d mut Document, obj: ObjId, path: Vec<Prop>) -> Self {
        Self { doc, obj, path }
    }

    pub fn object(&self) -> ObjRef {
        obj_ref(&self.obj)
    }

    /// Path from the root to this node.
    pub fn path(&self) -> &[Prop] {
        &self.path
    }

    fn prop(key: impl Into<HostKey>) -> Option<Prop> {
        Prop::normalize(&key.into(), ObjType::Map)
    }

    pub fn get(&mut self, key: impl Into<HostKey>) -> Result<Option<Resolved<'_>>> {
        let Some(prop) = Self::prop(key) else {
            return Ok(None);
        };
        resolve(self.doc, &self.obj, &self.path, prop)
    }

    /// Assign a value. Returns `false` for symbol keys.
    pub fn set(&mut self, key: impl Into<HostKey>, value: &HostValue) -> Result<bool> {
        let Some(prop) = Self::prop(key) else {
            return Ok(false);
        };
        assign(self.doc, &self.obj, ObjType::Map, &prop, value)?;
        Ok(true)
    }

    /// Remove a key. Absent keys succeed; symbol keys return `false`.
    pub fn delete(&mut self, key: impl Into<HostKey>) -> Result<bool> {
        let Some(prop) = Self::prop(key) else {
            return Ok(false);
        };
        if self.doc.engine().get(&self.obj, &prop, None)?.is_some() {
            self.doc.engine_mut().delete(&self.obj, &prop)?;
        }
        Ok(true)
    }

    pub fn has(&self, key: impl Into<HostKey>) -> Result<bool> {
        let Some(Prop::Key(key)) = Self::prop(key) else {
            return Ok(false);
        };
        Ok(self.keys()?.contains(&key))
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        self.doc.engine().keys(&self.obj, None)
    }

    /// Materialize this node.
    pub fn to_value(&self) -> Result<HostValue> {
        self.doc.materialize(Some(self.object().to_token().as_str()), None)
    }
}

impl std::fmt::Debug for MapProxy<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MapProxy({} @ {:?})", self.object(), self.path)
    }
}

// ============================================================================
// ListProxy
// ============================================================================

/// Array-like view over a list node.
pub struct ListProxy<'d> {
    doc: &'d mut Document,
    obj: ObjId,
    path: Vec<Prop>,
}

impl ListProxy<'_> {
    pub fn object(&self) -> ObjRef {
        obj_ref(&self.obj)
    }

    pub fn path(&self) -> &[Prop] {
        &self.path
    }

    fn prop(key: impl Into<HostKey>) -> Option<Prop> {
        Prop::normalize(&key.into(), ObjType::List)
    }

    pub fn len(&self) -> Result<usize> {
        self.doc.engine().length(&self.obj, None)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get(&mut self, key: impl Into<HostKey>) -> Result<Option<Resolved<'_>>> {
        let Some(prop) = Self::prop(key) else {
            return Ok(None);
        };
        resolve(self.doc, &self.obj, &self.path, prop)
    }

    /// Assign an element. `index == len` appends. Returns `false` for keys
    /// that are not indices.
    pub fn set(&mut self, key: impl Into<HostKey>, value: &HostValue) -> Result<bool> {
        let Some(prop) = Self::prop(key) else {
            return Ok(false);
        };
        assign(self.doc, &self.obj, ObjType::List, &prop, value)?;
        Ok(true)
    }

    /// Remove an element, shifting later ones down. Out-of-range indices
    /// succeed; non-index keys return `false`.
    pub fn delete(&mut self, key: impl Into<HostKey>) -> Result<bool> {
        let Some(prop) = Self::prop(key) else {
            return Ok(false);
        };
        let len = self.len()?;
        if prop.as_index().is_some_and(|i| i < len) {
            self.doc.engine_mut().delete(&self.obj, &prop)?;
        }
        Ok(true)
    }

    pub fn has(&self, key: impl Into<HostKey>) -> Result<bool> {
        match Self::prop(key) {
            Some(Prop::Index(i)) => Ok(i < self.len()?),
            _ => Ok(false),
        }
    }

    /// Element indices as strings.
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok((0..self.len()?).map(|i| i.to_string()).collect())
    }

    /// Length assignment. Shrinking truncates; growing follows
    /// [`crate::Config::list_growth`].
    pub fn set_len(&mut self, new_len: usize) -> Result<()> {
        let len = self.len()?;
        if new_len < len {
            return self.doc.engine_mut().splice(&self.obj, new_len, len - new_len, &[]);
        }
        if new_len > len {
            match self.doc.config().list_growth {
                GrowthPolicy::Reject => {
                    return Err(CrdtError::ListGrowth { len, requested: new_len });
                }
                GrowthPolicy::Ignore => {
                    debug!(len, requested = new_len, "ignoring list growth");
                }
            }
        }
        Ok(())
    }

    /// Append each value in order. Returns the new length.
    pub fn push(&mut self, values: &[HostValue]) -> Result<usize> {
        for value in values {
            let len = self.len()?;
            assign(self.doc, &self.obj, ObjType::List, &Prop::Index(len), value)?;
        }
        self.len()
    }

    /// Materialize this node.
    pub fn to_value(&self) -> Result<HostValue> {
        self.doc.materialize(Some(self.object().to_token().as_str()), None)
    }
}

impl std::fmt::Debug for ListProxy<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ListProxy({} @ {:?})", self.object(), self.path)
    }
}
