//! Typed binding over the Automerge engine.
//!
//! [`EngineDoc`] is the only place that names `automerge` document types.
//! Everything above it speaks `utsushi_types`: raw [`ObjId`] bytes, tagged
//! values, change hashes. Sequence positions in patches are reported as
//! `u64`, the width the engine's wire types use.
//!
//! Errors from the engine pass through as [`CrdtError::Engine`]; decode
//! failures on bytes handed in from outside become [`CrdtError::Load`].

use automerge as am;
use automerge::marks::{ExpandMark, Mark};
use automerge::sync::SyncDoc;
use automerge::transaction::{CommitOptions, Transactable};
use automerge::{AutoCommit, ReadDoc};
use strum::EnumString;
use utsushi_types::{
    ActorId, ChangeHash, Cursor, DecodedChange, ObjId, ObjType, Prop, ScalarValue, TaggedValue,
};

use crate::ids::{
    from_am_actor, from_am_cursor, from_am_hash, from_am_heads, from_am_obj, to_am_actor,
    to_am_cursor, to_am_heads, to_am_obj,
};
use crate::{CrdtError, Result};

// ============================================================================
// Engine patch model
// ============================================================================

/// Property as the engine reports it inside a patch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineProp {
    Key(String),
    Index(u64),
}

/// One hop of a patch path: the object passed through and the property taken.
#[derive(Clone, Debug, PartialEq)]
pub struct PathElement {
    pub obj: ObjId,
    pub prop: EngineProp,
}

/// A formatting mark over `[start, end)`.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineMark {
    pub start: u64,
    pub end: u64,
    pub name: String,
    pub value: ScalarValue,
}

/// What happened, relative to the patch's target object.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineAction {
    Put {
        prop: EngineProp,
        value: TaggedValue,
        conflict: bool,
    },
    Insert {
        index: u64,
        values: Vec<TaggedValue>,
    },
    SpliceText {
        index: u64,
        value: String,
        marks: Vec<(String, ScalarValue)>,
    },
    Increment {
        prop: EngineProp,
        value: i64,
    },
    Conflict {
        prop: EngineProp,
    },
    DeleteMap {
        key: String,
    },
    DeleteSeq {
        index: u64,
        length: u64,
    },
    Marks {
        marks: Vec<EngineMark>,
    },
    /// An action this binding has no mapping for.
    Other,
}

/// A patch as produced by the engine's diff.
#[derive(Clone, Debug, PartialEq)]
pub struct EnginePatch {
    /// Target object.
    pub obj: ObjId,
    /// Route from the root to `obj`.
    pub path: Vec<PathElement>,
    pub action: EngineAction,
}

/// Which sides of a marked range grow when text is inserted at the boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Expand {
    Before,
    After,
    Both,
    #[default]
    None,
}

impl Expand {
    /// Parse from string (case-insensitive). Unknown names yield `None`.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as std::str::FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Expand::Before => "before",
            Expand::After => "after",
            Expand::Both => "both",
            Expand::None => "none",
        }
    }
}

// ============================================================================
// Value conversions
// ============================================================================

pub(crate) fn to_am_prop(prop: &Prop) -> am::Prop {
    match prop {
        Prop::Key(k) => am::Prop::Map(k.clone()),
        Prop::Index(i) => am::Prop::Seq(*i),
    }
}

fn from_am_prop(prop: &am::Prop) -> EngineProp {
    match prop {
        am::Prop::Map(k) => EngineProp::Key(k.clone()),
        am::Prop::Seq(i) => EngineProp::Index(*i as u64),
    }
}

pub(crate) fn to_am_obj_type(kind: ObjType) -> am::ObjType {
    match kind {
        ObjType::Map => am::ObjType::Map,
        ObjType::List => am::ObjType::List,
        ObjType::Text => am::ObjType::Text,
    }
}

pub(crate) fn from_am_obj_type(kind: am::ObjType) -> ObjType {
    match kind {
        am::ObjType::Map | am::ObjType::Table => ObjType::Map,
        am::ObjType::List => ObjType::List,
        am::ObjType::Text => ObjType::Text,
    }
}

pub(crate) fn to_am_scalar(value: &ScalarValue) -> am::ScalarValue {
    match value {
        ScalarValue::Str(s) => am::ScalarValue::Str(s.as_str().into()),
        ScalarValue::Int(n) => am::ScalarValue::Int(*n),
        ScalarValue::Uint(n) => am::ScalarValue::Uint(*n),
        ScalarValue::F64(n) => am::ScalarValue::F64(*n),
        ScalarValue::Boolean(b) => am::ScalarValue::Boolean(*b),
        ScalarValue::Null => am::ScalarValue::Null,
        ScalarValue::Bytes(b) => am::ScalarValue::Bytes(b.clone()),
        ScalarValue::Timestamp(t) => am::ScalarValue::Timestamp(*t),
        ScalarValue::Counter(n) => am::ScalarValue::counter(*n),
        ScalarValue::Unknown { type_code, bytes } => am::ScalarValue::Unknown {
            type_code: *type_code,
            bytes: bytes.clone(),
        },
    }
}

pub(crate) fn from_am_scalar(value: &am::ScalarValue) -> ScalarValue {
    match value {
        am::ScalarValue::Str(s) => ScalarValue::Str(s.to_string()),
        am::ScalarValue::Int(n) => ScalarValue::Int(*n),
        am::ScalarValue::Uint(n) => ScalarValue::Uint(*n),
        am::ScalarValue::F64(n) => ScalarValue::F64(*n),
        am::ScalarValue::Boolean(b) => ScalarValue::Boolean(*b),
        am::ScalarValue::Null => ScalarValue::Null,
        am::ScalarValue::Bytes(b) => ScalarValue::Bytes(b.clone()),
        am::ScalarValue::Timestamp(t) => ScalarValue::Timestamp(*t),
        am::ScalarValue::Counter(c) => ScalarValue::Counter(i64::from(c)),
        am::ScalarValue::Unknown { type_code, bytes } => ScalarValue::Unknown {
            type_code: *type_code,
            bytes: bytes.clone(),
        },
    }
}

fn tagged(value: &am::Value<'_>, id: &am::ObjId) -> TaggedValue {
    match value {
        am::Value::Object(kind) => TaggedValue::Object {
            kind: from_am_obj_type(*kind),
            id: from_am_obj(id),
        },
        am::Value::Scalar(s) => TaggedValue::Scalar(from_am_scalar(s)),
    }
}

fn engine_mark(mark: &Mark<'_>) -> EngineMark {
    EngineMark {
        start: mark.start as u64,
        end: mark.end as u64,
        name: mark.name().to_string(),
        value: from_am_scalar(mark.value()),
    }
}

fn convert_patch(patch: am::Patch) -> EnginePatch {
    let path = patch
        .path
        .iter()
        .map(|(obj, prop)| PathElement {
            obj: from_am_obj(obj),
            prop: from_am_prop(prop),
        })
        .collect();

    let action = match patch.action {
        am::PatchAction::PutMap { key, value, conflict } => EngineAction::Put {
            prop: EngineProp::Key(key),
            value: tagged(&value.0, &value.1),
            conflict,
        },
        am::PatchAction::PutSeq { index, value, conflict } => EngineAction::Put {
            prop: EngineProp::Index(index as u64),
            value: tagged(&value.0, &value.1),
            conflict,
        },
        am::PatchAction::Insert { index, values, .. } => EngineAction::Insert {
            index: index as u64,
            values: values.iter().map(|entry| tagged(&entry.0, &entry.1)).collect(),
        },
        am::PatchAction::SpliceText { index, value, marks } => EngineAction::SpliceText {
            index: index as u64,
            value: value.make_string(),
            marks: marks
                .map(|set| {
                    set.iter()
                        .map(|(name, v)| (name.to_string(), from_am_scalar(v)))
                        .collect()
                })
                .unwrap_or_default(),
        },
        am::PatchAction::Increment { prop, value } => EngineAction::Increment {
            prop: from_am_prop(&prop),
            value,
        },
        am::PatchAction::Conflict { prop } => EngineAction::Conflict {
            prop: from_am_prop(&prop),
        },
        am::PatchAction::DeleteMap { key } => EngineAction::DeleteMap { key },
        am::PatchAction::DeleteSeq { index, length } => EngineAction::DeleteSeq {
            index: index as u64,
            length: length as u64,
        },
        am::PatchAction::Mark { marks } => EngineAction::Marks {
            marks: marks.iter().map(engine_mark).collect(),
        },
        #[allow(unreachable_patterns)]
        _ => EngineAction::Other,
    };

    EnginePatch {
        obj: from_am_obj(&patch.obj),
        path,
        action,
    }
}

fn load_err(e: impl std::fmt::Display) -> CrdtError {
    CrdtError::Load(e.to_string())
}

/// Decode a single change's metadata.
pub fn decode_change(bytes: &[u8]) -> Result<DecodedChange> {
    let change = am::Change::from_bytes(bytes.to_vec()).map_err(load_err)?;
    Ok(DecodedChange {
        hash: from_am_hash(&change.hash()),
        actor: from_am_actor(change.actor_id()),
        seq: change.seq(),
        start_op: u64::from(change.start_op()),
        time: change.timestamp(),
        message: change.message().map(|m| m.to_string()).unwrap_or_default(),
        deps: from_am_heads(change.deps()),
        ops: Vec::new(),
    })
}

// ============================================================================
// EngineDoc
// ============================================================================

/// One engine document handle.
pub struct EngineDoc {
    doc: AutoCommit,
}

impl EngineDoc {
    pub fn new(actor: Option<&ActorId>) -> Self {
        let mut doc = AutoCommit::new();
        if let Some(actor) = actor {
            doc.set_actor(to_am_actor(actor));
        }
        Self { doc }
    }

    pub fn load(bytes: &[u8], actor: Option<&ActorId>) -> Result<Self> {
        let mut doc = AutoCommit::load(bytes).map_err(load_err)?;
        if let Some(actor) = actor {
            doc.set_actor(to_am_actor(actor));
        }
        Ok(Self { doc })
    }

    /// Independent copy at the current state.
    pub fn fork(&mut self, actor: Option<&ActorId>) -> Self {
        let mut doc = self.doc.fork();
        if let Some(actor) = actor {
            doc.set_actor(to_am_actor(actor));
        }
        Self { doc }
    }

    /// Independent copy at a historical state.
    pub fn fork_at(&mut self, heads: &[ChangeHash], actor: Option<&ActorId>) -> Result<Self> {
        let mut doc = self.doc.fork_at(&to_am_heads(heads))?;
        if let Some(actor) = actor {
            doc.set_actor(to_am_actor(actor));
        }
        Ok(Self { doc })
    }

    pub fn actor(&self) -> ActorId {
        from_am_actor(self.doc.get_actor())
    }

    /// Current heads. Closes any open transaction.
    pub fn heads(&mut self) -> Vec<ChangeHash> {
        from_am_heads(&self.doc.get_heads())
    }

    // ── Transactions ────────────────────────────────────────────────────────

    fn commit_options(message: Option<&str>, time: Option<i64>) -> CommitOptions {
        let mut options = CommitOptions::default();
        if let Some(message) = message {
            options = options.with_message(message.to_string());
        }
        if let Some(time) = time {
            options = options.with_time(time);
        }
        options
    }

    /// Commit pending operations. `None` when nothing was pending.
    pub fn commit(&mut self, message: Option<&str>, time: Option<i64>) -> Option<ChangeHash> {
        self.doc
            .commit_with(Self::commit_options(message, time))
            .map(|h| from_am_hash(&h))
    }

    /// Commit a change with no operations.
    pub fn empty_change(&mut self, message: Option<&str>, time: Option<i64>) -> ChangeHash {
        from_am_hash(&self.doc.empty_change(Self::commit_options(message, time)))
    }

    pub fn pending_ops(&self) -> usize {
        self.doc.pending_ops()
    }

    pub fn rollback(&mut self) -> usize {
        self.doc.rollback()
    }

    // ── Mutation ────────────────────────────────────────────────────────────

    pub fn put(&mut self, obj: &ObjId, prop: &Prop, value: &ScalarValue) -> Result<()> {
        self.doc.put(to_am_obj(obj)?, to_am_prop(prop), to_am_scalar(value))?;
        Ok(())
    }

    pub fn put_object(&mut self, obj: &ObjId, prop: &Prop, kind: ObjType) -> Result<ObjId> {
        let id = self
            .doc
            .put_object(to_am_obj(obj)?, to_am_prop(prop), to_am_obj_type(kind))?;
        Ok(from_am_obj(&id))
    }

    pub fn insert(&mut self, obj: &ObjId, index: usize, value: &ScalarValue) -> Result<()> {
        self.doc.insert(to_am_obj(obj)?, index, to_am_scalar(value))?;
        Ok(())
    }

    pub fn insert_object(&mut self, obj: &ObjId, index: usize, kind: ObjType) -> Result<ObjId> {
        let id = self
            .doc
            .insert_object(to_am_obj(obj)?, index, to_am_obj_type(kind))?;
        Ok(from_am_obj(&id))
    }

    pub fn delete(&mut self, obj: &ObjId, prop: &Prop) -> Result<()> {
        self.doc.delete(to_am_obj(obj)?, to_am_prop(prop))?;
        Ok(())
    }

    pub fn increment(&mut self, obj: &ObjId, prop: &Prop, by: i64) -> Result<()> {
        self.doc.increment(to_am_obj(obj)?, to_am_prop(prop), by)?;
        Ok(())
    }

    /// Whether the current value at `prop` is a counter.
    pub fn holds_counter(&self, obj: &ObjId, prop: &Prop) -> bool {
        let Ok(id) = to_am_obj(obj) else {
            return false;
        };
        matches!(
            self.doc.get(&id, to_am_prop(prop)),
            Ok(Some((am::Value::Scalar(s), _))) if matches!(*s, am::ScalarValue::Counter(_))
        )
    }

    pub fn splice(&mut self, obj: &ObjId, start: usize, delete: usize, values: &[ScalarValue]) -> Result<()> {
        self.doc.splice(
            to_am_obj(obj)?,
            start,
            delete as isize,
            values.iter().map(to_am_scalar),
        )?;
        Ok(())
    }

    pub fn splice_text(&mut self, obj: &ObjId, start: usize, delete: usize, text: &str) -> Result<()> {
        self.doc
            .splice_text(to_am_obj(obj)?, start, delete as isize, text)?;
        Ok(())
    }

    /// Replace the whole text, letting the engine compute a minimal edit.
    pub fn update_text(&mut self, obj: &ObjId, text: &str) -> Result<()> {
        let id = to_am_obj(obj)?;
        self.doc.update_text(&id, text)?;
        Ok(())
    }

    pub fn mark(
        &mut self,
        obj: &ObjId,
        start: usize,
        end: usize,
        expand: Expand,
        name: &str,
        value: &ScalarValue,
    ) -> Result<()> {
        let expand = match expand {
            Expand::Before => ExpandMark::Before,
            Expand::After => ExpandMark::After,
            Expand::Both => ExpandMark::Both,
            Expand::None => ExpandMark::None,
        };
        let mark = Mark::new(name.to_string(), to_am_scalar(value), start, end);
        self.doc.mark(to_am_obj(obj)?, mark, expand)?;
        Ok(())
    }

    // ── Query ───────────────────────────────────────────────────────────────

    pub fn get(&self, obj: &ObjId, prop: &Prop, heads: Option<&[ChangeHash]>) -> Result<Option<TaggedValue>> {
        let id = to_am_obj(obj)?;
        let prop = to_am_prop(prop);
        let found = match heads {
            Some(heads) => self.doc.get_at(&id, prop, &to_am_heads(heads))?,
            None => self.doc.get(&id, prop)?,
        };
        Ok(found.map(|(value, id)| tagged(&value, &id)))
    }

    pub fn get_all(&self, obj: &ObjId, prop: &Prop, heads: Option<&[ChangeHash]>) -> Result<Vec<TaggedValue>> {
        let id = to_am_obj(obj)?;
        let prop = to_am_prop(prop);
        let found = match heads {
            Some(heads) => self.doc.get_all_at(&id, prop, &to_am_heads(heads))?,
            None => self.doc.get_all(&id, prop)?,
        };
        Ok(found.iter().map(|(value, id)| tagged(value, id)).collect())
    }

    pub fn keys(&self, obj: &ObjId, heads: Option<&[ChangeHash]>) -> Result<Vec<String>> {
        let id = to_am_obj(obj)?;
        Ok(match heads {
            Some(heads) => self.doc.keys_at(&id, &to_am_heads(heads)).collect(),
            None => self.doc.keys(&id).collect(),
        })
    }

    pub fn length(&self, obj: &ObjId, heads: Option<&[ChangeHash]>) -> Result<usize> {
        let id = to_am_obj(obj)?;
        Ok(match heads {
            Some(heads) => self.doc.length_at(&id, &to_am_heads(heads)),
            None => self.doc.length(&id),
        })
    }

    pub fn text(&self, obj: &ObjId, heads: Option<&[ChangeHash]>) -> Result<String> {
        let id = to_am_obj(obj)?;
        Ok(match heads {
            Some(heads) => self.doc.text_at(&id, &to_am_heads(heads))?,
            None => self.doc.text(&id)?,
        })
    }

    pub fn object_type(&self, obj: &ObjId) -> Result<ObjType> {
        let id = to_am_obj(obj)?;
        Ok(from_am_obj_type(self.doc.object_type(&id)?))
    }

    pub fn marks(&self, obj: &ObjId, heads: Option<&[ChangeHash]>) -> Result<Vec<EngineMark>> {
        let id = to_am_obj(obj)?;
        let marks = match heads {
            Some(heads) => self.doc.marks_at(&id, &to_am_heads(heads))?,
            None => self.doc.marks(&id)?,
        };
        Ok(marks.iter().map(engine_mark).collect())
    }

    pub fn cursor(&self, obj: &ObjId, index: usize, heads: Option<&[ChangeHash]>) -> Result<Cursor> {
        let id = to_am_obj(obj)?;
        let heads = heads.map(to_am_heads);
        let cursor = self.doc.get_cursor(&id, index, heads.as_deref())?;
        Ok(from_am_cursor(&cursor))
    }

    pub fn cursor_position(&self, obj: &ObjId, cursor: &Cursor, heads: Option<&[ChangeHash]>) -> Result<usize> {
        let id = to_am_obj(obj)?;
        let cursor = to_am_cursor(cursor)?;
        let heads = heads.map(to_am_heads);
        Ok(self.doc.get_cursor_position(&id, &cursor, heads.as_deref())?)
    }

    // ── Diff ────────────────────────────────────────────────────────────────

    /// Patches that take the document from `before` to `after`, in engine order.
    pub fn diff(&mut self, before: &[ChangeHash], after: &[ChangeHash]) -> Vec<EnginePatch> {
        self.doc
            .diff(&to_am_heads(before), &to_am_heads(after))
            .into_iter()
            .map(convert_patch)
            .collect()
    }

    // ── Persistence ─────────────────────────────────────────────────────────

    pub fn save(&mut self) -> Vec<u8> {
        self.doc.save()
    }

    pub fn save_nocompress(&mut self) -> Vec<u8> {
        self.doc.save_nocompress()
    }

    /// Changes since the previous save or incremental save.
    pub fn save_incremental(&mut self) -> Vec<u8> {
        self.doc.save_incremental()
    }

    pub fn save_after(&mut self, heads: &[ChangeHash]) -> Vec<u8> {
        self.doc.save_after(&to_am_heads(heads))
    }

    /// Returns the number of operations applied.
    pub fn load_incremental(&mut self, bytes: &[u8]) -> Result<usize> {
        self.doc.load_incremental(bytes).map_err(load_err)
    }

    // ── Changes ─────────────────────────────────────────────────────────────

    pub fn apply_changes<I, B>(&mut self, changes: I) -> Result<()>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let decoded = changes
            .into_iter()
            .map(|bytes| am::Change::from_bytes(bytes.as_ref().to_vec()).map_err(load_err))
            .collect::<Result<Vec<_>>>()?;
        self.doc.apply_changes(decoded)?;
        Ok(())
    }

    /// Encoded changes not reachable from `have_deps`, one buffer per change.
    pub fn changes_since(&mut self, have_deps: &[ChangeHash]) -> Vec<Vec<u8>> {
        self.doc
            .get_changes(&to_am_heads(have_deps))
            .iter()
            .map(|c| c.raw_bytes().to_vec())
            .collect()
    }

    /// Encoded changes `other` has that this document does not.
    pub fn changes_added(&mut self, other: &mut EngineDoc) -> Vec<Vec<u8>> {
        self.doc
            .get_changes_added(&mut other.doc)
            .iter()
            .map(|c| c.raw_bytes().to_vec())
            .collect()
    }

    pub fn last_local_change(&mut self) -> Option<Vec<u8>> {
        self.doc
            .get_last_local_change()
            .map(|c| c.raw_bytes().to_vec())
    }

    /// Dependencies referenced by applied changes but not present locally.
    pub fn missing_deps(&mut self, heads: &[ChangeHash]) -> Vec<ChangeHash> {
        from_am_heads(&self.doc.get_missing_deps(&to_am_heads(heads)))
    }

    pub fn merge(&mut self, other: &mut EngineDoc) -> Result<()> {
        self.doc.merge(&mut other.doc)?;
        Ok(())
    }

    // ── Sync ────────────────────────────────────────────────────────────────

    pub fn generate_sync_message(&mut self, state: &mut am::sync::State) -> Option<Vec<u8>> {
        self.doc
            .sync()
            .generate_sync_message(state)
            .map(|msg| msg.encode())
    }

    pub fn receive_sync_message(&mut self, state: &mut am::sync::State, message: &[u8]) -> Result<()> {
        let message = am::sync::Message::decode(message).map_err(load_err)?;
        self.doc.sync().receive_sync_message(state, message)?;
        Ok(())
    }
}

impl std::fmt::Debug for EngineDoc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EngineDoc({})", self.actor().short())
    }
}
