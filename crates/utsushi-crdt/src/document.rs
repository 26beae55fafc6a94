//! Document facade over one engine handle.
//!
//! [`Document`] is the object-tree API host code programs against. Object
//! references are string tokens (`_root`, `o:<base64>`), heads are hex change
//! hashes, and values are [`HostValue`]s. All conversion goes through
//! [`crate::codec`] and [`crate::ids`]; all state lives in the engine.
//!
//! # Diff Cursor
//!
//! Each facade remembers the heads at which its consumer last observed the
//! document. [`Document::diff_incremental`] returns the patches between that
//! point and now, then advances it. Calling it twice with no mutation in
//! between yields an empty list the second time.
//!
//! # Identity
//!
//! Every facade gets a fresh [`HandleId`] at construction. Materialized arrays
//! and objects carry it (see [`NodeMeta`]) so host code can tell which facade
//! produced a value without comparing object identity.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, trace};
use utsushi_types::{
    ActorId, ChangeHash, Cursor, Datatype, DecodedChange, FullValue, HandleId, HostArray, HostObject,
    HostValue, MarkRecord, NodeMeta, ObjId, ObjType, Patch, Prop, TaggedValue, heads_from_hex,
    heads_to_hex,
};

use crate::apply;
use crate::codec::{from_scalar, from_tagged, to_scalar};
use crate::config::Config;
use crate::engine::{EngineDoc, Expand};
use crate::ids::{obj_ref, obj_token, parse_obj, root};
use crate::patch::translate_all;
use crate::proxy::MapProxy;
use crate::sync::SyncState;
use crate::{CrdtError, Result};

/// Range argument of [`Document::mark`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkRange {
    pub start: usize,
    pub end: usize,
    pub expand: Expand,
}

impl MarkRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end, expand: Expand::None }
    }

    pub fn with_expand(mut self, expand: Expand) -> Self {
        self.expand = expand;
        self
    }
}

/// Document statistics. Not tracked; always zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub num_ops: u64,
    pub num_changes: u64,
}

/// Decode an optional head set. Absent and empty both mean "current state".
fn parse_heads(heads: Option<&[String]>) -> Result<Option<Vec<ChangeHash>>> {
    match heads {
        Some(h) if !h.is_empty() => Ok(Some(heads_from_hex(h)?)),
        _ => Ok(None),
    }
}

fn parse_actor(actor: Option<&str>) -> Result<Option<ActorId>> {
    Ok(actor.map(ActorId::from_hex).transpose()?)
}

/// Object-tree facade over one engine document.
pub struct Document {
    /// Exclusively owned engine handle.
    doc: EngineDoc,

    /// Process-unique identity of this facade.
    handle: HandleId,

    config: Config,

    /// Heads at which the consumer last observed the document.
    diff_cursor: Vec<ChangeHash>,
}

impl Document {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    fn from_engine(doc: EngineDoc, config: Config) -> Self {
        let mut this = Self {
            doc,
            handle: HandleId::next(),
            config,
            diff_cursor: Vec::new(),
        };
        this.update_diff_cursor();
        debug!(handle = %this.handle, actor = %this.doc.actor(), "document opened");
        this
    }

    /// Create an empty document. `actor` is a hex actor id; random when absent.
    pub fn create(actor: Option<&str>) -> Result<Self> {
        let actor = parse_actor(actor)?;
        Ok(Self::from_engine(EngineDoc::new(actor.as_ref()), Config::default()))
    }

    /// Load a saved document.
    pub fn load(bytes: &[u8], actor: Option<&str>) -> Result<Self> {
        let actor = parse_actor(actor)?;
        let doc = EngineDoc::load(bytes, actor.as_ref())?;
        Ok(Self::from_engine(doc, Config::default()))
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn handle(&self) -> HandleId {
        self.handle
    }

    /// Independent copy at the current state, under a new handle.
    pub fn clone_doc(&mut self, actor: Option<&str>) -> Result<Document> {
        let actor = parse_actor(actor)?;
        let doc = self.doc.fork(actor.as_ref());
        debug!(from = %self.handle, "document cloned");
        Ok(Self::from_engine(doc, self.config.clone()))
    }

    /// Independent copy, optionally at historical `heads`.
    pub fn fork(&mut self, actor: Option<&str>, heads: Option<&[String]>) -> Result<Document> {
        let actor = parse_actor(actor)?;
        let doc = match parse_heads(heads)? {
            Some(heads) => self.doc.fork_at(&heads, actor.as_ref())?,
            None => self.doc.fork(actor.as_ref()),
        };
        debug!(from = %self.handle, "document forked");
        Ok(Self::from_engine(doc, self.config.clone()))
    }

    /// Release the engine handle. The handle is released on drop; this exists
    /// for callers that free explicitly and may be called any number of times.
    pub fn free(&mut self) {}

    pub fn actor_id(&self) -> String {
        self.doc.actor().to_hex()
    }

    pub fn heads(&mut self) -> Vec<String> {
        heads_to_hex(&self.doc.heads())
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Commit pending operations. Returns the new change hash, or `None` when
    /// nothing was pending.
    pub fn commit(&mut self, message: Option<&str>, time: Option<i64>) -> Option<String> {
        self.doc.commit(message, time).map(|h| h.to_hex())
    }

    /// Commit a change with no operations.
    pub fn empty_change(&mut self, message: Option<&str>, time: Option<i64>) -> String {
        self.doc.empty_change(message, time).to_hex()
    }

    pub fn pending_ops(&self) -> usize {
        self.doc.pending_ops()
    }

    /// Discard pending operations. Returns how many were discarded.
    pub fn rollback(&mut self) -> usize {
        self.doc.rollback()
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Store a scalar at `prop`. An explicit `datatype` overrides inference.
    pub fn put(
        &mut self,
        obj: &str,
        prop: impl Into<Prop>,
        value: &HostValue,
        datatype: Option<Datatype>,
    ) -> Result<()> {
        let id = parse_obj(obj)?;
        let scalar = to_scalar(value, datatype, &self.config)?;
        self.doc.put(&id, &prop.into(), &scalar)
    }

    /// Create an empty nested object at `prop`; returns its token.
    pub fn put_object(&mut self, obj: &str, prop: impl Into<Prop>, kind: ObjType) -> Result<String> {
        let id = parse_obj(obj)?;
        let child = self.doc.put_object(&id, &prop.into(), kind)?;
        Ok(obj_token(&child))
    }

    pub fn insert(
        &mut self,
        obj: &str,
        index: usize,
        value: &HostValue,
        datatype: Option<Datatype>,
    ) -> Result<()> {
        let id = parse_obj(obj)?;
        let scalar = to_scalar(value, datatype, &self.config)?;
        self.doc.insert(&id, index, &scalar)
    }

    pub fn insert_object(&mut self, obj: &str, index: usize, kind: ObjType) -> Result<String> {
        let id = parse_obj(obj)?;
        let child = self.doc.insert_object(&id, index, kind)?;
        Ok(obj_token(&child))
    }

    /// Append a scalar to a list.
    pub fn push(&mut self, obj: &str, value: &HostValue, datatype: Option<Datatype>) -> Result<()> {
        let id = parse_obj(obj)?;
        let scalar = to_scalar(value, datatype, &self.config)?;
        let len = self.doc.length(&id, None)?;
        self.doc.insert(&id, len, &scalar)
    }

    /// Append an empty nested object to a list; returns its token.
    pub fn push_object(&mut self, obj: &str, kind: ObjType) -> Result<String> {
        let id = parse_obj(obj)?;
        let len = self.doc.length(&id, None)?;
        let child = self.doc.insert_object(&id, len, kind)?;
        Ok(obj_token(&child))
    }

    pub fn delete(&mut self, obj: &str, prop: impl Into<Prop>) -> Result<()> {
        let id = parse_obj(obj)?;
        self.doc.delete(&id, &prop.into())
    }

    /// Add `by` to the counter at `prop`.
    ///
    /// Fails with [`CrdtError::NotACounter`] when the target holds anything
    /// other than a counter; the engine's error is kept as the source.
    pub fn increment(&mut self, obj: &str, prop: impl Into<Prop>, by: i64) -> Result<()> {
        let id = parse_obj(obj)?;
        let prop = prop.into();
        match self.doc.increment(&id, &prop, by) {
            Err(CrdtError::Engine(source)) if !self.doc.holds_counter(&id, &prop) => {
                Err(CrdtError::NotACounter { source })
            }
            other => other,
        }
    }

    /// Delete `delete_count` elements at `start`, then insert `text` if given.
    ///
    /// With `text` the target must be a text object; without it the call is a
    /// plain list deletion.
    pub fn splice(&mut self, obj: &str, start: usize, delete_count: usize, text: Option<&str>) -> Result<()> {
        let id = parse_obj(obj)?;
        match text {
            Some(text) => self.doc.splice_text(&id, start, delete_count, text),
            None => self.doc.splice(&id, start, delete_count, &[]),
        }
    }

    /// Replace the whole content of a text object.
    pub fn update_text(&mut self, obj: &str, text: &str) -> Result<()> {
        let id = parse_obj(obj)?;
        self.doc.update_text(&id, text)
    }

    // ========================================================================
    // Query
    // ========================================================================

    /// Winning value at `prop` as a `(datatype, value)` pair.
    pub fn get(&self, obj: &str, prop: impl Into<Prop>, heads: Option<&[String]>) -> Result<Option<FullValue>> {
        let id = parse_obj(obj)?;
        let heads = parse_heads(heads)?;
        let found = self.doc.get(&id, &prop.into(), heads.as_deref())?;
        Ok(found.as_ref().map(from_tagged))
    }

    /// Every concurrent value at `prop`, winner included.
    pub fn get_all(&self, obj: &str, prop: impl Into<Prop>, heads: Option<&[String]>) -> Result<Vec<FullValue>> {
        let id = parse_obj(obj)?;
        let heads = parse_heads(heads)?;
        let found = self.doc.get_all(&id, &prop.into(), heads.as_deref())?;
        Ok(found.iter().map(from_tagged).collect())
    }

    pub fn keys(&self, obj: &str, heads: Option<&[String]>) -> Result<Vec<String>> {
        let id = parse_obj(obj)?;
        let heads = parse_heads(heads)?;
        self.doc.keys(&id, heads.as_deref())
    }

    pub fn text(&self, obj: &str, heads: Option<&[String]>) -> Result<String> {
        let id = parse_obj(obj)?;
        let heads = parse_heads(heads)?;
        self.doc.text(&id, heads.as_deref())
    }

    pub fn length(&self, obj: &str, heads: Option<&[String]>) -> Result<usize> {
        let id = parse_obj(obj)?;
        let heads = parse_heads(heads)?;
        self.doc.length(&id, heads.as_deref())
    }

    pub fn object_type(&self, obj: &str) -> Result<ObjType> {
        let id = parse_obj(obj)?;
        self.doc.object_type(&id)
    }

    // ========================================================================
    // Materialization
    // ========================================================================

    /// Plain snapshot of `obj` (the root when absent), optionally at `heads`.
    ///
    /// Text objects become strings. Arrays and objects are annotated with this
    /// facade's handle unless [`Config::annotate`] is off.
    pub fn materialize(&self, obj: Option<&str>, heads: Option<&[String]>) -> Result<HostValue> {
        let id = match obj {
            Some(token) => parse_obj(token)?,
            None => root(),
        };
        let heads = parse_heads(heads)?;
        let kind = self.doc.object_type(&id)?;
        self.materialize_node(&id, kind, heads.as_deref())
    }

    /// Current snapshot of `obj` (the root when absent).
    pub fn to_js(&self, obj: Option<&str>) -> Result<HostValue> {
        self.materialize(obj, None)
    }

    fn materialize_node(&self, id: &ObjId, kind: ObjType, heads: Option<&[ChangeHash]>) -> Result<HostValue> {
        let mut value = match kind {
            ObjType::Text => return Ok(HostValue::String(self.doc.text(id, heads)?)),
            ObjType::Map => {
                let mut entries = IndexMap::new();
                for key in self.doc.keys(id, heads)? {
                    if let Some(v) = self.doc.get(id, &Prop::Key(key.clone()), heads)? {
                        entries.insert(key, self.materialize_value(&v, heads)?);
                    }
                }
                HostValue::Object(HostObject { entries, meta: None })
            }
            ObjType::List => {
                let len = self.doc.length(id, heads)?;
                let mut items = Vec::with_capacity(len);
                for i in 0..len {
                    items.push(match self.doc.get(id, &Prop::Index(i), heads)? {
                        Some(v) => self.materialize_value(&v, heads)?,
                        None => HostValue::Undefined,
                    });
                }
                HostValue::Array(HostArray { items, meta: None })
            }
        };
        self.annotate(&mut value, id);
        Ok(value)
    }

    fn materialize_value(&self, value: &TaggedValue, heads: Option<&[ChangeHash]>) -> Result<HostValue> {
        match value {
            TaggedValue::Object { kind, id } => self.materialize_node(id, *kind, heads),
            TaggedValue::Scalar(s) => Ok(from_scalar(s)),
        }
    }

    fn annotate(&self, value: &mut HostValue, id: &ObjId) {
        if self.config.annotate {
            value.set_meta(NodeMeta {
                handle: self.handle,
                object: obj_ref(id),
            });
        }
    }

    // ========================================================================
    // Incremental diff
    // ========================================================================

    /// Mark the current state as observed.
    pub fn update_diff_cursor(&mut self) {
        self.diff_cursor = self.doc.heads();
    }

    /// Patches since the last observation, in engine order; advances the
    /// cursor to the current heads.
    pub fn diff_incremental(&mut self) -> Vec<Patch> {
        let after = self.doc.heads();
        let before = std::mem::replace(&mut self.diff_cursor, after.clone());
        if before == after {
            return Vec::new();
        }
        let patches = translate_all(self.doc.diff(&before, &after));
        trace!(handle = %self.handle, count = patches.len(), "incremental diff");
        patches
    }

    /// Patches between two explicit head sets. Does not touch the cursor.
    pub fn diff(&mut self, before: &[String], after: &[String]) -> Result<Vec<Patch>> {
        let before = heads_from_hex(before)?;
        let after = heads_from_hex(after)?;
        Ok(translate_all(self.doc.diff(&before, &after)))
    }

    /// Fold the incremental diff into `snapshot` and return it.
    pub fn apply_patches(&mut self, snapshot: HostValue) -> HostValue {
        self.apply_and_return_patches(snapshot).0
    }

    /// Like [`Document::apply_patches`], also returning the patches applied.
    pub fn apply_and_return_patches(&mut self, mut snapshot: HostValue) -> (HostValue, Vec<Patch>) {
        let patches = self.diff_incremental();
        apply::apply_patches(&mut snapshot, &patches);
        self.annotate(&mut snapshot, &root());
        (snapshot, patches)
    }

    /// Patches from `before` to the current heads.
    fn patches_since(&mut self, before: &[ChangeHash]) -> Vec<Patch> {
        let after = self.doc.heads();
        if before == after.as_slice() {
            return Vec::new();
        }
        translate_all(self.doc.diff(before, &after))
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn save(&mut self) -> Vec<u8> {
        self.doc.save()
    }

    pub fn save_no_compress(&mut self) -> Vec<u8> {
        self.doc.save_nocompress()
    }

    /// Save, then load the bytes back and check they reproduce the heads.
    pub fn save_and_verify(&mut self) -> Result<Vec<u8>> {
        let bytes = self.doc.save();
        let mut check = EngineDoc::load(&bytes, None)?;
        if check.heads() != self.doc.heads() {
            return Err(CrdtError::Load("saved document does not reproduce current heads".into()));
        }
        Ok(bytes)
    }

    /// Changes since the previous save or incremental save.
    pub fn save_incremental(&mut self) -> Vec<u8> {
        self.doc.save_incremental()
    }

    /// Changes not reachable from `heads`.
    pub fn save_since(&mut self, heads: &[String]) -> Result<Vec<u8>> {
        let heads = heads_from_hex(heads)?;
        Ok(self.doc.save_after(&heads))
    }

    /// Apply saved or incremental bytes. Returns the number of operations applied.
    pub fn load_incremental(&mut self, bytes: &[u8]) -> Result<usize> {
        self.doc.load_incremental(bytes)
    }

    // ========================================================================
    // Changes
    // ========================================================================

    pub fn apply_changes<I, B>(&mut self, changes: I) -> Result<()>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        self.doc.apply_changes(changes)
    }

    /// Encoded changes not reachable from `have_deps`, one buffer per change.
    pub fn get_changes(&mut self, have_deps: &[String]) -> Result<Vec<Vec<u8>>> {
        let have_deps = heads_from_hex(have_deps)?;
        Ok(self.doc.changes_since(&have_deps))
    }

    /// Encoded changes `other` has that this document lacks.
    pub fn get_changes_added(&mut self, other: &mut Document) -> Vec<Vec<u8>> {
        self.doc.changes_added(&mut other.doc)
    }

    pub fn get_last_local_change(&mut self) -> Option<Vec<u8>> {
        self.doc.last_local_change()
    }

    pub fn get_missing_deps(&mut self, heads: &[String]) -> Result<Vec<String>> {
        let heads = heads_from_hex(heads)?;
        Ok(heads_to_hex(&self.doc.missing_deps(&heads)))
    }

    // ========================================================================
    // Sync and merge
    // ========================================================================

    /// Next message for the peer behind `state`, or `None` when in sync.
    pub fn generate_sync_message(&mut self, state: &mut SyncState) -> Option<Vec<u8>> {
        self.doc.generate_sync_message(&mut state.inner)
    }

    pub fn receive_sync_message(&mut self, state: &mut SyncState, message: &[u8]) -> Result<()> {
        self.doc.receive_sync_message(&mut state.inner, message)
    }

    /// Receive a message and return the patches it caused. The diff cursor is
    /// left where it was.
    pub fn receive_sync_message_with_patches(&mut self, state: &mut SyncState, message: &[u8]) -> Result<Vec<Patch>> {
        let before = self.doc.heads();
        self.doc.receive_sync_message(&mut state.inner, message)?;
        Ok(self.patches_since(&before))
    }

    /// Merge every change from `other`.
    pub fn merge(&mut self, other: &mut Document) -> Result<()> {
        self.doc.merge(&mut other.doc)?;
        debug!(into = %self.handle, from = %other.handle, "documents merged");
        Ok(())
    }

    /// Merge and return the patches it caused. The diff cursor is left where
    /// it was.
    pub fn merge_with_patches(&mut self, other: &mut Document) -> Result<Vec<Patch>> {
        let before = self.doc.heads();
        self.merge(other)?;
        Ok(self.patches_since(&before))
    }

    // ========================================================================
    // Marks and cursors
    // ========================================================================

    /// Mark `[range.start, range.end)` of a text object.
    pub fn mark(&mut self, obj: &str, range: MarkRange, name: &str, value: &HostValue) -> Result<()> {
        let id = parse_obj(obj)?;
        let scalar = to_scalar(value, None, &self.config)?;
        self.doc.mark(&id, range.start, range.end, range.expand, name, &scalar)
    }

    pub fn marks(&self, obj: &str, heads: Option<&[String]>) -> Result<Vec<MarkRecord>> {
        let id = parse_obj(obj)?;
        let heads = parse_heads(heads)?;
        Ok(self
            .doc
            .marks(&id, heads.as_deref())?
            .into_iter()
            .map(|m| MarkRecord {
                start: m.start as usize,
                end: m.end as usize,
                name: m.name,
                value: from_scalar(&m.value),
            })
            .collect())
    }

    /// Stable position token for `index` inside a list or text object.
    pub fn get_cursor(&self, obj: &str, index: usize, heads: Option<&[String]>) -> Result<String> {
        let id = parse_obj(obj)?;
        let heads = parse_heads(heads)?;
        Ok(self.doc.cursor(&id, index, heads.as_deref())?.to_token())
    }

    /// Current index of a cursor token.
    pub fn get_cursor_position(&self, obj: &str, cursor: &str, heads: Option<&[String]>) -> Result<usize> {
        let id = parse_obj(obj)?;
        let cursor = Cursor::from_token(cursor)?;
        let heads = parse_heads(heads)?;
        self.doc.cursor_position(&id, &cursor, heads.as_deref())
    }

    // ========================================================================
    // Proxies
    // ========================================================================

    /// Writable proxy over the root map.
    pub fn root_proxy(&mut self) -> MapProxy<'_> {
        MapProxy::new(self, root(), Vec::new())
    }

    pub(crate) fn engine(&self) -> &EngineDoc {
        &self.doc
    }

    pub(crate) fn engine_mut(&mut self) -> &mut EngineDoc {
        &mut self.doc
    }

    // ========================================================================
    // Unsupported surface
    // ========================================================================

    pub fn unmark(&mut self, _obj: &str, _range: MarkRange, _name: &str) -> Result<()> {
        Err(CrdtError::NotImplemented("unmark"))
    }

    pub fn split_block(&mut self, _obj: &str, _index: usize) -> Result<String> {
        Err(CrdtError::NotImplemented("split_block"))
    }

    pub fn join_block(&mut self, _obj: &str, _index: usize) -> Result<()> {
        Err(CrdtError::NotImplemented("join_block"))
    }

    pub fn save_bundle(&mut self, _hashes: &[String]) -> Result<Vec<u8>> {
        Err(CrdtError::NotImplemented("save_bundle"))
    }

    pub fn spans(&self, _obj: &str, _heads: Option<&[String]>) -> Vec<HostValue> {
        Vec::new()
    }

    pub fn get_block(&self, _obj: &str, _index: usize) -> Option<HostValue> {
        None
    }

    pub fn update_block(&mut self, _obj: &str, _index: usize, _block: &HostValue) {}

    pub fn update_spans(&mut self, _obj: &str, _spans: &[HostValue]) {}

    pub fn topo_history_traversal(&self) -> Vec<String> {
        Vec::new()
    }

    pub fn get_changes_meta(&self, _have_deps: &[String]) -> Vec<DecodedChange> {
        Vec::new()
    }

    pub fn get_change_meta_by_hash(&self, _hash: &str) -> Option<DecodedChange> {
        None
    }

    pub fn get_decoded_change_by_hash(&self, _hash: &str) -> Option<DecodedChange> {
        None
    }

    pub fn has_our_changes(&self, _state: &SyncState) -> bool {
        false
    }

    pub fn stats(&self) -> Stats {
        Stats::default()
    }

    pub fn isolate(&mut self, _heads: &[String]) {}

    pub fn integrate(&mut self) {}

    pub fn dump(&self) {}
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Document({})", self.handle)
    }
}

// ============================================================================
// Tests
// ============================================================================
