//! Engine-side identifier conversions.
//!
//! The string forms live in `utsushi_types::ids`. This module knows which
//! bytes the engine uses for the root object and moves identifiers across the
//! binding boundary.

use std::sync::OnceLock;

use automerge as am;
use utsushi_types::{ActorId, ChangeHash, Cursor, IdError, ObjId, ObjRef};

use crate::Result;

static ROOT_BYTES: OnceLock<Vec<u8>> = OnceLock::new();

/// Byte form of the engine's root object id, computed once per process.
pub fn root_bytes() -> &'static [u8] {
    ROOT_BYTES.get_or_init(|| am::ROOT.to_bytes())
}

/// Raw root object id.
pub fn root() -> ObjId {
    ObjId::from_bytes(root_bytes())
}

/// Host reference for a raw object id. Root bytes collapse to [`ObjRef::Root`].
pub fn obj_ref(id: &ObjId) -> ObjRef {
    if id.as_bytes() == root_bytes() {
        ObjRef::Root
    } else {
        ObjRef::Object(id.clone())
    }
}

/// Raw object id for a host reference.
pub fn obj_id(r: &ObjRef) -> ObjId {
    match r {
        ObjRef::Root => root(),
        ObjRef::Object(id) => id.clone(),
    }
}

/// Parse a token straight to a raw object id.
pub fn parse_obj(token: &str) -> Result<ObjId> {
    Ok(obj_id(&ObjRef::parse(token)?))
}

/// Render a raw object id as its token.
pub fn obj_token(id: &ObjId) -> String {
    obj_ref(id).to_token()
}

// ── Binding conversions ─────────────────────────────────────────────────────

pub(crate) fn to_am_obj(id: &ObjId) -> Result<am::ObjId> {
    am::ObjId::try_from(id.as_bytes())
        .map_err(|_| IdError::InvalidObjectToken(obj_token(id)).into())
}

pub(crate) fn from_am_obj(id: &am::ObjId) -> ObjId {
    ObjId::from_bytes(id.to_bytes())
}

pub(crate) fn to_am_hash(hash: &ChangeHash) -> am::ChangeHash {
    am::ChangeHash(*hash.as_bytes())
}

pub(crate) fn from_am_hash(hash: &am::ChangeHash) -> ChangeHash {
    ChangeHash::from_array(hash.0)
}

pub(crate) fn to_am_heads(heads: &[ChangeHash]) -> Vec<am::ChangeHash> {
    heads.iter().map(to_am_hash).collect()
}

pub(crate) fn from_am_heads(heads: &[am::ChangeHash]) -> Vec<ChangeHash> {
    heads.iter().map(from_am_hash).collect()
}

pub(crate) fn to_am_actor(actor: &ActorId) -> am::ActorId {
    am::ActorId::from(actor.as_bytes())
}

pub(crate) fn from_am_actor(actor: &am::ActorId) -> ActorId {
    ActorId::from_bytes(actor.to_bytes())
}

pub(crate) fn to_am_cursor(cursor: &Cursor) -> Result<am::Cursor> {
    am::Cursor::try_from(cursor.as_bytes().to_vec())
        .map_err(|_| IdError::InvalidCursorToken(cursor.to_token()).into())
}

pub(crate) fn from_am_cursor(cursor: &am::Cursor) -> Cursor {
    Cursor::from_bytes(cursor.to_bytes())
}
