//! Per-peer sync state.
//!
//! One [`SyncState`] tracks the conversation with one remote peer. It is
//! opaque to callers apart from its head sets; the protocol itself belongs to
//! the engine.

use std::collections::BTreeSet;

use automerge::sync;
use serde::{Deserialize, Serialize};
use utsushi_types::ChangeHash;

use crate::ids::{from_am_hash, from_am_heads, to_am_hash, to_am_heads};
use crate::{CrdtError, Result};

/// Sync progress with one peer.
#[derive(Clone)]
pub struct SyncState {
    pub(crate) inner: sync::State,
}

/// Plain-data view of a sync state, for inspection and transfer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStateExport {
    pub shared_heads: Vec<ChangeHash>,
    pub last_sent_heads: Vec<ChangeHash>,
    pub sent_hashes: Vec<ChangeHash>,
}

impl SyncState {
    pub fn new() -> Self {
        Self { inner: sync::State::new() }
    }

    /// Persistable form. Only the durable part of the state survives.
    pub fn encode(&self) -> Vec<u8> {
        self.inner.encode()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let inner = sync::State::decode(bytes).map_err(|e| CrdtError::Load(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Heads both sides are known to have.
    pub fn shared_heads(&self) -> Vec<ChangeHash> {
        from_am_heads(&self.inner.shared_heads)
    }

    /// Heads the peer last reported, if it has reported any.
    pub fn their_heads(&self) -> Option<Vec<ChangeHash>> {
        self.inner.their_heads.as_deref().map(from_am_heads)
    }

    pub fn export(&self) -> SyncStateExport {
        SyncStateExport {
            shared_heads: self.shared_heads(),
            last_sent_heads: from_am_heads(&self.inner.last_sent_heads),
            sent_hashes: self
                .inner
                .sent_hashes
                .iter()
                .map(from_am_hash)
                .collect(),
        }
    }

    /// Rebuild from an export. Peer-reported fields start empty and are
    /// learned again on the next exchange.
    pub fn import(export: &SyncStateExport) -> Self {
        let mut inner = sync::State::new();
        inner.shared_heads = to_am_heads(&export.shared_heads);
        inner.last_sent_heads = to_am_heads(&export.last_sent_heads);
        inner.sent_hashes = export.sent_hashes.iter().map(to_am_hash).collect::<BTreeSet<_>>();
        Self { inner }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncState")
            .field("shared_heads", &self.shared_heads())
            .field("their_heads", &self.their_heads())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_state() {
        let state = SyncState::new();
        assert!(state.shared_heads().is_empty());
        assert_eq!(state.their_heads(), None);
    }

    #[test]
    fn test_encode_decode() {
        let state = SyncState::new();
        let back = SyncState::decode(&state.encode()).unwrap();
        assert_eq!(back.shared_heads(), state.shared_heads());
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(SyncState::decode(&[0xff, 0x00]), Err(CrdtError::Load(_))));
    }

    #[test]
    fn test_export_import() {
        let export = SyncStateExport {
            shared_heads: vec![ChangeHash::from_array([1; 32])],
            last_sent_heads: vec![ChangeHash::from_array([2; 32])],
            sent_hashes: vec![ChangeHash::from_array([3; 32])],
        };
        let state = SyncState::import(&export);
        assert_eq!(state.export(), export);

        let json = serde_json::to_value(&export).unwrap();
        assert!(json.get("lastSentHeads").is_some());
    }
}
