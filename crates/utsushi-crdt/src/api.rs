//! Free-function entry points.
//!
//! Module-level surface for callers that expect a library object rather than
//! methods: construction, change decoding and sync-state helpers. Codec entry
//! points the engine binding does not expose fail with
//! [`CrdtError::NotImplemented`].

use serde::Serialize;
use utsushi_types::DecodedChange;

use crate::document::Document;
use crate::sync::{SyncState, SyncStateExport};
use crate::{CrdtError, Result};

/// Which backend is serving the API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReleaseInfo {
    pub backend: &'static str,
    pub version: &'static str,
}

pub fn create(actor: Option<&str>) -> Result<Document> {
    Document::create(actor)
}

pub fn load(bytes: &[u8], actor: Option<&str>) -> Result<Document> {
    Document::load(bytes, actor)
}

/// Metadata of one encoded change.
pub fn decode_change(bytes: &[u8]) -> Result<DecodedChange> {
    crate::engine::decode_change(bytes)
}

pub fn init_sync_state() -> SyncState {
    SyncState::new()
}

pub fn encode_sync_state(state: &SyncState) -> Vec<u8> {
    state.encode()
}

pub fn decode_sync_state(bytes: &[u8]) -> Result<SyncState> {
    SyncState::decode(bytes)
}

pub fn export_sync_state(state: &SyncState) -> SyncStateExport {
    state.export()
}

pub fn import_sync_state(export: &SyncStateExport) -> SyncState {
    SyncState::import(export)
}

pub fn release_info() -> ReleaseInfo {
    ReleaseInfo {
        backend: "native-rust",
        version: env!("CARGO_PKG_VERSION"),
    }
}

pub fn encode_change(_change: &DecodedChange) -> Result<Vec<u8>> {
    Err(CrdtError::NotImplemented("encode_change"))
}

pub fn encode_sync_message(_message: &serde_json::Value) -> Result<Vec<u8>> {
    Err(CrdtError::NotImplemented("encode_sync_message"))
}

pub fn decode_sync_message(_bytes: &[u8]) -> Result<serde_json::Value> {
    Err(CrdtError::NotImplemented("decode_sync_message"))
}

pub fn read_bundle(_bytes: &[u8]) -> Result<serde_json::Value> {
    Err(CrdtError::NotImplemented("read_bundle"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_info() {
        let info = release_info();
        assert_eq!(info.backend, "native-rust");
        assert!(!info.version.is_empty());
    }

    #[test]
    fn test_decode_change_of_last_local_change() {
        let mut doc = create(Some("beef")).unwrap();
        doc.put("_root", "k", &"v".into(), None).unwrap();
        let hash = doc.commit(Some("hello"), Some(42)).unwrap();

        let bytes = doc.get_last_local_change().unwrap();
        let change = decode_change(&bytes).unwrap();
        assert_eq!(change.hash.to_hex(), hash);
        assert_eq!(change.actor.to_hex(), "beef");
        assert_eq!(change.seq, 1);
        assert_eq!(change.start_op, 1);
        assert_eq!(change.time, 42);
        assert_eq!(change.message, "hello");
        assert!(change.deps.is_empty());
    }

    #[test]
    fn test_decode_change_garbage() {
        assert!(matches!(decode_change(b"junk"), Err(CrdtError::Load(_))));
    }

    #[test]
    fn test_sync_state_helpers() {
        let state = init_sync_state();
        let back = decode_sync_state(&encode_sync_state(&state)).unwrap();
        assert_eq!(export_sync_state(&back), export_sync_state(&state));
        let imported = import_sync_state(&export_sync_state(&state));
        assert!(imported.shared_heads().is_empty());
    }

    #[test]
    fn test_stubbed_codecs() {
        assert!(encode_sync_message(&serde_json::Value::Null).unwrap_err().is_not_implemented());
        assert!(decode_sync_message(&[]).unwrap_err().is_not_implemented());
        assert!(read_bundle(&[]).unwrap_err().is_not_implemented());
    }
}
