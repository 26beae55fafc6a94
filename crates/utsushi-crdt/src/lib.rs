//! Object-tree document API over Automerge.
//!
//! Application code written against a plain nested-object CRDT API talks to
//! a [`Document`]; underneath, every read and write becomes a typed engine
//! operation on an `automerge::AutoCommit`.
//!
//! # Layers
//!
//! - **Engine binding** (`engine`): tagged values, binary ids, raw patches.
//! - **Codecs** (`codec`, `ids`): host value ⇄ scalar, binary id ⇄ token.
//! - **Facade** ([`Document`]): string tokens in, host values out.
//! - **Proxies** ([`proxy`]): live mutable views that route property access
//!   to the facade.
//! - **Patches** (`patch`, `apply`): engine diffs as `{action, path, ...}`
//!   records, and folding them into a snapshot.
//!
//! # Example
//!
//! ```no_run
//! use utsushi_crdt::{Document, HostValue};
//!
//! let mut doc = Document::create(None)?;
//! doc.root_proxy().set("name", &HostValue::from("Alice"))?;
//! let bytes = doc.save();
//!
//! let loaded = Document::load(&bytes, None)?;
//! assert!(loaded.get("_root", "name", None)?.is_some());
//! # Ok::<(), utsushi_crdt::CrdtError>(())
//! ```
//!
//! # Merge Semantics
//!
//! - **Maps**: concurrent writes to one key keep every value; reads return the
//!   deterministic winner and `get_all` returns the rest.
//! - **Lists and text**: concurrent inserts interleave; nothing is lost.
//! - **Counters**: concurrent increments sum.

pub mod api;
pub mod apply;
pub mod codec;
mod config;
mod document;
pub mod engine;
mod error;
pub mod ids;
pub mod patch;
pub mod proxy;
mod sync;

pub use config::{Config, FallbackPolicy, GrowthPolicy};
pub use document::{Document, MarkRange, Stats};
pub use engine::{Expand, decode_change};
pub use error::CrdtError;
pub use proxy::{ListProxy, MapProxy, Resolved};
pub use sync::{SyncState, SyncStateExport};

pub use utsushi_types::{
    ChangeHash, Datatype, DecodedChange, FullValue, HandleId, HostKey, HostValue, MarkRecord,
    NodeMeta, ObjRef, ObjType, Patch, Prop,
};

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, CrdtError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_basic_operations() {
        let mut doc = Document::create(None).unwrap();
        let mut root = doc.root_proxy();
        root.set("title", &"draft".into()).unwrap();
        root.set("tags", &json!(["a", "b"]).into()).unwrap();

        assert_eq!(
            doc.materialize(None, None).unwrap(),
            HostValue::from(json!({"title": "draft", "tags": ["a", "b"]}))
        );
    }

    #[test]
    fn test_config_from_ron() {
        let config = Config::from_ron_str("(list_growth: Ignore)").unwrap();
        let doc = Document::create(None).unwrap().with_config(config);
        assert_eq!(doc.config().list_growth, GrowthPolicy::Ignore);
        assert_eq!(doc.config().unrepresentable, FallbackPolicy::Stringify);
    }

    #[test]
    fn test_same_document_detection() {
        let mut a = Document::create(None).unwrap();
        let b = Document::create(None).unwrap();
        let first = a.materialize(None, None).unwrap();
        a.put("_root", "k", &1.0.into(), None).unwrap();
        let second = a.materialize(None, None).unwrap();
        let other = b.materialize(None, None).unwrap();

        assert!(first.is_same_document(&second));
        assert!(!first.is_same_document(&other));
    }
}
