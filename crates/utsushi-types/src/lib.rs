//! Shared value, identifier and patch types for Utsushi.
//!
//! This crate is the data vocabulary of the compatibility layer: host values,
//! property keys, tagged engine values, identifier encodings and patch
//! records. It has **no engine dependency**; `utsushi-crdt` builds the
//! document facade on top of it.
//!
//! # Key Types
//!
//! |--------------------|-----------------------------------------------|
//! | Type               | Purpose                                       |
//! |--------------------|-----------------------------------------------|
//! | [`HostValue`]      | Plain value as application code sees it      |
//! | [`HostKey`]        | Key as application code supplies it          |
//! | [`Prop`]           | Normalized map key or list index             |
//! | [`TaggedValue`]    | Engine value: object reference or scalar     |
//! | [`Datatype`]       | Kind name (`str`, `uint`, `map`, ...)         |
//! | [`ObjRef`]         | `_root` or `o:<base64>` object token         |
//! | [`ChangeHash`]     | 32-byte change hash, hex on the wire         |
//! | [`Patch`]          | One change notification                      |
//! | [`DecodedChange`]  | Change metadata                              |
//! |--------------------|-----------------------------------------------|

pub mod change;
pub mod ids;
pub mod patch;
pub mod prop;
pub mod tagged;
pub mod value;

pub use change::DecodedChange;
pub use ids::{
    ActorId, ChangeHash, Cursor, IdError, ObjId, ObjRef, ROOT_TOKEN, heads_from_hex, heads_to_hex,
};
pub use patch::{MarkRecord, Patch};
pub use prop::{HostKey, Prop};
pub use tagged::{Datatype, FullValue, ObjType, ScalarValue, TaggedValue};
pub use value::{HandleId, HostArray, HostObject, HostValue, NodeMeta};
