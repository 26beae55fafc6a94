//! Property keys.
//!
//! [`HostKey`] is what arrives from host code: a name, an index, or a symbol
//! used by runtime introspection. [`Prop`] is what reaches the engine: a map
//! key or a list index. [`Prop::normalize`] is the only place one becomes the
//! other.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tagged::ObjType;

/// A map key or a list index. Serializes as a bare string or integer, which
/// is the path-element shape of patch records.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prop {
    Index(usize),
    Key(String),
}

/// A key as supplied by host code.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum HostKey {
    Name(String),
    Index(usize),
    /// A symbol-keyed access. The document has no symbol storage.
    Symbol(String),
}

impl Prop {
    /// Normalize a host key for a container of the given kind.
    ///
    /// Maps take names verbatim and stringify indices. Lists and text take
    /// indices, and names only when they are canonical non-negative integers
    /// (`"3"`, not `"03"` or `"-1"`). Symbols never normalize.
    pub fn normalize(key: &HostKey, container: ObjType) -> Option<Prop> {
        match (key, container) {
            (HostKey::Symbol(_), _) => None,
            (HostKey::Name(name), ObjType::Map) => Some(Prop::Key(name.clone())),
            (HostKey::Index(i), ObjType::Map) => Some(Prop::Key(i.to_string())),
            (HostKey::Index(i), _) => Some(Prop::Index(*i)),
            (HostKey::Name(name), _) => parse_index(name).map(Prop::Index),
        }
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            Prop::Key(k) => Some(k),
            Prop::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Prop::Index(i) => Some(*i),
            Prop::Key(_) => None,
        }
    }
}

fn parse_index(name: &str) -> Option<usize> {
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    if !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

impl fmt::Display for Prop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prop::Key(k) => f.write_str(k),
            Prop::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Prop {
    fn from(s: &str) -> Self {
        Prop::Key(s.to_string())
    }
}

impl From<String> for Prop {
    fn from(s: String) -> Self {
        Prop::Key(s)
    }
}

impl From<usize> for Prop {
    fn from(i: usize) -> Self {
        Prop::Index(i)
    }
}

impl From<&str> for HostKey {
    fn from(s: &str) -> Self {
        HostKey::Name(s.to_string())
    }
}

impl From<String> for HostKey {
    fn from(s: String) -> Self {
        HostKey::Name(s)
    }
}

impl From<usize> for HostKey {
    fn from(i: usize) -> Self {
        HostKey::Index(i)
    }
}

impl From<Prop> for HostKey {
    fn from(p: Prop) -> Self {
        match p {
            Prop::Key(k) => HostKey::Name(k),
            Prop::Index(i) => HostKey::Index(i),
        }
    }
}
