//! Binary identifiers and their string encodings.
//!
//! The engine speaks in raw bytes: object ids, change hashes, actor ids and
//! cursors. Host code wants strings it can use as property keys and pass over
//! text channels, so every identifier class has exactly one string form:
//!
//! | class        | binary            | string form                 |
//! |--------------|-------------------|-----------------------------|
//! | object       | [`ObjId`]         | `_root` or `o:<base64>`     |
//! | cursor       | [`Cursor`]        | `c:<base64>`                |
//! | change hash  | [`ChangeHash`]    | 64 lowercase hex chars      |
//! | actor        | [`ActorId`]       | lowercase hex, any length   |
//!
//! The `o:` and `c:` prefixes keep object and cursor tokens in disjoint
//! spaces. Padded base64 and hex are both injective, so token equality is byte
//! equality.
//!
//! Which bytes denote the document root is a property of the engine, so the
//! mapping between [`ObjId`] and [`ObjRef::Root`] lives in `utsushi-crdt`.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Reserved token for the document root.
pub const ROOT_TOKEN: &str = "_root";

/// Path-style alias accepted for the root on input. Never emitted.
pub const ROOT_ALIAS: &str = "/";

/// Prefix of non-root object tokens.
pub const OBJECT_PREFIX: &str = "o:";

/// Prefix of cursor tokens.
pub const CURSOR_PREFIX: &str = "c:";

/// Byte length of a change hash.
pub const CHANGE_HASH_LEN: usize = 32;

/// An identifier failed to decode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("invalid object token '{0}'")]
    InvalidObjectToken(String),
    #[error("invalid cursor token '{0}'")]
    InvalidCursorToken(String),
    #[error("invalid base64 in token '{0}'")]
    InvalidBase64(String),
    #[error("invalid hex '{input}': {reason}")]
    InvalidHex { input: String, reason: String },
    #[error("expected {expected} bytes, got {got}")]
    WrongLength { expected: usize, got: usize },
    #[error("empty identifier")]
    Empty,
}

fn decode_hex(input: &str) -> Result<Vec<u8>, IdError> {
    hex::decode(input).map_err(|e| IdError::InvalidHex {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

fn decode_b64(token: &str, body: &str) -> Result<Vec<u8>, IdError> {
    STANDARD
        .decode(body)
        .map_err(|_| IdError::InvalidBase64(token.to_string()))
}

// ── Variable-length byte identifiers ────────────────────────────────────────

/// Raw object identifier as produced by the engine.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ObjId(Vec<u8>);

/// Raw actor identifier.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ActorId(Vec<u8>);

/// Raw cursor (a stable position inside a list or text object).
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct Cursor(Vec<u8>);

macro_rules! impl_byte_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Wrap raw bytes.
            pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
                Self(bytes.into())
            }

            /// The raw bytes.
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Consume into the raw bytes.
            pub fn into_bytes(self) -> Vec<u8> {
                self.0
            }

            /// First 8 hex characters, for logs only.
            pub fn short(&self) -> String {
                let full = hex::encode(&self.0);
                full[..full.len().min(8)].to_string()
            }
        }

        impl AsRef<[u8]> for $T {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<Vec<u8>> for $T {
            fn from(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_byte_id!(ObjId, "ObjId");
impl_byte_id!(ActorId, "ActorId");
impl_byte_id!(Cursor, "Cursor");

impl ActorId {
    /// Lowercase hex, two characters per byte.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Exact inverse of [`ActorId::to_hex`].
    pub fn from_hex(input: &str) -> Result<Self, IdError> {
        let bytes = decode_hex(input)?;
        if bytes.is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<ActorId> for String {
    fn from(id: ActorId) -> String {
        id.to_hex()
    }
}

impl TryFrom<String> for ActorId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl Cursor {
    /// `c:` followed by padded base64 of the cursor bytes.
    pub fn to_token(&self) -> String {
        format!("{CURSOR_PREFIX}{}", STANDARD.encode(&self.0))
    }

    /// Decode a `c:` token. Object tokens are rejected.
    pub fn from_token(token: &str) -> Result<Self, IdError> {
        let body = token
            .strip_prefix(CURSOR_PREFIX)
            .ok_or_else(|| IdError::InvalidCursorToken(token.to_string()))?;
        Ok(Self(decode_b64(token, body)?))
    }
}

// ── Change hashes ───────────────────────────────────────────────────────────

/// Hash of a single change; the unit of a head set.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ChangeHash([u8; CHANGE_HASH_LEN]);

impl ChangeHash {
    pub fn from_array(bytes: [u8; CHANGE_HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Fails unless the slice is exactly [`CHANGE_HASH_LEN`] bytes.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, IdError> {
        let arr: [u8; CHANGE_HASH_LEN] = bytes.try_into().map_err(|_| IdError::WrongLength {
            expected: CHANGE_HASH_LEN,
            got: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; CHANGE_HASH_LEN] {
        &self.0
    }

    /// 64 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(input: &str) -> Result<Self, IdError> {
        Self::try_from_slice(&decode_hex(input)?)
    }
}

impl fmt::Display for ChangeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ChangeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChangeHash({})", &self.to_hex()[..8])
    }
}

impl From<ChangeHash> for String {
    fn from(hash: ChangeHash) -> String {
        hash.to_hex()
    }
}

impl TryFrom<String> for ChangeHash {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

/// Encode a head set as hex strings, preserving order.
pub fn heads_to_hex(heads: &[ChangeHash]) -> Vec<String> {
    heads.iter().map(ChangeHash::to_hex).collect()
}

/// Decode a head set. The first malformed hash aborts the whole set.
pub fn heads_from_hex<S: AsRef<str>>(heads: &[S]) -> Result<Vec<ChangeHash>, IdError> {
    heads.iter().map(|h| ChangeHash::from_hex(h.as_ref())).collect()
}

// ── Object references ───────────────────────────────────────────────────────

/// Host-facing object reference.
///
/// `Root` is the reserved `_root` token; `Object` carries the engine bytes and
/// renders as `o:<base64>`. Construct from engine ids through
/// `utsushi_crdt::ids::obj_ref` so that root bytes collapse to `Root`.
#[derive(Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ObjRef {
    Root,
    Object(ObjId),
}

impl ObjRef {
    pub fn root() -> Self {
        ObjRef::Root
    }

    pub fn is_root(&self) -> bool {
        matches!(self, ObjRef::Root)
    }

    /// Parse a token. Accepts `_root`, `/`, and `o:<base64>`.
    pub fn parse(token: &str) -> Result<Self, IdError> {
        if token == ROOT_TOKEN || token == ROOT_ALIAS {
            return Ok(ObjRef::Root);
        }
        let body = token
            .strip_prefix(OBJECT_PREFIX)
            .ok_or_else(|| IdError::InvalidObjectToken(token.to_string()))?;
        let bytes = decode_b64(token, body)?;
        if bytes.is_empty() {
            return Err(IdError::InvalidObjectToken(token.to_string()));
        }
        Ok(ObjRef::Object(ObjId(bytes)))
    }

    /// The canonical token.
    pub fn to_token(&self) -> String {
        match self {
            ObjRef::Root => ROOT_TOKEN.to_string(),
            ObjRef::Object(id) => format!("{OBJECT_PREFIX}{}", STANDARD.encode(id.as_bytes())),
        }
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_token())
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjRef::Root => f.write_str("ObjRef(_root)"),
            ObjRef::Object(id) => write!(f, "ObjRef({})", id.short()),
        }
    }
}

impl From<ObjRef> for String {
    fn from(r: ObjRef) -> String {
        r.to_token()
    }
}

impl TryFrom<String> for ObjRef {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl std::str::FromStr for ObjRef {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ============================================================================
// Tests
// ============================================================================
