//! Host value ⇄ tagged engine value conversion.
//!
//! Host numbers carry no signedness, width or counter semantics, so an explicit
//! [`Datatype`] always wins over inference. Without one the rules are:
//!
//! | host value                  | stored as                     |
//! |-----------------------------|-------------------------------|
//! | undefined, null             | `null`                        |
//! | string                      | `str`                         |
//! | boolean                     | `boolean`                     |
//! | non-negative integral number| `uint`                        |
//! | negative integral number    | `int`                         |
//! | other number                | `f64`                         |
//! | date                        | `timestamp` (epoch ms)        |
//! | bytes                       | `bytes`                       |
//! | array                       | new `list` node               |
//! | object                      | new `map` node                |
//! | anything else               | `str` (lossy, see [`Config`]) |
//!
//! Decoding is total. Unknown scalar kinds decode to [`HostValue::Undefined`].

use tracing::warn;
use utsushi_types::{Datatype, FullValue, HostValue, ObjType, ScalarValue, TaggedValue};

use crate::config::{Config, FallbackPolicy};
use crate::ids::obj_token;
use crate::{CrdtError, Result};

/// Largest integer a host number holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Bounds of `i64` as host numbers: `[-2^63, 2^63)`.
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

/// What a write should do: store a scalar or create a nested node.
#[derive(Clone, Debug, PartialEq)]
pub enum Tagged {
    Scalar(ScalarValue),
    Object(ObjType),
}

/// Kind a host value would be stored as without a hint.
pub fn infer_datatype(value: &HostValue) -> Datatype {
    match value {
        HostValue::Undefined | HostValue::Null => Datatype::Null,
        HostValue::String(_) | HostValue::Opaque(_) => Datatype::Str,
        HostValue::Bool(_) => Datatype::Boolean,
        HostValue::Number(n) => infer_number(*n),
        HostValue::Date(_) => Datatype::Timestamp,
        HostValue::Bytes(_) => Datatype::Bytes,
        HostValue::Array(_) => Datatype::List,
        HostValue::Object(_) => Datatype::Map,
    }
}

fn infer_number(n: f64) -> Datatype {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        if n >= 0.0 { Datatype::Uint } else { Datatype::Int }
    } else {
        Datatype::F64
    }
}

/// Encode a value for a write, deciding between a scalar and a new node.
///
/// Object-kind hints are honored only for arrays and objects; a scalar with a
/// `map`/`list`/`text` hint is encoded by inference.
pub fn to_tagged(value: &HostValue, hint: Option<Datatype>, config: &Config) -> Result<Tagged> {
    match (value, hint.and_then(|h| h.obj_type())) {
        (HostValue::Array(_) | HostValue::Object(_), Some(kind)) => Ok(Tagged::Object(kind)),
        (HostValue::Array(_), None) if hint.is_none() => Ok(Tagged::Object(ObjType::List)),
        (HostValue::Object(_), None) if hint.is_none() => Ok(Tagged::Object(ObjType::Map)),
        _ => to_scalar(value, hint, config).map(Tagged::Scalar),
    }
}

/// Encode a value as a scalar.
///
/// Arrays and objects without a scalar hint have no scalar form and go
/// through the lossy fallback.
pub fn to_scalar(value: &HostValue, hint: Option<Datatype>, config: &Config) -> Result<ScalarValue> {
    match hint {
        Some(dt) if !dt.is_object() && dt != Datatype::Unknown => hinted(value, dt),
        _ => inferred(value, config),
    }
}

fn mismatch(expected: Datatype, value: &HostValue) -> CrdtError {
    CrdtError::KindMismatch {
        expected,
        found: value.type_name(),
    }
}

fn integral(value: &HostValue, dt: Datatype) -> Result<i64> {
    match value {
        HostValue::Number(n) if n.is_finite() => {
            let n = n.floor();
            if (I64_LOWER..I64_UPPER).contains(&n) {
                Ok(n as i64)
            } else {
                Err(mismatch(dt, value))
            }
        }
        HostValue::Date(ms) => Ok(*ms),
        _ => Err(mismatch(dt, value)),
    }
}

fn hinted(value: &HostValue, dt: Datatype) -> Result<ScalarValue> {
    Ok(match dt {
        Datatype::Int => ScalarValue::Int(integral(value, dt)?),
        Datatype::Counter => ScalarValue::Counter(integral(value, dt)?),
        Datatype::Timestamp => ScalarValue::Timestamp(integral(value, dt)?),
        Datatype::Uint => {
            let n = integral(value, dt)?;
            let n = u64::try_from(n).map_err(|_| mismatch(dt, value))?;
            ScalarValue::Uint(n)
        }
        Datatype::F64 => match value {
            HostValue::Number(n) => ScalarValue::F64(*n),
            _ => return Err(mismatch(dt, value)),
        },
        Datatype::Bytes => match value {
            HostValue::Bytes(b) => ScalarValue::Bytes(b.clone()),
            HostValue::Array(a) => ScalarValue::Bytes(
                a.items
                    .iter()
                    .map(|item| match item {
                        HostValue::Number(n) if (0.0..=255.0).contains(n) && n.fract() == 0.0 => {
                            Ok(*n as u8)
                        }
                        _ => Err(mismatch(dt, value)),
                    })
                    .collect::<Result<Vec<u8>>>()?,
            ),
            _ => return Err(mismatch(dt, value)),
        },
        Datatype::Boolean => ScalarValue::Boolean(value.truthy()),
        Datatype::Null => ScalarValue::Null,
        Datatype::Str => ScalarValue::Str(value.to_display_string()),
        Datatype::Map | Datatype::List | Datatype::Text | Datatype::Unknown => {
            return Err(mismatch(dt, value));
        }
    })
}

fn inferred(value: &HostValue, config: &Config) -> Result<ScalarValue> {
    Ok(match value {
        HostValue::Undefined | HostValue::Null => ScalarValue::Null,
        HostValue::String(s) => ScalarValue::Str(s.clone()),
        HostValue::Bool(b) => ScalarValue::Boolean(*b),
        HostValue::Number(n) => match infer_number(*n) {
            Datatype::Uint => ScalarValue::Uint(*n as u64),
            Datatype::Int => ScalarValue::Int(*n as i64),
            _ => ScalarValue::F64(*n),
        },
        HostValue::Date(ms) => ScalarValue::Timestamp(*ms),
        HostValue::Bytes(b) => ScalarValue::Bytes(b.clone()),
        HostValue::Array(_) | HostValue::Object(_) | HostValue::Opaque(_) => {
            let text = value.to_display_string();
            match config.unrepresentable {
                FallbackPolicy::Stringify => {
                    warn!(kind = value.type_name(), "storing host value by its string form");
                    ScalarValue::Str(text)
                }
                FallbackPolicy::Reject => return Err(CrdtError::Unrepresentable(text)),
            }
        }
    })
}

/// Decode a scalar to its host value.
pub fn from_scalar(value: &ScalarValue) -> HostValue {
    match value {
        ScalarValue::Str(s) => HostValue::String(s.clone()),
        ScalarValue::Int(n) | ScalarValue::Counter(n) => HostValue::Number(*n as f64),
        ScalarValue::Uint(n) => HostValue::Number(*n as f64),
        ScalarValue::F64(n) => HostValue::Number(*n),
        ScalarValue::Boolean(b) => HostValue::Bool(*b),
        ScalarValue::Null => HostValue::Null,
        ScalarValue::Bytes(b) => HostValue::Bytes(b.clone()),
        ScalarValue::Timestamp(ms) => HostValue::Date(*ms),
        ScalarValue::Unknown { type_code, .. } => {
            warn!(type_code, "unknown scalar kind decoded as undefined");
            HostValue::Undefined
        }
    }
}

/// Decode a tagged value to its `(datatype, value)` pair. Objects decode to
/// their reference token.
pub fn from_tagged(value: &TaggedValue) -> FullValue {
    match value {
        TaggedValue::Object { kind, id } => {
            FullValue::new(Datatype::from(*kind), HostValue::String(obj_token(id)))
        }
        TaggedValue::Scalar(s) => FullValue::new(s.datatype(), from_scalar(s)),
    }
}

/// An empty host container of the given kind.
pub fn empty_container(kind: ObjType) -> HostValue {
    match kind {
        ObjType::Map => HostValue::object(),
        ObjType::List => HostValue::array(),
        ObjType::Text => HostValue::String(String::new()),
    }
}
