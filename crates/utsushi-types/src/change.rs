//! Decoded change records.

use serde::{Deserialize, Serialize};

use crate::ids::{ActorId, ChangeHash};

/// Metadata of one change, with identifiers in their hex forms.
///
/// `ops` is always empty: operation-level decoding is not exposed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedChange {
    pub hash: ChangeHash,
    pub actor: ActorId,
    pub seq: u64,
    pub start_op: u64,
    /// Epoch milliseconds, as recorded by the author.
    pub time: i64,
    /// Empty when the change was committed without one.
    pub message: String,
    pub deps: Vec<ChangeHash>,
    pub ops: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let change = DecodedChange {
            hash: ChangeHash::from_array([0xaa; 32]),
            actor: ActorId::from_bytes(vec![0x01, 0x02]),
            seq: 1,
            start_op: 1,
            time: 0,
            message: "init".into(),
            deps: vec![],
            ops: vec![],
        };
        let v = serde_json::to_value(&change).unwrap();
        assert_eq!(v["actor"], json!("0102"));
        assert_eq!(v["startOp"], json!(1));
        assert_eq!(v["hash"], json!("aa".repeat(32)));
        assert_eq!(v["ops"], json!([]));
        assert_eq!(v["message"], json!("init"));
        let back: DecodedChange = serde_json::from_value(v).unwrap();
        assert_eq!(back, change);
    }
}
