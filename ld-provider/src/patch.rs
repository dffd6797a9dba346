//! JSON Patch operations for update calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of patch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    /// Replace the value at a path.
    Replace,
    /// Add a value at a path.
    Add,
    /// Remove the value at a path.
    Remove,
}

/// One RFC 6902 operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    /// Operation kind.
    pub op: PatchOp,
    /// JSON Pointer to the target.
    pub path: String,
    /// New value; absent for removals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    /// Replace `path` with `value`.
    pub fn replace(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value: Some(value.into()),
        }
    }

    /// Add `value` at `path`.
    pub fn add(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            value: Some(value.into()),
        }
    }

    /// Remove `path`.
    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            value: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let ops = vec![
            PatchOperation::replace("/name", "Checkout"),
            PatchOperation::add("/tags/-", "beta"),
            PatchOperation::remove("/description"),
        ];
        assert_eq!(
            serde_json::to_value(&ops).unwrap(),
            json!([
                {"op": "replace", "path": "/name", "value": "Checkout"},
                {"op": "add", "path": "/tags/-", "value": "beta"},
                {"op": "remove", "path": "/description"},
            ])
        );
    }

    #[test]
    fn test_null_value_is_kept() {
        let op = PatchOperation::replace("/maintainerId", Value::Null);
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"op": "replace", "path": "/maintainerId", "value": null})
        );
    }
}
