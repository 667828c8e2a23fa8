use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pointer;

/// Patch operation kind. Declaration order is the sort priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Remove,
    Add,
    Replace,
}

/// One `add` / `remove` / `replace` step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    pub op: Op,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOp {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: Op::Add,
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: Op::Remove,
            path: path.into(),
            value: None,
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: Op::Replace,
            path: path.into(),
            value: Some(value),
        }
    }
}

/// Compute the patch turning `base` into `new`.
///
/// Equal documents produce an empty patch. Only objects are descended
/// into; any other differing pair is one `replace` carrying the whole new
/// value at that location.
///
/// Paths are joined with [`pointer::join`], so a change to an object's
/// `""` member is reported at `/`, the same path as a whole-document
/// replacement. [`apply_patch`](crate::apply_patch) reads a `replace` or
/// `remove` at `/` as the `""` member when the target object has one.
pub fn diff(base: &Value, new: &Value) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    let mut tokens = Vec::new();
    walk(base, new, &mut tokens, &mut ops);
    ops.sort_by(|a, b| a.path.cmp(&b.path).then(a.op.cmp(&b.op)));
    ops
}

fn walk(base: &Value, new: &Value, tokens: &mut Vec<String>, ops: &mut Vec<PatchOp>) {
    if base == new {
        return;
    }

    let (Value::Object(base_map), Value::Object(new_map)) = (base, new) else {
        ops.push(PatchOp::replace(pointer::join(tokens), new.clone()));
        return;
    };

    for (key, base_value) in base_map {
        tokens.push(key.clone());
        match new_map.get(key) {
            Some(new_value) => walk(base_value, new_value, tokens, ops),
            None => ops.push(PatchOp::remove(pointer::join(tokens))),
        }
        tokens.pop();
    }

    for (key, new_value) in new_map {
        if !base_map.contains_key(key) {
            tokens.push(key.clone());
            ops.push(PatchOp::add(pointer::join(tokens), new_value.clone()));
            tokens.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn identical_documents_yield_empty_patch() {
        let doc = json!({"a": [1, 2, {"b": null}], "c": {"d": "e"}});
        assert!(diff(&doc, &doc).is_empty());
        assert!(diff(&json!(3), &json!(3)).is_empty());
    }

    #[test]
    fn single_scalar_change_is_one_replace() {
        let ops = diff(&json!({"a": 1, "b": 2}), &json!({"a": 1, "b": 3}));
        assert_eq!(ops, vec![PatchOp::replace("/b", json!(3))]);
    }

    #[test]
    fn array_change_replaces_whole_array() {
        let ops = diff(
            &json!({"items": [1, 2, 3]}),
            &json!({"items": [1, 2, 4]}),
        );
        assert_eq!(ops, vec![PatchOp::replace("/items", json!([1, 2, 4]))]);

        let ops = diff(&json!({"items": [1]}), &json!({"items": [1, 2]}));
        assert_eq!(ops, vec![PatchOp::replace("/items", json!([1, 2]))]);
    }

    #[test]
    fn added_and_removed_keys() {
        let ops = diff(&json!({"old": 1, "keep": 0}), &json!({"new": 2, "keep": 0}));
        assert_eq!(
            ops,
            vec![PatchOp::add("/new", json!(2)), PatchOp::remove("/old")]
        );
    }

    #[test]
    fn nested_objects_recurse() {
        let ops = diff(
            &json!({"shader": {"name": "a", "uniforms": {"u": 1}}}),
            &json!({"shader": {"name": "a", "uniforms": {"u": 2, "v": 3}}}),
        );
        assert_eq!(
            ops,
            vec![
                PatchOp::replace("/shader/uniforms/u", json!(2)),
                PatchOp::add("/shader/uniforms/v", json!(3)),
            ]
        );
    }

    #[test]
    fn type_change_and_root_replace_use_root_pointer() {
        assert_eq!(
            diff(&json!({"a": 1}), &json!([1])),
            vec![PatchOp::replace("/", json!([1]))]
        );
        assert_eq!(
            diff(&json!("x"), &json!("y")),
            vec![PatchOp::replace("/", json!("y"))]
        );
    }

    #[test]
    fn keys_are_escaped() {
        let ops = diff(&json!({}), &json!({"a/b": 1, "m~n": 2}));
        let paths: Vec<&str> = ops.iter().map(|op| op.path.as_str()).collect();
        assert_eq!(paths, vec!["/a~1b", "/m~0n"]);
    }

    #[test]
    fn ordering_is_by_path_then_priority() {
        let ops = diff(
            &json!({"b": 1, "a": {"x": 1}, "c": 1}),
            &json!({"a": {"y": 1}, "c": 2, "d": 1}),
        );
        let got: Vec<(String, Op)> = ops.iter().map(|op| (op.path.clone(), op.op)).collect();
        assert_eq!(
            got,
            vec![
                ("/a/x".to_string(), Op::Remove),
                ("/a/y".to_string(), Op::Add),
                ("/b".to_string(), Op::Remove),
                ("/c".to_string(), Op::Replace),
                ("/d".to_string(), Op::Add),
            ]
        );
    }

    #[test]
    fn serializes_rfc6902_shape() {
        let ops = diff(&json!({"a": 1, "b": 1}), &json!({"a": 2}));
        assert_eq!(
            serde_json::to_value(&ops).unwrap(),
            json!([
                {"op": "replace", "path": "/a", "value": 2},
                {"op": "remove", "path": "/b"}
            ])
        );
    }
}
