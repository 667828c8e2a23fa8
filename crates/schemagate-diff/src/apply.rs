use serde_json::Value;

use crate::diff::{Op, PatchOp};
use crate::error::{PatchError, Result};
use crate::pointer;

/// Apply `ops` in order to a copy of `doc`.
///
/// Supports `add`, `remove` and `replace` against object and array
/// containers. Array `add` appends for the `-` token and inserts at the
/// index otherwise. The input document is never modified; on error the
/// partially patched copy is discarded.
pub fn apply_patch(doc: &Value, ops: &[PatchOp]) -> Result<Value> {
    let mut out = doc.clone();
    for op in ops {
        apply_one(&mut out, op)?;
    }
    Ok(out)
}

fn apply_one(doc: &mut Value, op: &PatchOp) -> Result<()> {
    let mut tokens =
        pointer::parse(&op.path).ok_or_else(|| PatchError::InvalidPointer(op.path.clone()))?;
    if addresses_empty_key(doc, op) {
        tokens.push(String::new());
    }

    let Some((last, parents)) = tokens.split_last() else {
        return match op.op {
            Op::Add | Op::Replace => {
                *doc = required_value(op)?;
                Ok(())
            }
            Op::Remove => Err(PatchError::PathNotFound(op.path.clone())),
        };
    };

    let parent = resolve_mut(doc, parents, &op.path)?;
    match (op.op, parent) {
        (Op::Add | Op::Replace, Value::Object(map)) => {
            if op.op == Op::Replace && !map.contains_key(last) {
                return Err(PatchError::PathNotFound(op.path.clone()));
            }
            map.insert(last.clone(), required_value(op)?);
        }
        (Op::Remove, Value::Object(map)) => {
            if map.remove(last).is_none() {
                return Err(PatchError::PathNotFound(op.path.clone()));
            }
        }
        (Op::Add, Value::Array(items)) => {
            let value = required_value(op)?;
            if last == "-" {
                items.push(value);
            } else {
                let index = parse_index(last, &op.path)?;
                if index > items.len() {
                    return Err(invalid_index(last, &op.path));
                }
                items.insert(index, value);
            }
        }
        (Op::Replace, Value::Array(items)) => {
            let index = existing_index(last, items.len(), &op.path)?;
            items[index] = required_value(op)?;
        }
        (Op::Remove, Value::Array(items)) => {
            let index = existing_index(last, items.len(), &op.path)?;
            items.remove(index);
        }
        (_, _) => return Err(PatchError::NotAContainer(op.path.clone())),
    }
    Ok(())
}

/// `/` is both the root and the `""` member. Against an object that
/// already has a `""` member, `replace` and `remove` target the member.
fn addresses_empty_key(doc: &Value, op: &PatchOp) -> bool {
    op.path == "/"
        && op.op != Op::Add
        && doc.as_object().is_some_and(|map| map.contains_key(""))
}

fn resolve_mut<'a>(doc: &'a mut Value, tokens: &[String], path: &str) -> Result<&'a mut Value> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| PatchError::PathNotFound(path.to_string()))?,
            Value::Array(items) => {
                let index = existing_index(token, items.len(), path)?;
                &mut items[index]
            }
            _ => return Err(PatchError::NotAContainer(path.to_string())),
        };
    }
    Ok(current)
}

fn required_value(op: &PatchOp) -> Result<Value> {
    op.value.clone().ok_or_else(|| PatchError::MissingValue {
        op: format!("{:?}", op.op).to_lowercase(),
        path: op.path.clone(),
    })
}

fn parse_index(token: &str, path: &str) -> Result<usize> {
    // RFC 6901: no leading zeros, digits only.
    if token.is_empty()
        || !token.bytes().all(|b| b.is_ascii_digit())
        || (token.len() > 1 && token.starts_with('0'))
    {
        return Err(invalid_index(token, path));
    }
    token.parse().map_err(|_| invalid_index(token, path))
}

fn existing_index(token: &str, len: usize, path: &str) -> Result<usize> {
    let index = parse_index(token, path)?;
    if index >= len {
        return Err(invalid_index(token, path));
    }
    Ok(index)
}

fn invalid_index(token: &str, path: &str) -> PatchError {
    PatchError::InvalidIndex {
        path: path.to_string(),
        index: token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::diff::diff;

    #[test]
    fn applying_a_diff_reproduces_the_target() {
        let base = json!({"a": 1, "b": {"c": [1, 2], "d": "x"}, "gone": true});
        let new = json!({"a": 2, "b": {"c": [3], "d": "x", "e": null}, "fresh": {"k": 1}});
        let patch = diff(&base, &new);
        assert_eq!(apply_patch(&base, &patch).unwrap(), new);
    }

    #[test]
    fn array_add_appends_and_inserts() {
        let doc = json!({"list": [1, 3]});
        let patch = vec![
            PatchOp::add("/list/-", json!(4)),
            PatchOp::add("/list/1", json!(2)),
        ];
        assert_eq!(apply_patch(&doc, &patch).unwrap(), json!({"list": [1, 2, 3, 4]}));
    }

    #[test]
    fn array_remove_and_replace_by_index() {
        let doc = json!([10, 20, 30]);
        let patch = vec![PatchOp::remove("/0"), PatchOp::replace("/1", json!(31))];
        assert_eq!(apply_patch(&doc, &patch).unwrap(), json!([20, 31]));
    }

    #[test]
    fn root_replace_swaps_document() {
        let patch = vec![PatchOp::replace("/", json!({"fresh": 1}))];
        assert_eq!(apply_patch(&json!([1]), &patch).unwrap(), json!({"fresh": 1}));
    }

    #[test]
    fn empty_key_change_round_trips() {
        let base = json!({"": 1, "a": 1});
        let new = json!({"": 2, "a": 1});
        let patch = diff(&base, &new);
        assert_eq!(patch, vec![PatchOp::replace("/", json!(2))]);
        assert_eq!(apply_patch(&base, &patch).unwrap(), new);

        let removed = apply_patch(&base, &[PatchOp::remove("/")]).unwrap();
        assert_eq!(removed, json!({"a": 1}));
    }

    #[test]
    fn errors_are_reported_and_input_untouched() {
        let doc = json!({"a": {"b": 1}, "list": [1]});

        assert_eq!(
            apply_patch(&doc, &[PatchOp::remove("/missing")]),
            Err(PatchError::PathNotFound("/missing".to_string()))
        );
        assert!(matches!(
            apply_patch(&doc, &[PatchOp::add("/list/5", json!(0))]),
            Err(PatchError::InvalidIndex { .. })
        ));
        assert!(matches!(
            apply_patch(&doc, &[PatchOp::add("/list/01", json!(0))]),
            Err(PatchError::InvalidIndex { .. })
        ));
        assert!(matches!(
            apply_patch(&doc, &[PatchOp::replace("/a/b/c", json!(0))]),
            Err(PatchError::NotAContainer(_))
        ));
        assert!(matches!(
            apply_patch(&doc, &[PatchOp::replace("a", json!(0))]),
            Err(PatchError::InvalidPointer(_))
        ));
        assert!(matches!(
            apply_patch(
                &doc,
                &[PatchOp {
                    op: Op::Add,
                    path: "/x".to_string(),
                    value: None
                }]
            ),
            Err(PatchError::MissingValue { .. })
        ));
        assert_eq!(doc, json!({"a": {"b": 1}, "list": [1]}));
    }
}
