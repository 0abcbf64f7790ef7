//! Reduction of the inference endpoint's fragment array into one message.
//!
//! The endpoint answers with a complete JSON array such as
//! `[{"data":"Hel"},{"data":"lo"},{"data":"END"}]`. Fragments are joined in
//! order until the `END` sentinel; anything after it is ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChatError;

/// Fragment payload that marks the logical end of a response.
pub const END_SENTINEL: &str = "END";

/// One element of the response array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFragment {
    pub data: String,
}

impl StreamFragment {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }

    pub fn is_sentinel(&self) -> bool {
        self.data == END_SENTINEL
    }
}

/// Join fragment payloads up to, not including, the first sentinel.
pub fn assemble<I>(fragments: I) -> String
where
    I: IntoIterator<Item = StreamFragment>,
{
    let mut message = String::new();
    for fragment in fragments {
        if fragment.is_sentinel() {
            break;
        }
        message.push_str(&fragment.data);
    }
    message
}

/// Decode a raw response body and assemble it.
///
/// Fails with [`ChatError::MalformedResponse`] if the body is not an array
/// or a fragment before the sentinel is not `{"data": string}`. On failure
/// nothing assembled so far is returned.
pub fn decode(body: Value) -> Result<String, ChatError> {
    let Value::Array(items) = body else {
        return Err(ChatError::MalformedResponse(format!(
            "expected an array of fragments, got {}",
            kind_of(&body)
        )));
    };

    let mut fragments = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let fragment: StreamFragment = serde_json::from_value(item).map_err(|e| {
            ChatError::MalformedResponse(format!("fragment {index} is invalid: {e}"))
        })?;
        let done = fragment.is_sentinel();
        fragments.push(fragment);
        if done {
            break;
        }
    }
    Ok(assemble(fragments))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stops_at_sentinel() {
        let body = json!([
            {"data": "Hel"},
            {"data": "lo"},
            {"data": "END"},
            {"data": "ignored"}
        ]);
        assert_eq!(decode(body).unwrap(), "Hello");
    }

    #[test]
    fn leading_sentinel_yields_empty() {
        assert_eq!(decode(json!([{"data": "END"}])).unwrap(), "");
        assert_eq!(decode(json!([])).unwrap(), "");
    }

    #[test]
    fn missing_sentinel_joins_everything() {
        let fragments = ["a", "b", "c"].map(StreamFragment::new);
        assert_eq!(assemble(fragments), "abc");
    }

    #[test]
    fn sentinel_must_match_exactly() {
        let body = json!([{"data": "end"}, {"data": " END"}, {"data": "END"}]);
        assert_eq!(decode(body).unwrap(), "end END");
    }

    #[test]
    fn non_array_is_malformed() {
        for body in [json!({"data": "hi"}), json!("hi"), json!(null), json!(3)] {
            assert!(
                matches!(decode(body), Err(ChatError::MalformedResponse(_))),
                "non-array body must be rejected"
            );
        }
    }

    #[test]
    fn bad_fragment_before_sentinel_is_malformed() {
        let body = json!([{"data": "ok"}, {"text": "no data"}, {"data": "END"}]);
        assert!(matches!(decode(body), Err(ChatError::MalformedResponse(_))));

        let body = json!([{"data": 42}]);
        assert!(matches!(decode(body), Err(ChatError::MalformedResponse(_))));
    }

    #[test]
    fn fragments_after_sentinel_are_not_inspected() {
        let body = json!([{"data": "done"}, {"data": "END"}, "garbage", 7]);
        assert_eq!(decode(body).unwrap(), "done");
    }
}
