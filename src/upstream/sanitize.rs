use axum::body::Bytes;
use serde_json::{Map, Value, json};

/// Nested object some upstreams read generation flags from.
pub const EXTRA_PARAMS_KEY: &str = "extra_params";

pub const THINKING_BUDGET_TOKEN_LIMIT: u64 = 100;

fn reasoning_overrides() -> [(&'static str, Value); 5] {
    [
        ("enable_thinking", Value::Bool(false)),
        ("enable_thoughts", Value::Bool(false)),
        ("enable_reasoning", Value::Bool(false)),
        ("response_format", json!({ "type": "text" })),
        (
            "thinking_budget_token_limit",
            Value::from(THINKING_BUDGET_TOKEN_LIMIT),
        ),
    ]
}

fn apply_overrides(obj: &mut Map<String, Value>) {
    for (key, value) in reasoning_overrides() {
        obj.insert(key.to_string(), value);
    }
}

/// Forces reasoning off at the top level and inside `extra_params` (when it is an object).
/// Non-object payloads are returned untouched.
pub fn sanitize_payload(payload: Value) -> Value {
    let Value::Object(mut obj) = payload else {
        return payload;
    };
    apply_overrides(&mut obj);
    if let Some(Value::Object(params)) = obj.get_mut(EXTRA_PARAMS_KEY) {
        apply_overrides(params);
    }
    Value::Object(obj)
}

/// Byte-level entry point: bodies that are not a JSON object are forwarded verbatim.
pub fn sanitize_body(body: Bytes) -> Bytes {
    let parsed = match serde_json::from_slice::<Value>(&body) {
        Ok(v @ Value::Object(_)) => v,
        Ok(_) => {
            tracing::debug!("request body is not a JSON object; forwarding unmodified");
            return body;
        }
        Err(e) => {
            tracing::debug!("request body is not JSON ({}); forwarding unmodified", e);
            return body;
        }
    };

    match serde_json::to_vec(&sanitize_payload(parsed)) {
        Ok(rewritten) => Bytes::from(rewritten),
        Err(e) => {
            tracing::warn!("failed to re-serialize sanitized request: {}", e);
            body
        }
    }
}
