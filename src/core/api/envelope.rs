use serde_json::{Map, Value};

use super::error::{ApiError, ApiResult};

/// Body of a successful response with the `ok` discriminator removed.
pub type Payload = Map<String, Value>;

/// Collapse a raw HTTP response into the uniform result shape.
///
/// Non-2xx statuses take their message from the body's `error` field when
/// the body parses, else `Request failed (<status>)`. A 2xx body must be a
/// JSON object carrying a boolean `ok`; anything else is `Malformed`.
pub fn normalize(status: u16, body: &[u8]) -> ApiResult<Payload> {
    let parsed = serde_json::from_slice::<Value>(body);

    if !(200..300).contains(&status) {
        let message = parsed
            .ok()
            .as_ref()
            .and_then(|v| v.get("error"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Request failed ({})", status));
        return Err(ApiError::Application { status, message });
    }

    let value = parsed.map_err(|e| ApiError::Malformed(format!("invalid JSON body: {}", e)))?;
    let Value::Object(mut map) = value else {
        return Err(ApiError::Malformed("expected a JSON object".to_string()));
    };

    match map.remove("ok") {
        Some(Value::Bool(true)) => Ok(map),
        Some(Value::Bool(false)) => {
            let message = map
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            Err(ApiError::Application { status, message })
        }
        Some(other) => Err(ApiError::Malformed(format!(
            "`ok` must be a boolean, got {}",
            other
        ))),
        None => Err(ApiError::Malformed("missing `ok` field".to_string())),
    }
}
