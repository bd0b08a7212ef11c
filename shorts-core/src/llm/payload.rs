use serde::de::{DeserializeOwned, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key under which an unparseable model response is persisted.
pub const RAW_RESPONSE_KEY: &str = "raw_response";

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Returns the body of the first ```json fence, else the body of the first
/// plain fence, else the whole text.
pub fn extract_json_block(text: &str) -> &str {
    if let Some((_, rest)) = text.split_once(JSON_FENCE) {
        return rest.split(FENCE).next().unwrap_or(rest);
    }
    let mut pieces = text.split(FENCE);
    pieces.next();
    match pieces.next() {
        Some(body) => body,
        None => text,
    }
}

/// Structured model output, or the untouched response when it could not be
/// decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum TextPayload<T = Value> {
    Parsed(T),
    RawFallback(String),
}

impl<T> TextPayload<T> {
    pub fn parsed(&self) -> Option<&T> {
        match self {
            TextPayload::Parsed(value) => Some(value),
            TextPayload::RawFallback(_) => None,
        }
    }

    pub fn into_parsed(self) -> Option<T> {
        match self {
            TextPayload::Parsed(value) => Some(value),
            TextPayload::RawFallback(_) => None,
        }
    }

    pub fn raw(&self) -> Option<&str> {
        match self {
            TextPayload::Parsed(_) => None,
            TextPayload::RawFallback(raw) => Some(raw),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, TextPayload::RawFallback(_))
    }
}

/// Decodes a model response. Never fails: anything that does not decode into
/// `T` becomes [`TextPayload::RawFallback`] carrying the full response.
pub fn parse_payload<T: DeserializeOwned>(text: &str) -> TextPayload<T> {
    let block = extract_json_block(text).trim();
    match serde_json::from_str::<Value>(block) {
        Ok(value) if is_raw_sentinel(&value) => TextPayload::RawFallback(text.to_string()),
        Ok(value) => match serde_json::from_value::<T>(value) {
            Ok(parsed) => TextPayload::Parsed(parsed),
            Err(err) => {
                tracing::warn!(target: "llm", error = %err, "response json does not match expected shape");
                TextPayload::RawFallback(text.to_string())
            }
        },
        Err(err) => {
            tracing::warn!(target: "llm", error = %err, "response is not valid json, keeping raw text");
            TextPayload::RawFallback(text.to_string())
        }
    }
}

fn is_raw_sentinel(value: &Value) -> bool {
    value
        .as_object()
        .map(|object| object.len() == 1 && object.contains_key(RAW_RESPONSE_KEY))
        .unwrap_or(false)
}

impl<T: Serialize> Serialize for TextPayload<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TextPayload::Parsed(value) => value.serialize(serializer),
            TextPayload::RawFallback(raw) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(RAW_RESPONSE_KEY, raw)?;
                map.end()
            }
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for TextPayload<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if is_raw_sentinel(&value) {
            let raw = value
                .get(RAW_RESPONSE_KEY)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Ok(TextPayload::RawFallback(raw));
        }
        serde_json::from_value(value)
            .map(TextPayload::Parsed)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Script;
    use serde_json::json;

    #[test]
    fn extracts_json_fence_first() {
        let text = "intro ```python\nx\n``` then ```json\n{\"a\": 1}\n``` tail";
        assert_eq!(extract_json_block(text).trim(), "{\"a\": 1}");
    }

    #[test]
    fn extracts_generic_fence() {
        let text = "Here you go:\n```\n{\"a\": 2}\n```\nbye";
        assert_eq!(extract_json_block(text).trim(), "{\"a\": 2}");
    }

    #[test]
    fn unfenced_text_is_unchanged() {
        assert_eq!(extract_json_block("{\"a\": 3}"), "{\"a\": 3}");
    }

    #[test]
    fn unterminated_json_fence_takes_the_rest() {
        assert_eq!(extract_json_block("```json\n[1,2]").trim(), "[1,2]");
    }

    #[test]
    fn garbage_becomes_raw_fallback() {
        let text = "Sorry, I cannot help with that.";
        let payload: TextPayload = parse_payload(text);
        assert_eq!(payload, TextPayload::RawFallback(text.to_string()));
    }

    #[test]
    fn shape_mismatch_becomes_raw_fallback() {
        let text = "```json\n{\"scenes\": \"not a list\"}\n```";
        let payload: TextPayload<Script> = parse_payload(text);
        assert_eq!(payload.raw(), Some(text));
    }

    #[test]
    fn fenced_value_parses() {
        let payload: TextPayload = parse_payload("```json\n{\"candidates\": []}\n```");
        assert_eq!(payload, TextPayload::Parsed(json!({"candidates": []})));
    }

    #[test]
    fn raw_fallback_persists_under_sentinel_key() {
        let payload: TextPayload<Script> = TextPayload::RawFallback("oops".into());
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, json!({"raw_response": "oops"}));

        let restored: TextPayload<Script> = serde_json::from_value(value).unwrap();
        assert!(restored.is_raw());
        assert_eq!(restored.raw(), Some("oops"));
    }

    #[test]
    fn parsed_persists_as_plain_value() {
        let payload: TextPayload = TextPayload::Parsed(json!({"titles": {"A": "x"}}));
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, json!({"titles": {"A": "x"}}));
        let restored: TextPayload = serde_json::from_value(value).unwrap();
        assert_eq!(restored, payload);
    }
}
