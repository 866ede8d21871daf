//! Stream-json envelope decoding
//!
//! Turns one raw output line into an [`Envelope`]. There is no business logic
//! here: only the wire schema, decoded permissively.
//!
//! # Error Handling
//!
//! - **Malformed JSON / non-object lines**: returned as [`DecodeError`]. The
//!   pipeline reports these and skips the line.
//!
//! - **Missing or wrongly typed fields**: every field is optional and decoded
//!   leniently, so a bad field becomes absent instead of failing the line.
//!
//! - **Tool input payloads**: decoded a second time, best-effort, into a
//!   [`ToolInput`]. A payload that is not an object yields an empty input.

use crate::error::DecodeError;
use crate::types::{InputValue, ToolInput};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

// ============================================
// Wire records (serde deserialization)
// ============================================

/// One decoded line of stream-json output.
///
/// Field names follow the wire format exactly (snake_case).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub record_type: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub message: Option<EnvelopeMessage>,

    // System init extras (informational)
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    // Result-only fields
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub total_cost_usd: Option<f64>,

    #[serde(default, deserialize_with = "counter", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    #[serde(default, deserialize_with = "counter", skip_serializing_if = "Option::is_none")]
    pub duration_api_ms: Option<u64>,

    #[serde(default, deserialize_with = "counter", skip_serializing_if = "Option::is_none")]
    pub num_turns: Option<u64>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub usage: Option<EnvelopeUsage>,

    /// Final answer text on result envelopes
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// Kind of envelope, from the `type` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeKind {
    System,
    Assistant,
    User,
    Result,
    /// Anything else, kept for forward compatibility
    Other(String),
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &str {
        match self {
            EnvelopeKind::System => "system",
            EnvelopeKind::Assistant => "assistant",
            EnvelopeKind::User => "user",
            EnvelopeKind::Result => "result",
            EnvelopeKind::Other(other) => other,
        }
    }
}

impl Envelope {
    pub fn kind(&self) -> EnvelopeKind {
        match self.record_type.as_deref() {
            Some("system") => EnvelopeKind::System,
            Some("assistant") => EnvelopeKind::Assistant,
            Some("user") => EnvelopeKind::User,
            Some("result") => EnvelopeKind::Result,
            Some(other) => EnvelopeKind::Other(other.to_string()),
            None => EnvelopeKind::Other(String::new()),
        }
    }

    /// Content blocks of the message, or an empty slice.
    pub fn blocks(&self) -> &[ContentBlock] {
        self.message
            .as_ref()
            .map(|m| m.content.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeMessage {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// A bare string decodes as one text block
    #[serde(default, deserialize_with = "content_blocks")]
    pub content: Vec<ContentBlock>,
}

/// One element of `message.content`.
///
/// Only the field group matching `block_type` is meaningful.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub block_type: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    // tool_use
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(
        default,
        deserialize_with = "tool_input",
        serialize_with = "serialize_tool_input",
        skip_serializing_if = "Option::is_none"
    )]
    pub input: Option<ToolInput>,

    // tool_result
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,

    #[serde(
        default,
        deserialize_with = "tool_result_content",
        skip_serializing_if = "Option::is_none"
    )]
    pub content: Option<String>,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            block_type: Some("text".to_string()),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: ToolInput) -> Self {
        Self {
            block_type: Some("tool_use".to_string()),
            id: Some(id.into()),
            name: Some(name.into()),
            input: Some(input),
            ..Default::default()
        }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            block_type: Some("tool_result".to_string()),
            tool_use_id: Some(tool_use_id.into()),
            content: Some(content.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeUsage {
    #[serde(default, deserialize_with = "counter", skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,

    #[serde(default, deserialize_with = "counter", skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,

    #[serde(default, deserialize_with = "counter", skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u64>,

    #[serde(default, deserialize_with = "counter", skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u64>,
}

// ============================================
// Decoding
// ============================================

/// Decode one stream line.
pub fn decode_line(line: &str) -> Result<Envelope, DecodeError> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    if line.trim().is_empty() {
        return Err(DecodeError::Empty);
    }

    let value: Value = serde_json::from_str(line)?;
    if !value.is_object() {
        return Err(DecodeError::NotAnObject {
            found: json_type_name(&value),
        });
    }

    // All fields are lenient, so an object always decodes.
    Ok(serde_json::from_value(value)?)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Decode any field, turning a type mismatch into `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Non-negative integer counter; negatives clamp to 0, fractions truncate.
fn counter<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_counter(&value))
}

fn value_to_counter(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    if value.as_i64().is_some() {
        // as_u64 failed, so this is negative
        return Some(0);
    }
    value.as_f64().map(|f| if f > 0.0 { f as u64 } else { 0 })
}

fn content_blocks<'de, D>(deserializer: D) -> Result<Vec<ContentBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) => vec![ContentBlock::text(text)],
        Value::Array(items) => items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn tool_result_content<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        // [{"type":"text","text":"..."}, ...]
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        other => Some(other.to_string()),
    })
}

fn tool_input<'de, D>(deserializer: D) -> Result<Option<ToolInput>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(Some(decode_tool_input(&value)))
}

fn serialize_tool_input<S>(input: &Option<ToolInput>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match input {
        Some(input) => input.raw.serialize(serializer),
        None => serializer.serialize_none(),
    }
}

/// Best-effort decode of a tool input payload. Never fails.
pub fn decode_tool_input(value: &Value) -> ToolInput {
    let Some(object) = value.as_object() else {
        return ToolInput::default();
    };

    let named = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);

    ToolInput {
        command: named("command"),
        file_path: named("file_path"),
        content: named("content"),
        pattern: named("pattern"),
        old_string: named("old_string"),
        new_string: named("new_string"),
        raw: object
            .iter()
            .filter_map(|(key, value)| input_value(value).map(|v| (key.clone(), v)))
            .collect(),
    }
}

/// Discriminate a JSON value into the closed [`InputValue`] set.
///
/// Tried in a fixed order: string, int, double, bool, null.
fn input_value(value: &Value) -> Option<InputValue> {
    if let Some(s) = value.as_str() {
        return Some(InputValue::String(s.to_string()));
    }
    if let Some(i) = value.as_i64() {
        return Some(InputValue::Int(i));
    }
    if let Some(d) = value.as_f64() {
        return Some(InputValue::Double(d));
    }
    if let Some(b) = value.as_bool() {
        return Some(InputValue::Bool(b));
    }
    if value.is_null() {
        return Some(InputValue::Null);
    }
    None
}
