//! Line codec: one JSON-RPC message per `\n`-terminated line.
//!
//! Encoding produces compact JSON with no embedded newline; the
//! transport appends the terminator. Decoding checks JSON-RPC
//! structure only, never method-specific payload shape.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::jsonrpc::{JsonRpcError, JsonRpcReply, JsonRpcRequest, RequestId, JSONRPC_VERSION};

/// Errors from encoding or decoding a wire line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The request could not be serialized.
    #[error("failed to serialize request: {0}")]
    Serialize(String),
    /// The serialized request contains a newline and cannot be framed.
    #[error("encoded message contains an embedded newline")]
    EmbeddedNewline,
    /// The line is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    /// The line is valid JSON but not an object.
    #[error("message is not a JSON object")]
    NotAnObject,
    /// A required envelope field is absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    /// The `jsonrpc` tag is not "2.0".
    #[error("unsupported jsonrpc version {0}")]
    UnsupportedVersion(String),
    /// An envelope field has the wrong type.
    #[error("invalid `{field}` field: {reason}")]
    InvalidField { field: &'static str, reason: String },
    /// Both `result` and `error` are present.
    #[error("reply carries both `result` and `error`")]
    BothResultAndError,
    /// Neither `result` nor `error` is present.
    #[error("reply carries neither `result` nor `error`")]
    NeitherResultNorError,
}

/// Serializes a request to a single line without its terminator.
pub fn encode_request(request: &JsonRpcRequest) -> Result<String, CodecError> {
    let line = serde_json::to_string(request).map_err(|e| CodecError::Serialize(e.to_string()))?;
    if line.contains('\n') {
        return Err(CodecError::EmbeddedNewline);
    }
    Ok(line)
}

/// Parses one received line into a reply.
///
/// An explicit `"result": null` counts as a present result.
pub fn decode_reply(line: &str) -> Result<JsonRpcReply, CodecError> {
    let value: Value =
        serde_json::from_str(line.trim()).map_err(|e| CodecError::InvalidJson(e.to_string()))?;
    let Value::Object(mut obj) = value else {
        return Err(CodecError::NotAnObject);
    };

    let jsonrpc = take_version(&mut obj)?;
    let id = take_id(&mut obj)?;
    let result = obj.remove("result");
    let error = obj
        .remove("error")
        .map(serde_json::from_value::<JsonRpcError>)
        .transpose()
        .map_err(|e| CodecError::InvalidField {
            field: "error",
            reason: e.to_string(),
        })?;

    match (&result, &error) {
        (Some(_), Some(_)) => Err(CodecError::BothResultAndError),
        (None, None) => Err(CodecError::NeitherResultNorError),
        _ => Ok(JsonRpcReply {
            jsonrpc,
            id,
            result,
            error,
        }),
    }
}

fn take_version(obj: &mut Map<String, Value>) -> Result<String, CodecError> {
    match obj.remove("jsonrpc") {
        Some(Value::String(v)) if v == JSONRPC_VERSION => Ok(v),
        Some(other) => Err(CodecError::UnsupportedVersion(other.to_string())),
        None => Err(CodecError::MissingField("jsonrpc")),
    }
}

fn take_id(obj: &mut Map<String, Value>) -> Result<RequestId, CodecError> {
    match obj.remove("id") {
        None | Some(Value::Null) => Err(CodecError::MissingField("id")),
        Some(raw) => serde_json::from_value(raw).map_err(|e| CodecError::InvalidField {
            field: "id",
            reason: e.to_string(),
        }),
    }
}
