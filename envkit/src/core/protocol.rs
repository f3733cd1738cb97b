//! Control-channel wire format shared by builders and the parent.
//!
//! Every line a builder writes to stdout is either plain text or a tagged
//! line:
//!
//! ```text
//! __HATCH__:<hex of {"v":1,"method":"display_info","args":["world"],"kwargs":{}}>
//! ```
//!
//! The indicator is the text before the first `:`; only an exact match with
//! [`SENTINEL`] switches the line into decode mode.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Literal indicator marking a tagged line.
pub const SENTINEL: &str = "__HATCH__";

/// Payload schema version understood by this build.
pub const SCHEMA_VERSION: u32 = 1;

/// A remote invocation request: method name plus arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    #[serde(rename = "v")]
    pub version: u32,
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl Procedure {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            version: SCHEMA_VERSION,
            method: method.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Encode as a tagged line, without the trailing newline.
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        let payload =
            serde_json::to_vec(self).map_err(|err| ProtocolError::Payload(err.to_string()))?;
        Ok(format!("{SENTINEL}:{}", hex::encode(payload)))
    }

    /// Text contributed to a captured buffer: the first positional argument.
    pub fn captured_text(&self) -> Result<String, ProtocolError> {
        match self.args.first() {
            Some(Value::String(text)) => Ok(text.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(ProtocolError::Arguments {
                method: self.method.clone(),
                reason: "captured invocation has no positional argument".to_string(),
            }),
        }
    }
}

/// One decoded line of builder output.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Ordinary output, including its line terminator if any.
    Plain(String),
    /// A tagged line decoded into a procedure.
    Invocation(Procedure),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("control payload is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("control payload is not a valid procedure: {0}")]
    Payload(String),
    #[error("unsupported control payload version {0} (expected {expected})", expected = SCHEMA_VERSION)]
    Version(u32),
    #[error("unknown capability `{0}`")]
    UnknownMethod(String),
    #[error("`{0}` cannot be invoked over the control channel")]
    NotRemote(String),
    #[error("invalid arguments for `{method}`: {reason}")]
    Arguments { method: String, reason: String },
}

/// Classify a single line of builder output.
pub fn parse_line(line: &str) -> Result<ControlMessage, ProtocolError> {
    match line.split_once(':') {
        Some((SENTINEL, payload)) => {
            decode_payload(payload.trim_end()).map(ControlMessage::Invocation)
        }
        _ => Ok(ControlMessage::Plain(line.to_string())),
    }
}

fn decode_payload(payload: &str) -> Result<Procedure, ProtocolError> {
    let bytes = hex::decode(payload)?;
    let procedure: Procedure =
        serde_json::from_slice(&bytes).map_err(|err| ProtocolError::Payload(err.to_string()))?;
    if procedure.version != SCHEMA_VERSION {
        return Err(ProtocolError::Version(procedure.version));
    }
    Ok(procedure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_lines_pass_through_verbatim() {
        assert_eq!(
            parse_line("hello\n").expect("parse"),
            ControlMessage::Plain("hello\n".to_string())
        );
        assert_eq!(
            parse_line("time: 12:00\n").expect("parse"),
            ControlMessage::Plain("time: 12:00\n".to_string())
        );
    }

    #[test]
    fn indicator_must_match_exactly() {
        let line = format!("{SENTINEL}x:{}\n", hex::encode("{}"));
        assert!(matches!(
            parse_line(&line).expect("parse"),
            ControlMessage::Plain(_)
        ));
    }

    #[test]
    fn tagged_line_decodes_into_procedure() {
        let procedure = Procedure::new("display_info").arg("world");
        let line = format!("{}\n", procedure.to_line().expect("encode"));
        assert_eq!(
            parse_line(&line).expect("parse"),
            ControlMessage::Invocation(procedure)
        );
    }

    #[test]
    fn missing_args_and_kwargs_default_to_empty() {
        let payload = hex::encode(json!({"v": 1, "method": "display"}).to_string());
        let ControlMessage::Invocation(procedure) =
            parse_line(&format!("{SENTINEL}:{payload}")).expect("parse")
        else {
            panic!("expected invocation");
        };
        assert!(procedure.args.is_empty());
        assert!(procedure.kwargs.is_empty());
    }

    #[test]
    fn malformed_hex_is_rejected() {
        let err = parse_line(&format!("{SENTINEL}:zz\n")).unwrap_err();
        assert!(matches!(err, ProtocolError::Hex(_)));
    }

    #[test]
    fn non_procedure_payload_is_rejected() {
        let payload = hex::encode("[1, 2, 3]");
        let err = parse_line(&format!("{SENTINEL}:{payload}")).unwrap_err();
        assert!(matches!(err, ProtocolError::Payload(_)));
    }

    #[test]
    fn future_versions_are_rejected() {
        let payload = hex::encode(json!({"v": 2, "method": "display"}).to_string());
        let err = parse_line(&format!("{SENTINEL}:{payload}")).unwrap_err();
        assert_eq!(err, ProtocolError::Version(2));
        assert_eq!(
            err.to_string(),
            "unsupported control payload version 2 (expected 1)"
        );
    }

    #[test]
    fn captured_text_uses_first_argument() {
        let procedure = Procedure::new("x").arg("b").arg("ignored");
        assert_eq!(procedure.captured_text().expect("text"), "b");
        assert_eq!(
            Procedure::new("x").arg(42).captured_text().expect("text"),
            "42"
        );
        assert!(Procedure::new("x").captured_text().is_err());
    }
}
