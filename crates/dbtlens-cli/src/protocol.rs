//! Messages exchanged by `dbtlens serve`, one JSON object per line.
//!
//! Requests carry an `id` and get exactly one `response` or `error` back.
//! Document notifications (`didOpen`, `didChange`, `didClose`,
//! `forceRecompile`) are answered only when they fail.
//!
//! Positions count Unicode scalar values, not UTF-16 code units.

use dbtlens_core::{Diagnostic, Position, Progress, TextEdit};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Request or notification id, echoed back in replies.
pub type RequestId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    DidOpen {
        uri: String,
        version: i32,
        text: String,
        #[serde(default = "default_language_id")]
        language_id: String,
    },
    DidChange {
        uri: String,
        version: i32,
        changes: Vec<TextEdit>,
    },
    DidClose {
        uri: String,
    },
    ForceRecompile {
        uri: String,
    },
    Hover {
        id: RequestId,
        uri: String,
        position: Position,
    },
    Completion {
        id: RequestId,
        uri: String,
        position: Position,
    },
    SignatureHelp {
        id: RequestId,
        uri: String,
        position: Position,
    },
    Status {
        id: RequestId,
        uri: String,
    },
    /// Closes every document and stops the server.
    Shutdown {
        #[serde(default)]
        id: Option<RequestId>,
    },
}

fn default_language_id() -> String {
    "sql".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    PublishDiagnostics {
        uri: String,
        version: i32,
        diagnostics: Vec<Diagnostic>,
    },
    CompiledText {
        uri: String,
        text: String,
    },
    Progress {
        uri: String,
        kind: Progress,
    },
    Response {
        id: RequestId,
        result: Value,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<RequestId>,
        message: String,
    },
}

impl ServerMessage {
    pub fn error(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::Error {
            id,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub fn parse_message(line: &str) -> Result<ClientMessage, ProtocolError> {
    Ok(serde_json::from_str(line)?)
}

/// Serializes `message` as a single line, without the trailing newline.
pub fn encode_message(message: &ServerMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbtlens_core::Range;
    use serde_json::json;

    #[test]
    fn did_open_defaults_language() {
        let message = parse_message(
            r#"{"method":"didOpen","uri":"file:///m.sql","version":1,"text":"SELECT 1"}"#,
        )
        .unwrap();
        assert_eq!(
            message,
            ClientMessage::DidOpen {
                uri: "file:///m.sql".into(),
                version: 1,
                text: "SELECT 1".into(),
                language_id: "sql".into(),
            }
        );
    }

    #[test]
    fn did_change_carries_edits() {
        let message = parse_message(
            r#"{"method":"didChange","uri":"u","version":2,"changes":[
                {"range":{"start":{"line":0,"character":7},"end":{"line":0,"character":8}},"text":"2"}
            ]}"#,
        )
        .unwrap();
        let ClientMessage::DidChange { changes, .. } = message else {
            panic!("expected didChange");
        };
        assert_eq!(changes, [TextEdit::replace(Range::on_line(0, 7, 8), "2")]);
    }

    #[test]
    fn unknown_method_is_malformed() {
        let err = parse_message(r#"{"method":"format","uri":"u"}"#).unwrap_err();
        assert!(err.to_string().starts_with("malformed message"));
    }

    #[test]
    fn server_messages_are_tagged() {
        let line = encode_message(&ServerMessage::Progress {
            uri: "u".into(),
            kind: Progress::Begin,
        })
        .unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&line).unwrap(),
            json!({"type": "progress", "uri": "u", "kind": "begin"})
        );

        let line = encode_message(&ServerMessage::error(None, "boom")).unwrap();
        assert_eq!(line, r#"{"type":"error","message":"boom"}"#);
    }
}
