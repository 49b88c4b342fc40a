use serde::Deserialize;
use thiserror::Error;

/// Raw wire form of a handshake status update. Decoded once at the channel
/// boundary; the rest of the client only ever sees [`ControlMessage`].
///
/// The canonical detail field is `error`. Older gateway revisions used `err`;
/// that spelling is not accepted.
#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// A control message received while a session handshake is in progress.
///
/// `Starting` and `Uploading` are informational progress updates emitted by
/// the gateway while it deploys the sandbox and copies code into it; the
/// client keeps waiting through them. `Running` and `Error` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    Starting,
    Ready,
    Uploading,
    Running,
    Error(String),
}

impl ControlMessage {
    /// Decode one inbound text frame into a control message.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let update: StatusUpdate = serde_json::from_str(raw)?;
        match update.status.as_str() {
            "starting" => Ok(ControlMessage::Starting),
            "ready" => Ok(ControlMessage::Ready),
            "uploading" => Ok(ControlMessage::Uploading),
            "running" => Ok(ControlMessage::Running),
            "error" => Ok(ControlMessage::Error(update.error.unwrap_or_default())),
            other => Err(DecodeError::UnknownStatus(other.to_string())),
        }
    }

    /// Whether this message ends the handshake, one way or the other.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ControlMessage::Running | ControlMessage::Error(_))
    }

    pub fn status_label(&self) -> &'static str {
        match self {
            ControlMessage::Starting => "starting",
            ControlMessage::Ready => "ready",
            ControlMessage::Uploading => "uploading",
            ControlMessage::Running => "running",
            ControlMessage::Error(_) => "error",
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("control message is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown control status '{0}'")]
    UnknownStatus(String),
    #[error("control message must be a text frame")]
    BinaryFrame,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_every_known_status() {
        assert_eq!(
            ControlMessage::decode(r#"{"status":"starting"}"#).unwrap(),
            ControlMessage::Starting
        );
        assert_eq!(
            ControlMessage::decode(r#"{"status":"ready"}"#).unwrap(),
            ControlMessage::Ready
        );
        assert_eq!(
            ControlMessage::decode(r#"{"status":"uploading"}"#).unwrap(),
            ControlMessage::Uploading
        );
        assert_eq!(
            ControlMessage::decode(r#"{"status":"running"}"#).unwrap(),
            ControlMessage::Running
        );
    }

    #[test]
    fn decodes_error_with_detail() {
        let message = ControlMessage::decode(r#"{"status":"error","error":"no such language"}"#)
            .unwrap();
        assert_eq!(message, ControlMessage::Error("no such language".into()));
    }

    #[test]
    fn error_detail_is_optional() {
        let message = ControlMessage::decode(r#"{"status":"error"}"#).unwrap();
        assert_eq!(message, ControlMessage::Error(String::new()));
    }

    #[test]
    fn rejects_unknown_status() {
        let err = ControlMessage::decode(r#"{"status":"rebooting"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownStatus(ref s) if s == "rebooting"));
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(
            ControlMessage::decode("definitely not json"),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn rejects_wrong_shape() {
        assert!(matches!(
            ControlMessage::decode(r#"[1,2,3]"#),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn terminal_statuses() {
        assert!(ControlMessage::Running.is_terminal());
        assert!(ControlMessage::Error(String::new()).is_terminal());
        assert!(!ControlMessage::Starting.is_terminal());
        assert!(!ControlMessage::Ready.is_terminal());
        assert!(!ControlMessage::Uploading.is_terminal());
    }
}
