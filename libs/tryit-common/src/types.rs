use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Languages accepted by the run endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Cpp,
    Python,
}

impl Language {
    pub fn from_str(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "cpp" | "c++" => Some(Language::Cpp),
            "python" | "py" => Some(Language::Python),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Cpp => "cpp",
            Language::Python => "python",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a run or visualize request.
///
/// `code` is optional so that a missing field and an empty string are both
/// rejected by the handler with the same client error instead of a
/// deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub code: Option<String>,
}

/// Classifies why a run failed. Serialized alongside the compatibility
/// `error` boolean; absent on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    CompileError,
    RuntimeError,
    Timeout,
    OutputLimit,
}

/// Response body for the run endpoints.
///
/// `error = false` means `output` is the program's stdout; `error = true`
/// means `output` is the best available diagnostic (compiler stderr, runtime
/// stderr, or a failure reason).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    pub output: String,
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
}

impl RunResponse {
    pub fn ok(output: String) -> Self {
        Self {
            output,
            error: false,
            kind: None,
        }
    }

    pub fn failed(output: String, kind: FailureKind) -> Self {
        Self {
            output,
            error: true,
            kind: Some(kind),
        }
    }
}

/// One step of a traced Python execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub event: TraceEventKind,
    pub function: String,
    pub line: u32,
    #[serde(default)]
    pub locals: BTreeMap<String, String>,
    #[serde(default)]
    pub stack: Vec<StackFrame>,
    /// Stdout captured up to and including this step, so the visualizer can
    /// scrub output in lockstep with the timeline.
    #[serde(default)]
    pub stdout: String,
    #[serde(rename = "returnValue", default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceEventKind {
    Call,
    Line,
    Return,
    Exception,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackFrame {
    pub function: String,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

/// Response body for the visualize endpoint.
///
/// Events are strictly ordered by execution; the visualizer's timeline
/// depends on that ordering being stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracePayload {
    pub success: bool,
    #[serde(default)]
    pub events: Vec<TraceEvent>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    /// Set when the event cap was reached and execution was cut off early.
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub error: Option<TraceError>,
}

impl TracePayload {
    /// Payload for a run that failed before the trace hook could report
    /// anything useful (timeout, hook killed by a signal).
    pub fn failure(message: String, stderr: String) -> Self {
        Self {
            success: false,
            events: Vec::new(),
            stdout: String::new(),
            stderr,
            truncated: false,
            error: Some(TraceError {
                message,
                traceback: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_str() {
        assert_eq!(Language::from_str("cpp"), Some(Language::Cpp));
        assert_eq!(Language::from_str("C++"), Some(Language::Cpp));
        assert_eq!(Language::from_str("python"), Some(Language::Python));
        assert_eq!(Language::from_str("PY"), Some(Language::Python));
        assert_eq!(Language::from_str("java"), None);
    }

    #[test]
    fn test_run_response_omits_kind_on_success() {
        let json = serde_json::to_value(RunResponse::ok("42\n".to_string())).unwrap();
        assert_eq!(json["output"], "42\n");
        assert_eq!(json["error"], false);
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_run_response_carries_kind_on_failure() {
        let json = serde_json::to_value(RunResponse::failed(
            "Execution timed out after 5000ms".to_string(),
            FailureKind::Timeout,
        ))
        .unwrap();
        assert_eq!(json["error"], true);
        assert_eq!(json["kind"], "timeout");
    }

    #[test]
    fn test_trace_event_round_trip() {
        // Shape emitted by the trace hook.
        let raw = r#"{
            "event": "return",
            "function": "f",
            "line": 1,
            "locals": {"x": "1"},
            "stack": [{"function": "<module>", "line": 2}, {"function": "f", "line": 1}],
            "stdout": "",
            "returnValue": "1"
        }"#;
        let event: TraceEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.event, TraceEventKind::Return);
        assert_eq!(event.return_value.as_deref(), Some("1"));
        assert_eq!(event.stack.len(), 2);
        assert_eq!(event.locals["x"], "1");
        assert!(event.exception.is_none());
    }

    #[test]
    fn test_trace_payload_defaults() {
        let payload: TracePayload = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(payload.success);
        assert!(payload.events.is_empty());
        assert!(!payload.truncated);
        assert!(payload.error.is_none());
    }

    #[test]
    fn test_exception_event_deserializes_type_field() {
        let raw = r#"{
            "event": "exception",
            "function": "<module>",
            "line": 3,
            "exception": {"type": "ValueError", "message": "boom"}
        }"#;
        let event: TraceEvent = serde_json::from_str(raw).unwrap();
        let exc = event.exception.unwrap();
        assert_eq!(exc.kind, "ValueError");
        assert_eq!(exc.message, "boom");
    }

    #[test]
    fn test_run_request_tolerates_missing_code() {
        let req: RunRequest = serde_json::from_str("{}").unwrap();
        assert!(req.code.is_none());
    }
}
