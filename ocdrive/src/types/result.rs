use serde::Serialize;

use super::enums::{CompletionSignal, SessionStatus};
use crate::error::ShimError;

/// Uniform result envelope returned by every facade operation.
///
/// Serializes as `{"success": true, ...payload}` or
/// `{"success": false, "error": "...", "hint": "..."}`. A failed result may
/// still carry a payload (e.g. the output captured before a timeout).
#[derive(Debug, Clone, Serialize)]
pub struct Response<T> {
    pub success: bool,
    #[serde(flatten)]
    pub payload: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl<T> Response<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error: None,
            hint: None,
        }
    }

    pub fn failure(err: &ShimError) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(err.to_string()),
            hint: err.hint().map(str::to_string),
        }
    }

    pub fn failure_with(payload: T, err: &ShimError) -> Self {
        Self {
            payload: Some(payload),
            ..Self::failure(err)
        }
    }

    pub fn from_result(result: Result<T, ShimError>) -> Self {
        match result {
            Ok(payload) => Self::ok(payload),
            Err(err) => Self::failure(&err),
        }
    }
}

/// Payload of a synchronous run
#[derive(Debug, Clone, Serialize)]
pub struct RunPayload {
    pub session_id: String,
    pub status: CompletionSignal,
    pub output: String,
    pub truncated: bool,
    pub elapsed_secs: u64,
}

/// Payload of a background start
#[derive(Debug, Clone, Serialize)]
pub struct StartPayload {
    pub session_id: String,
    pub command: String,
    pub attach: String,
    pub instructions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusPayload {
    pub session_id: String,
    pub is_running: bool,
    pub prompt_visible: bool,
    pub status: CompletionSignal,
    pub output: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputPayload {
    pub session_id: String,
    pub output: String,
    pub truncated: bool,
}

/// Confirmation payload for send and kill
#[derive(Debug, Clone, Serialize)]
pub struct MessagePayload {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionEntry {
    pub session_id: String,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListPayload {
    pub sessions: Vec<SessionEntry>,
}

/// Payload of a direct (non-tmux) agent run
#[derive(Debug, Clone, Serialize)]
pub struct DirectRunPayload {
    pub output: serde_json::Value,
    pub session_url: Option<String>,
}

/// Payloads of the agent's own session management actions
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AgentSessionPayload {
    List {
        sessions: serde_json::Value,
    },
    Get {
        session: serde_json::Value,
    },
    Continue {
        session_id: String,
        command: String,
    },
    Share {
        share_url: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzePayload {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agents_md: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServePayload {
    pub message: String,
    pub url: String,
    pub usage: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuickTaskPayload {
    pub label: String,
    pub result: serde_json::Value,
}
