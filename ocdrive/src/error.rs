//! Error taxonomy shared by the driver, supervisor and facade operations.
//!
//! Every variant is converted into a `{success: false, error, hint}` result at
//! the facade boundary; nothing here escapes to the caller as a fault.

use std::path::PathBuf;

use crate::exec::ExecError;
use crate::tmux::TmuxError;

#[derive(Debug, thiserror::Error)]
pub enum ShimError {
    /// Malformed input, e.g. an empty task description
    #[error("Invalid request: {0}")]
    Build(String),
    #[error("Failed to create session {session_id}: {source}")]
    SessionCreate {
        session_id: String,
        #[source]
        source: TmuxError,
    },
    #[error("Failed to capture session {session_id}: {source}")]
    Capture {
        session_id: String,
        #[source]
        source: TmuxError,
    },
    #[error("Failed to send input to session {session_id}: {source}")]
    Send {
        session_id: String,
        #[source]
        source: TmuxError,
    },
    /// Only reported when an explicit kill leaves the session alive
    #[error("Failed to kill session {session_id}: {source}")]
    Kill {
        session_id: String,
        #[source]
        source: TmuxError,
    },
    #[error("Session {session_id} timed out after {elapsed_secs}s without a completion signal")]
    Timeout {
        session_id: String,
        elapsed_secs: u64,
    },
    #[error("Session {session_id} reported an error")]
    TaskErrored { session_id: String },
    #[error("Failed to list sessions: {0}")]
    List(#[source] TmuxError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("Project analysis of {} failed: {source}", .directory.display())]
    Analyze {
        directory: PathBuf,
        #[source]
        source: ExecError,
    },
    #[error("Task delegation failed: {0}")]
    Delegation(String),
    #[error("Unknown action: {0}")]
    UnknownAction(String),
}

impl ShimError {
    /// Short remediation hint for causes that can be classified
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ShimError::Build(_) => Some("Check the task description, directory and model arguments"),
            ShimError::SessionCreate { source, .. }
            | ShimError::Capture { source, .. }
            | ShimError::Send { source, .. }
            | ShimError::Kill { source, .. }
            | ShimError::List(source) => source.hint(),
            ShimError::Timeout { .. } => Some(
                "Increase session.timeout_secs, or use `ocdrive start` and poll with `ocdrive status`",
            ),
            ShimError::TaskErrored { .. } => {
                Some("Inspect the session output; the agent printed an error")
            }
            ShimError::Exec(err) => err.hint(),
            ShimError::Analyze { .. } => Some("Ensure the directory exists and contains code files"),
            ShimError::Delegation(_) => Some("Ensure the opencode CLI supports `run --agent`"),
            ShimError::UnknownAction(_) => Some("Supported actions: list, get, continue, share"),
        }
    }
}
