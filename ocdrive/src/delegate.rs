//! Hand-off of self-contained tasks to a sub-agent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::command_builder::build_delegate_command;
use crate::error::ShimError;
use crate::exec::{ExecOptions, ProcessExecutor};
use crate::opencode::parse_json_or_text;
use crate::types::SecurityPolicy;

/// A task submitted to a sub-agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegatedTask {
    /// Agent role tag, e.g. `opencode_dev`
    pub role: String,
    pub prompt: String,
    /// Short human-readable description
    pub label: String,
    pub timeout: Duration,
}

#[async_trait]
pub trait TaskDelegator: Send + Sync {
    async fn delegate(&self, task: &DelegatedTask) -> Result<serde_json::Value, ShimError>;
}

/// Delegates by running `<agent> run --agent <role>` through the process executor
pub struct CliDelegator {
    agent_binary: String,
    executor: Arc<dyn ProcessExecutor>,
    policy: SecurityPolicy,
}

impl CliDelegator {
    pub fn new(
        agent_binary: impl Into<String>,
        executor: Arc<dyn ProcessExecutor>,
        policy: SecurityPolicy,
    ) -> Self {
        Self {
            agent_binary: agent_binary.into(),
            executor,
            policy,
        }
    }
}

#[async_trait]
impl TaskDelegator for CliDelegator {
    async fn delegate(&self, task: &DelegatedTask) -> Result<serde_json::Value, ShimError> {
        let command = build_delegate_command(&self.agent_binary, &task.role, &task.prompt)?;
        info!(role = %task.role, label = %task.label, "delegating task");

        let options = ExecOptions::foreground(task.timeout, self.policy);
        let output = self
            .executor
            .execute(&command, &options)
            .await
            .map_err(|e| ShimError::Delegation(e.to_string()))?;
        Ok(parse_json_or_text(&output.stdout))
    }
}
