use serde::{Deserialize, Serialize};

use super::enums::{OutputFormat, SecurityPolicy};

/// Coding agent invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_binary")]
    pub binary: String,
    #[serde(default)]
    pub model: Option<String>,
    /// When non-empty, only these model identifiers are accepted
    #[serde(default)]
    pub allowed_models: Vec<String>,
    #[serde(default)]
    pub output_format: OutputFormat,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            binary: default_agent_binary(),
            model: None,
            allowed_models: Vec::new(),
            output_format: OutputFormat::Json,
        }
    }
}

/// Session naming and polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_prefix")]
    pub prefix: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_poll_tail_lines")]
    pub poll_tail_lines: u32,
    #[serde(default = "default_final_tail_lines")]
    pub final_tail_lines: u32,
    #[serde(default = "default_final_tail_lines")]
    pub output_tail_lines: u32,
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prefix: default_session_prefix(),
            poll_interval_secs: 3,
            timeout_secs: 300,
            poll_tail_lines: 50,
            final_tail_lines: 100,
            output_tail_lines: 100,
            max_output_chars: 50_000,
        }
    }
}

/// Completion detector policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_prompt_markers")]
    pub prompt_markers: Vec<String>,
    #[serde(default = "default_error_keyword")]
    pub error_keyword: String,
    /// Substrings that suppress the error classification when present
    #[serde(default = "default_benign_tokens")]
    pub benign_tokens: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            prompt_markers: default_prompt_markers(),
            error_keyword: default_error_keyword(),
            benign_tokens: default_benign_tokens(),
        }
    }
}

/// Process execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default)]
    pub policy: SecurityPolicy,
    /// Programs allowed in addition to `cd`, `tmux` and the agent binary
    #[serde(default)]
    pub allowed_programs: Vec<String>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 10,
            policy: SecurityPolicy::Allowlist,
            allowed_programs: Vec::new(),
        }
    }
}

/// Top-level shim configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShimConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub exec: ExecConfig,
}

/// Type of config file location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathConfigType {
    Local,
    Global,
}

/// Resolved config file location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    pub config_type: PathConfigType,
    pub config_path: String,
}

fn default_agent_binary() -> String {
    "opencode".to_string()
}

fn default_session_prefix() -> String {
    "opencode-".to_string()
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_poll_tail_lines() -> u32 {
    50
}

fn default_final_tail_lines() -> u32 {
    100
}

fn default_max_output_chars() -> usize {
    50_000
}

fn default_prompt_markers() -> Vec<String> {
    vec!["❯".to_string(), "›".to_string(), "➜".to_string()]
}

fn default_error_keyword() -> String {
    "error".to_string()
}

fn default_benign_tokens() -> Vec<String> {
    vec!["0 errors".to_string(), "no errors".to_string()]
}

fn default_command_timeout_secs() -> u64 {
    10
}
