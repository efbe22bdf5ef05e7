//! Process execution capability with timeout and allow-list policy.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::types::SecurityPolicy;

/// Options for a single execution
#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub timeout: Duration,
    /// Spawn and return immediately without waiting for output
    pub background: bool,
    pub policy: SecurityPolicy,
}

impl ExecOptions {
    pub fn foreground(timeout: Duration, policy: SecurityPolicy) -> Self {
        Self {
            timeout,
            background: false,
            policy,
        }
    }

    pub fn background(policy: SecurityPolicy) -> Self {
        Self {
            timeout: Duration::from_secs(5),
            background: true,
            policy,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Command denied by allowlist policy: {0}")]
    PolicyDenied(String),
    #[error("Failed to spawn command: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Command timed out after {0}s")]
    Timeout(u64),
    #[error("Command exited with status {code}: {message}")]
    NonZeroExit { code: i32, message: String },
}

impl ExecError {
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ExecError::PolicyDenied(_) => {
                Some("Add the program to exec.allowed_programs or set exec.policy to full")
            }
            ExecError::Spawn(_) | ExecError::NonZeroExit { .. } => {
                Some("Ensure the opencode CLI is installed and an API key is configured")
            }
            ExecError::Timeout(_) => Some("The command exceeded its time limit; retry with a longer timeout"),
        }
    }
}

#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    async fn execute(&self, command_line: &str, options: &ExecOptions)
        -> Result<ExecOutput, ExecError>;
}

/// Programs a command line may invoke under the allowlist policy
#[derive(Debug, Clone)]
pub struct Allowlist {
    programs: Vec<String>,
}

impl Allowlist {
    pub fn new(agent_binary: &str, extra: &[String]) -> Self {
        let mut programs = vec!["cd".to_string(), "tmux".to_string(), program_name(agent_binary)];
        programs.extend(extra.iter().map(|p| program_name(p)));
        programs.sort();
        programs.dedup();
        Self { programs }
    }

    /// Every compound or pipeline segment must start with an allowed program
    pub fn check(&self, command_line: &str) -> Result<(), ExecError> {
        let segments = split_segments(command_line)
            .ok_or_else(|| ExecError::PolicyDenied("unbalanced quotes".to_string()))?;

        for segment in segments {
            let words = shlex::split(&segment)
                .ok_or_else(|| ExecError::PolicyDenied(format!("unparseable segment: {segment}")))?;
            let Some(program) = words.iter().find(|w| !is_env_assignment(w)) else {
                continue;
            };
            let name = program_name(program);
            if !self.programs.contains(&name) {
                return Err(ExecError::PolicyDenied(name));
            }
        }
        Ok(())
    }
}

/// Runs command lines through `sh -c`
pub struct ShellExecutor {
    allowlist: Allowlist,
}

impl ShellExecutor {
    pub fn new(allowlist: Allowlist) -> Self {
        Self { allowlist }
    }
}

#[async_trait]
impl ProcessExecutor for ShellExecutor {
    async fn execute(
        &self,
        command_line: &str,
        options: &ExecOptions,
    ) -> Result<ExecOutput, ExecError> {
        if options.policy == SecurityPolicy::Allowlist {
            self.allowlist.check(command_line)?;
        }
        debug!(command = command_line, background = options.background, "executing");

        if options.background {
            let mut child = Command::new("sh")
                .arg("-c")
                .arg(command_line)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(ExecError::Spawn)?;
            // Reap in the background so the child does not linger as a zombie
            tokio::spawn(async move {
                let _ = child.wait().await;
            });
            return Ok(ExecOutput::default());
        }

        let child = Command::new("sh")
            .arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(options.timeout, child).await {
            Ok(result) => result.map_err(ExecError::Spawn)?,
            Err(_) => return Err(ExecError::Timeout(options.timeout.as_secs())),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let message = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(ExecError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                message,
            });
        }

        Ok(ExecOutput { stdout, stderr })
    }
}

fn program_name(word: &str) -> String {
    Path::new(word)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| word.to_string())
}

fn is_env_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

/// Split a command line on `&&`, `||`, `&`, `;`, `|` and newlines outside of quotes.
///
/// Returns `None` when a quote is left open.
fn split_segments(command_line: &str) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = command_line.chars().peekable();
    let mut in_single = false;
    let mut in_double = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' if !in_single => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '\'' if !in_double => {
                in_single = !in_single;
                current.push(c);
            }
            '"' if !in_single => {
                in_double = !in_double;
                current.push(c);
            }
            '&' | '|' | ';' | '\n' if !in_single && !in_double => {
                if (c == '&' || c == '|') && chars.peek() == Some(&c) {
                    chars.next();
                }
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }

    if in_single || in_double {
        return None;
    }
    segments.push(current);
    Some(
        segments
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}
