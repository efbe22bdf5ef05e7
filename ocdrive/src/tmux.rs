use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

/// Default upper bound for a single tmux invocation
const CMD_TIMEOUT: Duration = Duration::from_secs(10);

/// Width and height given to detached sessions so captures are not wrapped at 80 columns
const PANE_WIDTH: &str = "200";
const PANE_HEIGHT: &str = "50";

#[derive(Debug, thiserror::Error)]
pub enum TmuxError {
    #[error("tmux is not installed or not on PATH")]
    NotInstalled,
    #[error("no such tmux session: {0}")]
    NoSuchSession(String),
    #[error("tmux session already exists: {0}")]
    DuplicateSession(String),
    #[error("tmux {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("tmux {command} timed out after {secs}s")]
    Timeout { command: String, secs: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TmuxError {
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            TmuxError::NotInstalled => Some("Ensure tmux is installed and on PATH"),
            TmuxError::NoSuchSession(_) => {
                Some("The session may have exited; run `ocdrive list` to see live sessions")
            }
            TmuxError::DuplicateSession(_) => Some("Kill the existing session or retry"),
            TmuxError::Timeout { .. } => Some("The tmux server is not responding; try `tmux ls`"),
            TmuxError::CommandFailed { .. } | TmuxError::Io(_) => None,
        }
    }
}

/// What tmux reports for a session's active pane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneState {
    /// No session with exactly this name
    Missing,
    Running,
    /// The command exited and `remain-on-exit` kept the pane
    Exited { status: Option<i32> },
}

impl PaneState {
    pub fn is_running(self) -> bool {
        self == PaneState::Running
    }
}

/// Terminal multiplexer capability.
///
/// Every session is addressed by its exact name. All methods are bounded by a
/// wall-clock timeout in the concrete implementation; an overrun is reported
/// as `TmuxError::Timeout`.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    async fn new_session(&self, name: &str, command: &str, detached: bool) -> Result<(), TmuxError>;
    async fn pane_state(&self, name: &str) -> Result<PaneState, TmuxError>;
    /// Last `lines` lines of rendered pane content
    async fn capture_pane(&self, name: &str, lines: u32) -> Result<String, TmuxError>;
    /// Send `keys` to the session; `literal` disables tmux key-name lookup
    async fn send_keys(&self, name: &str, keys: &str, literal: bool) -> Result<(), TmuxError>;
    /// Fails with `NoSuchSession` when the session is already gone
    async fn kill_session(&self, name: &str) -> Result<(), TmuxError>;
    /// Names of all sessions on the server; no server means no sessions
    async fn list_sessions(&self) -> Result<Vec<String>, TmuxError>;
}

/// tmux-backed multiplexer
#[derive(Debug, Clone)]
pub struct Tmux {
    binary: String,
    timeout: Duration,
}

impl Default for Tmux {
    fn default() -> Self {
        Self::new(CMD_TIMEOUT)
    }
}

impl Tmux {
    pub fn new(timeout: Duration) -> Self {
        Self {
            binary: "tmux".to_string(),
            timeout,
        }
    }

    /// Run a tmux command with a timeout, returning its raw output
    async fn run(&self, args: &[String]) -> Result<Output, TmuxError> {
        let command = args.first().cloned().unwrap_or_default();
        let child = Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(TmuxError::NotInstalled),
            Ok(Err(e)) => Err(TmuxError::Io(e)),
            Err(_) => Err(TmuxError::Timeout {
                command,
                secs: self.timeout.as_secs(),
            }),
        }
    }

    /// Run a tmux command and map a non-zero exit to a classified error
    async fn run_checked(&self, target: &str, args: &[String]) -> Result<Output, TmuxError> {
        let output = self.run(args).await?;
        if output.status.success() {
            return Ok(output);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let command = args.first().map(String::as_str).unwrap_or_default();
        Err(classify_failure(command, target, stderr))
    }
}

#[async_trait]
impl Multiplexer for Tmux {
    async fn new_session(&self, name: &str, command: &str, detached: bool) -> Result<(), TmuxError> {
        let args = new_session_args(name, command, detached);
        if detached {
            self.run_checked(name, &args).await?;
            return Ok(());
        }

        // Attached sessions need inherited stdio for interactive use
        let status = Command::new(&self.binary)
            .args(&args)
            .status()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => TmuxError::NotInstalled,
                _ => TmuxError::Io(e),
            })?;
        if !status.success() {
            return Err(TmuxError::CommandFailed {
                command: "new-session".to_string(),
                stderr: format!("exited with {status}"),
            });
        }
        Ok(())
    }

    async fn pane_state(&self, name: &str) -> Result<PaneState, TmuxError> {
        let output = self.run(&pane_state_args(name)).await?;
        // Any failure here means tmux cannot resolve the exact name
        if !output.status.success() {
            return Ok(PaneState::Missing);
        }
        Ok(parse_pane_state(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn capture_pane(&self, name: &str, lines: u32) -> Result<String, TmuxError> {
        let output = self.run_checked(name, &capture_args(name, lines)).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(tail_lines(&stdout, lines as usize))
    }

    async fn send_keys(&self, name: &str, keys: &str, literal: bool) -> Result<(), TmuxError> {
        self.run_checked(name, &send_keys_args(name, keys, literal))
            .await?;
        Ok(())
    }

    async fn kill_session(&self, name: &str) -> Result<(), TmuxError> {
        self.run_checked(name, &kill_args(name)).await?;
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>, TmuxError> {
        let output = self.run(&list_args()).await?;

        // tmux exits non-zero when no server is running - that's just no sessions
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_no_server(&stderr) {
                return Ok(Vec::new());
            }
            return Err(TmuxError::CommandFailed {
                command: "list-sessions".to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// `=name` makes tmux match the session name exactly instead of by prefix or pattern
fn exact_session(name: &str) -> String {
    format!("={name}")
}

/// Active pane of the exactly named session
fn exact_pane(name: &str) -> String {
    format!("={name}:")
}

fn to_args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

/// Detached sessions set `remain-on-exit` in the same invocation, so the pane
/// survives even a command that exits immediately
fn new_session_args(name: &str, command: &str, detached: bool) -> Vec<String> {
    if !detached {
        return to_args(&["new-session", "-s", name, command]);
    }
    let pane = exact_pane(name);
    to_args(&[
        "new-session", "-d", "-s", name, "-x", PANE_WIDTH, "-y", PANE_HEIGHT, command,
        ";",
        "set-option", "-w", "-t", pane.as_str(), "remain-on-exit", "on",
    ])
}

fn pane_state_args(name: &str) -> Vec<String> {
    to_args(&[
        "display-message",
        "-p",
        "-t",
        exact_pane(name).as_str(),
        "#{pane_dead} #{pane_dead_status}",
    ])
}

fn capture_args(name: &str, lines: u32) -> Vec<String> {
    let start_line = format!("-{lines}");
    let pane = exact_pane(name);
    to_args(&[
        "capture-pane",
        "-p",
        "-J",
        "-t",
        pane.as_str(),
        "-S",
        start_line.as_str(),
    ])
}

/// `--` ends option parsing so text such as `-1` is sent, not read as a flag
fn send_keys_args(name: &str, keys: &str, literal: bool) -> Vec<String> {
    let pane = exact_pane(name);
    let mut args = vec!["send-keys", "-t", pane.as_str()];
    if literal {
        args.push("-l");
    }
    args.extend(["--", keys]);
    to_args(&args)
}

fn kill_args(name: &str) -> Vec<String> {
    to_args(&["kill-session", "-t", exact_session(name).as_str()])
}

fn list_args() -> Vec<String> {
    to_args(&["list-sessions", "-F", "#{session_name}"])
}

/// Parse `#{pane_dead} #{pane_dead_status}`
fn parse_pane_state(stdout: &str) -> PaneState {
    let mut fields = stdout.split_whitespace();
    match fields.next() {
        Some("1") => PaneState::Exited {
            status: fields.next().and_then(|code| code.parse().ok()),
        },
        _ => PaneState::Running,
    }
}

fn is_no_server(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("no server running") || lower.contains("error connecting to")
}

/// Map tmux stderr to a classified error
fn classify_failure(command: &str, target: &str, stderr: String) -> TmuxError {
    let lower = stderr.to_lowercase();
    if lower.contains("can't find session")
        || lower.contains("session not found")
        || lower.contains("can't find pane")
        || lower.contains("can't find window")
        || is_no_server(&lower)
    {
        TmuxError::NoSuchSession(target.to_string())
    } else if lower.contains("duplicate session") {
        TmuxError::DuplicateSession(target.to_string())
    } else {
        TmuxError::CommandFailed {
            command: command.to_string(),
            stderr,
        }
    }
}

/// Keep the last `lines` lines, ignoring the blank padding tmux adds below the cursor
pub fn tail_lines(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
