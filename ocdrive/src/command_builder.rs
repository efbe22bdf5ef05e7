//! Builds the shell command lines handed to tmux or the process executor.
//!
//! Everything here is a pure function of its inputs.

use std::path::{Path, PathBuf};

use crate::error::ShimError;
use crate::types::OutputFormat;

/// Prompt used when resuming an agent session
const CONTINUE_PROMPT: &str = "Continue the previous task";

/// A task to hand to the agent
#[derive(Debug, Clone, Default)]
pub struct TaskRequest {
    pub task: String,
    /// Defaults to the caller's current directory
    pub directory: Option<PathBuf>,
    pub model: Option<String>,
    pub continue_session: bool,
    pub share: bool,
}

impl TaskRequest {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Self::default()
        }
    }

    pub fn in_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn resolved_directory(&self) -> PathBuf {
        self.directory
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Escape text for embedding inside a double-quoted shell argument.
///
/// `"` cannot terminate the argument early; `\`, `$` and `` ` `` are escaped
/// too so the shell hands the agent the text unchanged.
pub fn escape_double_quoted(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Build `cd "<dir>" && <agent> run "<task>" [--format json] [--continue] [--share] [--model <m>]`.
///
/// The model is interpolated unescaped; callers validate it with
/// [`validate_model`] first.
pub fn build_run_command(
    agent_binary: &str,
    request: &TaskRequest,
    format: OutputFormat,
) -> Result<String, ShimError> {
    if request.task.trim().is_empty() {
        return Err(ShimError::Build("task description must not be empty".to_string()));
    }

    let directory = request.resolved_directory();
    let mut cmd = format!(
        "cd \"{}\" && {} run \"{}\"",
        escape_double_quoted(&directory.to_string_lossy()),
        agent_binary,
        escape_double_quoted(&request.task)
    );

    if let Some(flag) = format.flag() {
        cmd.push(' ');
        cmd.push_str(flag);
    }

    if request.continue_session {
        cmd.push_str(" --continue");
    }

    if request.share {
        cmd.push_str(" --share");
    }

    if let Some(model) = &request.model {
        cmd.push_str(&format!(" --model {model}"));
    }

    Ok(cmd)
}

/// Reject model identifiers that could break out of the command line, and
/// models outside `allowed` when that list is non-empty.
pub fn validate_model(model: &str, allowed: &[String]) -> Result<(), ShimError> {
    let well_formed = !model.is_empty()
        && model
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | ':' | '-'));
    if !well_formed {
        return Err(ShimError::Build(format!("invalid model identifier: {model:?}")));
    }
    if !allowed.is_empty() && !allowed.iter().any(|m| m == model) {
        return Err(ShimError::Build(format!(
            "model {model} is not in agent.allowed_models"
        )));
    }
    Ok(())
}

/// Identifiers interpolated into agent subcommands (session ids, hostnames)
fn validate_token(kind: &str, value: &str) -> Result<(), ShimError> {
    let ok = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ':'));
    if ok {
        Ok(())
    } else {
        Err(ShimError::Build(format!("invalid {kind}: {value:?}")))
    }
}

pub fn build_session_list_command(agent_binary: &str, max_count: u32) -> String {
    format!("{agent_binary} session list --max-count {max_count} --format json")
}

pub fn build_export_command(agent_binary: &str, session_id: &str) -> Result<String, ShimError> {
    validate_token("session id", session_id)?;
    Ok(format!("{agent_binary} export {session_id}"))
}

/// Command the caller can run later to resume an agent session
pub fn build_continue_command(agent_binary: &str, session_id: &str) -> Result<String, ShimError> {
    validate_token("session id", session_id)?;
    Ok(format!(
        "{agent_binary} run --session {session_id} \"{CONTINUE_PROMPT}\""
    ))
}

pub fn build_share_command(agent_binary: &str, session_id: &str) -> Result<String, ShimError> {
    validate_token("session id", session_id)?;
    Ok(format!("{agent_binary} session share {session_id}"))
}

pub fn build_init_command(agent_binary: &str, directory: &Path) -> String {
    format!(
        "cd \"{}\" && {agent_binary} /init",
        escape_double_quoted(&directory.to_string_lossy())
    )
}

pub fn build_serve_command(agent_binary: &str, port: u16, hostname: &str) -> Result<String, ShimError> {
    validate_token("hostname", hostname)?;
    Ok(format!("{agent_binary} serve --port {port} --hostname {hostname}"))
}

/// Build `<agent> run --agent <role> "<task>" --format json` for delegated tasks
pub fn build_delegate_command(agent_binary: &str, role: &str, task: &str) -> Result<String, ShimError> {
    validate_token("agent role", role)?;
    if task.trim().is_empty() {
        return Err(ShimError::Build("task description must not be empty".to_string()));
    }
    Ok(format!(
        "{agent_binary} run --agent {role} \"{}\" --format json",
        escape_double_quoted(task)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(task: &str) -> TaskRequest {
        TaskRequest::new(task).in_directory("/repo")
    }

    /// Extract the quoted task argument the shell would pass to the agent
    fn unquoted_task(cmd: &str) -> String {
        let (_, agent_part) = cmd.split_once(" && ").unwrap();
        let words = shlex::split(agent_part).unwrap();
        assert_eq!(words[1], "run");
        words[2].clone()
    }

    #[test]
    fn test_build_run_command_basic() {
        let cmd = build_run_command("opencode", &request("run tests"), OutputFormat::Json).unwrap();
        assert_eq!(cmd, r#"cd "/repo" && opencode run "run tests" --format json"#);
    }

    #[test]
    fn test_build_run_command_flag_order() {
        let mut req = request("fix it").with_model("anthropic/claude-sonnet-4");
        req.continue_session = true;
        req.share = true;
        let cmd = build_run_command("opencode", &req, OutputFormat::Json).unwrap();
        assert_eq!(
            cmd,
            r#"cd "/repo" && opencode run "fix it" --format json --continue --share --model anthropic/claude-sonnet-4"#
        );
    }

    #[test]
    fn test_build_run_command_default_format_has_no_flag() {
        let cmd = build_run_command("opencode", &request("x"), OutputFormat::Default).unwrap();
        assert!(!cmd.contains("--format"));
    }

    #[test]
    fn test_build_run_command_empty_task() {
        let err = build_run_command("opencode", &request("   "), OutputFormat::Json).unwrap_err();
        assert!(matches!(err, ShimError::Build(_)));
    }

    #[test]
    fn test_double_quotes_round_trip() {
        let task = r#"rename "foo" to "bar" and print "done""#;
        let cmd = build_run_command("opencode", &request(task), OutputFormat::Json).unwrap();
        assert_eq!(unquoted_task(&cmd), task);
    }

    #[test]
    fn test_shell_metacharacters_round_trip() {
        let tasks = [
            r#"echo "$HOME" and `whoami`"#,
            r#"trailing backslash \"#,
            r#"a \" sneaky" && rm -rf / #"#,
            "multi\nline \"task\"",
        ];
        for task in tasks {
            let cmd = build_run_command("opencode", &request(task), OutputFormat::Json).unwrap();
            assert_eq!(unquoted_task(&cmd), task, "command: {cmd}");
        }
    }

    #[test]
    fn test_directory_with_spaces_round_trip() {
        let req = TaskRequest::new("x").in_directory("/path/to/my \"odd\" project");
        let cmd = build_run_command("opencode", &req, OutputFormat::Json).unwrap();
        let (cd_part, _) = cmd.split_once(" && ").unwrap();
        let words = shlex::split(cd_part).unwrap();
        assert_eq!(words, vec!["cd", "/path/to/my \"odd\" project"]);
    }

    #[test]
    fn test_validate_model() {
        assert!(validate_model("anthropic/claude-sonnet-4", &[]).is_ok());
        assert!(validate_model("openai/gpt-5.1:latest", &[]).is_ok());
        assert!(validate_model("x; rm -rf /", &[]).is_err());
        assert!(validate_model("", &[]).is_err());

        let allowed = vec!["openai/gpt-5".to_string()];
        assert!(validate_model("openai/gpt-5", &allowed).is_ok());
        assert!(validate_model("openai/gpt-4o", &allowed).is_err());
    }

    #[test]
    fn test_agent_session_commands() {
        assert_eq!(
            build_session_list_command("opencode", 10),
            "opencode session list --max-count 10 --format json"
        );
        assert_eq!(
            build_export_command("opencode", "ses_abc123").unwrap(),
            "opencode export ses_abc123"
        );
        assert_eq!(
            build_continue_command("opencode", "ses_abc123").unwrap(),
            "opencode run --session ses_abc123 \"Continue the previous task\""
        );
        assert_eq!(
            build_share_command("opencode", "ses_abc123").unwrap(),
            "opencode session share ses_abc123"
        );
        assert!(build_export_command("opencode", "x && y").is_err());
    }

    #[test]
    fn test_build_init_and_serve_commands() {
        assert_eq!(
            build_init_command("opencode", Path::new("/repo")),
            r#"cd "/repo" && opencode /init"#
        );
        assert_eq!(
            build_serve_command("opencode", 4096, "127.0.0.1").unwrap(),
            "opencode serve --port 4096 --hostname 127.0.0.1"
        );
        assert!(build_serve_command("opencode", 4096, "0.0.0.0; id").is_err());
    }

    #[test]
    fn test_build_delegate_command() {
        let cmd = build_delegate_command("opencode", "opencode_dev", "say \"hi\"").unwrap();
        assert_eq!(
            cmd,
            r#"opencode run --agent opencode_dev "say \"hi\"" --format json"#
        );
        assert!(build_delegate_command("opencode", "bad role", "x").is_err());
    }
}
