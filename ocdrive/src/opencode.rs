//! Operations that call the agent CLI directly, without a tmux session.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use tracing::info;

use crate::command_builder::{
    build_continue_command, build_export_command, build_init_command, build_serve_command,
    build_session_list_command, build_share_command, TaskRequest,
};
use crate::delegate::DelegatedTask;
use crate::error::ShimError;
use crate::exec::{ExecOptions, ExecOutput};
use crate::facade::Shim;
use crate::types::{
    AgentSessionPayload, AnalyzePayload, DirectRunPayload, QuickTaskPayload, Response,
    ServePayload,
};

const DIRECT_RUN_TIMEOUT: Duration = Duration::from_secs(300);
const ANALYZE_TIMEOUT: Duration = Duration::from_secs(120);
const QUICK_TASK_TIMEOUT: Duration = Duration::from_secs(600);
const QUICK_TASK_ROLE: &str = "opencode_dev";
const LABEL_TASK_CHARS: usize = 50;

pub const DEFAULT_SERVE_PORT: u16 = 4096;
pub const DEFAULT_SERVE_HOSTNAME: &str = "127.0.0.1";
pub const DEFAULT_SESSION_LIST_COUNT: u32 = 10;

/// Session management actions of the agent CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    List,
    Get,
    Continue,
    Share,
}

impl std::str::FromStr for SessionAction {
    type Err = ShimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list" => Ok(SessionAction::List),
            "get" => Ok(SessionAction::Get),
            "continue" => Ok(SessionAction::Continue),
            "share" => Ok(SessionAction::Share),
            other => Err(ShimError::UnknownAction(other.to_string())),
        }
    }
}

/// Parse `text` as JSON, falling back to the raw text as a JSON string
pub fn parse_json_or_text(text: &str) -> Value {
    let trimmed = text.trim();
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// `OpenCode: <first 50 chars>...`
fn quick_task_label(task: &str) -> String {
    let head: String = task.chars().take(LABEL_TASK_CHARS).collect();
    format!("OpenCode: {head}...")
}

impl Shim {
    fn foreground(&self, timeout: Duration) -> ExecOptions {
        ExecOptions::foreground(timeout, self.config.exec.policy)
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.config.exec.command_timeout_secs)
    }

    async fn execute(&self, command: &str, options: &ExecOptions) -> Result<ExecOutput, ShimError> {
        Ok(self.executor.execute(command, options).await?)
    }

    /// Run the agent to completion through the process executor
    pub async fn exec_direct(&self, request: TaskRequest) -> Response<DirectRunPayload> {
        Response::from_result(self.try_exec_direct(request).await)
    }

    async fn try_exec_direct(&self, request: TaskRequest) -> Result<DirectRunPayload, ShimError> {
        let (command, _) = self.prepare(request)?;
        let output = self
            .execute(&command, &self.foreground(DIRECT_RUN_TIMEOUT))
            .await?;
        let text = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        let output = parse_json_or_text(&text);
        let session_url = output
            .get("share_url")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(DirectRunPayload {
            output,
            session_url,
        })
    }

    /// Dispatch one of the agent's session management actions
    pub async fn session_action(
        &self,
        action: &str,
        session_id: Option<&str>,
        max_count: Option<u32>,
    ) -> Response<AgentSessionPayload> {
        Response::from_result(self.try_session_action(action, session_id, max_count).await)
    }

    async fn try_session_action(
        &self,
        action: &str,
        session_id: Option<&str>,
        max_count: Option<u32>,
    ) -> Result<AgentSessionPayload, ShimError> {
        let action: SessionAction = action.parse()?;
        let binary = &self.config.agent.binary;
        let options = self.foreground(self.default_timeout());
        let require_id = || {
            session_id.ok_or_else(|| {
                ShimError::Build("a session id is required for this action".to_string())
            })
        };

        match action {
            SessionAction::List => {
                let count = max_count.unwrap_or(DEFAULT_SESSION_LIST_COUNT);
                let command = build_session_list_command(binary, count);
                let output = self.execute(&command, &options).await?;
                let sessions = if output.stdout.trim().is_empty() {
                    Value::Array(Vec::new())
                } else {
                    parse_json_or_text(&output.stdout)
                };
                Ok(AgentSessionPayload::List { sessions })
            }
            SessionAction::Get => {
                let command = build_export_command(binary, require_id()?)?;
                let output = self.execute(&command, &options).await?;
                let session = if output.stdout.trim().is_empty() {
                    Value::Object(serde_json::Map::new())
                } else {
                    parse_json_or_text(&output.stdout)
                };
                Ok(AgentSessionPayload::Get { session })
            }
            SessionAction::Continue => {
                let id = require_id()?;
                Ok(AgentSessionPayload::Continue {
                    command: build_continue_command(binary, id)?,
                    session_id: id.to_string(),
                })
            }
            SessionAction::Share => {
                let command = build_share_command(binary, require_id()?)?;
                let output = self.execute(&command, &options).await?;
                let url = output.stdout.trim();
                Ok(AgentSessionPayload::Share {
                    share_url: (!url.is_empty()).then(|| url.to_string()),
                })
            }
        }
    }

    /// Run the agent's project initialization and return the generated AGENTS.md
    pub async fn analyze(&self, directory: Option<PathBuf>) -> Response<AnalyzePayload> {
        Response::from_result(self.try_analyze(directory).await)
    }

    async fn try_analyze(&self, directory: Option<PathBuf>) -> Result<AnalyzePayload, ShimError> {
        let directory = match directory {
            Some(dir) => dir,
            None => TaskRequest::default().resolved_directory(),
        };
        let command = build_init_command(&self.config.agent.binary, &directory);
        let output = self
            .executor
            .execute(&command, &self.foreground(ANALYZE_TIMEOUT))
            .await
            .map_err(|source| ShimError::Analyze {
                directory: directory.clone(),
                source,
            })?;

        let agents_path = directory.join("AGENTS.md");
        match self.files.read_to_string(&agents_path).await {
            Ok(content) => Ok(AnalyzePayload {
                message: "Project analysis complete; AGENTS.md created".to_string(),
                agents_md: Some(content),
                output: None,
            }),
            Err(e) => {
                info!(path = %agents_path.display(), error = %e, "AGENTS.md not readable after init");
                Ok(AnalyzePayload {
                    message: "Project analysis complete, but AGENTS.md was not found"
                        .to_string(),
                    agents_md: None,
                    output: Some(output.stdout),
                })
            }
        }
    }

    /// Start the agent's HTTP server in the background
    pub async fn serve(&self, port: Option<u16>, hostname: Option<&str>) -> Response<ServePayload> {
        Response::from_result(self.try_serve(port, hostname).await)
    }

    async fn try_serve(
        &self,
        port: Option<u16>,
        hostname: Option<&str>,
    ) -> Result<ServePayload, ShimError> {
        let port = port.unwrap_or(DEFAULT_SERVE_PORT);
        let hostname = hostname.unwrap_or(DEFAULT_SERVE_HOSTNAME);
        let command = build_serve_command(&self.config.agent.binary, port, hostname)?;
        self.execute(&command, &ExecOptions::background(self.config.exec.policy))
            .await?;

        let url = format!("http://{hostname}:{port}");
        Ok(ServePayload {
            message: format!("OpenCode server started on {hostname}:{port}"),
            usage: format!("Connect with the SDK: createOpencodeClient({{ baseUrl: '{url}' }})"),
            url,
        })
    }

    /// Hand a development task to the `opencode_dev` sub-agent
    pub async fn quick_task(
        &self,
        task: &str,
        directory: Option<PathBuf>,
    ) -> Response<QuickTaskPayload> {
        Response::from_result(self.try_quick_task(task, directory).await)
    }

    async fn try_quick_task(
        &self,
        task: &str,
        directory: Option<PathBuf>,
    ) -> Result<QuickTaskPayload, ShimError> {
        if task.trim().is_empty() {
            return Err(ShimError::Build("task description must not be empty".to_string()));
        }
        let directory = match directory {
            Some(dir) => dir,
            None => TaskRequest::default().resolved_directory(),
        };
        let delegated = DelegatedTask {
            role: QUICK_TASK_ROLE.to_string(),
            prompt: format!(
                "In directory \"{}\", carry out the following development task:\n\n{task}",
                directory.display()
            ),
            label: quick_task_label(task),
            timeout: QUICK_TASK_TIMEOUT,
        };
        let result = self.delegator.delegate(&delegated).await?;
        Ok(QuickTaskPayload {
            label: delegated.label,
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::exec::ExecError;
    use crate::facade::Capabilities;
    use crate::test_support::{FakeDelegator, FakeExecutor, FakeFiles, FakeMultiplexer};
    use crate::types::ShimConfig;

    struct Harness {
        shim: Shim,
        executor: Arc<FakeExecutor>,
        files: Arc<FakeFiles>,
        delegator: Arc<FakeDelegator>,
    }

    fn harness() -> Harness {
        let executor = Arc::new(FakeExecutor::new());
        let files = Arc::new(FakeFiles::new());
        let delegator = Arc::new(FakeDelegator::new());
        let shim = Shim::new(
            ShimConfig::default(),
            Capabilities {
                mux: Arc::new(FakeMultiplexer::new()),
                executor: executor.clone(),
                files: files.clone(),
                delegator: delegator.clone(),
            },
        );
        Harness {
            shim,
            executor,
            files,
            delegator,
        }
    }

    fn json<T: serde::Serialize>(response: &Response<T>) -> Value {
        serde_json::to_value(response).unwrap()
    }

    #[test]
    fn test_parse_json_or_text() {
        assert_eq!(parse_json_or_text(" {\"a\": 1}\n")["a"], 1);
        assert_eq!(parse_json_or_text("plain text"), Value::String("plain text".into()));
    }

    #[test]
    fn test_quick_task_label_truncates() {
        let task = "x".repeat(80);
        let label = quick_task_label(&task);
        assert_eq!(label, format!("OpenCode: {}...", "x".repeat(50)));
        assert_eq!(quick_task_label("short"), "OpenCode: short...");
    }

    #[test]
    fn test_session_action_parse() {
        assert_eq!("share".parse::<SessionAction>().unwrap(), SessionAction::Share);
        assert!(matches!(
            "delete".parse::<SessionAction>(),
            Err(ShimError::UnknownAction(_))
        ));
    }

    #[tokio::test]
    async fn test_exec_direct_parses_json_and_share_url() {
        let h = harness();
        h.executor
            .push_stdout("{\"share_url\": \"https://opencode.ai/s/abc\", \"text\": \"done\"}");

        let value = json(&h.shim.exec_direct(TaskRequest::new("run tests").in_directory("/repo")).await);
        assert_eq!(value["success"], true);
        assert_eq!(value["output"]["text"], "done");
        assert_eq!(value["session_url"], "https://opencode.ai/s/abc");

        let calls = h.executor.calls();
        assert_eq!(calls[0].0, r#"cd "/repo" && opencode run "run tests" --format json"#);
        assert_eq!(calls[0].1.timeout, Duration::from_secs(300));
        assert!(!calls[0].1.background);
    }

    #[tokio::test]
    async fn test_exec_direct_falls_back_to_stderr_text() {
        let h = harness();
        h.executor.push_response(Ok(ExecOutput {
            stdout: String::new(),
            stderr: "warming up".to_string(),
        }));

        let value = json(&h.shim.exec_direct(TaskRequest::new("x").in_directory("/repo")).await);
        assert_eq!(value["output"], "warming up");
        assert!(value["session_url"].is_null());
    }

    #[tokio::test]
    async fn test_exec_direct_failure_has_hint() {
        let h = harness();
        h.executor.push_response(Err(ExecError::NonZeroExit {
            code: 1,
            message: "missing API key".to_string(),
        }));

        let value = json(&h.shim.exec_direct(TaskRequest::new("x").in_directory("/repo")).await);
        assert_eq!(value["success"], false);
        assert!(value["error"].as_str().unwrap().contains("missing API key"));
        assert!(value["hint"].as_str().unwrap().contains("API key"));
    }

    #[tokio::test]
    async fn test_session_list_defaults() {
        let h = harness();
        h.executor.push_stdout("");

        let value = json(&h.shim.session_action("list", None, None).await);
        assert_eq!(value["success"], true);
        assert_eq!(value["sessions"], serde_json::json!([]));
        assert_eq!(
            h.executor.commands(),
            vec!["opencode session list --max-count 10 --format json"]
        );
    }

    #[tokio::test]
    async fn test_session_get_parses_export() {
        let h = harness();
        h.executor.push_stdout("{\"id\": \"ses_1\", \"messages\": []}");

        let value = json(&h.shim.session_action("get", Some("ses_1"), None).await);
        assert_eq!(value["session"]["id"], "ses_1");
        assert_eq!(h.executor.commands(), vec!["opencode export ses_1"]);
    }

    #[tokio::test]
    async fn test_session_continue_does_not_execute() {
        let h = harness();
        let value = json(&h.shim.session_action("continue", Some("ses_1"), None).await);
        assert_eq!(value["success"], true);
        assert_eq!(value["session_id"], "ses_1");
        assert_eq!(
            value["command"],
            "opencode run --session ses_1 \"Continue the previous task\""
        );
        assert!(h.executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_session_share_trims_url() {
        let h = harness();
        h.executor.push_stdout("https://opencode.ai/s/xyz\n");
        let value = json(&h.shim.session_action("share", Some("ses_1"), None).await);
        assert_eq!(value["share_url"], "https://opencode.ai/s/xyz");

        h.executor.push_stdout("  \n");
        let value = json(&h.shim.session_action("share", Some("ses_1"), None).await);
        assert!(value["share_url"].is_null());
    }

    #[tokio::test]
    async fn test_session_action_requires_id() {
        let h = harness();
        for action in ["get", "continue", "share"] {
            let value = json(&h.shim.session_action(action, None, None).await);
            assert_eq!(value["success"], false, "action {action}");
        }
        assert!(h.executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_action() {
        let h = harness();
        let value = json(&h.shim.session_action("delete", None, None).await);
        assert_eq!(value["success"], false);
        assert!(value["error"].as_str().unwrap().contains("delete"));
        assert!(value["hint"].as_str().unwrap().contains("list, get, continue, share"));
    }

    #[tokio::test]
    async fn test_analyze_returns_agents_md() {
        let h = harness();
        h.files.insert("/repo/AGENTS.md", "# Project\n");

        let value = json(&h.shim.analyze(Some(PathBuf::from("/repo"))).await);
        assert_eq!(value["success"], true);
        assert_eq!(value["agents_md"], "# Project\n");

        let calls = h.executor.calls();
        assert_eq!(calls[0].0, r#"cd "/repo" && opencode /init"#);
        assert_eq!(calls[0].1.timeout, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_analyze_without_agents_md_returns_stdout() {
        let h = harness();
        h.executor.push_stdout("initialized");

        let value = json(&h.shim.analyze(Some(PathBuf::from("/repo"))).await);
        assert_eq!(value["success"], true);
        assert!(value.get("agents_md").is_none());
        assert_eq!(value["output"], "initialized");
        assert!(value["message"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_analyze_failure_hints_at_directory() {
        let h = harness();
        h.executor.push_response(Err(ExecError::NonZeroExit {
            code: 1,
            message: "no such file or directory".to_string(),
        }));

        let value = json(&h.shim.analyze(Some(PathBuf::from("/missing"))).await);
        assert_eq!(value["success"], false);
        assert!(value["error"].as_str().unwrap().contains("/missing"));
        assert_eq!(
            value["hint"],
            "Ensure the directory exists and contains code files"
        );
    }

    #[tokio::test]
    async fn test_serve_runs_in_background() {
        let h = harness();
        let value = json(&h.shim.serve(None, None).await);
        assert_eq!(value["success"], true);
        assert_eq!(value["url"], "http://127.0.0.1:4096");
        assert!(value["usage"].as_str().unwrap().contains("createOpencodeClient"));

        let calls = h.executor.calls();
        assert_eq!(calls[0].0, "opencode serve --port 4096 --hostname 127.0.0.1");
        assert!(calls[0].1.background);
    }

    #[tokio::test]
    async fn test_quick_task_delegates_to_dev_role() {
        let h = harness();
        let value = json(&h.shim.quick_task("add tests", Some(PathBuf::from("/repo"))).await);
        assert_eq!(value["success"], true);
        assert_eq!(value["label"], "OpenCode: add tests...");
        assert_eq!(value["result"]["status"], "accepted");

        let tasks = h.delegator.tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].role, "opencode_dev");
        assert_eq!(tasks[0].timeout, Duration::from_secs(600));
        assert_eq!(
            tasks[0].prompt,
            "In directory \"/repo\", carry out the following development task:\n\nadd tests"
        );
    }

    #[tokio::test]
    async fn test_quick_task_rejects_empty_task() {
        let h = harness();
        assert!(!h.shim.quick_task("  ", None).await.success);
        assert!(h.delegator.tasks().is_empty());
    }
}
