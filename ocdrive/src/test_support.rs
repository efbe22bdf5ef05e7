//! Scripted in-memory capabilities for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::delegate::{DelegatedTask, TaskDelegator};
use crate::error::ShimError;
use crate::exec::{ExecError, ExecOptions, ExecOutput, ProcessExecutor};
use crate::files::FileReader;
use crate::tmux::{Multiplexer, PaneState, TmuxError};

/// Multiplexer call log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create {
        name: String,
        command: String,
        detached: bool,
    },
    Capture(String, u32),
    Send(String, String, bool),
    Kill(String),
    List,
}

/// How `new_session` misbehaves when scripted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateFailure {
    NotInstalled,
    Duplicate,
    Timeout,
    /// Never returns
    Hang,
}

#[derive(Default)]
struct FakeState {
    sessions: HashSet<String>,
    /// Sessions whose command exited, with its status
    exited: HashMap<String, Option<i32>>,
    /// Per-session capture script; `None` entries fail. The last entry repeats.
    scripts: HashMap<String, VecDeque<Option<String>>>,
    /// Script for sessions created during the test
    default_script: Vec<Option<String>>,
    calls: Vec<Call>,
    create_failure: Option<CreateFailure>,
    fail_kills: bool,
}

/// In-memory multiplexer with scripted captures and a call log
#[derive(Default)]
pub struct FakeMultiplexer {
    state: Mutex<FakeState>,
}

impl FakeMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_session(&self, name: &str) {
        self.state.lock().unwrap().sessions.insert(name.to_string());
    }

    pub fn has(&self, name: &str) -> bool {
        self.state.lock().unwrap().sessions.contains(name)
    }

    pub fn script_captures(&self, name: &str, script: &[Option<&str>]) {
        let script = script.iter().map(|s| s.map(str::to_string)).collect();
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(name.to_string(), script);
    }

    /// Capture script used by every session created after this call
    pub fn script_new_sessions(&self, script: &[Option<&str>]) {
        self.state.lock().unwrap().default_script =
            script.iter().map(|s| s.map(str::to_string)).collect();
    }

    pub fn fail_creates(&self) {
        self.fail_creates_with(CreateFailure::NotInstalled);
    }

    pub fn fail_creates_with(&self, failure: CreateFailure) {
        self.state.lock().unwrap().create_failure = Some(failure);
    }

    /// The session's command exits; its pane stays capturable
    pub fn exit_session(&self, name: &str, status: Option<i32>) {
        self.state
            .lock()
            .unwrap()
            .exited
            .insert(name.to_string(), status);
    }

    pub fn fail_kills(&self) {
        self.state.lock().unwrap().fail_kills = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn created(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Create { name, command, .. } => Some((name, command)),
                _ => None,
            })
            .collect()
    }

    pub fn sent_keys(&self, name: &str) -> Vec<(String, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send(target, keys, literal) if target == name => Some((keys, literal)),
                _ => None,
            })
            .collect()
    }

    pub fn kill_count(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Kill(target) if target == name))
            .count()
    }
}

#[async_trait]
impl Multiplexer for FakeMultiplexer {
    async fn new_session(&self, name: &str, command: &str, detached: bool) -> Result<(), TmuxError> {
        let failure = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Create {
                name: name.to_string(),
                command: command.to_string(),
                detached,
            });
            state.create_failure
        };
        match failure {
            Some(CreateFailure::NotInstalled) => return Err(TmuxError::NotInstalled),
            Some(CreateFailure::Duplicate) => {
                return Err(TmuxError::DuplicateSession(name.to_string()))
            }
            Some(CreateFailure::Timeout) => {
                return Err(TmuxError::Timeout {
                    command: "new-session".to_string(),
                    secs: 10,
                })
            }
            Some(CreateFailure::Hang) => return std::future::pending().await,
            None => {}
        }

        let mut state = self.state.lock().unwrap();
        if !state.sessions.insert(name.to_string()) {
            return Err(TmuxError::DuplicateSession(name.to_string()));
        }
        if !state.default_script.is_empty() && !state.scripts.contains_key(name) {
            let script = state.default_script.iter().cloned().collect();
            state.scripts.insert(name.to_string(), script);
        }
        Ok(())
    }

    async fn pane_state(&self, name: &str) -> Result<PaneState, TmuxError> {
        let state = self.state.lock().unwrap();
        if !state.sessions.contains(name) {
            return Ok(PaneState::Missing);
        }
        Ok(match state.exited.get(name) {
            Some(status) => PaneState::Exited { status: *status },
            None => PaneState::Running,
        })
    }

    async fn capture_pane(&self, name: &str, lines: u32) -> Result<String, TmuxError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Capture(name.to_string(), lines));
        if !state.sessions.contains(name) {
            return Err(TmuxError::NoSuchSession(name.to_string()));
        }
        let next = match state.scripts.get_mut(name) {
            Some(script) if script.len() > 1 => script.pop_front().flatten(),
            Some(script) => script.front().cloned().flatten(),
            None => Some(String::new()),
        };
        next.ok_or_else(|| TmuxError::CommandFailed {
            command: "capture-pane".to_string(),
            stderr: "scripted failure".to_string(),
        })
    }

    async fn send_keys(&self, name: &str, keys: &str, literal: bool) -> Result<(), TmuxError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::Send(name.to_string(), keys.to_string(), literal));
        if state.sessions.contains(name) {
            Ok(())
        } else {
            Err(TmuxError::NoSuchSession(name.to_string()))
        }
    }

    async fn kill_session(&self, name: &str) -> Result<(), TmuxError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Kill(name.to_string()));
        if state.fail_kills {
            return Err(TmuxError::CommandFailed {
                command: "kill-session".to_string(),
                stderr: "server busy".to_string(),
            });
        }
        state.exited.remove(name);
        if state.sessions.remove(name) {
            Ok(())
        } else {
            Err(TmuxError::NoSuchSession(name.to_string()))
        }
    }

    async fn list_sessions(&self) -> Result<Vec<String>, TmuxError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::List);
        let mut names: Vec<String> = state.sessions.iter().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Process executor returning queued responses and recording each call
#[derive(Default)]
pub struct FakeExecutor {
    responses: Mutex<VecDeque<Result<ExecOutput, ExecError>>>,
    calls: Mutex<Vec<(String, ExecOptions)>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: Result<ExecOutput, ExecError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn push_stdout(&self, stdout: &str) {
        self.push_response(Ok(ExecOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
        }));
    }

    pub fn calls(&self) -> Vec<(String, ExecOptions)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|(command, _)| command).collect()
    }
}

#[async_trait]
impl ProcessExecutor for FakeExecutor {
    async fn execute(
        &self,
        command_line: &str,
        options: &ExecOptions,
    ) -> Result<ExecOutput, ExecError> {
        self.calls
            .lock()
            .unwrap()
            .push((command_line.to_string(), options.clone()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ExecOutput::default()))
    }
}

/// File reader over an in-memory map
#[derive(Default)]
pub struct FakeFiles {
    files: Mutex<HashMap<PathBuf, String>>,
}

impl FakeFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), content.to_string());
    }
}

#[async_trait]
impl FileReader for FakeFiles {
    async fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"))
    }
}

/// Delegator that records tasks and answers with a fixed value
#[derive(Default)]
pub struct FakeDelegator {
    tasks: Mutex<Vec<DelegatedTask>>,
}

impl FakeDelegator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> Vec<DelegatedTask> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskDelegator for FakeDelegator {
    async fn delegate(&self, task: &DelegatedTask) -> Result<serde_json::Value, ShimError> {
        self.tasks.lock().unwrap().push(task.clone());
        Ok(serde_json::json!({ "status": "accepted" }))
    }
}
