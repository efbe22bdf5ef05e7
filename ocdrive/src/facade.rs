//! The operations exposed to callers. Each returns a uniform `Response`;
//! failures never escape as errors.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tracing::{info, warn};

use crate::command_builder::{build_run_command, validate_model, TaskRequest};
use crate::delegate::{CliDelegator, TaskDelegator};
use crate::detector::{CompletionDetector, HeuristicDetector};
use crate::driver::{SessionDriver, SessionLease};
use crate::error::ShimError;
use crate::exec::{Allowlist, ProcessExecutor, ShellExecutor};
use crate::files::{FileReader, LocalFiles};
use crate::registry::{SessionRecord, SessionRegistry};
use crate::sanitizer::{sanitize, truncate_output};
use crate::supervisor::{PollSettings, Supervisor, TaskOutcome};
use crate::tmux::{Multiplexer, Tmux, TmuxError};
use crate::types::{
    CompletionSignal, ListPayload, MessagePayload, OutputPayload, Response, RunPayload,
    SessionEntry, SessionStatus, ShimConfig, StartPayload, StatusPayload,
};

/// Input sent by `send` when the caller gives none
pub const DEFAULT_SEND_INPUT: &str = "y";

/// External capabilities the facade is built on
pub struct Capabilities {
    pub mux: Arc<dyn Multiplexer>,
    pub executor: Arc<dyn ProcessExecutor>,
    pub files: Arc<dyn FileReader>,
    pub delegator: Arc<dyn TaskDelegator>,
}

impl Capabilities {
    /// tmux, `sh -c` under the configured allowlist, and the local filesystem
    pub fn system(config: &ShimConfig) -> Self {
        let allowlist = Allowlist::new(&config.agent.binary, &config.exec.allowed_programs);
        let executor: Arc<dyn ProcessExecutor> = Arc::new(ShellExecutor::new(allowlist));
        let delegator = Arc::new(CliDelegator::new(
            config.agent.binary.clone(),
            executor.clone(),
            config.exec.policy,
        ));
        Self {
            mux: Arc::new(Tmux::new(Duration::from_secs(
                config.exec.command_timeout_secs,
            ))),
            executor,
            files: Arc::new(LocalFiles),
            delegator,
        }
    }
}

pub struct Shim {
    pub(crate) config: ShimConfig,
    pub(crate) driver: SessionDriver,
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) detector: Arc<dyn CompletionDetector>,
    pub(crate) executor: Arc<dyn ProcessExecutor>,
    pub(crate) files: Arc<dyn FileReader>,
    pub(crate) delegator: Arc<dyn TaskDelegator>,
}

impl Shim {
    pub fn new(config: ShimConfig, capabilities: Capabilities) -> Self {
        let detector = Arc::new(HeuristicDetector::new(&config.detection));
        let registry = Arc::new(SessionRegistry::new(config.session.prefix.clone()));
        Self {
            driver: SessionDriver::new(capabilities.mux),
            registry,
            detector,
            executor: capabilities.executor,
            files: capabilities.files,
            delegator: capabilities.delegator,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn driver(&self) -> &SessionDriver {
        &self.driver
    }

    /// Apply the default model and build the agent command line
    pub(crate) fn prepare(&self, mut request: TaskRequest) -> Result<(String, TaskRequest), ShimError> {
        if request.model.is_none() {
            request.model = self.config.agent.model.clone();
        }
        if let Some(model) = &request.model {
            validate_model(model, &self.config.agent.allowed_models)?;
        }
        let directory = request.resolved_directory();
        request.directory = Some(directory);
        let command = build_run_command(
            &self.config.agent.binary,
            &request,
            self.config.agent.output_format,
        )?;
        Ok((command, request))
    }

    /// Register `request` under a fresh id, then create its detached session.
    ///
    /// The id is registered before tmux is asked for the session, so a launch
    /// interrupted mid-create still leaves an active id to clean up.
    async fn launch(&self, request: TaskRequest) -> Result<(String, String), ShimError> {
        let (command, request) = self.prepare(request)?;
        let session_id = self.registry.generate_id();
        self.registry.register(SessionRecord {
            id: session_id.clone(),
            command: command.clone(),
            directory: request.resolved_directory(),
            model: request.model.clone(),
            created_at: Utc::now(),
        });

        if let Err(e) = self.driver.create(&session_id, &command, true).await {
            // Only a timed-out create can have started our session; a duplicate name belongs to someone else
            let timed_out = matches!(
                e,
                ShimError::SessionCreate {
                    source: TmuxError::Timeout { .. },
                    ..
                }
            );
            if timed_out {
                if let Err(kill_err) = self.driver.kill(&session_id).await {
                    warn!(session_id = %session_id, error = %kill_err, "cleanup after failed create failed");
                }
            }
            self.registry.mark_inactive(&session_id);
            return Err(e);
        }
        Ok((session_id, command))
    }

    fn truncate(&self, text: &str) -> (String, bool) {
        truncate_output(text, self.config.session.max_output_chars)
    }

    /// Run a task to completion, polling until it finishes or times out.
    /// The session is killed before this returns.
    pub async fn run(&self, request: TaskRequest) -> Response<RunPayload> {
        let (session_id, _) = match self.launch(request).await {
            Ok(launched) => launched,
            Err(e) => return Response::failure(&e),
        };

        let lease = SessionLease::new(self.driver.clone(), session_id.clone());
        let settings = PollSettings::from_config(&self.config.session);
        let run = Supervisor::new(self.detector.as_ref(), settings)
            .supervise(lease)
            .await;
        self.registry.mark_inactive(&session_id);

        let (output, truncated) = self.truncate(&run.output());
        let elapsed_secs = run.elapsed.as_secs();
        let status = match run.outcome {
            TaskOutcome::Completed => CompletionSignal::Completed,
            TaskOutcome::Errored | TaskOutcome::Failed(_) => CompletionSignal::Errored,
            TaskOutcome::TimedOut => CompletionSignal::Running,
        };
        let payload = RunPayload {
            session_id: session_id.clone(),
            status,
            output,
            truncated,
            elapsed_secs,
        };

        match run.outcome {
            TaskOutcome::Completed => {
                info!(session_id = %session_id, elapsed_secs, "task completed");
                Response::ok(payload)
            }
            TaskOutcome::Errored => {
                Response::failure_with(payload, &ShimError::TaskErrored { session_id })
            }
            TaskOutcome::TimedOut => Response::failure_with(
                payload,
                &ShimError::Timeout {
                    session_id,
                    elapsed_secs,
                },
            ),
            TaskOutcome::Failed(e) => Response::failure_with(payload, &e),
        }
    }

    /// Start a task in a detached session and return immediately
    pub async fn start(&self, request: TaskRequest) -> Response<StartPayload> {
        match self.launch(request).await {
            Ok((session_id, command)) => Response::ok(StartPayload {
                attach: format!("tmux attach -t {session_id}"),
                instructions: vec![
                    format!("ocdrive status {session_id}"),
                    format!("ocdrive output {session_id}"),
                    format!("ocdrive send {session_id} <input>"),
                    format!("ocdrive kill {session_id}"),
                ],
                session_id,
                command,
            }),
            Err(e) => Response::failure(&e),
        }
    }

    pub async fn status(&self, session_id: &str) -> Response<StatusPayload> {
        let alive = self.driver.is_alive(session_id).await;
        let raw = match self
            .driver
            .capture(session_id, self.config.session.poll_tail_lines)
            .await
        {
            Ok(raw) => raw,
            Err(e) => return Response::failure(&e),
        };

        let text = sanitize(&raw);
        let status = self.detector.classify(&text);
        let prompt_visible = self.detector.prompt_visible(&text);
        let (output, truncated) = self.truncate(&text);
        Response::ok(StatusPayload {
            session_id: session_id.to_string(),
            is_running: alive && status == CompletionSignal::Running,
            prompt_visible,
            status,
            output,
            truncated,
        })
    }

    pub async fn output(&self, session_id: &str, lines: Option<u32>) -> Response<OutputPayload> {
        let lines = lines.unwrap_or(self.config.session.output_tail_lines);
        match self.driver.capture(session_id, lines).await {
            Ok(raw) => {
                let (output, truncated) = self.truncate(&sanitize(&raw));
                Response::ok(OutputPayload {
                    session_id: session_id.to_string(),
                    output,
                    truncated,
                })
            }
            Err(e) => Response::failure(&e),
        }
    }

    /// Type `input` (default `"y"`) into the session and press Enter
    pub async fn send(&self, session_id: &str, input: Option<&str>) -> Response<MessagePayload> {
        let input = input.unwrap_or(DEFAULT_SEND_INPUT);
        match self.driver.send(session_id, input).await {
            Ok(()) => Response::ok(MessagePayload {
                session_id: session_id.to_string(),
                message: format!("Sent {input:?} to session {session_id}"),
            }),
            Err(e) => Response::failure(&e),
        }
    }

    /// Kill the session. Killing a session that is already gone succeeds.
    pub async fn kill(&self, session_id: &str) -> Response<MessagePayload> {
        if let Err(e) = self.driver.kill(session_id).await {
            if self.driver.is_alive(session_id).await {
                return Response::failure(&e);
            }
            warn!(session_id, error = %e, "kill reported an error but the session is gone");
        }
        self.registry.mark_inactive(session_id);
        Response::ok(MessagePayload {
            session_id: session_id.to_string(),
            message: format!("Session {session_id} killed"),
        })
    }

    /// Sessions carrying the configured prefix, each with a fresh classification
    pub async fn list(&self) -> Response<ListPayload> {
        let names = match self.driver.list(self.registry.prefix()).await {
            Ok(names) => names,
            Err(e) => return Response::failure(&e),
        };

        let lines = self.config.session.poll_tail_lines;
        let sessions = join_all(names.into_iter().map(|name| async move {
            let status = match self.driver.capture(&name, lines).await {
                Ok(raw) => SessionStatus::from(self.detector.classify(&sanitize(&raw))),
                Err(_) => SessionStatus::Unknown,
            };
            SessionEntry {
                session_id: name,
                status,
            }
        }))
        .await;

        Response::ok(ListPayload { sessions })
    }
}
