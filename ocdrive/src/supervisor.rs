//! Owns a synchronous task's session from creation to teardown.
//!
//! ```text
//! Created -> Polling -> {Completed, Errored, TimedOut} -> Cleaned
//! ```
//!
//! An agent process that exits also ends polling: status 0 (or unknown)
//! counts as completed, any other status as errored.
//!
//! Whatever the terminal state, the session gets one final wide capture
//! followed by exactly one kill, and the kill runs even when the capture
//! fails.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::detector::CompletionDetector;
use crate::driver::SessionLease;
use crate::error::ShimError;
use crate::sanitizer::sanitize;
use crate::tmux::PaneState;
use crate::types::{CompletionSignal, SessionConfig};

/// Timing and capture sizes for the polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
    pub poll_tail_lines: u32,
    pub final_tail_lines: u32,
}

impl PollSettings {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
            poll_tail_lines: config.poll_tail_lines,
            final_tail_lines: config.final_tail_lines,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Created,
    Polling,
    Completed,
    Errored,
    TimedOut,
    Cleaned,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorState::Created => "created",
            SupervisorState::Polling => "polling",
            SupervisorState::Completed => "completed",
            SupervisorState::Errored => "errored",
            SupervisorState::TimedOut => "timed_out",
            SupervisorState::Cleaned => "cleaned",
        };
        write!(f, "{name}")
    }
}

/// How the polling phase ended
#[derive(Debug)]
pub enum TaskOutcome {
    Completed,
    Errored,
    TimedOut,
    /// A capture failed mid-poll, e.g. the session vanished
    Failed(ShimError),
}

impl TaskOutcome {
    fn terminal_state(&self) -> SupervisorState {
        match self {
            TaskOutcome::Completed => SupervisorState::Completed,
            TaskOutcome::Errored | TaskOutcome::Failed(_) => SupervisorState::Errored,
            TaskOutcome::TimedOut => SupervisorState::TimedOut,
        }
    }
}

/// Everything the facade needs to build a run result
#[derive(Debug)]
pub struct SupervisedRun {
    pub session_id: String,
    pub outcome: TaskOutcome,
    /// Sanitized final wide capture
    pub final_capture: Result<String, ShimError>,
    /// Sanitized text of the last successful poll
    pub last_capture: Option<String>,
    pub elapsed: Duration,
}

impl SupervisedRun {
    /// Final capture, or the last polled text when the final capture failed
    pub fn output(&self) -> String {
        match &self.final_capture {
            Ok(text) => text.clone(),
            Err(_) => self.last_capture.clone().unwrap_or_default(),
        }
    }
}

pub struct Supervisor<'a> {
    detector: &'a dyn CompletionDetector,
    settings: PollSettings,
}

impl<'a> Supervisor<'a> {
    pub fn new(detector: &'a dyn CompletionDetector, settings: PollSettings) -> Self {
        Self { detector, settings }
    }

    /// Poll the leased session until it completes, errors or times out, then
    /// capture and release it
    pub async fn supervise(&self, lease: SessionLease) -> SupervisedRun {
        let session_id = lease.session_id().to_string();
        let started = Instant::now();
        let mut state = SupervisorState::Created;
        let mut last_capture = None;

        transition(&session_id, &mut state, SupervisorState::Polling);
        let outcome = loop {
            let elapsed = started.elapsed();
            if elapsed >= self.settings.timeout {
                break TaskOutcome::TimedOut;
            }
            let wait = self.settings.interval.min(self.settings.timeout - elapsed);
            tokio::time::sleep(wait).await;

            let raw = match lease
                .driver()
                .capture(&session_id, self.settings.poll_tail_lines)
                .await
            {
                Ok(raw) => raw,
                Err(e) => break TaskOutcome::Failed(e),
            };
            let text = sanitize(&raw);
            let signal = self.detector.classify(&text);
            debug!(session_id = %session_id, %signal, elapsed_ms = started.elapsed().as_millis() as u64, "poll");
            last_capture = Some(text);

            match signal {
                CompletionSignal::Completed => break TaskOutcome::Completed,
                CompletionSignal::Errored => break TaskOutcome::Errored,
                CompletionSignal::Running => {}
            }
            if let PaneState::Exited { status } = lease.driver().pane_state(&session_id).await {
                debug!(session_id = %session_id, ?status, "agent process exited");
                break match status {
                    Some(code) if code != 0 => TaskOutcome::Errored,
                    _ => TaskOutcome::Completed,
                };
            }
        };
        transition(&session_id, &mut state, outcome.terminal_state());

        let final_capture = lease
            .driver()
            .capture(&session_id, self.settings.final_tail_lines)
            .await
            .map(|raw| sanitize(&raw));
        if let Err(e) = &final_capture {
            debug!(session_id = %session_id, error = %e, "final capture failed");
        }

        lease.release().await;
        transition(&session_id, &mut state, SupervisorState::Cleaned);

        SupervisedRun {
            session_id,
            outcome,
            final_capture,
            last_capture,
            elapsed: started.elapsed(),
        }
    }
}

fn transition(session_id: &str, state: &mut SupervisorState, next: SupervisorState) {
    info!(session_id, from = %state, to = %next, "state transition");
    *state = next;
}
