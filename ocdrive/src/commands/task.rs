//! Task commands - run, start and exec

use std::path::PathBuf;

use chrono::Utc;
use colored::Colorize;
use tracing::warn;

use super::{block_on, build_shim, emit};
use crate::command_builder::TaskRequest;
use crate::types::OutputFormat;

/// Arguments shared by the task commands
pub struct TaskOptions<'a> {
    pub task: &'a str,
    pub directory: Option<PathBuf>,
    pub model: Option<&'a str>,
    pub continue_session: bool,
    pub share: bool,
    pub format: Option<OutputFormat>,
}

impl TaskOptions<'_> {
    fn request(&self) -> TaskRequest {
        let mut request = TaskRequest::new(self.task);
        if let Some(directory) = &self.directory {
            request = request.in_directory(directory.clone());
        }
        if let Some(model) = self.model {
            request = request.with_model(model);
        }
        request.continue_session = self.continue_session;
        request.share = self.share;
        request
    }
}

fn shim_for(opts: &TaskOptions<'_>) -> anyhow::Result<crate::facade::Shim> {
    let mut shim = build_shim()?;
    if let Some(format) = opts.format {
        shim.config.agent.output_format = format;
    }
    Ok(shim)
}

/// Run a task in tmux and wait for it. Ctrl-C kills the session before exiting.
pub fn run(opts: &TaskOptions<'_>) -> anyhow::Result<()> {
    let shim = shim_for(opts)?;
    let request = opts.request();

    let response = block_on(async {
        tokio::select! {
            response = shim.run(request) => Some(response),
            _ = tokio::signal::ctrl_c() => {
                for session_id in shim.registry().active_ids() {
                    if let Some(record) = shim.registry().get(&session_id) {
                        let age_secs = (Utc::now() - record.created_at).num_seconds();
                        warn!(
                            session_id = %record.id,
                            directory = %record.directory.display(),
                            model = ?record.model,
                            command = %record.command,
                            age_secs,
                            "interrupted, killing session"
                        );
                    }
                    if let Err(e) = shim.driver().kill(&session_id).await {
                        warn!(session_id = %session_id, error = %e, "kill after interrupt failed");
                    }
                }
                None
            }
        }
    })?;

    match response {
        Some(response) => emit(&response),
        None => {
            eprintln!("{}", "Interrupted; session cleaned up".yellow());
            std::process::exit(130);
        }
    }
}

/// Start a task in a detached session and print how to follow it
pub fn start(opts: &TaskOptions<'_>) -> anyhow::Result<()> {
    let shim = shim_for(opts)?;
    let response = block_on(shim.start(opts.request()))?;
    emit(&response)
}

/// Run the agent directly, without tmux
pub fn exec(opts: &TaskOptions<'_>) -> anyhow::Result<()> {
    let shim = shim_for(opts)?;
    let response = block_on(shim.exec_direct(opts.request()))?;
    emit(&response)
}
