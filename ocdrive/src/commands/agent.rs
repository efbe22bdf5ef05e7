//! Agent commands - sessions, analyze, serve and quick

use std::path::PathBuf;

use super::{block_on, build_shim, emit};

pub fn sessions(
    action: &str,
    session_id: Option<&str>,
    max_count: Option<u32>,
) -> anyhow::Result<()> {
    let shim = build_shim()?;
    emit(&block_on(shim.session_action(action, session_id, max_count))?)
}

pub fn analyze(directory: Option<PathBuf>) -> anyhow::Result<()> {
    let shim = build_shim()?;
    emit(&block_on(shim.analyze(directory))?)
}

/// The server keeps running after this command exits
pub fn serve(port: Option<u16>, hostname: Option<&str>) -> anyhow::Result<()> {
    let shim = build_shim()?;
    emit(&block_on(shim.serve(port, hostname))?)
}

pub fn quick(task: &str, directory: Option<PathBuf>) -> anyhow::Result<()> {
    let shim = build_shim()?;
    emit(&block_on(shim.quick_task(task, directory))?)
}
