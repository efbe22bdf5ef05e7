//! Session commands - status, output, send, kill and list

use super::{block_on, build_shim, emit};

pub fn status(session_id: &str) -> anyhow::Result<()> {
    let shim = build_shim()?;
    emit(&block_on(shim.status(session_id))?)
}

pub fn output(session_id: &str, lines: Option<u32>) -> anyhow::Result<()> {
    let shim = build_shim()?;
    emit(&block_on(shim.output(session_id, lines))?)
}

pub fn send(session_id: &str, input: Option<&str>) -> anyhow::Result<()> {
    let shim = build_shim()?;
    emit(&block_on(shim.send(session_id, input))?)
}

pub fn kill(session_id: &str) -> anyhow::Result<()> {
    let shim = build_shim()?;
    emit(&block_on(shim.kill(session_id))?)
}

pub fn list() -> anyhow::Result<()> {
    let shim = build_shim()?;
    emit(&block_on(shim.list())?)
}
