pub mod agent;
pub mod config;
pub mod doctor;
pub mod session;
pub mod task;

use std::future::Future;
use std::io::Write;

use serde::Serialize;

use crate::facade::{Capabilities, Shim};
use crate::types::Response;

/// Load the configuration and wire the facade to the real capabilities
pub fn build_shim() -> anyhow::Result<Shim> {
    let (config, _) = crate::config::load()?;
    let capabilities = Capabilities::system(&config);
    Ok(Shim::new(config, capabilities))
}

/// Run `future` on a fresh multi-threaded runtime
pub fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Runtime::new()?;
    Ok(runtime.block_on(future))
}

/// Print a result as pretty JSON on stdout and exit 1 when it reports failure
pub fn emit<T: Serialize>(response: &Response<T>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(response)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}")?;
    stdout.flush()?;
    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}
