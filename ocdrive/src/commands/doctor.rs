//! Doctor command - Check tmux, the agent CLI and configuration

use colored::Colorize;
use std::path::Path;
use std::process::Command;

use crate::config::loader::{read_config_with_env, validate_config};
use crate::config::paths::resolve_paths;

struct CheckResult {
    name: String,
    status: CheckStatus,
    message: String,
    details: Option<String>,
}

enum CheckStatus {
    Pass,
    Fail,
    Warn,
}

fn format_result(result: &CheckResult) -> String {
    let icon = match result.status {
        CheckStatus::Pass => "✓".green().to_string(),
        CheckStatus::Fail => "✗".red().to_string(),
        CheckStatus::Warn => "!".yellow().to_string(),
    };

    let message = match result.status {
        CheckStatus::Fail => result.message.red().to_string(),
        _ => result.message.clone(),
    };

    let mut line = format!("  {} {}: {}", icon, result.name, message);
    if let Some(ref details) = result.details {
        if !matches!(result.status, CheckStatus::Pass) {
            line += &format!("\n      {}", details.dimmed());
        }
    }
    line
}

fn check_command_exists(name: &str) -> bool {
    which::which(name).is_ok()
}

fn check_command_version(name: &str, flag: &str) -> Option<String> {
    let output = Command::new(name).arg(flag).output().ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let version = if stdout.trim().is_empty() {
        stderr.trim().to_string()
    } else {
        stdout.trim().to_string()
    };
    version.lines().next().map(str::to_string).filter(|v| !v.is_empty())
}

/// Check that `command` is on PATH and report its version
fn check_binary_with<F, G>(
    display_name: &str,
    command: &str,
    install_hint: &str,
    command_exists: F,
    command_version: G,
) -> CheckResult
where
    F: Fn(&str) -> bool,
    G: Fn(&str) -> Option<String>,
{
    if command_exists(command) {
        let version = command_version(command).unwrap_or_else(|| "unknown version".into());
        CheckResult {
            name: display_name.into(),
            status: CheckStatus::Pass,
            message: format!("Installed ({})", version),
            details: None,
        }
    } else {
        CheckResult {
            name: display_name.into(),
            status: CheckStatus::Fail,
            message: format!("{} not found on PATH", command),
            details: Some(install_hint.into()),
        }
    }
}

fn check_tmux() -> CheckResult {
    check_binary_with(
        "tmux",
        "tmux",
        "Install: brew install tmux (macOS) or apt install tmux (Linux)",
        check_command_exists,
        |name| check_command_version(name, "-V"),
    )
}

fn check_agent_cli(binary: &str) -> CheckResult {
    check_binary_with(
        "OpenCode CLI",
        binary,
        "Install opencode and ensure it is available in PATH, or set agent.binary",
        check_command_exists,
        |name| check_command_version(name, "--version"),
    )
}

fn check_config(config_path: &str) -> CheckResult {
    if !Path::new(config_path).exists() {
        return CheckResult {
            name: "Config".into(),
            status: CheckStatus::Warn,
            message: format!("Not found at {}, using defaults", config_path),
            details: Some("Create ocdrive.config.yaml to override defaults".into()),
        };
    }

    match read_config_with_env(config_path).and_then(|config| validate_config(&config)) {
        Ok(()) => CheckResult {
            name: "Config".into(),
            status: CheckStatus::Pass,
            message: format!("Found at {}", config_path),
            details: None,
        },
        Err(e) => CheckResult {
            name: "Config".into(),
            status: CheckStatus::Fail,
            message: "Invalid".into(),
            details: Some(format!("{}", e)),
        },
    }
}

pub fn run() -> anyhow::Result<()> {
    println!("{}", "\nocdrive doctor\n".bold());

    let paths = resolve_paths();
    let binary = read_config_with_env(&paths.config_path)
        .map(|config| config.agent.binary)
        .unwrap_or_else(|_| "opencode".to_string());

    let results = [
        check_tmux(),
        check_agent_cli(&binary),
        check_config(&paths.config_path),
    ];
    for result in &results {
        println!("{}", format_result(result));
    }

    println!();
    let failed = results
        .iter()
        .filter(|r| matches!(r.status, CheckStatus::Fail))
        .count();
    let warnings = results
        .iter()
        .filter(|r| matches!(r.status, CheckStatus::Warn))
        .count();

    if failed > 0 {
        eprintln!("{}", format!("✗ {} check(s) failed\n", failed).red());
        std::process::exit(1);
    } else if warnings > 0 {
        println!(
            "{}",
            format!("! All required checks passed, {} warning(s)\n", warnings).yellow()
        );
    } else {
        println!("{}", "✓ All checks passed! ocdrive is ready to use.\n".green());
    }

    Ok(())
}
