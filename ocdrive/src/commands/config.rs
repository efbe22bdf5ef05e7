//! Config command - Show the resolved configuration

use colored::Colorize;
use std::path::Path;

use crate::config::loader::{read_config_with_env, ENV_OVERRIDES};
use crate::config::paths::resolve_paths;

pub fn run() -> anyhow::Result<()> {
    let paths = resolve_paths();

    println!("{}", "\nocdrive configuration\n".bold());

    println!("{}", "Config location:".dimmed());
    if Path::new(&paths.config_path).exists() {
        println!(
            "  {} {} ({:?})",
            "●".green(),
            paths.config_path,
            paths.config_type
        );
    } else {
        println!("  {} {} (not found, using defaults)", "○".yellow(), paths.config_path);
    }

    match read_config_with_env(&paths.config_path) {
        Ok(config) => {
            let model = config.agent.model.as_deref().unwrap_or("(agent default)");
            println!("{}", "\nCurrent settings:".dimmed());
            println!("  agent.binary:            {}", config.agent.binary.cyan());
            println!("  agent.model:             {}", model.cyan());
            println!(
                "  agent.output_format:     {}",
                config.agent.output_format.to_string().cyan()
            );
            println!("  session.prefix:          {}", config.session.prefix.cyan());
            println!(
                "  session.poll_interval:   {}",
                format!("{}s", config.session.poll_interval_secs).cyan()
            );
            println!(
                "  session.timeout:         {}",
                format!("{}s", config.session.timeout_secs).cyan()
            );
            println!(
                "  detection.markers:       {}",
                config.detection.prompt_markers.join(" ").cyan()
            );
            println!(
                "  exec.policy:             {}",
                config.exec.policy.to_string().cyan()
            );

            println!("{}", "\nEnvironment overrides:".dimmed());
            let mut has_overrides = false;
            for var in &ENV_OVERRIDES {
                if let Ok(val) = std::env::var(var) {
                    println!("  {}={}", var, val.yellow());
                    has_overrides = true;
                }
            }
            if !has_overrides {
                println!("  {}", "(none)".dimmed());
            }
            println!();
        }
        Err(e) => {
            eprintln!("\n{}", "Error reading config:".red());
            eprintln!("  {}", format!("{}", e).dimmed());
            println!();
        }
    }

    Ok(())
}
