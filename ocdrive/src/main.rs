pub mod command_builder;
pub mod commands;
pub mod config;
pub mod delegate;
pub mod detector;
pub mod driver;
pub mod error;
pub mod exec;
pub mod facade;
pub mod files;
pub mod opencode;
pub mod registry;
pub mod sanitizer;
pub mod supervisor;
pub mod tmux;
pub mod types;

#[cfg(test)]
pub mod test_support;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use commands::task::TaskOptions;
use types::OutputFormat;

#[derive(Parser)]
#[command(
    name = "ocdrive",
    version,
    about = "Drive the opencode coding agent through tmux sessions",
    long_about = "ocdrive starts opencode tasks in tmux sessions, polls them for completion and \
                  reports every operation as a uniform JSON result."
)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(clap::Args)]
struct TaskArgs {
    /// Task description handed to the agent
    task: String,

    /// Working directory (defaults to the current directory)
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Model identifier, e.g. anthropic/claude-sonnet-4
    #[arg(short, long)]
    model: Option<String>,

    /// Continue the agent's previous session
    #[arg(long = "continue")]
    continue_session: bool,

    /// Share the agent session
    #[arg(long)]
    share: bool,

    /// Agent output format: json or default
    #[arg(long)]
    format: Option<OutputFormat>,
}

impl TaskArgs {
    fn options(&self) -> TaskOptions<'_> {
        TaskOptions {
            task: &self.task,
            directory: self.directory.clone(),
            model: self.model.as_deref(),
            continue_session: self.continue_session,
            share: self.share,
            format: self.format,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run a task in tmux and wait for it to finish
    Run(TaskArgs),

    /// Start a task in a detached tmux session and return immediately
    Start(TaskArgs),

    /// Check whether a session is still working
    Status {
        session_id: String,
    },

    /// Show recent output of a session
    Output {
        session_id: String,

        /// Number of lines to capture
        #[arg(short = 'n', long)]
        lines: Option<u32>,
    },

    /// Type input into a session and press Enter
    Send {
        session_id: String,

        /// Text to send (defaults to "y")
        input: Option<String>,
    },

    /// Kill a session
    Kill {
        session_id: String,
    },

    /// List sessions started by ocdrive
    List,

    /// Run the agent directly without tmux
    Exec(TaskArgs),

    /// Manage the agent's own sessions: list, get, continue or share
    Sessions {
        action: String,

        /// Agent session id (get, continue, share)
        session_id: Option<String>,

        /// Maximum number of sessions to list
        #[arg(long)]
        max_count: Option<u32>,
    },

    /// Analyze a project and generate AGENTS.md
    Analyze {
        /// Project directory (defaults to the current directory)
        directory: Option<PathBuf>,
    },

    /// Start the agent's HTTP server in the background
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        hostname: Option<String>,
    },

    /// Delegate a development task to a sub-agent
    Quick {
        task: String,

        #[arg(short, long)]
        directory: Option<PathBuf>,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Show current configuration
    Config,
}

fn init_logging(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let (label, result) = match &cli.command {
        Command::Run(args) => ("Run", commands::task::run(&args.options())),
        Command::Start(args) => ("Start", commands::task::start(&args.options())),
        Command::Exec(args) => ("Exec", commands::task::exec(&args.options())),
        Command::Status { session_id } => ("Status", commands::session::status(session_id)),
        Command::Output { session_id, lines } => {
            ("Output", commands::session::output(session_id, *lines))
        }
        Command::Send { session_id, input } => (
            "Send",
            commands::session::send(session_id, input.as_deref()),
        ),
        Command::Kill { session_id } => ("Kill", commands::session::kill(session_id)),
        Command::List => ("List", commands::session::list()),
        Command::Sessions {
            action,
            session_id,
            max_count,
        } => (
            "Sessions",
            commands::agent::sessions(action, session_id.as_deref(), *max_count),
        ),
        Command::Analyze { directory } => {
            ("Analyze", commands::agent::analyze(directory.clone()))
        }
        Command::Serve { port, hostname } => (
            "Serve",
            commands::agent::serve(*port, hostname.as_deref()),
        ),
        Command::Quick { task, directory } => {
            ("Quick", commands::agent::quick(task, directory.clone()))
        }
        Command::Doctor => ("Doctor", commands::doctor::run()),
        Command::Config => ("Config", commands::config::run()),
    };

    if let Err(e) = result {
        eprintln!("{} error: {:#}", label, e);
        std::process::exit(1);
    }
}
