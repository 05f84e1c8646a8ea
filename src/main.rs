//! Halo - attention rings for terminal coding assistants
//!
//! Runs the agent by default. The subcommands are thin clients: `trigger`
//! appends a PID to the trigger file (for assistant hooks), `dismiss` and
//! `status` talk to the running agent over its control socket.

use clap::Parser;
use halo::config;
use halo::ipc::{self, ControlRequest, ControlResponse};
use halo::resolve::display::DisplayId;
use halo::trigger;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "halo", about = "Per-display attention rings for terminal coding assistants")]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Ask for attention on behalf of a process (default: the calling shell)
    Trigger {
        /// Process to resolve to a display
        #[arg(long)]
        pid: Option<u32>,
    },
    /// Dismiss alerts on every display, or on one
    Dismiss {
        /// Display identifier as reported by `halo status`
        #[arg(long)]
        display: Option<u32>,
    },
    /// Print the running agent's alerts as JSON
    Status,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_env("HALO_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_target(false).init();
}

fn run_trigger(pid: Option<u32>) -> halo::Result<()> {
    let pid = pid.unwrap_or_else(std::os::unix::process::parent_id);
    let path = config::load_config().trigger_file();
    trigger::append_pid(&path, pid)
}

fn run_control(request: ControlRequest) -> halo::Result<()> {
    match ipc::send(&request)? {
        ControlResponse::Dismissed { count } => println!("dismissed {count} alert(s)"),
        ControlResponse::Status { snapshot } => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        ControlResponse::Error { message } => eprintln!("agent error: {message}"),
    }
    Ok(())
}

fn run_agent() -> halo::Result<()> {
    let settings = config::load_config();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(halo::agent::run(settings))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Some(Command::Trigger { pid }) => run_trigger(pid),
        Some(Command::Dismiss { display }) => run_control(match display {
            Some(id) => ControlRequest::DismissDisplay {
                display: DisplayId(id),
            },
            None => ControlRequest::DismissAll,
        }),
        Some(Command::Status) => run_control(ControlRequest::Status),
        None => run_agent(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("halo: {e}");
            ExitCode::FAILURE
        }
    }
}
