use clap::{Parser, Subcommand};

use commands::GlobalArgs;

#[derive(Debug, Clone, Copy)]
enum ResponseMode {
    Json,
    InteractivePassthrough,
}

mod commands;
mod output;

use commands::{exec, sync};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "opsbox")]
#[command(version = VERSION)]
#[command(about = "Compose and run shell pipelines across ssh and containers")]
struct Cli {
    /// Echo every command line to stderr before it runs
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull files and databases from a configured context
    Sync(sync::SyncArgs),
    /// Run a command inside a configured context
    Exec(exec::ExecArgs),
}

fn response_mode(command: &Commands) -> ResponseMode {
    match command {
        Commands::Exec(args) if exec::is_interactive(args) => ResponseMode::InteractivePassthrough,
        _ => ResponseMode::Json,
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let global = GlobalArgs {
        verbose: cli.verbose,
    };
    let mode = response_mode(&cli.command);

    let (json_result, exit_code) = commands::run_json(cli.command, &global);

    let printed = match (mode, json_result) {
        (ResponseMode::Json, result) => output::print_json_result(result),
        // The child already owned the terminal; only failures are reported.
        (ResponseMode::InteractivePassthrough, Err(err)) => {
            output::print_result::<serde_json::Value>(Err(err))
        }
        (ResponseMode::InteractivePassthrough, Ok(_)) => Ok(()),
    };

    if let Err(err) = printed {
        eprintln!("{}", err);
        return std::process::ExitCode::from(1);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
