use clap::Args;
use serde::Serialize;

use opsbox::config::Config;
use opsbox::sync::wrap_for_context;
use opsbox::{Command, CommandBuilder, Error, ExecutionMode};

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct ExecArgs {
    /// Sync context whose ssh/container settings wrap the command
    pub context: String,

    /// Capture stdout and return it as JSON
    #[arg(long)]
    pub capture: bool,

    /// Print the composed command line without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Program and arguments (use `--` before them)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecOutput {
    pub context: String,
    pub command: String,
    pub executed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<String>,
}

/// Interactive runs hand the terminal to the child; nothing is printed.
pub fn is_interactive(args: &ExecArgs) -> bool {
    !args.capture && !args.dry_run
}

pub fn run(args: ExecArgs, global: &GlobalArgs) -> CmdResult<ExecOutput> {
    let (program, rest) = args.command.split_first().ok_or_else(|| {
        Error::validation_invalid_argument("command", "No program given to execute")
    })?;

    let config = Config::load()?;
    let ctx = config.context(&args.context)?;
    let pipeline = wrap_for_context(&ctx, Command::with_args(program, rest));

    if args.dry_run {
        return Ok((
            ExecOutput {
                context: ctx.name,
                command: pipeline.render(),
                executed: false,
                exit_code: None,
                output: Vec::new(),
            },
            0,
        ));
    }

    let mode = if args.capture {
        ExecutionMode::Captured
    } else {
        ExecutionMode::Interactive
    };
    let execution = global.executor().run(&pipeline, mode)?;

    Ok((
        ExecOutput {
            context: ctx.name,
            command: execution.command,
            executed: true,
            exit_code: Some(execution.exit_code),
            output: execution.output,
        },
        execution.exit_code,
    ))
}
