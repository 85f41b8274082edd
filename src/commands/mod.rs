pub type CmdResult<T> = opsbox::Result<(T, i32)>;

pub(crate) struct GlobalArgs {
    pub(crate) verbose: bool,
}

pub mod exec;
pub mod sync;

impl GlobalArgs {
    /// Executor honouring `--verbose` or `OPSBOX_VERBOSE`.
    pub(crate) fn executor(&self) -> opsbox::Executor {
        let executor = opsbox::Executor::from_env();
        if self.verbose {
            executor.verbose(true)
        } else {
            executor
        }
    }
}

macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (opsbox::Result<serde_json::Value>, i32) {
    use crate::output;

    match command {
        crate::Commands::Sync(args) => dispatch!(args, global, sync),
        crate::Commands::Exec(args) => dispatch!(args, global, exec),
    }
}
