//! Command pipeline builders.
//!
//! - `argument` - escaped, raw and templated command line fragments
//! - `builder` - the shared `CommandBuilder` capability set
//! - `command` - plain program invocation
//! - `remote` - ssh wrapper
//! - `container` - container exec wrapper
//! - `combine` - sequential output concatenation
//!
//! Builders are pure data. Nothing here touches the OS until one of the
//! `execute*` methods hands the rendered pipeline to the engine.

mod argument;
mod builder;
mod combine;
mod command;
mod container;
mod remote;

pub use argument::Argument;
pub use builder::{CommandBuilder, Downstream, OutputTarget, Stage};
pub use combine::CombinedCommand;
pub use command::Command;
pub use container::ContainerCommand;
pub use remote::RemoteCommand;

/// Any builder, stored by value. Pipe chains and wrappers hold this so a
/// tree of wrappers renders post-order: children first, then the parent
/// escapes and embeds them.
#[derive(Debug, Clone)]
pub enum Pipeline {
    Plain(Command),
    Remote(RemoteCommand),
    Container(ContainerCommand),
    Combine(CombinedCommand),
}

impl CommandBuilder for Pipeline {
    fn push_argument(&mut self, argument: Argument) {
        match self {
            Pipeline::Plain(command) => command.push_argument(argument),
            Pipeline::Remote(command) => command.push_argument(argument),
            Pipeline::Container(command) => command.push_argument(argument),
            Pipeline::Combine(command) => command.push_argument(argument),
        }
    }

    fn downstream(&self) -> &Downstream {
        match self {
            Pipeline::Plain(command) => command.downstream(),
            Pipeline::Remote(command) => command.downstream(),
            Pipeline::Container(command) => command.downstream(),
            Pipeline::Combine(command) => command.downstream(),
        }
    }

    fn downstream_mut(&mut self) -> &mut Downstream {
        match self {
            Pipeline::Plain(command) => command.downstream_mut(),
            Pipeline::Remote(command) => command.downstream_mut(),
            Pipeline::Container(command) => command.downstream_mut(),
            Pipeline::Combine(command) => command.downstream_mut(),
        }
    }

    fn render_head(&self) -> String {
        match self {
            Pipeline::Plain(command) => command.render_head(),
            Pipeline::Remote(command) => command.render_head(),
            Pipeline::Container(command) => command.render_head(),
            Pipeline::Combine(command) => command.render_head(),
        }
    }

    fn is_single_program(&self) -> bool {
        match self {
            Pipeline::Plain(command) => command.is_single_program(),
            Pipeline::Remote(command) => command.is_single_program(),
            Pipeline::Container(command) => command.is_single_program(),
            Pipeline::Combine(command) => command.is_single_program(),
        }
    }
}

impl From<Command> for Pipeline {
    fn from(command: Command) -> Self {
        Pipeline::Plain(command)
    }
}

impl From<RemoteCommand> for Pipeline {
    fn from(command: RemoteCommand) -> Self {
        Pipeline::Remote(command)
    }
}

impl From<ContainerCommand> for Pipeline {
    fn from(command: ContainerCommand) -> Self {
        Pipeline::Container(command)
    }
}

impl From<CombinedCommand> for Pipeline {
    fn from(command: CombinedCommand) -> Self {
        Pipeline::Combine(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::shell;

    #[test]
    fn remote_wrapping_container_escapes_once_per_layer() {
        let mut mysql = Command::new("mysql");
        mysql.add_argument("-e").add_argument("select 'x';");
        let mysql_line = mysql.render();

        let container = ContainerCommand::wrap("db", mysql);
        let remote = RemoteCommand::wrap("host", container.clone());

        assert_eq!(
            container.render(),
            format!("docker exec db sh -c {}", shell::quote_arg(&mysql_line))
        );
        assert_eq!(
            remote.render(),
            format!(
                "ssh -o BatchMode=yes host -- {}",
                shell::quote_arg(&container.render())
            )
        );
    }

    #[test]
    fn pipeline_dispatch_matches_concrete_builder() {
        let mut command = Command::new("ls");
        command.add_argument("/var/www");
        let pipeline: Pipeline = command.clone().into();

        assert_eq!(pipeline.render(), command.render());
        assert_eq!(pipeline.pipe_list().len(), 0);
    }

    #[test]
    fn stages_flatten_nested_pipes() {
        let mut sort = Command::new("sort");
        sort.add_pipe_command(Command::with_args("head", &["-n", "1"]));

        let mut combined = CombinedCommand::new();
        combined
            .add_command_for_combined_output(Command::with_args("echo", &["b"]))
            .add_command_for_combined_output(Command::with_args("echo", &["a"]))
            .add_pipe_command(sort);

        let stages = combined.pipe_stages();
        let lines: Vec<&str> = stages.iter().map(|s| s.line.as_str()).collect();
        assert_eq!(lines, vec!["{ echo b && echo a; }", "sort", "head -n 1"]);
        assert_eq!(lines.join(" | "), combined.render_unredirected());

        let single: Vec<bool> = stages.iter().map(|s| s.single_program).collect();
        assert_eq!(single, vec![false, true, true]);
    }
}
