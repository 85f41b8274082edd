use super::{Argument, CommandBuilder, Downstream};
use crate::utils::shell;

/// A single program invocation: program name, arguments, pipes, output.
///
/// Cloning yields a fully independent copy. Arguments and pipes are owned
/// values, so mutating a clone never shows up in the original.
#[derive(Debug, Clone)]
pub struct Command {
    program: String,
    arguments: Vec<Argument>,
    downstream: Downstream,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            arguments: Vec::new(),
            downstream: Downstream::default(),
        }
    }

    /// Program followed by caller-controlled raw arguments,
    /// e.g. `Command::with_raw("bzip2", "--compress --stdout")`.
    pub fn with_raw(program: impl Into<String>, raw: impl Into<String>) -> Self {
        let mut command = Self::new(program);
        command.add_argument_raw(raw);
        command
    }

    /// Program followed by escaped arguments.
    pub fn with_args<S: AsRef<str>>(program: impl Into<String>, args: &[S]) -> Self {
        let mut command = Self::new(program);
        command.add_argument_list(args);
        command
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }
}

impl CommandBuilder for Command {
    fn push_argument(&mut self, argument: Argument) {
        self.arguments.push(argument);
    }

    fn downstream(&self) -> &Downstream {
        &self.downstream
    }

    fn downstream_mut(&mut self) -> &mut Downstream {
        &mut self.downstream
    }

    fn render_head(&self) -> String {
        let mut parts = Vec::with_capacity(self.arguments.len() + 1);
        parts.push(shell::quote_command(&self.program));
        parts.extend(self.arguments.iter().map(Argument::render));
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::OutputTarget;
    use std::path::PathBuf;

    #[test]
    fn renders_program_and_arguments() {
        let mut command = Command::new("mysql");
        command
            .add_argument_raw("-B")
            .add_argument("my db")
            .add_argument_template("-u%s", "root")
            .unwrap();

        assert_eq!(command.render(), "mysql -B 'my db' -uroot");
    }

    #[test]
    fn renders_pipe_chain_in_order() {
        let mut command = Command::new("mysqldump");
        command
            .add_argument("shop")
            .add_pipe_command(Command::with_raw("bzip2", "--compress --stdout"))
            .add_pipe_command(Command::with_args("tee", &["copy.bz2"]));

        assert_eq!(
            command.render(),
            "mysqldump shop | bzip2 --compress --stdout | tee copy.bz2"
        );
    }

    #[test]
    fn redirect_applies_after_the_whole_chain() {
        let mut command = Command::new("mysqldump");
        command
            .add_pipe_command(Command::with_raw("bzip2", "--compress --stdout"))
            .set_output_redirect_to_file("/tmp/dump file.sql.bz2");

        assert_eq!(
            command.render(),
            "mysqldump | bzip2 --compress --stdout > '/tmp/dump file.sql.bz2'"
        );
        assert_eq!(
            command.render_unredirected(),
            "mysqldump | bzip2 --compress --stdout"
        );
    }

    #[test]
    fn last_pipe_output_target_applies_when_receiver_has_none() {
        let mut tail = Command::new("gzip");
        tail.set_output_redirect_to_file("/tmp/out.gz");

        let mut head = Command::new("cat");
        head.add_argument("in.txt").add_pipe_command(tail);

        assert_eq!(
            head.output_target(),
            OutputTarget::File(PathBuf::from("/tmp/out.gz"))
        );
        assert_eq!(head.render(), "cat in.txt | gzip > '/tmp/out.gz'");
    }

    #[test]
    fn template_multiple_appends_independent_arguments() {
        let mut command = Command::new("mysqldump");
        command
            .add_argument_template_multiple("--ignore-table=%s", &["a", "b"])
            .unwrap();

        assert_eq!(command.arguments().len(), 2);
        assert_eq!(
            command.render(),
            "mysqldump --ignore-table=a --ignore-table=b"
        );
    }

    #[test]
    fn argument_list_escapes_each_value() {
        let command = Command::with_args("tail", &["-f", "/var/log/slow query.log"]);
        assert_eq!(command.render(), "tail -f '/var/log/slow query.log'");
    }

    #[test]
    fn clone_does_not_alias_arguments_or_pipes() {
        let mut original = Command::new("mysqldump");
        original
            .add_argument("shop")
            .add_pipe_command(Command::with_raw("bzip2", "--compress --stdout"));
        let before = original.render();

        let mut variant = original.clone();
        variant.add_argument_raw("--no-data").clear_pipes();

        assert_eq!(original.render(), before);
        assert_eq!(original.pipe_list().len(), 1);
        assert_eq!(variant.render(), "mysqldump shop --no-data");
    }

    #[test]
    fn pipe_list_is_an_owned_copy() {
        let mut command = Command::new("mysqldump");
        command.add_pipe_command(Command::new("bzip2"));

        let mut pipes = command.pipe_list();
        pipes.push(Command::new("cat").into());

        assert_eq!(command.pipe_list().len(), 1);

        command.set_pipe_list(pipes);
        assert_eq!(command.render(), "mysqldump | bzip2 | cat");
    }
}
