use super::{Argument, CommandBuilder, Downstream, Pipeline};
use crate::utils::shell;

const SSH: &str = "ssh";
const DEFAULT_PORT: u16 = 22;

/// Runs an inner pipeline on a remote host over ssh.
///
/// The inner pipeline is rendered at render time and passed to ssh as one
/// escaped argument. Argument operations reach the inner builder; pipes and
/// the output target attached here run locally, after the ssh boundary.
#[derive(Debug, Clone)]
pub struct RemoteCommand {
    host: String,
    options: Vec<Argument>,
    inner: Box<Pipeline>,
    downstream: Downstream,
}

impl RemoteCommand {
    /// Wrap `inner` for execution on `host` (`host` or `user@host`).
    ///
    /// Batch mode is always on so a missing key fails instead of prompting.
    pub fn wrap(host: impl Into<String>, inner: impl Into<Pipeline>) -> Self {
        Self {
            host: host.into(),
            options: vec![Argument::literal("-o BatchMode=yes")],
            inner: Box::new(inner.into()),
            downstream: Downstream::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        if port != DEFAULT_PORT {
            self.options.push(Argument::literal("-p"));
            self.options.push(Argument::value(port.to_string()));
        }
        self
    }

    pub fn with_identity_file(mut self, path: impl Into<String>) -> Self {
        self.options.push(Argument::literal("-i"));
        self.options.push(Argument::value(path));
        self
    }

    /// Add an `-o key=value` ssh option.
    pub fn add_ssh_option(&mut self, option: impl Into<String>) -> &mut Self {
        self.options.push(Argument::literal("-o"));
        self.options.push(Argument::value(option));
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn inner(&self) -> &Pipeline {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut Pipeline {
        &mut self.inner
    }
}

impl CommandBuilder for RemoteCommand {
    fn push_argument(&mut self, argument: Argument) {
        self.inner.push_argument(argument);
    }

    fn downstream(&self) -> &Downstream {
        &self.downstream
    }

    fn downstream_mut(&mut self) -> &mut Downstream {
        &mut self.downstream
    }

    fn render_head(&self) -> String {
        let mut parts = vec![shell::quote_command(SSH)];
        parts.extend(self.options.iter().map(Argument::render));
        parts.push(shell::quote_arg(&self.host));
        parts.push("--".to_string());
        parts.push(shell::quote_arg(&self.inner.render()));
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Command;

    #[test]
    fn wraps_inner_pipeline_as_one_argument() {
        let mut dump = Command::new("mysqldump");
        dump.add_argument("shop")
            .add_pipe_command(Command::with_raw("bzip2", "--compress --stdout"));

        let remote = RemoteCommand::wrap("deploy@db.example.com", dump);

        assert_eq!(
            remote.render(),
            "ssh -o BatchMode=yes deploy@db.example.com -- 'mysqldump shop | bzip2 --compress --stdout'"
        );
    }

    #[test]
    fn arguments_reach_the_inner_command() {
        let mut remote = RemoteCommand::wrap("db", Command::new("mysql"));
        remote.add_argument("-e").add_argument("show tables;");

        assert_eq!(remote.inner().render(), "mysql -e 'show tables;'");
        assert_eq!(
            remote.render(),
            "ssh -o BatchMode=yes db -- 'mysql -e '\\''show tables;'\\'''"
        );
    }

    #[test]
    fn outer_pipes_run_after_the_boundary() {
        let mut remote = RemoteCommand::wrap("db", Command::new("mysqldump"));
        remote
            .add_pipe_command(Command::new("gzip"))
            .set_output_redirect_to_file("/tmp/db.sql.gz");

        assert_eq!(
            remote.render(),
            "ssh -o BatchMode=yes db -- mysqldump | gzip > '/tmp/db.sql.gz'"
        );
    }

    #[test]
    fn connection_flags() {
        let mut remote = RemoteCommand::wrap("db", Command::new("uptime"))
            .with_port(2222)
            .with_identity_file("/home/ops/.ssh/id ed25519");
        remote.add_ssh_option("ConnectTimeout=10");

        assert_eq!(
            remote.render(),
            "ssh -o BatchMode=yes -p 2222 -i '/home/ops/.ssh/id ed25519' -o ConnectTimeout=10 db -- uptime"
        );
    }

    #[test]
    fn default_port_adds_no_flag() {
        let remote = RemoteCommand::wrap("db", Command::new("uptime")).with_port(22);
        assert_eq!(remote.render(), "ssh -o BatchMode=yes db -- uptime");
    }
}
