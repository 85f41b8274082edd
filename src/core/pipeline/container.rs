use super::{Argument, CommandBuilder, Downstream, Pipeline};
use crate::utils::shell;

const DEFAULT_RUNTIME: &str = "docker";

/// Runs an inner pipeline inside a running container via `<runtime> exec`.
///
/// The inner pipeline is handed to `sh -c` inside the container as one
/// escaped argument, so pipes attached to the inner builder stay inside.
#[derive(Debug, Clone)]
pub struct ContainerCommand {
    runtime: String,
    container: String,
    flags: Vec<Argument>,
    inner: Box<Pipeline>,
    downstream: Downstream,
}

impl ContainerCommand {
    pub fn wrap(container: impl Into<String>, inner: impl Into<Pipeline>) -> Self {
        Self {
            runtime: DEFAULT_RUNTIME.to_string(),
            container: container.into(),
            flags: Vec::new(),
            inner: Box::new(inner.into()),
            downstream: Downstream::default(),
        }
    }

    /// Container runtime binary, e.g. `podman`.
    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    /// Keep stdin open (`-i`).
    pub fn interactive(mut self) -> Self {
        self.flags.push(Argument::literal("-i"));
        self
    }

    /// Allocate a pseudo terminal (`-t`).
    pub fn tty(mut self) -> Self {
        self.flags.push(Argument::literal("-t"));
        self
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn inner(&self) -> &Pipeline {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut Pipeline {
        &mut self.inner
    }
}

impl CommandBuilder for ContainerCommand {
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
        let mut parts = vec![shell::quote_command(&self.runtime), "exec".to_string()];
        parts.extend(self.flags.iter().map(Argument::render));
        parts.push(shell::quote_arg(&self.container));
        parts.push("sh".to_string());
        parts.push("-c".to_string());
        parts.push(shell::quote_arg(&self.inner.render()));
        parts.join(" ")
    }
}
