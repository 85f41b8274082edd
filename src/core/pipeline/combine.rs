use super::{Argument, CommandBuilder, Downstream, Pipeline};

/// Concatenates the stdout of several independent pipelines into one stream.
///
/// Stages run strictly one after another in append order inside a shell
/// group, so their output never interleaves. A failing stage stops the rest.
/// Pipes attached here consume the combined stream.
#[derive(Debug, Clone, Default)]
pub struct CombinedCommand {
    stages: Vec<Pipeline>,
    downstream: Downstream,
}

impl CombinedCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_command_for_combined_output(&mut self, command: impl Into<Pipeline>) -> &mut Self {
        self.stages.push(command.into());
        self
    }

    pub fn stages(&self) -> &[Pipeline] {
        &self.stages
    }
}

impl CommandBuilder for CombinedCommand {
    /// Appends to every stage already added. With no stages there is nothing
    /// to carry the argument and it is dropped; add stages first.
    fn push_argument(&mut self, argument: Argument) {
        for stage in &mut self.stages {
            stage.push_argument(argument.clone());
        }
    }

    fn downstream(&self) -> &Downstream {
        &self.downstream
    }

    fn downstream_mut(&mut self) -> &mut Downstream {
        &mut self.downstream
    }

    fn render_head(&self) -> String {
        if self.stages.is_empty() {
            return "true".to_string();
        }

        let body = self
            .stages
            .iter()
            .map(|stage| stage.render())
            .collect::<Vec<_>>()
            .join(" && ");

        format!("{{ {}; }}", body)
    }

    /// Runs as a shell group, not one program.
    fn is_single_program(&self) -> bool {
        false
    }
}
