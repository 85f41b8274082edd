use std::path::{Path, PathBuf};

use super::{Argument, Pipeline};
use crate::engine::{Execution, ExecutionMode, Executor};
use crate::error::Result;
use crate::utils::{shell, template};

/// Where the stdout of the last pipeline stage goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputTarget {
    /// Decided by the execution call (captured or terminal).
    #[default]
    Default,
    /// Always buffer stdout in memory, even for interactive calls.
    Capture,
    /// Write stdout straight to a file.
    File(PathBuf),
}

/// Pipe chain and output target that sit after a builder's own invocation.
#[derive(Debug, Clone, Default)]
pub struct Downstream {
    pipes: Vec<Pipeline>,
    output: OutputTarget,
}

impl Downstream {
    pub fn pipes(&self) -> &[Pipeline] {
        &self.pipes
    }

    pub fn output(&self) -> &OutputTarget {
        &self.output
    }

    /// The output target that governs the whole chain.
    ///
    /// The receiver's own target wins; otherwise the last pipe stage decides.
    pub fn effective_output(&self) -> OutputTarget {
        match (&self.output, self.pipes.last()) {
            (OutputTarget::Default, Some(last)) => last.downstream().effective_output(),
            (output, _) => output.clone(),
        }
    }

    fn render_pipes(&self, head: String) -> String {
        self.pipes.iter().fold(head, |line, pipe| {
            format!("{} | {}", line, pipe.render_unredirected())
        })
    }

    fn collect_stages(&self, head: Stage, stages: &mut Vec<Stage>) {
        stages.push(head);
        for pipe in &self.pipes {
            pipe.downstream().collect_stages(pipe.stage_head(), stages);
        }
    }
}

/// One process of a top-level pipe chain, as a line for the platform shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub line: String,
    /// The line is a single program invocation the shell can `exec` into,
    /// so its exit status (including a killing signal) is the program's own.
    pub single_program: bool,
}

/// Capability set shared by plain commands and every composite builder.
///
/// Implementors supply four hooks; everything else is provided. Callers hold
/// any builder through this trait and never need to know whether it is a
/// plain command, a remote or container wrapper, or a combined stream.
pub trait CommandBuilder {
    fn push_argument(&mut self, argument: Argument);

    fn downstream(&self) -> &Downstream;

    fn downstream_mut(&mut self) -> &mut Downstream;

    /// The builder's own invocation, without pipes or redirection.
    fn render_head(&self) -> String;

    /// Whether `render_head` is one program invocation rather than a group.
    fn is_single_program(&self) -> bool {
        true
    }

    /// Append an escaped value.
    fn add_argument(&mut self, value: impl Into<String>) -> &mut Self {
        self.push_argument(Argument::value(value));
        self
    }

    /// Append caller-controlled text verbatim.
    fn add_argument_raw(&mut self, raw: impl Into<String>) -> &mut Self {
        self.push_argument(Argument::literal(raw));
        self
    }

    fn add_argument_template(&mut self, template_text: &str, value: &str) -> Result<&mut Self> {
        self.push_argument(Argument::template(template_text, &[value])?);
        Ok(self)
    }

    /// Append one argument per value, each rendered from the same template.
    fn add_argument_template_multiple<S: AsRef<str>>(
        &mut self,
        template_text: &str,
        values: &[S],
    ) -> Result<&mut Self> {
        template::check_arity(template_text, 1)?;
        for value in values {
            self.push_argument(Argument::template(template_text, &[value.as_ref()])?);
        }
        Ok(self)
    }

    fn add_argument_list<S: AsRef<str>>(&mut self, values: &[S]) -> &mut Self {
        for value in values {
            self.push_argument(Argument::value(value.as_ref()));
        }
        self
    }

    fn add_pipe_command(&mut self, command: impl Into<Pipeline>) -> &mut Self {
        self.downstream_mut().pipes.push(command.into());
        self
    }

    fn clear_pipes(&mut self) -> &mut Self {
        self.downstream_mut().pipes.clear();
        self
    }

    /// Owned copy of the pipe chain.
    fn pipe_list(&self) -> Vec<Pipeline> {
        self.downstream().pipes.clone()
    }

    /// Replace the pipe chain wholesale.
    fn set_pipe_list(&mut self, pipes: Vec<Pipeline>) -> &mut Self {
        self.downstream_mut().pipes = pipes;
        self
    }

    fn set_output_target(&mut self, output: OutputTarget) -> &mut Self {
        self.downstream_mut().output = output;
        self
    }

    fn set_output_redirect_to_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.set_output_target(OutputTarget::File(path.as_ref().to_path_buf()))
    }

    fn output_target(&self) -> OutputTarget {
        self.downstream().effective_output()
    }

    /// Command line with pipes but without the final file redirection.
    fn render_unredirected(&self) -> String {
        self.downstream().render_pipes(self.render_head())
    }

    /// The head as a pipe chain stage.
    fn stage_head(&self) -> Stage {
        Stage {
            line: self.render_head(),
            single_program: self.is_single_program(),
        }
    }

    /// The pipe chain flattened into one stage per process, in order.
    /// Joined with ` | ` the lines equal `render_unredirected`.
    fn pipe_stages(&self) -> Vec<Stage> {
        let mut stages = Vec::new();
        self.downstream().collect_stages(self.stage_head(), &mut stages);
        stages
    }

    /// Full command line, including `> path` when redirected to a file.
    fn render(&self) -> String {
        let line = self.render_unredirected();
        match self.output_target() {
            OutputTarget::File(path) => {
                format!("{} > {}", line, shell::quote_path(&path.to_string_lossy()))
            }
            _ => line,
        }
    }

    /// Run to completion and capture stdout as lines.
    fn execute(&self) -> Result<Execution>
    where
        Self: Sized,
    {
        Executor::from_env().run(self, ExecutionMode::Captured)
    }

    /// Run with the terminal bound to the child's stdio.
    fn execute_interactive(&self) -> Result<Execution>
    where
        Self: Sized,
    {
        Executor::from_env().run(self, ExecutionMode::Interactive)
    }
}
