// Pipeline execution - the only place that spawns processes.
//
// Every top-level pipe stage runs in its own platform shell, connected to its
// neighbours with OS pipes. A stage that is a single program is `exec`ed by
// its shell, so a killing signal reaches the engine undisguised. All stages
// are waited on before returning. Only the outer stdio binding differs:
//
// Captured        stdin null,    stdout piped,  stderr piped
// Interactive     stdin tty,     stdout tty,    stderr tty
// RedirectToFile  stdin tty,     stdout file,   stderr tty
//
// In captured mode stdout is drained on the calling thread while the stages
// run and each stderr on a helper thread, so a full pipe buffer can't stall
// them.
//
// The chain fails with its rightmost failing stage. An upstream stage that
// died of a broken pipe only means its reader stopped early and is ignored.

use serde::Serialize;
use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use crate::error::{CommandExecutionDetails, Error, OutputDrainDetails, Result};
use crate::pipeline::{CommandBuilder, OutputTarget, Stage};

const VERBOSE_ENV: &str = "OPSBOX_VERBOSE";
const SIGPIPE: i32 = 13;

/// How stdio is bound for one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    Captured,
    Interactive,
    RedirectToFile(PathBuf),
}

impl ExecutionMode {
    /// Combine the requested mode with a builder's output target.
    /// A file target always wins; a capture target forces capturing.
    pub fn resolve(self, output: OutputTarget) -> ExecutionMode {
        match output {
            OutputTarget::File(path) => ExecutionMode::RedirectToFile(path),
            OutputTarget::Capture => ExecutionMode::Captured,
            OutputTarget::Default => self,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Captured => "captured",
            ExecutionMode::Interactive => "interactive",
            ExecutionMode::RedirectToFile(_) => "redirect",
        }
    }
}

/// Result of a successful execution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub command: String,
    pub mode: &'static str,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<String>,
}

impl Execution {
    /// Captured stdout lines. Empty for interactive and redirected runs.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn stdout(&self) -> String {
        self.output.join("\n")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Executor {
    verbose: bool,
    current_dir: Option<PathBuf>,
}

/// Spawned stages of one chain plus their stderr drains.
struct Running {
    children: Vec<Child>,
    stderr: Vec<JoinHandle<String>>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor with verbosity taken from `OPSBOX_VERBOSE`.
    pub fn from_env() -> Self {
        let verbose = env::var(VERBOSE_ENV)
            .map(|v| !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(false);
        Self::new().verbose(verbose)
    }

    /// Echo each command line to stderr before it starts.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn run<B: CommandBuilder>(&self, builder: &B, requested: ExecutionMode) -> Result<Execution> {
        let mode = requested.resolve(builder.output_target());
        let stages = builder.pipe_stages();
        let rendered = builder.render();

        // Explicitly requested, so not limited to terminals like log_status!.
        if self.verbose {
            eprintln!("[exec] {} ({})", rendered, mode.as_str());
        }

        match mode {
            ExecutionMode::Captured => self.run_captured(&stages, rendered),
            ExecutionMode::Interactive => self.run_interactive(&stages, rendered),
            ExecutionMode::RedirectToFile(path) => self.run_redirected(&stages, rendered, &path),
        }
    }

    fn shell_command(&self, stage: &Stage) -> Command {
        #[cfg(windows)]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&stage.line);
            cmd
        };

        #[cfg(not(windows))]
        let mut cmd = {
            let mut cmd = Command::new("sh");
            cmd.arg("-c");
            if stage.single_program {
                cmd.arg(format!("exec {}", stage.line));
            } else {
                cmd.arg(&stage.line);
            }
            cmd
        };

        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        cmd
    }

    /// Spawn one stage. The `Command` (and with it the parent's copies of the
    /// stage's pipe ends) is dropped on return, so readers see EOF and writers
    /// see a broken pipe once their peer exits.
    fn spawn_stage(
        &self,
        stage: &Stage,
        stdin: Stdio,
        stdout: Stdio,
        stderr: Stdio,
    ) -> std::io::Result<Child> {
        self.shell_command(stage)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
    }

    fn spawn_chain(
        &self,
        stages: &[Stage],
        rendered: &str,
        stdin: Stdio,
        stdout: Stdio,
        capture_stderr: bool,
    ) -> Result<Running> {
        let mut running = Running {
            children: Vec::with_capacity(stages.len()),
            stderr: Vec::new(),
        };
        let mut first_stdin = Some(stdin);
        let mut last_stdout = Some(stdout);
        let mut previous: Option<ChildStdout> = None;

        for (index, stage) in stages.iter().enumerate() {
            let is_last = index + 1 == stages.len();

            let stage_stdin = match previous.take() {
                Some(upstream) => Stdio::from(upstream),
                None => first_stdin.take().unwrap_or_else(Stdio::null),
            };
            let stage_stdout = if is_last {
                last_stdout.take().unwrap_or_else(Stdio::piped)
            } else {
                Stdio::piped()
            };
            let stage_stderr = if capture_stderr {
                Stdio::piped()
            } else {
                Stdio::inherit()
            };

            let mut child = match self.spawn_stage(stage, stage_stdin, stage_stdout, stage_stderr) {
                Ok(child) => child,
                Err(e) => {
                    abort(&mut running.children);
                    return Err(Error::process_start(rendered, e.to_string()));
                }
            };

            if let Some(stderr) = child.stderr.take() {
                running.stderr.push(spawn_drain(stderr));
            }
            if !is_last {
                previous = child.stdout.take();
            }
            running.children.push(child);
        }

        Ok(running)
    }

    fn run_captured(&self, stages: &[Stage], rendered: String) -> Result<Execution> {
        let mut running =
            self.spawn_chain(stages, &rendered, Stdio::null(), Stdio::piped(), true)?;

        let stdout = running
            .children
            .last_mut()
            .and_then(|child| child.stdout.take());
        let output = match stdout {
            Some(stdout) => drain_stdout(stdout, &mut running.children, &rendered)?,
            None => Vec::new(),
        };

        let exit_code = finish(running, &rendered)?;

        Ok(Execution {
            command: rendered,
            mode: ExecutionMode::Captured.as_str(),
            exit_code,
            output,
        })
    }

    fn run_interactive(&self, stages: &[Stage], rendered: String) -> Result<Execution> {
        let running =
            self.spawn_chain(stages, &rendered, Stdio::inherit(), Stdio::inherit(), false)?;
        let exit_code = finish(running, &rendered)?;

        Ok(Execution {
            command: rendered,
            mode: ExecutionMode::Interactive.as_str(),
            exit_code,
            output: Vec::new(),
        })
    }

    fn run_redirected(&self, stages: &[Stage], rendered: String, path: &Path) -> Result<Execution> {
        let file = File::create(path).map_err(|e| {
            Error::internal_io(
                e.to_string(),
                Some(format!("create output file {}", path.display())),
            )
        })?;

        let running =
            self.spawn_chain(stages, &rendered, Stdio::inherit(), Stdio::from(file), false)?;
        let exit_code = finish(running, &rendered)?;

        Ok(Execution {
            command: rendered,
            mode: ExecutionMode::RedirectToFile(path.to_path_buf()).as_str(),
            exit_code,
            output: Vec::new(),
        })
    }
}

/// Read the last stage's stdout to the end. On a read failure every stage is
/// killed and reaped, and the lines read so far travel with the error.
fn drain_stdout<R: Read>(reader: R, children: &mut [Child], rendered: &str) -> Result<Vec<String>> {
    let mut output = Vec::new();
    match read_lines(reader, &mut output) {
        Ok(()) => Ok(output),
        Err(err) => {
            abort(children);
            Err(Error::output_drain(OutputDrainDetails {
                command: rendered.to_string(),
                error: err.to_string(),
                partial_output: output,
            }))
        }
    }
}

fn read_lines<R: Read>(reader: R, output: &mut Vec<String>) -> std::io::Result<()> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return Ok(()),
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                output.push(String::from_utf8_lossy(&buf).into_owned());
            }
            Err(err) => {
                if !buf.is_empty() {
                    output.push(String::from_utf8_lossy(&buf).into_owned());
                }
                return Err(err);
            }
        }
    }
}

fn spawn_drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).trim().to_string()
    })
}

fn abort(children: &mut [Child]) {
    for child in children.iter_mut() {
        let _ = child.kill();
    }
    for child in children.iter_mut() {
        let _ = child.wait();
    }
}

/// Wait for every stage, collect stderr and turn the statuses into a result.
fn finish(running: Running, rendered: &str) -> Result<i32> {
    let Running {
        mut children,
        stderr,
    } = running;

    let mut statuses = Vec::with_capacity(children.len());
    let mut wait_error = None;
    for child in children.iter_mut() {
        match child.wait() {
            Ok(status) => statuses.push(status),
            Err(e) => {
                wait_error.get_or_insert(e);
            }
        }
    }

    let stderr = stderr
        .into_iter()
        .filter_map(|handle| handle.join().ok())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if let Some(e) = wait_error {
        return Err(Error::internal_io(
            e.to_string(),
            Some(format!("wait for {}", rendered)),
        ));
    }

    match chain_failure(&statuses) {
        None => Ok(0),
        Some((exit_code, signal)) => Err(Error::command_execution(CommandExecutionDetails {
            command: rendered.to_string(),
            exit_code,
            signal,
            stderr,
        })),
    }
}

/// `(exit_code, signal)` of the rightmost failing stage, if any.
fn chain_failure(statuses: &[ExitStatus]) -> Option<(i32, Option<i32>)> {
    let last = statuses.len().checked_sub(1)?;

    statuses
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, status)| !status.success())
        .map(|(index, status)| (index, decode_status(*status)))
        .find(|(index, decoded)| *index == last || !is_broken_pipe(*decoded))
        .map(|(_, decoded)| decoded)
}

/// Killed by SIGPIPE, directly or as reported by a shell group.
fn is_broken_pipe((exit_code, signal): (i32, Option<i32>)) -> bool {
    signal == Some(SIGPIPE) || (signal.is_none() && exit_code == 128 + SIGPIPE)
}

/// Decode an exit status into `(exit_code, signal)`.
pub fn decode_status(status: ExitStatus) -> (i32, Option<i32>) {
    if let Some(code) = status.code() {
        return (code, None);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return (128 + signal, Some(signal));
        }
    }

    (-1, None)
}
