use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationInvalidArgument,

    TemplateArityMismatch,

    ProcessStartFailed,
    CommandExecutionFailed,
    CommandTerminated,
    OutputDrainFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::TemplateArityMismatch => "template.arity_mismatch",

            ErrorCode::ProcessStartFailed => "process.start_failed",
            ErrorCode::CommandExecutionFailed => "process.execution_failed",
            ErrorCode::CommandTerminated => "process.terminated",
            ErrorCode::OutputDrainFailed => "process.output_drain_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateArityDetails {
    pub template: String,
    pub placeholders: usize,
    pub values: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStartDetails {
    pub command: String,
    pub error: String,
}

/// Details for a process that started but did not finish successfully.
///
/// `exit_code` is always populated. For signal termination it follows the
/// shell convention of `128 + signal` and `signal` carries the raw number.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandExecutionDetails {
    pub command: String,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDrainDetails {
    pub command: String,
    pub error: String,
    pub partial_output: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn template_arity(template: impl Into<String>, placeholders: usize, values: usize) -> Self {
        let template = template.into();
        let message = format!(
            "Template '{}' has {} placeholder(s) but {} value(s) were given",
            template, placeholders, values
        );
        let details = to_details(TemplateArityDetails {
            template,
            placeholders,
            values,
        });

        Self::new(ErrorCode::TemplateArityMismatch, message, details)
    }

    pub fn process_start(command: impl Into<String>, error: impl Into<String>) -> Self {
        let command = command.into();
        let details = to_details(ProcessStartDetails {
            command: command.clone(),
            error: error.into(),
        });

        Self::new(
            ErrorCode::ProcessStartFailed,
            format!("Process {} could not be started", command),
            details,
        )
        .with_hint("Check that the program is installed and on PATH")
    }

    pub fn command_execution(details: CommandExecutionDetails) -> Self {
        let (code, message) = match details.signal {
            Some(signal) => (
                ErrorCode::CommandTerminated,
                format!(
                    "Process {} was terminated by signal {}",
                    details.command, signal
                ),
            ),
            None => (
                ErrorCode::CommandExecutionFailed,
                format!(
                    "Process {} did not finish successfully [return code: {}]",
                    details.command, details.exit_code
                ),
            ),
        };

        Self::new(code, message, to_details(details))
    }

    pub fn output_drain(details: OutputDrainDetails) -> Self {
        let message = format!("Failed to read output of {}", details.command);
        Self::new(ErrorCode::OutputDrainFailed, message, to_details(details))
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        let details = to_details(ConfigMissingKeyDetails {
            key: key.into(),
            path,
        });

        Self::new(
            ErrorCode::ConfigMissingKey,
            "Missing required configuration key",
            details,
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        let details = to_details(ConfigInvalidJsonDetails {
            path: path.into(),
            error: err.to_string(),
        });

        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.into(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalJsonErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Exit code of the failed process, for execution errors.
    pub fn exit_code(&self) -> Option<i32> {
        match self.code {
            ErrorCode::CommandExecutionFailed | ErrorCode::CommandTerminated => self
                .details
                .get("exitCode")
                .and_then(Value::as_i64)
                .map(|code| code as i32),
            _ => None,
        }
    }

    /// Signal that terminated the process, if it was killed.
    pub fn signal(&self) -> Option<i32> {
        self.details
            .get("signal")
            .and_then(Value::as_i64)
            .map(|signal| signal as i32)
    }

    /// Rendered command line for process errors.
    pub fn command(&self) -> Option<&str> {
        self.details.get("command").and_then(Value::as_str)
    }

    /// Output captured before a drain failure.
    pub fn partial_output(&self) -> Vec<String> {
        self.details
            .get("partialOutput")
            .and_then(Value::as_array)
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_execution_exit_code_is_exposed() {
        let err = Error::command_execution(CommandExecutionDetails {
            command: "false".to_string(),
            exit_code: 2,
            signal: None,
            stderr: String::new(),
        });

        assert_eq!(err.code, ErrorCode::CommandExecutionFailed);
        assert_eq!(err.exit_code(), Some(2));
        assert_eq!(err.signal(), None);
        assert_eq!(err.command(), Some("false"));
        assert!(err.message.contains("return code: 2"));
    }

    #[test]
    fn signal_termination_has_distinct_code() {
        let err = Error::command_execution(CommandExecutionDetails {
            command: "sleep 10".to_string(),
            exit_code: 128 + 9,
            signal: Some(9),
            stderr: String::new(),
        });

        assert_eq!(err.code, ErrorCode::CommandTerminated);
        assert_eq!(err.code.as_str(), "process.terminated");
        assert_eq!(err.exit_code(), Some(137));
        assert_eq!(err.signal(), Some(9));
    }

    #[test]
    fn template_arity_details() {
        let err = Error::template_arity("-u%s -p%s", 2, 1);
        assert_eq!(err.code.as_str(), "template.arity_mismatch");
        assert_eq!(err.details["placeholders"], 2);
        assert_eq!(err.details["values"], 1);
    }

    #[test]
    fn output_drain_keeps_partial_output() {
        let err = Error::output_drain(OutputDrainDetails {
            command: "cat big".to_string(),
            error: "broken pipe".to_string(),
            partial_output: vec!["first".to_string()],
        });

        assert_eq!(err.partial_output(), vec!["first".to_string()]);
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn process_start_has_hint() {
        let err = Error::process_start("nope", "No such file or directory");
        assert_eq!(err.code, ErrorCode::ProcessStartFailed);
        assert_eq!(err.hints.len(), 1);
    }
}
