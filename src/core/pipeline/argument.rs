use crate::error::Result;
use crate::utils::{shell, template};

/// One fragment of a command line.
///
/// Only `Literal` reaches the shell unescaped. It is reserved for syntax the
/// caller controls (flags, operators); anything variable goes through `Value`
/// or `Template`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Literal(String),
    Value(String),
    Template {
        template: String,
        values: Vec<String>,
    },
}

impl Argument {
    pub fn literal(raw: impl Into<String>) -> Self {
        Argument::Literal(raw.into())
    }

    pub fn value(value: impl Into<String>) -> Self {
        Argument::Value(value.into())
    }

    /// Build a template argument. The placeholder count is checked here, so a
    /// mismatch surfaces while the pipeline is assembled, never at execution.
    pub fn template<S: AsRef<str>>(template_text: &str, values: &[S]) -> Result<Self> {
        template::check_arity(template_text, values.len())?;
        Ok(Argument::Template {
            template: template_text.to_string(),
            values: values.iter().map(|v| v.as_ref().to_string()).collect(),
        })
    }

    pub fn render(&self) -> String {
        match self {
            Argument::Literal(raw) => raw.clone(),
            Argument::Value(value) => shell::quote_arg(value),
            Argument::Template { template, values } => template::substitute(template, values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_is_verbatim() {
        assert_eq!(Argument::literal("2>&1").render(), "2>&1");
    }

    #[test]
    fn value_is_escaped() {
        assert_eq!(Argument::value("a b").render(), "'a b'");
        assert_eq!(Argument::value("plain").render(), "plain");
    }

    #[test]
    fn template_escapes_values() {
        let arg = Argument::template("-p%s", &["se cret"]).unwrap();
        assert_eq!(arg.render(), "-p'se cret'");
    }

    #[test]
    fn template_checks_arity_at_build_time() {
        assert!(Argument::template("-u%s", &["a", "b"]).is_err());
    }
}
