//! Shell escaping and quoting utilities.
//!
//! All quoting targets POSIX `sh`. A quoted token is always read back by the
//! shell as exactly one word with the original bytes.

// Characters that require quoting
const SHELL_META: &[char] = &[
    ' ', '\t', '\n', '\r', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
    '<', '>', '|', '&', ';', '#', '~',
];

/// Escape a value for use inside single quotes.
/// Replaces `'` with `'\''` (end quote, escaped quote, start quote).
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote a single argument for shell execution.
/// - Empty strings become `''`
/// - Strings with shell metacharacters are wrapped in single quotes
/// - Embedded single quotes are escaped
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}

// Words the shell only treats as syntax in command position.
const RESERVED_WORDS: &[&str] = &[
    "case", "do", "done", "elif", "else", "esac", "fi", "for", "function", "if", "in", "select",
    "then", "time", "until", "while",
];

/// Quote a program name for the command position.
///
/// Same as [`quote_arg`], but a bare `=` and reserved words are quoted too so
/// the shell never reads the token as an assignment or as syntax.
pub fn quote_command(program: &str) -> String {
    if program.contains('=') || RESERVED_WORDS.contains(&program) {
        return quote_path(program);
    }
    quote_arg(program)
}

/// Quote a path for shell execution (always quotes).
pub fn quote_path(path: &str) -> String {
    format!("'{}'", escape_single_quote_content(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_arg_simple() {
        assert_eq!(quote_arg("mysqldump"), "mysqldump");
        assert_eq!(quote_arg("--no-data"), "--no-data");
    }

    #[test]
    fn quote_arg_with_spaces() {
        assert_eq!(quote_arg("hello world"), "'hello world'");
    }

    #[test]
    fn quote_arg_with_operators() {
        assert_eq!(quote_arg("a;b|c&d"), "'a;b|c&d'");
        assert_eq!(quote_arg("$(rm -rf /)"), "'$(rm -rf /)'");
    }

    #[test]
    fn quote_arg_with_single_quote() {
        assert_eq!(quote_arg("it's"), "'it'\\''s'");
    }

    #[test]
    fn quote_arg_empty() {
        assert_eq!(quote_arg(""), "''");
    }

    #[test]
    fn quote_command_blocks_assignment() {
        assert_eq!(quote_command("ssh"), "ssh");
        assert_eq!(quote_command("FOO=bar"), "'FOO=bar'");
    }

    #[test]
    fn quote_command_quotes_reserved_words() {
        assert_eq!(quote_command("if"), "'if'");
        assert_eq!(quote_command("time"), "'time'");
        assert_eq!(quote_command("done"), "'done'");
        assert_eq!(quote_command("iffy"), "iffy");
        assert_eq!(quote_arg("if"), "if");
    }

    #[test]
    fn quote_path_with_quote() {
        assert_eq!(quote_path("/tmp/it's.sql"), "'/tmp/it'\\''s.sql'");
    }
}
