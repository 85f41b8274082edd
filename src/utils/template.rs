//! Positional argument templates.
//!
//! A template holds `%s` placeholders; `%%` is a literal percent sign. Values
//! are shell-quoted one by one before they are substituted, so the template
//! text itself is the only part that reaches the shell unescaped.

use crate::error::{Error, Result};
use crate::utils::shell;

const PLACEHOLDER: &str = "%s";

/// Count `%s` placeholders, skipping `%%` escapes.
pub fn placeholder_count(template: &str) -> usize {
    let mut count = 0;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        match chars.peek() {
            Some('s') => {
                count += 1;
                chars.next();
            }
            Some('%') => {
                chars.next();
            }
            _ => {}
        }
    }

    count
}

/// Fail unless `values` matches the template's placeholder count.
pub fn check_arity(template: &str, values: usize) -> Result<()> {
    let placeholders = placeholder_count(template);
    if placeholders != values {
        return Err(Error::template_arity(template, placeholders, values));
    }
    Ok(())
}

/// Escape each value and substitute it positionally into the template.
pub fn fill<S: AsRef<str>>(template: &str, values: &[S]) -> Result<String> {
    check_arity(template, values.len())?;
    Ok(substitute(template, values))
}

/// Apply a single-placeholder template to every value independently.
///
/// Returns one rendered string per value, e.g. one `--ignore-table=X` per table.
pub fn fill_each<S: AsRef<str>>(template: &str, values: &[S]) -> Result<Vec<String>> {
    check_arity(template, 1)?;
    Ok(values
        .iter()
        .map(|value| substitute(template, std::slice::from_ref(value)))
        .collect())
}

/// Substitution without the arity check. Callers validate first.
pub(crate) fn substitute<S: AsRef<str>>(template: &str, values: &[S]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut values = values.iter();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            result.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') => {
                chars.next();
                if let Some(value) = values.next() {
                    result.push_str(&shell::quote_arg(value.as_ref()));
                } else {
                    result.push_str(PLACEHOLDER);
                }
            }
            Some('%') => {
                chars.next();
                result.push('%');
            }
            _ => result.push('%'),
        }
    }

    result
}
