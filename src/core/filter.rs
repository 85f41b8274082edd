//! Table exclusion filters for data-only dumps.
//!
//! A pattern wrapped in slashes (`/^cache_/`) is a regular expression, any
//! other pattern is a glob (`cf_*`). Matching is against the bare table name.

use glob_match::glob_match;
use regex::Regex;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum Pattern {
    Regex(Regex),
    Glob(String),
}

#[derive(Debug, Clone)]
pub struct TableFilter {
    patterns: Vec<Pattern>,
}

impl TableFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| parse_pattern(pattern.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn should_exclude_table(&self, table: &str) -> bool {
        self.patterns.iter().any(|pattern| match pattern {
            Pattern::Regex(re) => re.is_match(table),
            Pattern::Glob(glob) => glob_match(glob, table),
        })
    }

    /// Excluded tables as `database.table`, ready for `--ignore-table`.
    pub fn ignored_tables<S: AsRef<str>>(&self, tables: &[S], database: &str) -> Vec<String> {
        tables
            .iter()
            .map(|table| table.as_ref().trim())
            .filter(|table| !table.is_empty() && self.should_exclude_table(table))
            .map(|table| format!("{}.{}", database, table))
            .collect()
    }
}

fn parse_pattern(raw: &str) -> Result<Pattern> {
    let raw = raw.trim();
    let delimited = raw.len() >= 2 && raw.starts_with('/') && raw.ends_with('/');

    if !delimited {
        return Ok(Pattern::Glob(raw.to_string()));
    }

    let expr = &raw[1..raw.len() - 1];
    Regex::new(expr).map(Pattern::Regex).map_err(|e| {
        Error::config_invalid_value("mysqlBackupFilter", Some(raw.to_string()), e.to_string())
    })
}
