use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV: &str = "OPSBOX_CONFIG";

/// Base opsbox config directory (universal ~/.config/opsbox/ on all platforms)
pub fn opsbox() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("opsbox"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("opsbox"))
    }
}

/// Config file path. `OPSBOX_CONFIG` overrides the default location.
pub fn config_file() -> Result<PathBuf> {
    match env::var(CONFIG_ENV) {
        Ok(path) if !path.trim().is_empty() => Ok(expand(&path)),
        _ => Ok(opsbox()?.join("opsbox.json")),
    }
}

/// Expand a leading `~` and environment variables in a configured path.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| shellexpand::tilde(path).into_owned());
    PathBuf::from(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_leaves_plain_paths_alone() {
        assert_eq!(expand("/var/www"), PathBuf::from("/var/www"));
    }

    #[test]
    fn expand_resolves_tilde() {
        let expanded = expand("~/dumps");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with("dumps"));
    }
}
