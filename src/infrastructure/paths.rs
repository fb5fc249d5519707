//! Path helpers for configuration and dump files.

use std::path::PathBuf;

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

/// Returns the data directory for statewire files.
///
/// `$XDG_DATA_HOME/statewire` when set, otherwise `~/.local/share/statewire`,
/// falling back to a relative `.statewire` when no home directory is known.
#[must_use]
pub fn get_data_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join("statewire");
    }
    home_dir().map_or_else(
        || PathBuf::from(".statewire"),
        |home| home.join(".local").join("share").join("statewire"),
    )
}

/// Default location of the failure dump.
#[must_use]
pub fn default_dump_path() -> PathBuf {
    get_data_dir().join("dump.jsonl")
}

/// Expands a leading `~` to the user's home directory.
///
/// Paths are returned unchanged when they do not start with `~` or when no
/// home directory is known.
///
/// # Examples
///
/// ```
/// use statewire::infrastructure::expand_tilde;
///
/// assert_eq!(expand_tilde("/absolute/path"), std::path::PathBuf::from("/absolute/path"));
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    let rest = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/")
    };

    match (rest, home_dir()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
