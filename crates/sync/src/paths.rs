use std::path::{Path, PathBuf};

pub fn default_data_path() -> PathBuf {
    if let Ok(path) = std::env::var("HONEY_DATA_PATH") {
        return PathBuf::from(path);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".honey.data");
    }
    PathBuf::from(".honey.data")
}

/// Expands a leading `~` against `HOME`.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(rest),
        Err(_) => path.to_path_buf(),
    }
}
