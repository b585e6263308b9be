use std::fs;
use std::path::{Path, PathBuf};

use honey_sync::{default_data_path, expand_home};

#[derive(Debug, Clone)]
pub struct DataDirResolution {
    pub dir: PathBuf,
    pub created: bool,
}

/// Picks the ledger directory: the command-line override, then the config
/// file, then the environment default. Creates it if missing.
pub fn resolve_data_dir(
    flag: Option<&Path>,
    configured: Option<&Path>,
) -> Result<DataDirResolution, String> {
    let dir = match flag.or(configured) {
        Some(path) => expand_home(path),
        None => default_data_path(),
    };
    let created = !dir.is_dir();
    if created {
        fs::create_dir_all(&dir)
            .map_err(|err| format!("create data dir {}: {}", dir.display(), err))?;
    }
    Ok(DataDirResolution { dir, created })
}
