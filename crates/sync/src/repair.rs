use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::types::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOutcome {
    pub path: PathBuf,
    pub nul_bytes_removed: usize,
}

/// Strips NUL bytes left behind by power loss and atomically replaces the
/// file. On any error the original file is left as it was.
pub fn repair_file(path: &Path) -> Result<RepairOutcome> {
    repair_file_with(path, |file, bytes| file.write_all(bytes))
}

pub(crate) fn repair_file_with<F>(path: &Path, write: F) -> Result<RepairOutcome>
where
    F: FnOnce(&mut NamedTempFile, &[u8]) -> io::Result<()>,
{
    let raw = fs::read(path)?;
    let permissions = fs::metadata(path)?.permissions();
    let cleaned: Vec<u8> = raw.iter().copied().filter(|byte| *byte != 0).collect();
    let nul_bytes_removed = raw.len() - cleaned.len();

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    write(&mut temp, &cleaned)?;
    temp.as_file().sync_all()?;
    temp.as_file().set_permissions(permissions)?;
    temp.persist(path).map_err(|err| err.error)?;

    Ok(RepairOutcome {
        path: path.to_path_buf(),
        nul_bytes_removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_entries(dir: &Path) -> usize {
        fs::read_dir(dir).expect("read dir").count()
    }

    #[test]
    fn repair_strips_nul_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("2024-01-01-03.csv");
        fs::write(&path, b"2024-01-01T03:00:00Z,4\n\0\0\0\02024-01-01T03:01:00Z,5\n\0").expect("seed");

        let outcome = repair_file(&path).expect("repair");
        assert_eq!(outcome.nul_bytes_removed, 5);
        assert_eq!(
            fs::read(&path).expect("read"),
            b"2024-01-01T03:00:00Z,4\n2024-01-01T03:01:00Z,5\n"
        );
        assert_eq!(temp_entries(dir.path()), 1);
    }

    #[test]
    fn repair_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("2024-01-01-03.csv");
        fs::write(&path, b"2024-01-01T03:00:00Z,4\n\0").expect("seed");

        repair_file(&path).expect("first repair");
        let once = fs::read(&path).expect("read once");
        let outcome = repair_file(&path).expect("second repair");
        assert_eq!(outcome.nul_bytes_removed, 0);
        assert_eq!(fs::read(&path).expect("read twice"), once);
    }

    #[test]
    fn failed_rewrite_leaves_original_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("2024-01-01-03.csv");
        let original = b"2024-01-01T03:00:00Z,4\n\0\02024-01-01T03:01:00Z,5\n".to_vec();
        fs::write(&path, &original).expect("seed");

        let result = repair_file_with(&path, |file, bytes| {
            file.write_all(&bytes[..bytes.len() / 2])?;
            Err(io::Error::other("disk full"))
        });

        assert!(result.is_err());
        assert_eq!(fs::read(&path).expect("read"), original);
        assert_eq!(temp_entries(dir.path()), 1);
    }

    #[cfg(unix)]
    #[test]
    fn repair_keeps_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("2024-01-01-03.csv");
        fs::write(&path, b"2024-01-01T03:00:00Z,4\n\0").expect("seed");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).expect("chmod");

        repair_file(&path).expect("repair");
        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(repair_file(&dir.path().join("missing.csv")).is_err());
        assert_eq!(temp_entries(dir.path()), 0);
    }
}
