use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct BackupManager;

impl BackupManager {
    pub fn new() -> Self {
        Self
    }

    /// `<path>-back.<timestamp>`, suffixed with a counter if already taken.
    pub fn backup_path(&self, path: &Path) -> PathBuf {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let base = format!("{}-back.{}", path.display(), timestamp);

        let mut candidate = PathBuf::from(&base);
        let mut counter = 1;
        while candidate.exists() {
            candidate = PathBuf::from(format!("{base}.{counter}"));
            counter += 1;
        }
        candidate
    }

    /// Renames `path` to its timestamped backup name.
    pub fn move_aside(&self, path: &Path) -> Result<PathBuf> {
        let backup = self.backup_path(path);
        fs::rename(path, &backup).context(format!(
            "Failed to move {} to {}",
            path.display(),
            backup.display()
        ))?;
        println!("  ✓ Backed up {} as {}", path.display(), backup.display());
        Ok(backup)
    }
}

/// Copy a directory recursively, merging into an existing destination.
pub fn copy_directory(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src) {
        let entry = entry?;
        let path = entry.path();

        let relative_path = path.strip_prefix(src)?;
        let target_path = dst.join(relative_path);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target_path)?;
        } else {
            if let Some(parent) = target_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &target_path)
                .context(format!("Failed to copy {}", path.display()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_move_aside() {
        let tmp = TempDir::new().unwrap();
        let war = tmp.path().join("jans-auth.war");
        fs::write(&war, "v1").unwrap();

        let manager = BackupManager::new();
        let backup = manager.move_aside(&war).unwrap();

        assert!(!war.exists());
        assert_eq!(fs::read_to_string(&backup).unwrap(), "v1");
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("jans-auth.war-back."));
    }

    #[test]
    fn test_backup_path_does_not_clobber() {
        let tmp = TempDir::new().unwrap();
        let setup = tmp.path().join("jans-setup");
        let manager = BackupManager::new();

        fs::create_dir_all(&setup).unwrap();
        let first = manager.move_aside(&setup).unwrap();
        fs::create_dir_all(&setup).unwrap();
        let second = manager.move_aside(&setup).unwrap();

        assert_ne!(first, second);
        assert!(first.is_dir());
        assert!(second.is_dir());
    }

    #[test]
    fn test_copy_directory_merges() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        fs::create_dir_all(src.join("lib/sqlalchemy")).unwrap();
        fs::write(src.join("lib/sqlalchemy/__init__.py"), "new").unwrap();
        fs::create_dir_all(dst.join("lib")).unwrap();
        fs::write(dst.join("lib/keep.py"), "keep").unwrap();

        copy_directory(&src, &dst).unwrap();

        assert_eq!(
            fs::read_to_string(dst.join("lib/sqlalchemy/__init__.py")).unwrap(),
            "new"
        );
        assert_eq!(fs::read_to_string(dst.join("lib/keep.py")).unwrap(), "keep");
    }
}
