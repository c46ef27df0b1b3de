use crate::managers::backup::{copy_directory, BackupManager};
use crate::managers::fetcher::ArchiveFetcher;
use crate::managers::registry::Registry;
use crate::types::{InstallationPaths, Profile};
use anyhow::{Context, Result};
use common::exec::{CommandOutcome, CommandRunner, ExitPolicy};
use std::fmt::{Display, Formatter};
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

/// Result of one removal task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalStatus {
    Removed,
    Absent,
    Failed(String),
}

impl Display for RemovalStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RemovalStatus::Removed => write!(f, "removed"),
            RemovalStatus::Absent => write!(f, "not present"),
            RemovalStatus::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct RemovalReport {
    pub entries: Vec<(PathBuf, RemovalStatus)>,
}

impl RemovalReport {
    pub fn failures(&self) -> Vec<&(PathBuf, RemovalStatus)> {
        self.entries
            .iter()
            .filter(|(_, status)| matches!(status, RemovalStatus::Failed(_)))
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.failures().is_empty()
    }

    pub fn print(&self) {
        for (path, status) in &self.entries {
            let mark = match status {
                RemovalStatus::Removed => "✓",
                RemovalStatus::Absent => "⊘",
                RemovalStatus::Failed(_) => "✗",
            };
            println!("  {mark} {}: {status}", path.display());
        }
    }
}

pub struct InstallationManager<'a> {
    paths: &'a InstallationPaths,
    backups: BackupManager,
}

impl<'a> InstallationManager<'a> {
    pub fn new(paths: &'a InstallationPaths) -> Self {
        Self {
            paths,
            backups: BackupManager::new(),
        }
    }

    /// Extracts the downloaded setup bundle as the setup directory, moving a
    /// previous setup directory aside first.
    pub fn extract_setup_bundle(&self) -> Result<PathBuf> {
        let setup = &self.paths.setup;
        if setup.exists() {
            self.backups.move_aside(setup)?;
        }

        println!("Extracting jans-setup package");
        let top = extract_zip(&self.paths.setup_zip, &self.paths.jans)?;
        let extracted = self.paths.jans.join(&top);

        fs::rename(&extracted, setup).context(format!(
            "Failed to move {} to {}",
            extracted.display(),
            setup.display()
        ))?;

        tracing::info!("Setup bundle extracted to {}", setup.display());
        Ok(setup.clone())
    }

    /// Copies `lib/sqlalchemy` from the downloaded sqlalchemy archive into
    /// the setup tree's python libraries.
    pub fn overlay_sqlalchemy(&self) -> Result<()> {
        let archive = self.paths.jans_app.join("sqlalchemy.zip");
        let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;

        let top = extract_zip(&archive, scratch.path())?;
        let source = scratch.path().join(top).join("lib/sqlalchemy");
        let target = self.paths.setup_app.join("pylib/sqlalchemy");

        tracing::debug!("Copying {} to {}", source.display(), target.display());
        copy_directory(&source, &target)
    }

    /// Copies the API documents staged with the downloads into the setup
    /// tree's data directory.
    pub fn stage_documents(
        &self,
        fetcher: &ArchiveFetcher,
        registry: &Registry,
        profile: Profile,
    ) -> Result<()> {
        for document in registry.setup_documents(profile, self.paths) {
            fetcher.fetch(&document.source, &document.target)?;
        }
        Ok(())
    }

    /// Runs `python3 <setup>/setup.py [args]` attached to the terminal.
    /// Its exit status is only logged.
    pub fn launch_setup(
        &self,
        runner: &dyn CommandRunner,
        setup_args: Option<&str>,
    ) -> Result<CommandOutcome> {
        println!("Launching Janssen Setup");

        let mut setup_cmd = format!("python3 {}/setup.py", self.paths.setup.display());
        if let Some(args) = setup_args.filter(|a| !a.trim().is_empty()) {
            setup_cmd.push(' ');
            setup_cmd.push_str(args);
        }

        let outcome = runner.interactive("sh", &["-c".to_string(), setup_cmd])?;
        Ok(outcome.check(ExitPolicy::Ignore)?)
    }

    /// Replaces `deployed` by `staged`, keeping a timestamped backup.
    pub fn replace_artifact(&self, deployed: &Path, staged: &Path) -> Result<PathBuf> {
        let backup = self.backups.move_aside(deployed)?;
        println!("Copying {} as {}", staged.display(), deployed.display());
        fs::copy(staged, deployed).context(format!(
            "Failed to copy {} to {}",
            staged.display(),
            deployed.display()
        ))?;
        Ok(backup)
    }

    /// Removes every path matching the given patterns. Each match is an
    /// independent task; failures are collected, not raised.
    pub fn remove_paths(&self, patterns: &[PathBuf]) -> RemovalReport {
        let mut report = RemovalReport::default();

        for pattern in patterns {
            let pattern_str = pattern.to_string_lossy();
            println!("Removing {pattern_str}");

            let matches = match glob::glob(&pattern_str) {
                Ok(paths) => paths,
                Err(e) => {
                    report
                        .entries
                        .push((pattern.clone(), RemovalStatus::Failed(e.to_string())));
                    continue;
                }
            };

            let mut found = false;
            for entry in matches {
                found = true;
                match entry {
                    Ok(path) => {
                        let status = match remove_path(&path) {
                            Ok(()) => RemovalStatus::Removed,
                            Err(e) => RemovalStatus::Failed(e.to_string()),
                        };
                        report.entries.push((path, status));
                    }
                    Err(e) => {
                        let path = e.path().to_path_buf();
                        report
                            .entries
                            .push((path, RemovalStatus::Failed(e.error().to_string())));
                    }
                }
            }

            if !found {
                report.entries.push((pattern.clone(), RemovalStatus::Absent));
            }
        }

        report
    }
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Extracts a zip archive below `dst` and returns the top-level directory of
/// its first entry.
fn extract_zip(archive: &Path, dst: &Path) -> Result<PathBuf> {
    let file = File::open(archive).context(format!("Failed to open {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file)
        .context(format!("Failed to read archive {}", archive.display()))?;

    if zip.is_empty() {
        anyhow::bail!("Archive {} is empty", archive.display());
    }

    let top = {
        let first = zip.by_index(0)?;
        first
            .enclosed_name()
            .and_then(|name| match name.components().next() {
                Some(Component::Normal(top)) => Some(PathBuf::from(top)),
                _ => None,
            })
            .context(format!("Invalid first entry in {}", archive.display()))?
    };

    zip.extract(dst)
        .context(format!("Failed to extract {}", archive.display()))?;

    Ok(top)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_zip;
    use common::exec::ScriptedRunner;
    use tempfile::TempDir;

    fn setup_paths(tmp: &TempDir) -> InstallationPaths {
        let paths = InstallationPaths::new(tmp.path().to_path_buf());
        paths.create_directories().unwrap();
        paths
    }

    #[test]
    fn test_extract_setup_bundle_backs_up_previous() {
        let tmp = TempDir::new().unwrap();
        let paths = setup_paths(&tmp);
        write_zip(
            &paths.setup_zip,
            &[
                ("jans-setup-master/", b"".as_slice()),
                ("jans-setup-master/setup.py", b"print('setup')".as_slice()),
                ("jans-setup-master/setup_app/__init__.py", b"".as_slice()),
            ],
        );
        fs::create_dir_all(&paths.setup).unwrap();
        fs::write(paths.setup.join("old.txt"), "old").unwrap();

        let manager = InstallationManager::new(&paths);
        let setup = manager.extract_setup_bundle().unwrap();

        assert_eq!(setup, paths.setup);
        assert!(setup.join("setup.py").is_file());
        assert!(setup.join("setup_app/__init__.py").is_file());
        assert!(!setup.join("old.txt").exists());
        assert!(!paths.jans.join("jans-setup-master").exists());

        let backups: Vec<_> = fs::read_dir(&paths.jans)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("jans-setup-back."))
            .collect();
        assert_eq!(backups.len(), 1);
        assert!(backups[0].path().join("old.txt").is_file());
    }

    #[test]
    fn test_overlay_sqlalchemy() {
        let tmp = TempDir::new().unwrap();
        let paths = setup_paths(&tmp);
        write_zip(
            &paths.jans_app.join("sqlalchemy.zip"),
            &[
                ("sqlalchemy-rel_1_3_23/", b"".as_slice()),
                ("sqlalchemy-rel_1_3_23/lib/sqlalchemy/__init__.py", b"v".as_slice()),
                ("sqlalchemy-rel_1_3_23/test/test_x.py", b"".as_slice()),
            ],
        );
        fs::create_dir_all(&paths.setup_app).unwrap();

        InstallationManager::new(&paths).overlay_sqlalchemy().unwrap();

        let pylib = paths.setup_app.join("pylib/sqlalchemy");
        assert_eq!(fs::read(pylib.join("__init__.py")).unwrap(), b"v");
        assert!(!paths.setup_app.join("pylib/test").exists());
    }

    #[test]
    fn test_launch_setup_appends_args() {
        let tmp = TempDir::new().unwrap();
        let paths = InstallationPaths::new(tmp.path().to_path_buf());
        let runner = ScriptedRunner::new().failing("sh");

        let outcome = InstallationManager::new(&paths)
            .launch_setup(&runner, Some("-n -f setup.properties"))
            .unwrap();

        assert!(!outcome.succeeded);
        assert_eq!(
            runner.calls(),
            vec![format!(
                "sh -c python3 {}/setup.py -n -f setup.properties",
                paths.setup.display()
            )]
        );
    }

    #[test]
    fn test_remove_paths_report() {
        let tmp = TempDir::new().unwrap();
        let paths = InstallationPaths::new(tmp.path().to_path_buf());
        fs::create_dir_all(paths.under_root("opt/jetty-9.4/lib")).unwrap();
        fs::create_dir_all(paths.under_root("opt/jetty-11")).unwrap();
        fs::create_dir_all(paths.under_root("opt")).unwrap();
        fs::write(paths.under_root("opt/jre"), "link").unwrap();
        fs::write(paths.under_root("opt/keep"), "keep").unwrap();

        let patterns = vec![
            paths.under_root("/opt/jetty*"),
            paths.under_root("/opt/jre"),
            paths.under_root("/opt/node*"),
        ];
        let report = InstallationManager::new(&paths).remove_paths(&patterns);

        assert!(report.is_success());
        assert_eq!(report.entries.len(), 4);
        assert_eq!(
            report
                .entries
                .iter()
                .filter(|(_, s)| *s == RemovalStatus::Removed)
                .count(),
            3
        );
        assert_eq!(
            report.entries.last().unwrap(),
            &(paths.under_root("/opt/node*"), RemovalStatus::Absent)
        );
        assert!(!paths.under_root("opt/jetty-11").exists());
        assert!(paths.under_root("opt/keep").exists());
    }
}
