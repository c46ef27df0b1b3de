use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Settings of one export run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub ldapsearch: String,
    pub host: String,
    pub port: u16,
    pub bind_dn: String,
    pub backup_dir: PathBuf,
    pub setup_properties: PathBuf,
    pub salt_file: PathBuf,
    pub webapps_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            ldapsearch: "/opt/opendj/bin/ldapsearch".to_string(),
            host: "localhost".to_string(),
            port: 1636,
            bind_dn: "cn=directory manager".to_string(),
            backup_dir: PathBuf::from("./opendj_export"),
            setup_properties: PathBuf::from(
                "/install/community-edition-setup/setup.properties.last",
            ),
            salt_file: PathBuf::from("/opt/tomcat/conf/salt"),
            webapps_dir: PathBuf::from("/opt/tomcat/webapps"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("directory search <{command}> failed: {reason}")]
    Search { command: String, reason: String },

    #[error("failed to create folder {path}: {reason}")]
    Folder { path: PathBuf, reason: String },
}

/// Output tree of an export: `ldif/` with one file per search, plus the
/// generated `setup.properties`.
#[derive(Debug, Clone)]
pub struct BackupBundle {
    pub root: PathBuf,
    pub ldif_dir: PathBuf,
    pub properties_file: PathBuf,
}

impl BackupBundle {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ldif_dir: root.join("ldif"),
            properties_file: root.join("setup.properties"),
        }
    }

    pub fn ldif(&self, file_name: &str) -> PathBuf {
        self.ldif_dir.join(file_name)
    }

    /// Creates an empty bundle, purging files left by a previous run.
    pub fn prepare(&self) -> Result<(), ExportError> {
        if self.root.exists() {
            tracing::warn!(
                "Backup folder {} exists, removing previous export",
                self.root.display()
            );
            fs::remove_dir_all(&self.root).map_err(|e| ExportError::Folder {
                path: self.root.clone(),
                reason: e.to_string(),
            })?;
        }

        for folder in [&self.root, &self.ldif_dir] {
            fs::create_dir_all(folder).map_err(|e| ExportError::Folder {
                path: folder.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }
}

/// Exit codes for jans-ldap-export
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const SEARCH_FAILURE: i32 = 1;
    pub const FOLDER_FAILURE: i32 = 3;
    pub const EXPORT_FAILURE: i32 = 4;
}
