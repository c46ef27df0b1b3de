use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Bind password handed to the search tool by file. The file is removed
/// when the value is dropped.
pub struct CredentialFile {
    file: NamedTempFile,
}

impl CredentialFile {
    pub fn new() -> Result<Self> {
        let file = NamedTempFile::new().context("Failed to create credential file")?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn write(&self, secret: &str) -> Result<()> {
        let mut out = fs::File::create(self.path()).context("Failed to write credential file")?;
        out.write_all(secret.as_bytes())?;
        Ok(())
    }

    pub fn read(&self) -> Result<String> {
        let secret = fs::read_to_string(self.path()).context("Failed to read credential file")?;
        Ok(secret.trim().to_string())
    }
}
