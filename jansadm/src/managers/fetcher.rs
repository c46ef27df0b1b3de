use crate::managers::registry::ArtifactSpec;
use anyhow::{Context, Result};
use common::JansError;
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// An opened remote byte stream.
pub struct Download {
    pub reader: Box<dyn Read>,
    pub length: Option<u64>,
}

/// Network side of the fetcher.
pub trait Transport {
    fn open(&self, url: &str) -> Result<Download>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("jansadm/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn open(&self, url: &str) -> Result<Download> {
        let response = self
            .client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| JansError::Network(format!("Failed to download {url}: {e}")))?;

        Ok(Download {
            length: response.content_length(),
            reader: Box::new(response),
        })
    }
}

pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Copies URL-or-path sources into local targets, overwriting them.
pub struct ArchiveFetcher<'a> {
    transport: &'a dyn Transport,
    app_dir: PathBuf,
}

impl<'a> ArchiveFetcher<'a> {
    pub fn new(transport: &'a dyn Transport, app_dir: PathBuf) -> Self {
        Self { transport, app_dir }
    }

    /// Relative targets land under the application artifact directory.
    pub fn resolve(&self, target: &Path) -> PathBuf {
        if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.app_dir.join(target)
        }
    }

    pub fn fetch(&self, source: &str, target: &Path) -> Result<PathBuf> {
        let dst = self.resolve(target);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create directory {}", parent.display()))?;
        }

        println!("Downloading {} to {}", source, dst.display());
        tracing::debug!("Fetch <{source}> into <{}>", dst.display());

        let download = self.open(source)?;
        let pb = progress_bar(download.length)?;

        let mut file =
            File::create(&dst).context(format!("Failed to create {}", dst.display()))?;
        io::copy(&mut pb.wrap_read(download.reader), &mut file)
            .context(format!("Failed to write {}", dst.display()))?;
        pb.finish_and_clear();

        Ok(dst)
    }

    pub fn fetch_all(&self, specs: &[ArtifactSpec]) -> Result<()> {
        for spec in specs {
            self.fetch(&spec.source, &spec.target)?;
        }
        Ok(())
    }

    pub fn fetch_json<T: DeserializeOwned>(&self, source: &str) -> Result<T> {
        tracing::debug!("Fetch JSON document <{source}>");
        let download = self.open(source)?;
        serde_json::from_reader(download.reader).context(format!("Invalid JSON from {source}"))
    }

    fn open(&self, source: &str) -> Result<Download> {
        if is_remote(source) {
            return self.transport.open(source);
        }

        let path = source.strip_prefix("file://").unwrap_or(source);
        if !Path::new(path).exists() {
            return Err(JansError::NotFound(path.to_string()).into());
        }
        let file = File::open(path).context(format!("Failed to open {path}"))?;
        let length = file.metadata().ok().map(|m| m.len());
        Ok(Download {
            reader: Box::new(file),
            length,
        })
    }
}

fn progress_bar(length: Option<u64>) -> Result<ProgressBar> {
    let pb = match length {
        Some(len) => {
            let pb = ProgressBar::new(len);
            pb.set_style(ProgressStyle::with_template(
                "  {bar:40.green} {bytes}/{total_bytes} ({eta})",
            )?);
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::with_template("  {spinner:.green} {bytes}")?);
            pb
        }
    };
    Ok(pb)
}
