use crate::managers::fetcher::ArchiveFetcher;
use crate::types::InstallationPaths;
use anyhow::{Context, Result};
use common::exec::{CommandRunner, ExitPolicy};
use flate2::read::GzDecoder;
use serde_derive::Deserialize;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

pub const GCS_BUNDLE_URL: &str = "https://ox.gluu.org/icrby8xcvbcv/spanner/gcs.tgz";
pub const GRPCIO_INDEX_URL: &str = "https://pypi.org/pypi/grpcio/1.37.0/json";

const NATIVE_MODULE_PREFIX: &str = "cygrpc.cpython";
const NATIVE_MODULE_SUFFIX: &str = "x86_64-linux-gnu.so";

/// Package index answer, reduced to the release files.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageIndex {
    pub urls: Vec<PackageFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackageFile {
    pub python_version: String,
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub upload_time: String,
}

impl PackageFile {
    fn matches(&self, abi_tag: &str) -> bool {
        self.python_version == abi_tag
            && self.filename.contains("manylinux")
            && self.filename.ends_with("x86_64.whl")
    }
}

/// Latest 64-bit Linux wheel built for `abi_tag`. On equal upload times
/// the first listed file wins.
pub fn select_wheel<'a>(files: &'a [PackageFile], abi_tag: &str) -> Option<&'a PackageFile> {
    let mut selected: Option<&PackageFile> = None;
    for file in files.iter().filter(|f| f.matches(abi_tag)) {
        match selected {
            Some(current) if file.upload_time <= current.upload_time => {}
            _ => selected = Some(file),
        }
    }
    selected
}

/// `cpXY` tag of the interpreter that will run setup.
pub fn python_abi_tag(runner: &dyn CommandRunner) -> Result<String> {
    let args = vec![
        "-c".to_string(),
        "import sys; print('cp{0}{1}'.format(*sys.version_info[:2]))".to_string(),
    ];
    let outcome = runner.output("python3", &args)?.check(ExitPolicy::Fatal)?;

    let tag = outcome.stdout_lossy().trim().to_string();
    if !tag.starts_with("cp") {
        anyhow::bail!("Unexpected python ABI tag <{tag}>");
    }
    Ok(tag)
}

/// Downloads the Spanner client modules into `<app>/gcs` together with the
/// grpc native extension matching the local interpreter. Does nothing if
/// the bundle directory already exists.
pub fn fetch_module_bundle(
    fetcher: &ArchiveFetcher,
    runner: &dyn CommandRunner,
    paths: &InstallationPaths,
) -> Result<()> {
    let bundle_dir = paths.app.join("gcs");
    if bundle_dir.exists() {
        tracing::debug!("Module bundle {} exists, skip", bundle_dir.display());
        return Ok(());
    }

    println!("Downloading Spanner modules");

    fs::create_dir_all(&paths.app)?;
    let scratch = tempfile::Builder::new()
        .prefix("gcs-")
        .tempdir_in(&paths.app)
        .context("Failed to create scratch directory")?;

    let archive = fetcher.fetch(GCS_BUNDLE_URL, &scratch.path().join("gcs.tgz"))?;
    unpack_tar_gz(&archive, &paths.app)?;

    let index: PackageIndex = fetcher.fetch_json(GRPCIO_INDEX_URL)?;
    let abi_tag = python_abi_tag(runner)?;

    match select_wheel(&index.urls, &abi_tag) {
        Some(wheel) => {
            let wheel_path = fetcher.fetch(&wheel.url, &scratch.path().join(&wheel.filename))?;
            let extracted = extract_native_module(&wheel_path, &bundle_dir)?;
            tracing::info!("Extracted {} native module(s) from {}", extracted.len(), wheel.filename);
        }
        None => {
            tracing::warn!("No grpcio wheel found for {abi_tag}");
        }
    }

    Ok(())
}

pub fn unpack_tar_gz(archive: &Path, dst: &Path) -> Result<()> {
    let file = File::open(archive).context(format!("Failed to open {}", archive.display()))?;
    tar::Archive::new(GzDecoder::new(file))
        .unpack(dst)
        .context(format!("Failed to unpack {}", archive.display()))?;
    Ok(())
}

/// Extracts the grpc native extension members of a wheel below `dst`,
/// keeping their in-archive paths.
pub fn extract_native_module(wheel: &Path, dst: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(wheel).context(format!("Failed to open {}", wheel.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .context(format!("Failed to read wheel {}", wheel.display()))?;

    let mut extracted = vec![];
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };

        let is_module = relative
            .file_name()
            .map(|name| name.to_string_lossy())
            .is_some_and(|name| {
                name.starts_with(NATIVE_MODULE_PREFIX) && name.ends_with(NATIVE_MODULE_SUFFIX)
            });
        if !is_module {
            continue;
        }

        let target = dst.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out =
            File::create(&target).context(format!("Failed to create {}", target.display()))?;
        io::copy(&mut entry, &mut out)?;
        extracted.push(target);
    }

    Ok(extracted)
}
