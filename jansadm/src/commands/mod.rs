pub mod install;
pub mod uninstall;
pub mod upgrade;

use crate::managers::{fetcher::ArchiveFetcher, registry::Registry};
use crate::types::{InstallationPaths, LifecycleConfig};
use anyhow::Result;

/// How a lifecycle operation ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleResult {
    Completed,
    NotInstalled,
    Declined,
}

/// Downloads every artifact of the selected profile, unless the existing
/// downloads are reused or the operation does not need them.
pub fn fetch_artifacts(
    config: &LifecycleConfig,
    paths: &InstallationPaths,
    registry: &Registry,
    fetcher: &ArchiveFetcher,
) -> Result<()> {
    if !config.fetch_artifacts() {
        tracing::info!("Skip downloading artifacts");
        return Ok(());
    }

    println!("═══ Downloading Files ═══");
    let artifacts = registry.artifacts(config.profile, paths)?;
    tracing::info!(
        "Fetching {} artifacts for profile {}",
        artifacts.len(),
        config.profile
    );
    fetcher.fetch_all(&artifacts)?;
    println!("✓ Downloaded {} files", artifacts.len());

    Ok(())
}
