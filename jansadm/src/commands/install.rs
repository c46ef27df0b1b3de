use crate::managers::{
    bundle, fetcher::ArchiveFetcher, installation::InstallationManager, overlay,
    registry::Registry,
};
use crate::types::{InstallationPaths, LifecycleConfig};
use anyhow::{Context, Result};
use common::exec::CommandRunner;

/// The downstream setup program runs on the system `python3`.
pub fn validate() -> Result<()> {
    let python = which::which("python3").context("python3 is required to run Janssen Setup")?;
    tracing::debug!("Using python interpreter {}", python.display());
    Ok(())
}

pub fn run(
    config: &LifecycleConfig,
    paths: &InstallationPaths,
    registry: &Registry,
    fetcher: &ArchiveFetcher,
    runner: &dyn CommandRunner,
) -> Result<()> {
    println!("🚀 Janssen Server Installation");
    println!("   Profile: {}", config.profile);
    println!();

    let manager = InstallationManager::new(paths);

    println!("═══ Phase 1: Extract Setup ═══");
    manager.extract_setup_bundle()?;
    manager.overlay_sqlalchemy()?;
    manager.stage_documents(fetcher, registry, config.profile)?;

    if config.profile.is_default() {
        bundle::fetch_module_bundle(fetcher, runner, paths)?;
    } else {
        println!("\n═══ Phase 2: Profile Overlay ═══");
        overlay::apply(&paths.setup, config.profile.name())?;
    }

    println!("\n═══ Phase 3: Setup ═══");
    let outcome = manager.launch_setup(runner, config.setup_args.as_deref())?;
    tracing::info!("Setup finished (exit code: {:?})", outcome.exit_code);

    Ok(())
}
