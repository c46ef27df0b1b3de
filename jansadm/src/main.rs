mod commands;
mod managers;
#[cfg(test)]
mod testing;
mod types;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use common::exec::SystemRunner;
use common::prompt::TerminalPrompter;

use crate::commands::LifecycleResult;
use crate::managers::fetcher::{ArchiveFetcher, HttpTransport};
use crate::managers::registry::{Registry, VersionMap, VersionOverrides};
use crate::types::{
    exit_codes, InstallationPaths, LifecycleConfig, LifecycleOperation, Profile,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "jansadm")]
#[command(version = VERSION)]
#[command(about = "Janssen Server installer", long_about = None)]
struct Cli {
    /// Use already downloaded components
    #[arg(short = 'u', long)]
    use_downloaded: bool,

    /// Upgrade Janssen war and jar files
    #[arg(long)]
    upgrade: bool,

    /// Uninstall Janssen server and remove all files
    #[arg(long)]
    uninstall: bool,

    /// Don't prompt for uninstall confirmation
    #[arg(short = 'n', long)]
    no_prompt: bool,

    /// Keep downloaded files when uninstalling
    #[arg(long)]
    keep_downloads: bool,

    /// Abort when a service command exits with a non-zero status
    #[arg(long)]
    strict: bool,

    /// Setup profile
    #[arg(long, value_enum, default_value_t = Profile::Jans)]
    profile: Profile,

    /// Arguments passed to setup.py
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    args: Option<String>,

    /// Version of Janssen applications
    #[arg(long, value_name = "VERSION")]
    jans_app_version: Option<String>,

    /// Janssen build suffix
    #[arg(long, value_name = "BUILD")]
    jans_build: Option<String>,

    /// Janssen setup github branch
    #[arg(long, value_name = "BRANCH")]
    setup_branch: Option<String>,

    #[arg(long, value_name = "VERSION", hide = true)]
    jetty_version: Option<String>,

    /// YAML file with pinned component versions
    #[arg(long, value_name = "FILE")]
    versions: Option<PathBuf>,
}

fn main() {
    if let Err(e) = common::init_logger() {
        eprintln!("Failed to initialize logger: {}", e);
        std::process::exit(exit_codes::LIFECYCLE_FAILURE);
    }

    let cli = Cli::parse();

    let operation = match LifecycleOperation::from_flags(cli.upgrade, cli.uninstall) {
        Ok(operation) => operation,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(exit_codes::INVALID_ARGUMENTS);
        }
    };

    let config = LifecycleConfig {
        operation,
        profile: cli.profile,
        use_downloaded: cli.use_downloaded,
        no_prompt: cli.no_prompt,
        keep_downloads: cli.keep_downloads,
        strict: cli.strict,
        setup_args: cli.args.clone(),
    };

    if operation == LifecycleOperation::Install {
        if let Err(e) = commands::install::validate() {
            eprintln!("Error: {:#}", e);
            std::process::exit(exit_codes::INVALID_ARGUMENTS);
        }
    }

    let overrides = VersionOverrides {
        jans_app_version: cli.jans_app_version.clone(),
        jans_build: cli.jans_build.clone(),
        setup_branch: cli.setup_branch.clone(),
        jetty_version: cli.jetty_version.clone(),
    };

    match run(&config, cli.versions.as_deref(), &overrides) {
        Ok(result) => {
            tracing::debug!("{operation:?} finished: {result:?}");
            std::process::exit(exit_codes::SUCCESS);
        }
        Err(e) => {
            tracing::error!("{operation:?} failed: {e:#}");
            eprintln!("Error: {:#}", e);
            std::process::exit(exit_codes::LIFECYCLE_FAILURE);
        }
    }
}

fn run(
    config: &LifecycleConfig,
    versions: Option<&std::path::Path>,
    overrides: &VersionOverrides,
) -> Result<LifecycleResult> {
    let base = match versions {
        Some(path) => VersionMap::from_file(path)?,
        None => VersionMap::default(),
    };
    let registry = Registry::new(base, overrides);

    let paths = InstallationPaths::default();
    paths.create_directories()?;

    let transport = HttpTransport::new()?;
    let fetcher = ArchiveFetcher::new(&transport, paths.app.clone());
    let runner = SystemRunner::new();

    commands::fetch_artifacts(config, &paths, &registry, &fetcher)?;

    match config.operation {
        LifecycleOperation::Install => {
            commands::install::run(config, &paths, &registry, &fetcher, &runner)?;
            Ok(LifecycleResult::Completed)
        }
        LifecycleOperation::Upgrade => commands::upgrade::run(config, &paths, &runner),
        LifecycleOperation::Uninstall => {
            let mut prompter = TerminalPrompter::new();
            commands::uninstall::run(config, &paths, &runner, &mut prompter)
        }
    }
}
