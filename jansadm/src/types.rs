use std::fmt::{Display, Formatter};
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use common::exec::ExitPolicy;

/// Install variant; `Jans` is the default profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Profile {
    #[default]
    Jans,
    #[value(name = "openbanking")]
    OpenBanking,
}

impl Profile {
    pub fn name(&self) -> &'static str {
        match self {
            Profile::Jans => "jans",
            Profile::OpenBanking => "openbanking",
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Profile::Jans
    }

    /// Jetty services managed for this profile, in restart/stop order.
    pub fn managed_services(&self) -> Vec<&'static str> {
        let mut services = vec!["jans-auth", "jans-config-api"];
        if self.is_default() {
            services.extend(["jans-fido2", "jans-scim", "jans-eleven"]);
        }
        services
    }
}

impl Display for Profile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOperation {
    Install,
    Upgrade,
    Uninstall,
}

impl LifecycleOperation {
    pub fn from_flags(upgrade: bool, uninstall: bool) -> Result<Self> {
        match (upgrade, uninstall) {
            (true, true) => {
                anyhow::bail!("--upgrade and --uninstall are mutually exclusive, choose one")
            }
            (true, false) => Ok(LifecycleOperation::Upgrade),
            (false, true) => Ok(LifecycleOperation::Uninstall),
            (false, false) => Ok(LifecycleOperation::Install),
        }
    }
}

/// Options of one jansadm invocation, resolved once from the command line.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub operation: LifecycleOperation,
    pub profile: Profile,
    pub use_downloaded: bool,
    pub no_prompt: bool,
    pub keep_downloads: bool,
    pub strict: bool,
    pub setup_args: Option<String>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            operation: LifecycleOperation::Install,
            profile: Profile::Jans,
            use_downloaded: false,
            no_prompt: false,
            keep_downloads: false,
            strict: false,
            setup_args: None,
        }
    }
}

impl LifecycleConfig {
    /// Artifacts are fetched for install and upgrade unless the existing
    /// downloads are reused.
    pub fn fetch_artifacts(&self) -> bool {
        !self.use_downloaded && self.operation != LifecycleOperation::Uninstall
    }

    /// Service commands only abort the operation in strict mode.
    pub fn service_policy(&self) -> ExitPolicy {
        if self.strict {
            ExitPolicy::Fatal
        } else {
            ExitPolicy::Ignore
        }
    }
}

/// Standard paths of a Janssen Server installation.
#[derive(Debug, Clone)]
pub struct InstallationPaths {
    pub root: PathBuf,
    pub jans: PathBuf,
    pub dist: PathBuf,
    pub app: PathBuf,
    pub jans_app: PathBuf,
    pub scripts: PathBuf,
    pub setup: PathBuf,
    pub setup_app: PathBuf,
    pub setup_zip: PathBuf,
    pub jetty_home: PathBuf,
    pub jans_properties: PathBuf,
    pub config_api_runner: PathBuf,
    pub etc_default: PathBuf,
    pub opendj: PathBuf,
}

impl Default for InstallationPaths {
    fn default() -> Self {
        Self::new(PathBuf::from("/"))
    }
}

impl InstallationPaths {
    pub fn new(root: PathBuf) -> Self {
        let jans = root.join("opt/jans");
        let dist = root.join("opt/dist");
        let setup = jans.join("jans-setup");

        Self {
            app: dist.join("app"),
            jans_app: dist.join("jans"),
            scripts: dist.join("scripts"),
            setup_app: setup.join("setup_app"),
            setup_zip: dist.join("jans/jans-setup.zip"),
            jetty_home: jans.join("jetty"),
            jans_properties: root.join("etc/jans/conf/jans.properties"),
            config_api_runner: jans.join("config-api/jans-config-api-runner.jar"),
            etc_default: root.join("etc/default"),
            opendj: root.join("opt/opendj"),
            setup,
            jans,
            dist,
            root,
        }
    }

    /// Maps an absolute layout path such as `/opt/jetty*` below the root.
    pub fn under_root(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    /// Webapp archive deployed for a jetty service.
    pub fn deployed_war(&self, service: &str) -> PathBuf {
        self.jetty_home
            .join(service)
            .join("webapps")
            .join(format!("{service}.war"))
    }

    /// Freshly downloaded archive for a jetty service.
    pub fn staged_war(&self, service: &str) -> PathBuf {
        self.jans_app.join(format!("{service}.war"))
    }

    pub fn create_directories(&self) -> Result<()> {
        for path in [&self.jans, &self.app, &self.jans_app, &self.scripts] {
            if !path.exists() {
                fs::create_dir_all(path)
                    .context(format!("Failed to create directory: {}", path.display()))?;
            }
        }
        Ok(())
    }

    /// Check if this looks like an installed Janssen Server
    pub fn is_valid_installation(&self) -> bool {
        self.jetty_home.exists() && self.setup_app.exists() && self.jans_properties.exists()
    }

    pub fn setup_data(&self, file_name: &str) -> PathBuf {
        self.setup_app.join("data").join(file_name)
    }

    pub fn stop_ds(&self) -> PathBuf {
        self.opendj.join("bin/stop-ds")
    }
}

/// Exit codes for jansadm
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const INVALID_ARGUMENTS: i32 = 2;
    pub const LIFECYCLE_FAILURE: i32 = 3;
}
