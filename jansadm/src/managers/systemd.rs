use crate::types::InstallationPaths;
use anyhow::Result;
use common::exec::{CommandOutcome, CommandRunner, ExitPolicy};

/// Drives `systemctl` and the directory server scripts.
pub struct ServiceManager<'a> {
    runner: &'a dyn CommandRunner,
    policy: ExitPolicy,
}

impl<'a> ServiceManager<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            policy: ExitPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ExitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn restart(&self, service: &str) -> Result<CommandOutcome> {
        println!("Restarting {service}");
        self.systemctl("restart", service)
    }

    pub fn stop(&self, service: &str) -> Result<CommandOutcome> {
        println!("Stopping {service}");
        self.systemctl("stop", service)
    }

    pub fn stop_directory_server(&self, paths: &InstallationPaths) -> Result<CommandOutcome> {
        println!("Stopping OpenDJ Server");
        let stop_ds = paths.stop_ds();
        let outcome = self.runner.output(&stop_ds.to_string_lossy(), &[])?;
        Ok(outcome.check(self.policy)?)
    }

    fn systemctl(&self, action: &str, service: &str) -> Result<CommandOutcome> {
        let args = vec![action.to_string(), service.to_string()];
        let outcome = self.runner.output("systemctl", &args)?;
        Ok(outcome.check(self.policy)?)
    }
}
