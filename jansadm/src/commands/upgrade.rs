use crate::commands::LifecycleResult;
use crate::managers::{installation::InstallationManager, systemd::ServiceManager};
use crate::types::{InstallationPaths, LifecycleConfig};
use anyhow::Result;
use common::exec::CommandRunner;
use std::path::Path;

const CONFIG_API_RUNNER: &str = "jans-config-api-runner.jar";

pub fn run(
    config: &LifecycleConfig,
    paths: &InstallationPaths,
    runner: &dyn CommandRunner,
) -> Result<LifecycleResult> {
    if !paths.is_valid_installation() {
        println!("Jans server seems not installed");
        return Ok(LifecycleResult::NotInstalled);
    }

    println!("⬆️  Janssen Server Upgrade");
    println!("   Profile: {}", config.profile);
    println!();

    let manager = InstallationManager::new(paths);
    let services = ServiceManager::new(runner).with_policy(config.service_policy());

    for service in config.profile.managed_services() {
        let deployed = paths.deployed_war(service);
        if !deployed.exists() {
            tracing::debug!("{service} is not deployed, skip");
            continue;
        }

        if upgrade_artifact(&manager, &deployed, &paths.staged_war(service))? {
            services.restart(service)?;
        }
    }

    let runner_jar = &paths.config_api_runner;
    if runner_jar.exists()
        && upgrade_artifact(&manager, runner_jar, &paths.jans_app.join(CONFIG_API_RUNNER))?
    {
        services.restart("jans-config-api")?;
    }

    println!("\n✓ Upgrade complete");
    Ok(LifecycleResult::Completed)
}

fn upgrade_artifact(manager: &InstallationManager, deployed: &Path, staged: &Path) -> Result<bool> {
    if !staged.exists() {
        tracing::warn!(
            "{} is missing, keeping {}",
            staged.display(),
            deployed.display()
        );
        return Ok(false);
    }

    manager.replace_artifact(deployed, staged)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Profile;
    use common::exec::ScriptedRunner;
    use std::fs;
    use tempfile::TempDir;

    fn installed(tmp: &TempDir) -> InstallationPaths {
        let paths = InstallationPaths::new(tmp.path().to_path_buf());
        paths.create_directories().unwrap();
        fs::create_dir_all(&paths.jetty_home).unwrap();
        fs::create_dir_all(&paths.setup_app).unwrap();
        fs::create_dir_all(paths.jans_properties.parent().unwrap()).unwrap();
        fs::write(&paths.jans_properties, "").unwrap();
        paths
    }

    fn deploy(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn backups_of(path: &Path) -> usize {
        let prefix = format!("{}-back.", path.file_name().unwrap().to_string_lossy());
        fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(&prefix))
            .count()
    }

    #[test]
    fn test_not_installed() {
        let tmp = TempDir::new().unwrap();
        let paths = InstallationPaths::new(tmp.path().to_path_buf());
        let runner = ScriptedRunner::new();

        let result = run(&LifecycleConfig::default(), &paths, &runner).unwrap();
        assert_eq!(result, LifecycleResult::NotInstalled);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_upgrade_replaces_and_restarts() {
        let tmp = TempDir::new().unwrap();
        let paths = installed(&tmp);

        deploy(&paths.deployed_war("jans-auth"), "auth v1");
        deploy(&paths.staged_war("jans-auth"), "auth v2");
        deploy(&paths.deployed_war("jans-scim"), "scim v1");
        deploy(&paths.config_api_runner, "runner v1");
        deploy(&paths.jans_app.join(CONFIG_API_RUNNER), "runner v2");

        let runner = ScriptedRunner::new().failing("systemctl");
        let result = run(&LifecycleConfig::default(), &paths, &runner).unwrap();
        assert_eq!(result, LifecycleResult::Completed);

        let auth = paths.deployed_war("jans-auth");
        assert_eq!(fs::read_to_string(&auth).unwrap(), "auth v2");
        assert_eq!(backups_of(&auth), 1);

        // staged scim war is missing, deployed one stays
        let scim = paths.deployed_war("jans-scim");
        assert_eq!(fs::read_to_string(&scim).unwrap(), "scim v1");
        assert_eq!(backups_of(&scim), 0);

        assert_eq!(
            fs::read_to_string(&paths.config_api_runner).unwrap(),
            "runner v2"
        );
        assert_eq!(
            runner.calls(),
            vec![
                "systemctl restart jans-auth",
                "systemctl restart jans-config-api"
            ]
        );
    }

    #[test]
    fn test_strict_restart_failure_aborts() {
        let tmp = TempDir::new().unwrap();
        let paths = installed(&tmp);
        deploy(&paths.deployed_war("jans-auth"), "auth v1");
        deploy(&paths.staged_war("jans-auth"), "auth v2");

        let config = LifecycleConfig {
            strict: true,
            ..LifecycleConfig::default()
        };
        let runner = ScriptedRunner::new().failing("systemctl");
        let err = run(&config, &paths, &runner).unwrap_err();

        assert!(err.to_string().contains("systemctl restart jans-auth"));
        assert_eq!(runner.calls(), vec!["systemctl restart jans-auth"]);
    }

    #[test]
    fn test_alternate_profile_services_only() {
        let tmp = TempDir::new().unwrap();
        let paths = installed(&tmp);
        for service in ["jans-config-api", "jans-fido2"] {
            deploy(&paths.deployed_war(service), "v1");
            deploy(&paths.staged_war(service), "v2");
        }

        let config = LifecycleConfig {
            profile: Profile::OpenBanking,
            ..LifecycleConfig::default()
        };
        let runner = ScriptedRunner::new();
        run(&config, &paths, &runner).unwrap();

        assert_eq!(runner.calls(), vec!["systemctl restart jans-config-api"]);
        assert_eq!(
            fs::read_to_string(paths.deployed_war("jans-fido2")).unwrap(),
            "v1"
        );
    }
}
