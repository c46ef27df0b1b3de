use crate::commands::LifecycleResult;
use crate::managers::{installation::InstallationManager, systemd::ServiceManager};
use crate::types::{InstallationPaths, LifecycleConfig};
use anyhow::{Context, Result};
use common::exec::CommandRunner;
use common::prompt::Prompter;
use console::style;
use std::fs;
use std::path::PathBuf;

const REMOVAL_LIST: &[&str] = &[
    "/etc/certs",
    "/etc/jans",
    "/opt/jans",
    "/opt/amazon-corretto*",
    "/opt/node*",
    "/opt/jre",
    "/opt/jetty*",
    "/opt/jython*",
];

pub fn run(
    config: &LifecycleConfig,
    paths: &InstallationPaths,
    runner: &dyn CommandRunner,
    prompter: &mut dyn Prompter,
) -> Result<LifecycleResult> {
    if !paths.is_valid_installation() {
        println!("Jans server seems not installed");
        return Ok(LifecycleResult::NotInstalled);
    }

    println!("{}", style("This process is irreversible.").red());
    println!(
        "{}",
        style("You will lose all data related to Janssen Server.").red()
    );
    println!();

    if !config.no_prompt && !confirm_uninstall(prompter)? {
        println!("Uninstall cancelled");
        return Ok(LifecycleResult::Declined);
    }

    println!("🗑️  Uninstalling Janssen Server...");

    println!("\n═══ Phase 1: Stop Services ═══");
    let services = ServiceManager::new(runner).with_policy(config.service_policy());
    for service in config.profile.managed_services() {
        if !paths.jetty_home.join(service).exists() {
            continue;
        }

        let default_fn = paths.etc_default.join(service);
        if default_fn.exists() {
            println!("Removing {}", default_fn.display());
            fs::remove_file(&default_fn)
                .context(format!("Failed to remove {}", default_fn.display()))?;
        }
        services.stop(service)?;
    }

    if config.profile.is_default() {
        services.stop_directory_server(paths)?;
    }

    println!("\n═══ Phase 2: Remove Files ═══");
    let report = InstallationManager::new(paths).remove_paths(&removal_targets(config, paths));
    report.print();

    if !report.is_success() {
        anyhow::bail!("{} path(s) could not be removed", report.failures().len());
    }

    println!("\n✓ Janssen Server uninstalled");
    Ok(LifecycleResult::Completed)
}

/// Asks until the operator answers `yes`, `n` or `no` (any case).
pub fn confirm_uninstall(prompter: &mut dyn Prompter) -> Result<bool> {
    loop {
        let response = prompter.ask("Are you sure to uninstall Janssen Server? [yes/N]")?;
        match response.trim().to_lowercase().as_str() {
            "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => println!("Please type {} to uninstall", style("yes").bold()),
        }
    }
}

pub fn removal_targets(config: &LifecycleConfig, paths: &InstallationPaths) -> Vec<PathBuf> {
    let mut targets: Vec<PathBuf> = REMOVAL_LIST.iter().map(|p| paths.under_root(p)).collect();

    if config.profile.is_default() {
        targets.push(paths.opendj.clone());
    }
    if !config.keep_downloads {
        targets.push(paths.dist.clone());
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LifecycleOperation, Profile};
    use common::exec::ScriptedRunner;
    use common::prompt::ScriptedPrompter;
    use tempfile::TempDir;

    fn installed(tmp: &TempDir) -> InstallationPaths {
        let paths = InstallationPaths::new(tmp.path().to_path_buf());
        paths.create_directories().unwrap();
        for service in ["jans-auth", "jans-scim"] {
            fs::create_dir_all(paths.jetty_home.join(service)).unwrap();
        }
        fs::create_dir_all(&paths.setup_app).unwrap();
        fs::create_dir_all(paths.jans_properties.parent().unwrap()).unwrap();
        fs::write(&paths.jans_properties, "").unwrap();
        fs::create_dir_all(&paths.etc_default).unwrap();
        fs::write(paths.etc_default.join("jans-auth"), "JAVA_HOME=/opt/jre").unwrap();
        fs::create_dir_all(paths.under_root("opt/jetty-9.4")).unwrap();
        fs::create_dir_all(paths.opendj.join("bin")).unwrap();
        fs::write(paths.app.join("jetty.tar.gz"), "").unwrap();
        paths
    }

    fn uninstall_config() -> LifecycleConfig {
        LifecycleConfig {
            operation: LifecycleOperation::Uninstall,
            ..LifecycleConfig::default()
        }
    }

    #[test]
    fn test_confirm_uninstall() {
        let mut prompter = ScriptedPrompter::new(["YES"]);
        assert!(confirm_uninstall(&mut prompter).unwrap());

        let mut prompter = ScriptedPrompter::new(["n"]);
        assert!(!confirm_uninstall(&mut prompter).unwrap());

        let mut prompter = ScriptedPrompter::new(["maybe", "", "No"]);
        assert!(!confirm_uninstall(&mut prompter).unwrap());
        assert_eq!(prompter.prompts.len(), 3);

        let mut prompter = ScriptedPrompter::new(["y"]);
        assert!(confirm_uninstall(&mut prompter).is_err());
    }

    #[test]
    fn test_declined_mutates_nothing() {
        let tmp = TempDir::new().unwrap();
        let paths = installed(&tmp);
        let runner = ScriptedRunner::new();
        let mut prompter = ScriptedPrompter::new(["no"]);

        let result = run(&uninstall_config(), &paths, &runner, &mut prompter).unwrap();

        assert_eq!(result, LifecycleResult::Declined);
        assert!(runner.calls().is_empty());
        assert!(paths.etc_default.join("jans-auth").exists());
        assert!(paths.jans.exists());
        assert!(paths.dist.exists());
    }

    #[test]
    fn test_confirmed_uninstall() {
        let tmp = TempDir::new().unwrap();
        let paths = installed(&tmp);
        let runner = ScriptedRunner::new();
        let mut prompter = ScriptedPrompter::new(["what", "yes"]);

        let result = run(&uninstall_config(), &paths, &runner, &mut prompter).unwrap();

        assert_eq!(result, LifecycleResult::Completed);
        assert_eq!(prompter.remaining(), 0);
        assert_eq!(
            runner.calls(),
            vec![
                "systemctl stop jans-auth".to_string(),
                "systemctl stop jans-scim".to_string(),
                paths.stop_ds().display().to_string(),
            ]
        );
        assert!(!paths.etc_default.join("jans-auth").exists());
        assert!(paths.etc_default.exists());
        for removed in [&paths.jans, &paths.dist, &paths.opendj] {
            assert!(!removed.exists(), "{}", removed.display());
        }
        assert!(!paths.under_root("etc/jans").exists());
        assert!(!paths.under_root("opt/jetty-9.4").exists());
    }

    #[test]
    fn test_no_prompt_keep_downloads() {
        let tmp = TempDir::new().unwrap();
        let paths = installed(&tmp);
        let runner = ScriptedRunner::new();
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());

        let config = LifecycleConfig {
            profile: Profile::OpenBanking,
            no_prompt: true,
            keep_downloads: true,
            ..uninstall_config()
        };
        let result = run(&config, &paths, &runner, &mut prompter).unwrap();

        assert_eq!(result, LifecycleResult::Completed);
        assert!(prompter.prompts.is_empty());
        assert_eq!(runner.calls(), vec!["systemctl stop jans-auth"]);
        assert!(paths.app.join("jetty.tar.gz").exists());
        assert!(paths.opendj.exists());
        assert!(!paths.jans.exists());
    }

    #[test]
    fn test_removal_targets() {
        let paths = InstallationPaths::default();

        let targets = removal_targets(&uninstall_config(), &paths);
        assert_eq!(targets.len(), 10);
        assert_eq!(targets[0], PathBuf::from("/etc/certs"));
        assert!(targets.contains(&PathBuf::from("/opt/opendj")));
        assert_eq!(targets.last().unwrap(), &PathBuf::from("/opt/dist"));

        let config = LifecycleConfig {
            profile: Profile::OpenBanking,
            keep_downloads: true,
            ..uninstall_config()
        };
        assert_eq!(removal_targets(&config, &paths).len(), 8);
    }
}
