use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use common::exec::{CommandOutcome, CommandRunner, ExitPolicy};
use common::prompt::Prompter;

use crate::credential::CredentialFile;
use crate::properties::{self, LegacyProperties, PropertySources};
use crate::types::{BackupBundle, ExportConfig, ExportError};

const ORGANIZATION_UNITS: &[&str] = &[
    "people",
    "groups",
    "attributes",
    "scopes",
    "clients",
    "scripts",
    "uma",
    "hosts",
    "u2f",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Base,
    One,
    Subtree,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Base => "base",
            Scope::One => "one",
            Scope::Subtree => "sub",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base: String,
    pub scope: Scope,
    pub filter: String,
    pub attributes: Vec<String>,
}

impl SearchRequest {
    pub fn new(base: impl Into<String>, scope: Scope, filter: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            scope,
            filter: filter.into(),
            attributes: vec![],
        }
    }

    pub fn with_attributes(mut self, attributes: &[&str]) -> Self {
        self.attributes = attributes.iter().map(|a| a.to_string()).collect();
        self
    }
}

/// Immediate children of `o=gluu`; the organization entry is among them.
pub fn organization_request() -> SearchRequest {
    SearchRequest::new("o=gluu", Scope::One, "o=*").with_attributes(&["dn"])
}

/// Output file name and search for every exported subtree, in order.
pub fn export_plan(org_inum: &str) -> Vec<(String, SearchRequest)> {
    let org_base = format!("o={org_inum},o=gluu");

    let mut plan: Vec<(String, SearchRequest)> = ORGANIZATION_UNITS
        .iter()
        .map(|ou| {
            (
                format!("{ou}.ldif"),
                SearchRequest::new(format!("ou={ou},{org_base}"), Scope::Subtree, "objectclass=*"),
            )
        })
        .collect();

    let appliances = "ou=appliances,o=gluu";
    plan.extend([
        (
            "appliance.ldif".to_string(),
            SearchRequest::new(appliances, Scope::One, "objectclass=*"),
        ),
        (
            "oxtrust_config.ldif".to_string(),
            SearchRequest::new(appliances, Scope::Subtree, "objectclass=oxTrustConfiguration"),
        ),
        (
            "oxauth_config.ldif".to_string(),
            SearchRequest::new(appliances, Scope::Subtree, "objectclass=oxAuthConfiguration"),
        ),
        (
            "trust_relationships.ldif".to_string(),
            SearchRequest::new(appliances, Scope::Subtree, "objectclass=gluuSAMLconfig"),
        ),
        (
            "organization.ldif".to_string(),
            SearchRequest::new(org_base, Scope::Base, "objectclass=*"),
        ),
        (
            "site.ldif".to_string(),
            SearchRequest::new("ou=people,o=site", Scope::One, "objectclass=*"),
        ),
    ]);

    plan
}

/// Organization inum from the `dn` of the first entry, e.g.
/// `dn: o=@!1234,o=gluu`.
pub fn parse_org_inum(output: &str) -> Option<String> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let rdn = line.split(',').next()?;
    if !rdn.contains("o=") {
        return None;
    }

    let inum = rdn.rsplit("o=").next()?.trim();
    if inum.is_empty() {
        None
    } else {
        Some(inum.to_string())
    }
}

/// The external directory search tool bound to one server.
pub struct LdapSearch<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a ExportConfig,
    password_file: PathBuf,
}

impl<'a> LdapSearch<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a ExportConfig, password_file: &Path) -> Self {
        Self {
            runner,
            config,
            password_file: password_file.to_path_buf(),
        }
    }

    pub fn args(&self, request: &SearchRequest) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-h".to_string(),
            self.config.host.clone(),
            "-p".to_string(),
            self.config.port.to_string(),
            "-Z".to_string(),
            "-X".to_string(),
            "-D".to_string(),
            self.config.bind_dn.clone(),
            "-j".to_string(),
            self.password_file.to_string_lossy().to_string(),
            "-s".to_string(),
            request.scope.as_str().to_string(),
            "-b".to_string(),
            request.base.clone(),
            request.filter.clone(),
        ];
        args.extend(request.attributes.iter().cloned());
        args
    }

    pub fn search(
        &self,
        request: &SearchRequest,
        policy: ExitPolicy,
    ) -> Result<CommandOutcome, ExportError> {
        let args = self.args(request);
        tracing::debug!("Searching <{}> ({})", request.base, request.filter);

        let outcome = self
            .runner
            .output(&self.config.ldapsearch, &args)
            .and_then(|outcome| outcome.check(policy))
            .map_err(|e| ExportError::Search {
                command: format!("{} -b {} {}", self.config.ldapsearch, request.base, request.filter),
                reason: e.to_string(),
            })?;

        Ok(outcome)
    }

    pub fn org_inum(&self, policy: ExitPolicy) -> Result<Option<String>, ExportError> {
        let outcome = self.search(&organization_request(), policy)?;
        if !outcome.succeeded {
            return Ok(None);
        }
        Ok(parse_org_inum(&outcome.stdout_lossy()))
    }
}

pub struct Exporter<'a> {
    config: &'a ExportConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> Exporter<'a> {
    pub fn new(config: &'a ExportConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// Exports the directory into the backup bundle and writes the migration
    /// properties. Returns the properties file.
    pub fn export(&self, prompter: &mut dyn Prompter) -> Result<PathBuf> {
        let legacy = LegacyProperties::from_file(&self.config.setup_properties)?;

        let credential = CredentialFile::new()?;
        credential.write(&legacy.get("ldapPass").unwrap_or_default())?;

        let search = LdapSearch::new(self.runner, self.config, credential.path());
        if search.org_inum(ExitPolicy::Ignore)?.is_none() {
            let password = prompter.ask_secret("Enter LDAP Password")?;
            credential.write(&password)?;
        }

        let bundle = BackupBundle::new(&self.config.backup_dir);
        bundle.prepare()?;

        tracing::info!("Creating backup of LDAP data");
        let org_inum = search
            .org_inum(ExitPolicy::Fatal)?
            .ok_or_else(|| ExportError::Search {
                command: format!("{} -b o=gluu o=*", self.config.ldapsearch),
                reason: "no organization found".to_string(),
            })?;
        tracing::debug!("Organization inum: {org_inum}");

        for (file_name, request) in export_plan(&org_inum) {
            let outcome = search.search(&request, ExitPolicy::Fatal)?;
            let target = bundle.ldif(&file_name);
            fs::write(&target, &outcome.stdout)
                .context(format!("Failed to write {}", target.display()))?;
            tracing::info!("Exported {} to {}", request.base, target.display());
        }

        let sources = PropertySources {
            ldap_pass: credential.read()?,
            hostname: gethostname::gethostname().to_string_lossy().to_string(),
            org_inum,
            appliance_ldif: bundle.ldif("appliance.ldif"),
            salt_file: self.config.salt_file.clone(),
            webapps_dir: self.config.webapps_dir.clone(),
            legacy,
        };
        let props = properties::generate(&sources, prompter)?;
        props.write(&bundle.properties_file)?;

        Ok(bundle.properties_file)
    }
}
