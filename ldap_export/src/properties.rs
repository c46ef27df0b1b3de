use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use common::prompt::Prompter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Flag(bool),
}

impl PropertyValue {
    /// Only truthy values are written; a missing key reads as false.
    pub fn is_truthy(&self) -> bool {
        match self {
            PropertyValue::Text(s) => !s.is_empty(),
            PropertyValue::Flag(b) => *b,
        }
    }

    fn render(&self) -> String {
        match self {
            PropertyValue::Text(s) => s.clone(),
            PropertyValue::Flag(_) => "True".to_string(),
        }
    }
}

impl From<Option<String>> for PropertyValue {
    fn from(value: Option<String>) -> Self {
        PropertyValue::Text(value.unwrap_or_default())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Flag(value)
    }
}

/// Ordered `key=value` set for the downstream installer.
#[derive(Debug, Default)]
pub struct PropertySet {
    entries: Vec<(String, PropertyValue)>,
}

impl PropertySet {
    pub fn set(&mut self, key: &str, value: impl Into<PropertyValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in self.entries.iter().filter(|(_, v)| v.is_truthy()) {
            let _ = writeln!(out, "{key}={}", value.render());
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render()).context(format!("Failed to write {}", path.display()))
    }
}

/// Property file persisted by the legacy installer.
#[derive(Debug, Default)]
pub struct LegacyProperties {
    lines: Vec<String>,
}

impl LegacyProperties {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
        Ok(Self::parse(&contents))
    }

    pub fn parse(contents: &str) -> Self {
        Self {
            lines: contents.lines().map(str::to_string).collect(),
        }
    }

    /// Value of the first line starting with `<key>=`.
    pub fn get(&self, key: &str) -> Option<String> {
        let prefix = format!("{key}=");
        self.lines
            .iter()
            .find_map(|line| line.strip_prefix(&prefix))
            .map(|value| value.trim().to_string())
    }
}

/// Strips `@`, `!` and `.` from an inum.
pub fn clean(s: &str) -> String {
    s.chars().filter(|c| !matches!(c, '@' | '!' | '.')).collect()
}

/// Value of the first `inum` attribute line of an ldif document.
pub fn first_inum(ldif: &str) -> Option<String> {
    ldif.lines()
        .find(|line| line.starts_with("inum"))
        .and_then(|line| line.rsplit(':').next())
        .map(|value| value.trim().to_string())
}

/// Everything the generator reads besides the operator.
#[derive(Debug)]
pub struct PropertySources {
    pub ldap_pass: String,
    pub hostname: String,
    pub org_inum: String,
    pub appliance_ldif: PathBuf,
    pub salt_file: PathBuf,
    pub webapps_dir: PathBuf,
    pub legacy: LegacyProperties,
}

pub fn generate(sources: &PropertySources, prompter: &mut dyn Prompter) -> Result<PropertySet> {
    tracing::info!("Creating setup.properties backup file");

    let mut props = PropertySet::default();
    let legacy = &sources.legacy;

    props.set("ldapPass", sources.ldap_pass.clone());
    props.set("hostname", sources.hostname.clone());

    let appliance = fs::read_to_string(&sources.appliance_ldif).context(format!(
        "Failed to read {}",
        sources.appliance_ldif.display()
    ))?;
    let inum_appliance = first_inum(&appliance).unwrap_or_default();
    props.set("inumAppliance", inum_appliance.clone());
    props.set("inumApplianceFN", clean(&inum_appliance));
    props.set("inumOrg", sources.org_inum.clone());
    props.set("inumOrgFN", clean(&sources.org_inum));
    props.set(
        "baseInum",
        sources.org_inum.chars().take(21).collect::<String>(),
    );

    let salt = fs::read_to_string(&sources.salt_file)
        .context(format!("Failed to read {}", sources.salt_file.display()))?;
    props.set(
        "encode_salt",
        salt.rsplit('=').next().unwrap_or_default().trim().to_string(),
    );

    for key in ["oxauth_client_id", "scim_rs_client_id", "scim_rp_client_id"] {
        props.set(key, legacy.get(key));
    }
    props.set(
        "version",
        legacy
            .get("githubBranchName")
            .and_then(|branch| branch.rsplit('_').next().map(str::to_string)),
    );
    for key in ["httpdKeyPass", "shibJksPass", "asimbaJksPass"] {
        props.set(key, legacy.get(key));
    }

    let install_saml = prompter.ask("\tIs Shibboleth SAML IDP installed? (Y/N)")?;
    props.set("installSaml", install_saml.to_lowercase().contains('y'));

    for (key, war) in [
        ("installAsimba", "asimba.war"),
        ("installCas", "cas.war"),
        ("installOxAuthRP", "oxauth-rp.war"),
    ] {
        props.set(key, sources.webapps_dir.join(war).is_file());
    }

    Ok(props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::prompt::ScriptedPrompter;
    use tempfile::TempDir;

    fn sources(tmp: &TempDir, legacy: &str) -> PropertySources {
        let appliance = tmp.path().join("appliance.ldif");
        fs::write(
            &appliance,
            "dn: inum=@!1111.2222,ou=appliances,o=gluu\nobjectClass: gluuAppliance\ninum: @!1111.2222\n",
        )
        .unwrap();
        let salt = tmp.path().join("salt");
        fs::write(&salt, "encodeSalt = s3cr3tSalt\n").unwrap();
        let webapps = tmp.path().join("webapps");
        fs::create_dir_all(&webapps).unwrap();

        PropertySources {
            ldap_pass: "secret".to_string(),
            hostname: "idp.example.org".to_string(),
            org_inum: "@!1111.2222.3333.4444!0001!ABCD".to_string(),
            appliance_ldif: appliance,
            salt_file: salt,
            webapps_dir: webapps,
            legacy: LegacyProperties::parse(legacy),
        }
    }

    #[test]
    fn test_client_id_without_saml() {
        let tmp = TempDir::new().unwrap();
        let sources = sources(&tmp, "hostname=old\noxauth_client_id=abc123\n");
        let mut prompter = ScriptedPrompter::new(["N"]);

        let rendered = generate(&sources, &mut prompter).unwrap().render();

        assert!(rendered.lines().any(|line| line == "oxauth_client_id=abc123"));
        assert!(!rendered.contains("installSaml"));
        assert!(!rendered.contains("installAsimba"));
        assert!(!rendered.contains("scim_rs_client_id"));
    }

    #[test]
    fn test_generated_values() {
        let tmp = TempDir::new().unwrap();
        let sources = sources(
            &tmp,
            "githubBranchName=version_3.1.6\nshibJksPass=jks\nldapPass=ignored\n",
        );
        fs::write(sources.webapps_dir.join("cas.war"), "").unwrap();
        let mut prompter = ScriptedPrompter::new(["yes"]);

        let props = generate(&sources, &mut prompter).unwrap();
        let rendered = props.render();

        assert_eq!(
            props.get("inumAppliance"),
            Some(&PropertyValue::Text("@!1111.2222".to_string()))
        );
        assert!(rendered.contains("inumApplianceFN=11112222\n"));
        assert!(rendered.contains("inumOrgFN=11112222333344440001ABCD\n"));
        assert!(rendered.contains("baseInum=@!1111.2222.3333.4444\n"));
        assert!(rendered.contains("encode_salt=s3cr3tSalt\n"));
        assert!(rendered.contains("version=3.1.6\n"));
        assert!(rendered.contains("shibJksPass=jks\n"));
        assert!(rendered.contains("installSaml=True\n"));
        assert!(rendered.contains("installCas=True\n"));
        assert!(!rendered.contains("installOxAuthRP"));
        assert!(rendered.starts_with("ldapPass=secret\nhostname=idp.example.org\n"));
    }

    #[test]
    fn test_legacy_lookup() {
        let legacy = LegacyProperties::parse(
            "# oxauth_client_id=commented\nmy_oxauth_client_id=x\noxauth_client_id=first\noxauth_client_id=second\ntoken=a=b\n",
        );
        assert_eq!(legacy.get("oxauth_client_id"), Some("first".to_string()));
        assert_eq!(legacy.get("token"), Some("a=b".to_string()));
        assert_eq!(legacy.get("missing"), None);
    }

    #[test]
    fn test_first_inum() {
        assert_eq!(
            first_inum("dn: o=gluu\ninumAppliance: @!AAA\ninum: @!BBB\n"),
            Some("@!AAA".to_string())
        );
        assert_eq!(first_inum("dn: o=gluu\n"), None);
        assert_eq!(clean("@!12.34!56"), "123456");
    }
}
