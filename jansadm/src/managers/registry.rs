use crate::types::{InstallationPaths, Profile};
use anyhow::{Context, Result};
use serde_derive::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

pub const MAVEN_BASE_URL: &str = "https://maven.jans.io/maven/io/jans/";
pub const JENKINS_BASE_URL: &str = "https://jenkins.jans.io/maven/io/jans/";

pub const CONFIG_API_SWAGGER: &str = "jans-config-api-swagger.yaml";
pub const SCIM_OPENAPI: &str = "jans-scim-openapi.yaml";

/// Runtime major versions above this use the `jetty-home` packaging.
const JETTY_HOME_MIN_MAJOR: u64 = 9;

/// Pinned component versions. Every download URL and file name is derived
/// from these values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct VersionMap {
    pub jans_app_version: String,
    pub jans_build: String,
    pub jetty_version: String,
    pub amazon_corretto_version: String,
    pub jython_version: String,
    pub opendj_version: String,
    pub setup_branch: String,
    pub admin_ui_frontend_branch: String,
    pub node_version: String,
}

impl Default for VersionMap {
    fn default() -> Self {
        Self {
            jans_app_version: "1.0.0".to_string(),
            jans_build: "-SNAPSHOT".to_string(),
            jetty_version: "9.4.44.v20210927".to_string(),
            amazon_corretto_version: "11.0.13.8.1".to_string(),
            jython_version: "2.7.3".to_string(),
            opendj_version: "4.4.12".to_string(),
            setup_branch: "master".to_string(),
            admin_ui_frontend_branch: "main".to_string(),
            node_version: "v14.18.2".to_string(),
        }
    }
}

impl VersionMap {
    /// Loads pinned versions from a YAML file; absent keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            anyhow::bail!("<{}> is not a file", path.display());
        }

        let contents = fs::read_to_string(path)
            .context(format!("Failed to read versions file {}", path.display()))?;
        let versions: VersionMap = serde_yaml::from_str(&contents)
            .context(format!("Failed to parse versions file {}", path.display()))?;

        tracing::debug!("Load versions from <{}>: {versions:?}", path.display());

        Ok(versions)
    }
}

/// Command-line version overrides; `None` keeps the pinned value.
#[derive(Debug, Clone, Default)]
pub struct VersionOverrides {
    pub jans_app_version: Option<String>,
    pub jans_build: Option<String>,
    pub setup_branch: Option<String>,
    pub jetty_version: Option<String>,
}

/// Packaging scheme of the jetty runtime tarball.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JettyDist {
    Distribution,
    Home,
}

impl JettyDist {
    pub fn as_str(&self) -> &'static str {
        match self {
            JettyDist::Distribution => "jetty-distribution",
            JettyDist::Home => "jetty-home",
        }
    }
}

/// Outcome of inspecting a runtime version override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeChoice {
    /// Major version above 9: newer packaging with the override version.
    Newer,
    /// Parsable major version of 9 or less: defaults stay.
    Default,
    /// No leading digits to parse: defaults stay, with a warning.
    Undetermined,
}

pub fn select_runtime(version: &str) -> RuntimeChoice {
    let digits: String = version.chars().take_while(|c| c.is_ascii_digit()).collect();

    match digits.parse::<u64>() {
        Ok(major) if major > JETTY_HOME_MIN_MAJOR => RuntimeChoice::Newer,
        Ok(_) => RuntimeChoice::Default,
        Err(_) => RuntimeChoice::Undetermined,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    All,
    Only(Profile),
}

/// One artifact to retrieve: where from, where to, and for which profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    pub source: String,
    pub target: PathBuf,
    pub applicability: Applicability,
}

impl ArtifactSpec {
    fn new(source: impl Into<String>, target: PathBuf, applicability: Applicability) -> Self {
        Self {
            source: source.into(),
            target,
            applicability,
        }
    }

    pub fn applies_to(&self, profile: Profile) -> bool {
        match self.applicability {
            Applicability::All => true,
            Applicability::Only(p) => p == profile,
        }
    }
}

/// The effective versions of this run and everything derived from them.
#[derive(Debug, Clone)]
pub struct Registry {
    versions: VersionMap,
    jetty_dist: JettyDist,
}

impl Registry {
    pub fn new(base: VersionMap, overrides: &VersionOverrides) -> Self {
        let mut versions = base;
        let mut jetty_dist = JettyDist::Distribution;

        if let Some(version) = &overrides.jans_app_version {
            versions.jans_app_version = version.clone();
        }
        if let Some(build) = &overrides.jans_build {
            versions.jans_build = build.clone();
        }
        if let Some(branch) = &overrides.setup_branch {
            versions.setup_branch = branch.clone();
        }

        if let Some(jetty_version) = &overrides.jetty_version {
            match select_runtime(jetty_version) {
                RuntimeChoice::Newer => {
                    jetty_dist = JettyDist::Home;
                    versions.jetty_version = jetty_version.clone();
                }
                RuntimeChoice::Default => {}
                RuntimeChoice::Undetermined => {
                    tracing::warn!(
                        "Can't determine Jetty Version. Continuing with version {}",
                        versions.jetty_version
                    );
                }
            }
        }

        Self {
            versions,
            jetty_dist,
        }
    }

    pub fn versions(&self) -> &VersionMap {
        &self.versions
    }

    pub fn jetty_dist(&self) -> JettyDist {
        self.jetty_dist
    }

    /// `<base>/<artifact>/<version><build>/<artifact>-<version><build><suffix>`
    pub fn maven_url(&self, base: &str, artifact: &str, suffix: &str) -> Result<String> {
        let version = format!(
            "{}{}",
            self.versions.jans_app_version, self.versions.jans_build
        );
        let url = Url::parse(base)
            .context(format!("Invalid maven base <{base}>"))?
            .join(&format!("{artifact}/{version}/{artifact}-{version}{suffix}"))
            .context(format!("Invalid maven path for {artifact}"))?;
        Ok(url.to_string())
    }

    pub fn setup_bundle_url(&self) -> String {
        format!(
            "https://github.com/JanssenProject/jans-setup/archive/refs/heads/{}.zip",
            self.versions.setup_branch
        )
    }

    /// Every artifact the given profile needs, in download order.
    pub fn artifacts(&self, profile: Profile, paths: &InstallationPaths) -> Result<Vec<ArtifactSpec>> {
        Ok(self
            .catalog(paths)?
            .into_iter()
            .filter(|spec| spec.applies_to(profile))
            .collect())
    }

    fn catalog(&self, paths: &InstallationPaths) -> Result<Vec<ArtifactSpec>> {
        use Applicability::{All, Only};

        let v = &self.versions;
        let app = &paths.app;
        let jans_app = &paths.jans_app;
        let jetty = self.jetty_dist.as_str();

        let corretto = format!("amazon-corretto-{0}-linux-x64.tar.gz", v.amazon_corretto_version);
        let jetty_tgz = format!("{jetty}-{}.tar.gz", v.jetty_version);
        let jython = format!("jython-installer-{0}.jar", v.jython_version);
        let node = format!("node-{0}-linux-x64.tar.xz", v.node_version);
        let opendj = format!("opendj-server-legacy-{0}.zip", v.opendj_version);

        Ok(vec![
            ArtifactSpec::new(self.setup_bundle_url(), paths.setup_zip.clone(), All),
            ArtifactSpec::new(
                format!(
                    "https://corretto.aws/downloads/resources/{}/{corretto}",
                    v.amazon_corretto_version
                ),
                app.join(&corretto),
                All,
            ),
            ArtifactSpec::new(
                format!(
                    "https://repo1.maven.org/maven2/org/eclipse/jetty/{jetty}/{}/{jetty_tgz}",
                    v.jetty_version
                ),
                app.join(&jetty_tgz),
                All,
            ),
            ArtifactSpec::new(
                format!(
                    "https://maven.gluu.org/maven/org/gluufederation/jython-installer/{}/{jython}",
                    v.jython_version
                ),
                app.join(&jython),
                All,
            ),
            ArtifactSpec::new(
                format!("https://nodejs.org/dist/{}/{node}", v.node_version),
                app.join(&node),
                All,
            ),
            ArtifactSpec::new(
                self.maven_url(MAVEN_BASE_URL, "jans-auth-server", ".war")?,
                jans_app.join("jans-auth.war"),
                All,
            ),
            ArtifactSpec::new(
                self.maven_url(MAVEN_BASE_URL, "jans-auth-client", "-jar-with-dependencies.jar")?,
                jans_app.join("jans-auth-client-jar-with-dependencies.jar"),
                All,
            ),
            ArtifactSpec::new(
                self.maven_url(MAVEN_BASE_URL, "jans-config-api-server", ".war")?,
                jans_app.join("jans-config-api.war"),
                All,
            ),
            ArtifactSpec::new(
                "https://api.github.com/repos/JanssenProject/jans-cli/tarball/main",
                jans_app.join("jans-cli.tgz"),
                All,
            ),
            ArtifactSpec::new(
                "https://github.com/sqlalchemy/sqlalchemy/archive/rel_1_3_23.zip",
                jans_app.join("sqlalchemy.zip"),
                All,
            ),
            ArtifactSpec::new(
                self.maven_url(MAVEN_BASE_URL, "scim-plugin", "-distribution.jar")?,
                jans_app.join("scim-plugin.jar"),
                All,
            ),
            ArtifactSpec::new(
                "https://ox.gluu.org/icrby8xcvbcv/cli-swagger/jca.tgz",
                jans_app.join("jca-swagger-client.tgz"),
                All,
            ),
            ArtifactSpec::new(
                "https://ox.gluu.org/icrby8xcvbcv/cli-swagger/scim.tgz",
                jans_app.join("scim-swagger-client.tgz"),
                All,
            ),
            ArtifactSpec::new(
                self.maven_url(MAVEN_BASE_URL, "admin-ui-plugin", "-distribution.jar")?,
                jans_app.join("admin-ui-plugin-distribution.jar"),
                All,
            ),
            ArtifactSpec::new(
                "https://raw.githubusercontent.com/JanssenProject/jans-config-api/master/server/src/main/resources/log4j2.xml",
                jans_app.join("log4j2.xml"),
                All,
            ),
            ArtifactSpec::new(
                "https://raw.githubusercontent.com/JanssenProject/jans-config-api/master/plugins/admin-ui-plugin/config/log4j2-adminui.xml",
                jans_app.join("log4j2-adminui.xml"),
                All,
            ),
            ArtifactSpec::new(
                format!(
                    "https://github.com/GluuFederation/gluu-admin-ui/archive/refs/heads/{}.zip",
                    v.admin_ui_frontend_branch
                ),
                jans_app.join("gluu-admin-ui.zip"),
                All,
            ),
            ArtifactSpec::new(
                "https://raw.githubusercontent.com/JanssenProject/jans-config-api/master/docs/jans-config-api-swagger.yaml",
                jans_app.join(CONFIG_API_SWAGGER),
                All,
            ),
            ArtifactSpec::new(
                format!(
                    "https://maven.gluu.org/maven/org/gluufederation/opendj/opendj-server-legacy/{}/{opendj}",
                    v.opendj_version
                ),
                app.join(&opendj),
                Only(Profile::Jans),
            ),
            ArtifactSpec::new(
                self.maven_url(MAVEN_BASE_URL, "jans-fido2-server", ".war")?,
                jans_app.join("jans-fido2.war"),
                Only(Profile::Jans),
            ),
            ArtifactSpec::new(
                self.maven_url(MAVEN_BASE_URL, "jans-scim-server", ".war")?,
                jans_app.join("jans-scim.war"),
                Only(Profile::Jans),
            ),
            ArtifactSpec::new(
                self.maven_url(JENKINS_BASE_URL, "jans-eleven-server", ".war")?,
                jans_app.join("jans-eleven.war"),
                Only(Profile::Jans),
            ),
            ArtifactSpec::new(
                "https://www.apple.com/certificateauthority/Apple_WebAuthn_Root_CA.pem",
                app.join("Apple_WebAuthn_Root_CA.pem"),
                Only(Profile::Jans),
            ),
            ArtifactSpec::new(
                "https://raw.githubusercontent.com/JanssenProject/jans-scim/master/server/src/main/resources/jans-scim-openapi.yaml",
                jans_app.join(SCIM_OPENAPI),
                Only(Profile::Jans),
            ),
        ])
    }

    /// Documents copied from the download area into the extracted setup
    /// tree's data directory.
    pub fn setup_documents(&self, profile: Profile, paths: &InstallationPaths) -> Vec<ArtifactSpec> {
        let mut documents = vec![ArtifactSpec::new(
            paths.jans_app.join(CONFIG_API_SWAGGER).to_string_lossy(),
            paths.setup_data(CONFIG_API_SWAGGER),
            Applicability::All,
        )];

        if profile.is_default() {
            documents.push(ArtifactSpec::new(
                paths.jans_app.join(SCIM_OPENAPI).to_string_lossy(),
                paths.setup_data(SCIM_OPENAPI),
                Applicability::Only(Profile::Jans),
            ));
        }

        documents
    }
}
