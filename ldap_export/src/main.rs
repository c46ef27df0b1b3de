mod credential;
mod exporter;
mod properties;
mod types;

use std::path::PathBuf;

use clap::Parser;
use common::exec::SystemRunner;
use common::prompt::TerminalPrompter;

use crate::exporter::Exporter;
use crate::types::{exit_codes, ExportConfig, ExportError};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "jans-ldap-export")]
#[command(version = VERSION)]
#[command(
    about = "Export a legacy OpenDJ directory and its setup properties for migration",
    long_about = None
)]
struct Cli {
    /// Directory search tool
    #[arg(long, default_value = "/opt/opendj/bin/ldapsearch", value_name = "PATH")]
    ldapsearch: String,

    #[arg(long, default_value = "localhost")]
    host: String,

    #[arg(long, default_value_t = 1636)]
    port: u16,

    #[arg(long, default_value = "cn=directory manager", value_name = "DN")]
    bind_dn: String,

    /// Folder receiving the exported ldif files and setup.properties
    #[arg(long, default_value = "./opendj_export", value_name = "PATH")]
    backup_dir: PathBuf,

    /// Properties persisted by the legacy installer
    #[arg(
        long,
        default_value = "/install/community-edition-setup/setup.properties.last",
        value_name = "PATH"
    )]
    setup_properties: PathBuf,

    #[arg(long, default_value = "/opt/tomcat/conf/salt", value_name = "PATH")]
    salt_file: PathBuf,

    #[arg(long, default_value = "/opt/tomcat/webapps", value_name = "PATH")]
    webapps_dir: PathBuf,

    /// Folder of export_opendj.log
    #[arg(long, default_value = ".", value_name = "PATH")]
    log_dir: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let guard = match common::init_file_logger(&cli.log_dir, "export_opendj.log") {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logger: {}", e);
            std::process::exit(exit_codes::EXPORT_FAILURE);
        }
    };

    let config = ExportConfig {
        ldapsearch: cli.ldapsearch,
        host: cli.host,
        port: cli.port,
        bind_dn: cli.bind_dn,
        backup_dir: cli.backup_dir,
        setup_properties: cli.setup_properties,
        salt_file: cli.salt_file,
        webapps_dir: cli.webapps_dir,
    };

    let runner = SystemRunner::new();
    let mut prompter = TerminalPrompter::new();

    let code = match Exporter::new(&config, &runner).export(&mut prompter) {
        Ok(properties) => {
            tracing::info!("Export written to {}", properties.display());
            exit_codes::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e:#}");
            exit_code(&e)
        }
    };

    drop(guard);
    std::process::exit(code);
}

fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<ExportError>() {
        Some(ExportError::Search { .. }) => exit_codes::SEARCH_FAILURE,
        Some(ExportError::Folder { .. }) => exit_codes::FOLDER_FAILURE,
        None => exit_codes::EXPORT_FAILURE,
    }
}
