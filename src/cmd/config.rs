//! Configuration view and validation commands — `deploy-manifest config`.

use anyhow::{Context, Result};
use std::path::Path;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    use deploy_manifest::config::{CONFIG_DIR, CONFIG_FILE, DeployConfig, DeployToml};

    let config_dir = project_dir.join(CONFIG_DIR);
    let config_path = config_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Deploy Manifest Configuration");
            println!("=============================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No deploy.toml found at {}", config_path.display());
                println!("Run 'deploy-manifest config init' to create one.");
            }
            println!();

            let config = DeployConfig::new(project_dir.to_path_buf())?;
            println!("[project]");
            println!("  name = \"{}\"", config.project_name());
            println!("  dist_dir = \"{}\"", config.dist_dir().display());
            println!("  artifact = \"{}\"", config.artifact());
            println!();

            println!("[storage]");
            match config.endpoint() {
                Ok(endpoint) => println!("  endpoint = {}", endpoint),
                Err(e) => println!("  {}", console::style(e.to_string()).red()),
            }
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let toml = DeployToml::load_or_default(&config_dir)?;
            let mut warnings = toml.validate();

            let config = DeployConfig::new(project_dir.to_path_buf())?;
            if let Err(e) = config.endpoint() {
                warnings.push(e.to_string());
            }

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("deploy.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&config_dir).context("Failed to create .deploy directory")?;

            let mut toml = DeployToml::default();
            toml.storage.connection_string = Some("file:.deploy/manifest.db".to_string());
            toml.save(&config_path)?;

            println!("Created deploy.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [project] name, dist_dir, artifact");
            println!("  - [storage] connection_string, or storage_account + storage_access_key");
            println!();
        }
    }

    Ok(())
}
