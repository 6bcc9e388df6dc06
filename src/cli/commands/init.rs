//! Implementation of the `triad init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::adapters::sqlite::{initialize_database, sqlite_repositories};
use crate::cli::output::{action_notice, action_success, output, CommandOutput};
use crate::infrastructure::config::{ConfigLoader, CONFIG_DIR};
use crate::services::ConvergenceGate;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Remove an existing .triad directory first
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub directories_created: Vec<String>,
    pub config_written: bool,
    pub database: String,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        if !self.success {
            return action_notice(&self.message);
        }
        let mut lines = vec![action_success(&self.message)];
        for dir in &self.directories_created {
            lines.push(format!("  created {dir}/"));
        }
        if self.config_written {
            lines.push(format!("  wrote {CONFIG_DIR}/config.yaml"));
        }
        lines.push(format!("  database {}", self.database));
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let root = PathBuf::from(CONFIG_DIR);

    if root.exists() && !args.force {
        let out = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to reinitialize.".to_string(),
            directories_created: vec![],
            config_written: false,
            database: String::new(),
        };
        output(&out, json_mode);
        return Ok(());
    }
    if args.force && root.exists() {
        fs::remove_dir_all(&root)
            .await
            .with_context(|| format!("Failed to remove existing {CONFIG_DIR} directory"))?;
    }

    let mut directories_created = vec![];
    for dir in [root.clone(), root.join("logs")] {
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            directories_created.push(dir.display().to_string());
        }
    }

    let config_path = root.join("config.yaml");
    let config_written = !config_path.exists();
    if config_written {
        fs::write(&config_path, ConfigLoader::default_yaml()?)
            .await
            .context("Failed to write default config")?;
    }

    let config = ConfigLoader::load()?;
    let pool = initialize_database(&config.database)
        .await
        .context("Failed to initialize database")?;
    ConvergenceGate::new(sqlite_repositories(&pool), config.scheduler)
        .initialize_queues()
        .await?;

    let out = InitOutput {
        success: true,
        message: if args.force {
            "Project reinitialized.".to_string()
        } else {
            "Project initialized.".to_string()
        },
        directories_created,
        config_written,
        database: config.database.path,
    };
    output(&out, json_mode);
    Ok(())
}
