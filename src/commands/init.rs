//! Initialize archivist configuration and database

use crate::config::Config;
use crate::controller::DocumentController;
use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing::info;

/// Write a default config and create the database
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<Config> {
    let config = Config::with_base_dir(base_dir);

    if config.paths.config_file.exists() && !force {
        return Err(Error::Config(format!(
            "Already initialized at {}; use --force to overwrite",
            config.paths.config_file.display()
        )));
    }

    config.save()?;

    // Opening the controller creates and initializes the database
    DocumentController::connect(&config).await?;

    info!("Initialized archivist at {:?}", config.paths.base_dir);
    Ok(config)
}
