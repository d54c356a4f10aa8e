//! Command handlers -- one module per subcommand

pub mod config;
pub mod history;
pub mod rules;
pub mod run;
pub mod stats;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use downvoter_core::config::{DownvoterConfig, GeneralConfig};
use downvoter_engine::{RuleStore, StoreBackend};

use crate::cli::{Commands, DEFAULT_CONFIG_PATH};
use crate::error::CliError;
use crate::output::OutputWriter;

/// Effective configuration and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: DownvoterConfig,
    /// File path, or `(defaults)` when no file was read.
    pub source: String,
}

/// Route a parsed subcommand to its handler.
pub async fn dispatch(
    command: Commands,
    config_path: Option<&Path>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match command {
        Commands::Rules(args) => rules::execute(args, config_path, writer).await,
        Commands::Stats(args) => stats::execute(args, config_path, writer).await,
        Commands::History(args) => history::execute(args, config_path, writer).await,
        Commands::Run(args) => run::execute(args, config_path, writer).await,
        Commands::Config(args) => config::execute(args, config_path, writer).await,
    }
}

/// Load the effective configuration.
///
/// An explicit `--config` path must exist. Without one, `downvoter.toml` in the
/// working directory is used when present, otherwise built-in defaults.
/// Environment overrides apply in both cases.
pub async fn load_config(config_path: Option<&Path>) -> Result<LoadedConfig, CliError> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if !tokio::fs::try_exists(&default).await.unwrap_or(false) {
                let mut config = DownvoterConfig::default();
                config.apply_env_overrides();
                config.validate()?;
                return Ok(LoadedConfig {
                    config,
                    source: "(defaults)".to_owned(),
                });
            }
            default
        }
    };

    let config = DownvoterConfig::load(&path).await?;
    Ok(LoadedConfig {
        config,
        source: path.display().to_string(),
    })
}

/// `[general]` section used to set up logging.
///
/// Falls back to defaults when the configuration cannot be loaded; the
/// command itself reports the load error.
pub async fn resolve_general(config_path: Option<&Path>) -> GeneralConfig {
    match load_config(config_path).await {
        Ok(loaded) => loaded.config.general,
        Err(_) => GeneralConfig::default(),
    }
}

/// Open the configured state store.
pub fn open_store(config: &DownvoterConfig) -> Result<Arc<StoreBackend>, CliError> {
    let store = StoreBackend::from_config(config)?;
    tracing::debug!(backend = store.kind(), "state store opened");
    Ok(Arc::new(store))
}

/// Rule store over the configured backend.
pub fn open_rule_store(config: &DownvoterConfig) -> Result<RuleStore<StoreBackend>, CliError> {
    Ok(RuleStore::new(open_store(config)?))
}
