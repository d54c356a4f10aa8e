//! `downvoter config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use downvoter_core::config::DownvoterConfig;

use super::load_config;
use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Sections accepted by `config show --section`.
const SECTIONS: [&str; 3] = ["general", "storage", "engine"];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: Option<&Path>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load and validate the configuration, reporting any errors.
///
/// # Errors
///
/// Returns `CliError::Config` if the file is missing, unparsable or invalid.
async fn execute_validate(config_path: Option<&Path>, writer: &OutputWriter) -> Result<(), CliError> {
    let report = match load_config(config_path).await {
        Ok(loaded) => {
            info!(source = %loaded.source, "configuration is valid");
            ConfigValidationReport {
                source: loaded.source,
                valid: true,
                errors: Vec::new(),
            }
        }
        Err(e) => ConfigValidationReport {
            source: describe_source(config_path),
            valid: false,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

/// Show the effective configuration (file + env overrides + defaults).
async fn execute_show(
    config_path: Option<&Path>,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let loaded = load_config(config_path).await?;
    let report = ConfigReport::build(&loaded.config, loaded.source, section)?;
    writer.render(&report)
}

fn describe_source(config_path: Option<&Path>) -> String {
    match config_path {
        Some(path) => path.display().to_string(),
        None => crate::cli::DEFAULT_CONFIG_PATH.to_owned(),
    }
}

/// Effective configuration, optionally narrowed to one section.
#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub config: serde_json::Value,
    #[serde(skip)]
    pub config_toml: String,
}

impl ConfigReport {
    /// Build a report for the whole configuration or a single section.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Command` for an unknown section name.
    pub fn build(
        config: &DownvoterConfig,
        source: String,
        section: Option<String>,
    ) -> Result<Self, CliError> {
        let (value, config_toml) = match section.as_deref() {
            None => (serde_json::to_value(config)?, to_toml(config)),
            Some("general") => (
                serde_json::to_value(&config.general)?,
                to_toml(&config.general),
            ),
            Some("storage") => (
                serde_json::to_value(&config.storage)?,
                to_toml(&config.storage),
            ),
            Some("engine") => (
                serde_json::to_value(&config.engine)?,
                to_toml(&config.engine),
            ),
            Some(other) => {
                return Err(CliError::Command(format!(
                    "unknown section '{other}', expected one of: {}",
                    SECTIONS.join(", ")
                )));
            }
        };

        Ok(Self {
            source,
            section,
            config: value,
            config_toml,
        })
    }
}

fn to_toml<T: Serialize>(value: &T) -> String {
    toml::to_string_pretty(value).unwrap_or_else(|e| format!("(serialization error: {e})\n"))
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{section}]");
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;
        Ok(())
    }
}

/// Configuration validation report.
#[derive(Debug, Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    /// Empty when valid.
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }
        Ok(())
    }
}
