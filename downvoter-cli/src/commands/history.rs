//! `downvoter history` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use super::{load_config, open_rule_store};
use crate::cli::HistoryArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `history` command.
pub async fn execute(
    args: HistoryArgs,
    config_path: Option<&Path>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let loaded = load_config(config_path).await?;
    let store = open_rule_store(&loaded.config)?;
    let ids = store.processed_ids().await?;

    writer.render(&HistoryReport::new(
        ids,
        args.limit,
        loaded.config.engine.ledger_capacity,
    ))
}

#[derive(Debug, Serialize)]
pub struct HistoryReport {
    /// Ids recorded in the ledger.
    pub total: usize,
    pub capacity: usize,
    /// Oldest first.
    pub ids: Vec<String>,
}

impl HistoryReport {
    pub fn new(mut ids: Vec<String>, limit: Option<usize>, capacity: usize) -> Self {
        let total = ids.len();
        if let Some(limit) = limit {
            ids.drain(..total.saturating_sub(limit));
        }
        Self {
            total,
            capacity,
            ids,
        }
    }
}

impl Render for HistoryReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Processed comments: {} / {}",
            self.total.to_string().bold(),
            self.capacity
        )?;
        for id in &self.ids {
            writeln!(w, "  {id}")?;
        }
        Ok(())
    }
}
