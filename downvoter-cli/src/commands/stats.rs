//! `downvoter stats` command handler

use std::io::{BufRead, Write};
use std::path::Path;

use serde::Serialize;
use tracing::info;

use downvoter_core::types::StatsState;

use super::{load_config, open_rule_store};
use crate::cli::{StatsAction, StatsArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `stats` command.
pub async fn execute(
    args: StatsArgs,
    config_path: Option<&Path>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let loaded = load_config(config_path).await?;
    let store = open_rule_store(&loaded.config)?;

    match args.action {
        StatsAction::Show => {
            let stats = store.stats().await?;
            writer.render(&StatsReport::from_state(stats))
        }
        StatsAction::Reset { yes } => {
            if !yes && !confirm("Reset all statistics to zero?")? {
                return Err(CliError::Command("reset cancelled".to_owned()));
            }
            store.reset_stats().await?;
            info!("statistics reset");
            writer.render(&StatsReport::from_state(StatsState::zero()))
        }
    }
}

fn confirm(question: &str) -> Result<bool, CliError> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{question} [y/N] ")?;
    stderr.flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub total: u64,
    /// Authors sorted by count, highest first.
    pub by_user: Vec<AuthorCount>,
}

#[derive(Debug, Serialize)]
pub struct AuthorCount {
    pub author: String,
    pub count: u64,
}

impl StatsReport {
    pub fn from_state(state: StatsState) -> Self {
        Self {
            total: state.total,
            by_user: state
                .ranked()
                .into_iter()
                .map(|(author, count)| AuthorCount {
                    author: author.to_owned(),
                    count,
                })
                .collect(),
        }
    }
}

impl Render for StatsReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Total actions: {}", self.total.to_string().bold())?;
        if self.by_user.is_empty() {
            return Ok(());
        }
        writeln!(w)?;
        writeln!(w, "{:<30} Count", "Author")?;
        writeln!(w, "{}", "-".repeat(40))?;
        for entry in &self.by_user {
            writeln!(w, "{:<30} {}", entry.author, entry.count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_sorts_by_count_desc_then_name() {
        let mut state = StatsState::zero();
        state.increment("carol");
        state.increment("Bob");
        state.increment("Bob");
        state.increment("alice");

        let report = StatsReport::from_state(state);
        assert_eq!(report.total, 4);
        let order: Vec<&str> = report.by_user.iter().map(|e| e.author.as_str()).collect();
        assert_eq!(order, vec!["Bob", "alice", "carol"]);
    }

    #[test]
    fn test_zero_report_text() {
        colored::control::set_override(false);
        let mut buffer = Vec::new();
        StatsReport::from_state(StatsState::zero())
            .render_text(&mut buffer)
            .expect("render");
        assert_eq!(String::from_utf8(buffer).expect("utf8"), "Total actions: 0\n");
    }
}
