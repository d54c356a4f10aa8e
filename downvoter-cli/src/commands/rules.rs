//! `downvoter rules` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use downvoter_core::types::Rule;
use downvoter_engine::rule::parse_keywords;
use downvoter_engine::{MergeReport, RuleLoader, UpsertOutcome};

use super::{load_config, open_rule_store};
use crate::cli::{RulesAction, RulesArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `rules` command.
pub async fn execute(
    args: RulesArgs,
    config_path: Option<&Path>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let loaded = load_config(config_path).await?;
    let store = open_rule_store(&loaded.config)?;

    match args.action {
        RulesAction::List => {
            let rules = store.list().await?;
            writer.render(&RuleListReport::from_rules(rules))
        }
        RulesAction::Add {
            username,
            keywords,
            force,
        } => {
            let rule = Rule::new(username, parse_keywords(&keywords));
            let display_name = rule.username.trim().to_owned();
            let outcome = store.upsert(rule, force).await?;
            info!(username = %display_name, ?outcome, "rule added");
            writer.render(&RuleChangeReport {
                username: display_name,
                action: match outcome {
                    UpsertOutcome::Added => "added",
                    UpsertOutcome::Replaced => "replaced",
                },
                count: 1,
            })
        }
        RulesAction::Remove { username } => {
            let removed = store.remove(&username).await?;
            if removed == 0 {
                return Err(CliError::Command(format!("no rule for '{username}'")));
            }
            writer.render(&RuleChangeReport {
                username,
                action: "removed",
                count: removed,
            })
        }
        RulesAction::Import {
            path,
            force,
            replace,
        } => {
            info!(path = %path.display(), force, replace, "importing rules");
            let rules = RuleLoader::load_file(&path).await?;
            let source = path.display().to_string();

            let report = if replace {
                let total = rules.len();
                store.replace_all(rules).await?;
                RuleImportReport {
                    source,
                    replaced_all: true,
                    merge: MergeReport {
                        added: total,
                        ..MergeReport::default()
                    },
                }
            } else {
                RuleImportReport {
                    source,
                    replaced_all: false,
                    merge: store.merge(rules, force).await?,
                }
            };
            writer.render(&report)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RuleListReport {
    pub total: usize,
    pub rules: Vec<RuleEntry>,
}

#[derive(Debug, Serialize)]
pub struct RuleEntry {
    /// Evaluation order, starting at 1.
    pub position: usize,
    pub username: String,
    pub keywords: Vec<String>,
}

impl RuleListReport {
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self {
            total: rules.len(),
            rules: rules
                .into_iter()
                .enumerate()
                .map(|(i, r)| RuleEntry {
                    position: i + 1,
                    username: r.username,
                    keywords: r.keywords,
                })
                .collect(),
        }
    }
}

impl Render for RuleListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Rules ({} total)", self.total.to_string().bold())?;
        if self.rules.is_empty() {
            writeln!(w, "  no rules configured")?;
            return Ok(());
        }
        writeln!(w)?;
        writeln!(w, "{:<4} {:<24} Keywords", "#", "Username")?;
        writeln!(w, "{}", "-".repeat(60))?;

        for r in &self.rules {
            let keywords = if r.keywords.is_empty() {
                "(any)".dimmed().to_string()
            } else {
                r.keywords.join(", ")
            };
            writeln!(w, "{:<4} {:<24} {}", r.position, r.username, keywords)?;
        }

        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct RuleChangeReport {
    pub username: String,
    pub action: &'static str,
    pub count: usize,
}

impl Render for RuleChangeReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match self.action {
            "removed" => writeln!(
                w,
                "{} removed {} rule(s) for '{}'",
                "ok".green(),
                self.count,
                self.username
            ),
            action => writeln!(w, "{} {} rule for '{}'", "ok".green(), action, self.username),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RuleImportReport {
    pub source: String,
    pub replaced_all: bool,
    #[serde(flatten)]
    pub merge: MergeReport,
}

impl Render for RuleImportReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if self.replaced_all {
            writeln!(
                w,
                "{} replaced rule list with {} rule(s) from {}",
                "ok".green(),
                self.merge.added,
                self.source.bold()
            )
        } else {
            writeln!(w, "Rule import: {}", self.source.bold())?;
            writeln!(
                w,
                "  {} added, {} replaced, {} skipped",
                self.merge.added, self.merge.replaced, self.merge.skipped
            )
        }
    }
}
