//! `downvoter run` command handler
//!
//! Feeds JSON-lines discovery input through the moderation pipeline.
//! Each decision is written to stdout as one line (compact JSON tagged with
//! the event type and trace id, or a text line ending in the short event id);
//! the run summary goes to stderr.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use downvoter_core::event::{ActionEvent, Event};
use downvoter_core::pipeline::Pipeline;
use downvoter_engine::{
    DispatchStats, EngineConfig, JsonLinesSource, ModerationPipelineBuilder, StoreBackend,
    VoteControlEffector,
};

use super::{load_config, open_store};
use crate::cli::{OutputFormat, RunArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `run` command.
pub async fn execute(
    args: RunArgs,
    config_path: Option<&Path>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let loaded = load_config(config_path).await?;
    let store = open_store(&loaded.config)?;
    let engine_config = EngineConfig::from_core(&loaded.config);

    let summary = if args.input == "-" {
        info!("reading discovery input from stdin");
        let reader = BufReader::new(tokio::io::stdin());
        run_source(store, engine_config, reader, writer.format()).await?
    } else {
        info!(path = %args.input, "reading discovery input from file");
        let file = tokio::fs::File::open(&args.input).await?;
        run_source(store, engine_config, BufReader::new(file), writer.format()).await?
    };

    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    writer.render_to(&mut handle, &summary)
}

/// Run the pipeline until the input is exhausted or Ctrl-C is received.
async fn run_source<R>(
    store: Arc<StoreBackend>,
    config: EngineConfig,
    reader: R,
    format: OutputFormat,
) -> Result<RunSummary, CliError>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let effector = VoteControlEffector::new();
    let (mut pipeline, event_rx) = ModerationPipelineBuilder::new()
        .config(config)
        .store(store)
        .effector(effector.clone())
        .source(JsonLinesSource::new(reader))
        .build()?;

    let printer = event_rx.map(|rx| tokio::spawn(print_events(rx, format)));

    pipeline.start().await?;

    let cancel = pipeline.cancel_token();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            cancel.cancel();
        }
    });

    pipeline.wait().await;
    signal.abort();
    pipeline.stop().await?;

    if let Some(printer) = printer {
        if let Err(e) = printer.await {
            warn!(error = %e, "event printer task failed");
        }
    }

    Ok(RunSummary {
        stats: pipeline.dispatch_stats(),
        pressed: effector.press_count(),
        lagged_changes: pipeline.lagged_changes(),
    })
}

async fn print_events(mut rx: mpsc::Receiver<ActionEvent>, format: OutputFormat) {
    while let Some(event) = rx.recv().await {
        let line = match format {
            OutputFormat::Json => match serde_json::to_string(&EventRecord::new(&event)) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "failed to serialize action event");
                    continue;
                }
            },
            OutputFormat::Text => event_line(&event),
        };
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        if writeln!(handle, "{line}").is_err() {
            // stdout closed (e.g. piped into `head`)
            break;
        }
    }
}

/// JSON form of an event: the event body plus its type and trace id.
#[derive(Debug, Serialize)]
struct EventRecord<'a, T> {
    event_type: &'a str,
    trace_id: &'a str,
    #[serde(flatten)]
    event: &'a T,
}

impl<'a, T: Event + Serialize> EventRecord<'a, T> {
    fn new(event: &'a T) -> Self {
        Self {
            event_type: event.event_type(),
            trace_id: &event.metadata().trace_id,
            event,
        }
    }
}

fn short_id(event: &impl Event) -> &str {
    let id = event.event_id();
    id.get(..8).unwrap_or(id)
}

fn event_line(event: &ActionEvent) -> String {
    let id = event.external_id.as_deref().unwrap_or("-");
    let line = match &event.rule {
        Some(rule) => format!("{} {id} {} rule={rule}", event.element, event.outcome),
        None => format!("{} {id} {}", event.element, event.outcome),
    };
    format!("{line} [{}]", short_id(event))
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub stats: DispatchStats,
    /// Vote controls pressed during this run.
    pub pressed: u64,
    pub lagged_changes: u64,
}

impl Render for RunSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let s = &self.stats;
        writeln!(w, "{}", "Run summary".bold())?;
        writeln!(w, "  processed:                 {}", s.processed)?;
        writeln!(w, "  actions confirmed:         {}", s.action_confirmed.to_string().green())?;
        writeln!(w, "  already taken:             {}", s.action_already_taken)?;
        writeln!(w, "  skipped (processed):       {}", s.skipped_already_processed)?;
        writeln!(w, "  skipped (no match):        {}", s.skipped_no_match)?;
        writeln!(w, "  already visited:           {}", s.already_visited)?;
        writeln!(w, "  effector missing:          {}", s.effector_missing)?;
        if s.write_failures > 0 {
            writeln!(w, "  write failures:            {}", s.write_failures.to_string().red())?;
        }
        if self.lagged_changes > 0 {
            writeln!(w, "  lagged changes:            {}", self.lagged_changes.to_string().yellow())?;
        }
        writeln!(w, "  vote controls pressed:     {}", self.pressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use downvoter_core::event::ActionOutcome;
    use downvoter_core::types::ElementId;

    #[test]
    fn test_event_line_with_rule() {
        let event = ActionEvent::new(
            ElementId(3),
            Some("123".to_owned()),
            ActionOutcome::ActionConfirmed {
                label: "Bob".to_owned(),
            },
            Some("bob".to_owned()),
        );
        let line = event_line(&event);
        assert!(line.starts_with("el-3 123 "));
        assert!(line.ends_with(&format!("rule=bob [{}]", &event.id[..8])));
    }

    #[test]
    fn test_event_line_without_id_or_rule() {
        let event = ActionEvent::new(ElementId(1), None, ActionOutcome::SkippedNoMatch, None);
        assert_eq!(
            event_line(&event),
            format!("el-1 - {} [{}]", ActionOutcome::SkippedNoMatch, &event.id[..8])
        );
    }

    #[test]
    fn test_event_record_json_carries_type_and_trace() {
        let event = ActionEvent::new(
            ElementId(2),
            Some("7".to_owned()),
            ActionOutcome::SkippedNoMatch,
            None,
        );
        let json = serde_json::to_value(EventRecord::new(&event)).expect("json");
        assert_eq!(json["event_type"], "action");
        assert_eq!(json["trace_id"], event.metadata.trace_id.as_str());
        assert_eq!(json["id"], event.id.as_str());
        assert_eq!(json["external_id"], "7");
    }

    #[test]
    fn test_summary_json_flattens_stats() {
        let summary = RunSummary {
            stats: DispatchStats::default(),
            pressed: 2,
            lagged_changes: 0,
        };
        let json = serde_json::to_value(&summary).expect("json");
        assert_eq!(json["pressed"], 2);
        assert_eq!(json["processed"], 0);
    }
}
