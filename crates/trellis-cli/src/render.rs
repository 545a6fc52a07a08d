//! Terminal rendering of records and errors.

use colored::Colorize;
use serde_json::Value;
use trellis_collections::{Intent, PartialWrite, StepAction};
use trellis_records::RecordError;

/// Exit status for a failed command.
pub fn exit_code(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<RecordError>() {
        Some(RecordError::PartialWrite(_))
        | Some(RecordError::SplitProjection(_))
        | Some(RecordError::StaleIntent { .. }) => 3,
        Some(RecordError::NotFound(_)) => 4,
        Some(RecordError::InvalidRecord(_)) | Some(RecordError::AlreadyExists(_)) => 2,
        _ => 1,
    }
}

pub fn error(e: &anyhow::Error) -> String {
    if let Some(partial) = e.downcast_ref::<RecordError>().and_then(RecordError::as_partial_write) {
        return partial_write(partial);
    }
    format!("{} {e:#}", "error:".red().bold())
}

/// A partial write gets its own block: what landed, what is missing, and
/// how to finish it.
pub fn partial_write(partial: &PartialWrite) -> String {
    let mut out = format!(
        "{} {} stopped halfway; manual repair required\n",
        "⚠ partial write:".yellow().bold(),
        partial.kind
    );
    out += &format!("  {} {} {}\n", "done:  ".green(), partial.completed.role, partial.completed.path);
    out += &format!("  {} {} {}\n", "failed:".red(), partial.failed.role, partial.failed.path);
    out += &format!("  {} {}\n", "cause: ".dimmed(), partial.cause);
    match &partial.intent {
        Some(id) => out += &format!("  repair: trellis intents replay {}", id.to_string().cyan()),
        None => {
            out += "  repair: re-run the failed step with this payload:\n";
            out += &indent(&step_payload(&partial.failed.action), 4);
        }
    }
    out
}

fn step_payload(action: &StepAction) -> String {
    match action {
        StepAction::Write { node, mode } => {
            let body = serde_json::to_string_pretty(node).unwrap_or_else(|_| node.to_string());
            format!("{mode} {body}")
        }
        StepAction::Delete => "delete".to_string(),
    }
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines().map(|line| format!("{pad}{line}")).collect::<Vec<_>>().join("\n")
}

/// `key: value` lines for one record.
pub fn record(value: &Value) -> String {
    let Value::Object(fields) = value else {
        return value.to_string();
    };
    fields
        .iter()
        .map(|(key, value)| {
            let shown = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("  {}: {shown}", key.bold())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn intent_line(intent: &Intent) -> String {
    format!(
        "{}  {}  {}  {} -> {}",
        intent.id.to_string().yellow(),
        intent.created_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
        intent.kind.to_string().cyan(),
        intent.first.path,
        intent.second.path,
    )
}
