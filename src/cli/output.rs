//! CLI output formatting

use crate::core::state::{ExecutionStatus, TraceEntry};
use crate::execution::ExecutionEvent;
use console::Emoji;
use serde_json::Value;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Interrupted => style("INTERRUPTED").blue().to_string(),
        ExecutionStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format an execution event for display
///
/// Render events are too chatty for the console and yield `None`.
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    let line = match event {
        ExecutionEvent::RunStarted { run_id, steps } => format!(
            "{} Starting run {} ({} step(s))",
            ROCKET,
            style(short_id(run_id)).dim(),
            steps
        ),
        ExecutionEvent::StepStarted { brick_id, label, .. } => match label {
            Some(label) => format!("{} {} {}", SPINNER, style(label).cyan(), style(brick_id).dim()),
            None => format!("{} {}", SPINNER, style(brick_id).cyan()),
        },
        ExecutionEvent::StepRendered { .. } => return None,
        ExecutionEvent::StepSkipped { instance_id, .. } => {
            format!("{} step {} skipped", SKIP, style(short_id(instance_id)).dim())
        }
        ExecutionEvent::StepCompleted { instance_id, .. } => {
            format!("{} step {} done", CHECK, style(short_id(instance_id)).green())
        }
        ExecutionEvent::StepFailed { error, .. } => {
            format!("{} {}: {}", CROSS, style(&error.name).red(), style(&error.message).dim())
        }
        ExecutionEvent::RunCompleted { run_id, status } => format!(
            "{} Run ({}) {}",
            INFO,
            style(short_id(run_id)).dim(),
            format_status(*status)
        ),
    };
    Some(line)
}

/// Pretty JSON, truncated to `max_lines`
pub fn format_value(value: &Value, max_lines: usize) -> String {
    let output = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

/// One line per trace entry
pub fn format_trace_entry(entry: &TraceEntry) -> String {
    let name = entry.label.as_deref().unwrap_or_else(|| entry.brick_id.as_str());
    let outcome = if entry.skipped {
        style("skipped").dim().to_string()
    } else if let Some(error) = &entry.error {
        style(format!("{}: {}", error.name, error.message)).red().to_string()
    } else if entry.render_error.is_some() {
        style("render error").yellow().to_string()
    } else {
        style("ok").green().to_string()
    };
    format!("  {} {} [{}]", style(short_id(&entry.instance_id)).dim(), style(name).bold(), outcome)
}
