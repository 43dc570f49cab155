//! Output formatting: table or JSON.
//!
//! Table uses `tabled`; JSON serializes the original data via serde so
//! scripts see every field.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use patchbay_core::PatchOutcome;

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

/// Rendering options shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct Painter {
    pub format: OutputFormat,
    pub color: bool,
}

impl Painter {
    pub fn new(format: OutputFormat, mode: ColorMode) -> Self {
        Self {
            format,
            color: should_color(mode),
        }
    }

    /// One-word outcome, colored for terminals.
    pub fn outcome(&self, outcome: &PatchOutcome) -> String {
        let text = match outcome {
            PatchOutcome::Success => "ok".to_owned(),
            PatchOutcome::Skipped { reason } => format!("skipped ({reason})"),
            PatchOutcome::Error {
                message,
                status: Some(status),
            } => format!("error {status}: {message}"),
            PatchOutcome::Error {
                message,
                status: None,
            } => format!("error: {message}"),
        };
        if !self.color {
            return text;
        }
        match outcome {
            PatchOutcome::Success => text.green().to_string(),
            PatchOutcome::Skipped { .. } => text.dimmed().to_string(),
            PatchOutcome::Error { .. } => text.red().to_string(),
        }
    }
}

fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list as a table of rows, or the items themselves as JSON.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(data)?),
    }
}

/// Render a single item; tables use a pre-formatted detail view.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(data)?),
    }
}

/// Print rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}
