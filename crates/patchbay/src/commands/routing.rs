//! take, take-many, disconnect and status.

use std::fmt::Write as _;

use serde::Serialize;
use tabled::Tabled;

use patchbay_core::{Essence, EssenceOutcomes, ReceiverPatch, ReceiverStatus};

use crate::commands::Context;
use crate::error::CliError;
use crate::output::{self, Painter};

#[derive(Serialize)]
struct RouteResult<'a> {
    source_id: Option<u32>,
    receiver_id: u32,
    code: String,
    #[serde(flatten)]
    outcomes: &'a EssenceOutcomes,
}

fn outcome_detail(painter: Painter, outcomes: &EssenceOutcomes) -> String {
    let mut out = String::new();
    for essence in Essence::ALL {
        let name = essence.to_string();
        let _ = writeln!(out, "{name:<6} {}", painter.outcome(outcomes.get(essence)));
    }
    let _ = write!(out, "code   {}", outcomes.code());
    out
}

// ── take ────────────────────────────────────────────────────────────

pub async fn take(source_id: u32, receiver_id: u32, ctx: &Context) -> Result<(), CliError> {
    let bridge = ctx.bridge()?;
    let outcomes = bridge.take(source_id, receiver_id).await?;

    let result = RouteResult {
        source_id: Some(source_id),
        receiver_id,
        code: outcomes.code(),
        outcomes: &outcomes,
    };
    let out = output::render_single(ctx.painter.format, &result, |r| {
        outcome_detail(ctx.painter, r.outcomes)
    })?;
    output::print_output(&out, ctx.quiet);

    if outcomes.has_error() {
        return Err(CliError::PatchFailed {
            target: format!("source {source_id} -> receiver {receiver_id}"),
            code: outcomes.code(),
        });
    }
    Ok(())
}

// ── take-many ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ManyRow {
    #[tabled(rename = "Receiver")]
    receiver: u32,
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Video")]
    video: String,
    #[tabled(rename = "Audio")]
    audio: String,
    #[tabled(rename = "Data")]
    data: String,
}

fn many_row(painter: Painter, patch: &ReceiverPatch) -> ManyRow {
    match &patch.outcomes {
        Some(o) => ManyRow {
            receiver: patch.receiver_id,
            code: o.code(),
            video: painter.outcome(&o.video),
            audio: painter.outcome(&o.audio),
            data: painter.outcome(&o.data),
        },
        None => ManyRow {
            receiver: patch.receiver_id,
            code: "---".into(),
            video: patch.error.clone().unwrap_or_default(),
            audio: String::new(),
            data: String::new(),
        },
    }
}

pub async fn take_many(source_id: u32, receivers: &[u32], ctx: &Context) -> Result<(), CliError> {
    let bridge = ctx.bridge()?;
    let results = bridge.take_many(source_id, receivers).await?;

    let out = output::render_list(ctx.painter.format, &results, |p| many_row(ctx.painter, p))?;
    output::print_output(&out, ctx.quiet);

    let failed: Vec<String> = results
        .iter()
        .filter(|p| p.outcomes.as_ref().is_none_or(EssenceOutcomes::has_error))
        .map(|p| p.receiver_id.to_string())
        .collect();
    if !failed.is_empty() {
        return Err(CliError::PatchFailed {
            target: format!("source {source_id} -> receivers {}", failed.join(", ")),
            code: "---".into(),
        });
    }
    Ok(())
}

// ── disconnect ──────────────────────────────────────────────────────

pub async fn disconnect(receiver_id: u32, ctx: &Context) -> Result<(), CliError> {
    let bridge = ctx.bridge()?;
    let outcomes = bridge.disconnect(receiver_id).await?;

    let result = RouteResult {
        source_id: None,
        receiver_id,
        code: outcomes.code(),
        outcomes: &outcomes,
    };
    let out = output::render_single(ctx.painter.format, &result, |r| {
        outcome_detail(ctx.painter, r.outcomes)
    })?;
    output::print_output(&out, ctx.quiet);

    if outcomes.has_error() {
        return Err(CliError::PatchFailed {
            target: format!("receiver {receiver_id}"),
            code: outcomes.code(),
        });
    }
    Ok(())
}

// ── status ──────────────────────────────────────────────────────────

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Essence")]
    essence: String,
    #[tabled(rename = "Receiver")]
    receiver: String,
    #[tabled(rename = "Live sender")]
    sender: String,
    #[tabled(rename = "Error")]
    error: String,
}

fn status_detail(status: &ReceiverStatus) -> String {
    let rows: Vec<StatusRow> = status
        .essences
        .iter()
        .map(|e| StatusRow {
            essence: e.essence.to_string(),
            receiver: e.receiver.clone(),
            sender: e.sender_id.clone().unwrap_or_else(|| "-".into()),
            error: e.error.clone().unwrap_or_default(),
        })
        .collect();

    let mut out = format!("{} (ID {})\n", status.name, status.receiver_id);
    if rows.is_empty() {
        out.push_str("no device receivers configured\n");
    } else {
        out.push_str(&tabled::Table::new(rows).with(tabled::settings::Style::rounded()).to_string());
        out.push('\n');
    }
    let _ = write!(
        out,
        "source: {}",
        status.source.as_deref().unwrap_or("none matching")
    );
    out
}

pub async fn status(receiver_id: u32, ctx: &Context) -> Result<(), CliError> {
    let bridge = ctx.bridge()?;
    let status = bridge.status(receiver_id).await?;
    let out = output::render_single(ctx.painter.format, &status, status_detail)?;
    output::print_output(&out, ctx.quiet);
    Ok(())
}
