//! `refresh`: run one discovery pass and list the result.

use serde::Serialize;
use tabled::Tabled;

use patchbay_core::Resource;

use crate::cli::{RefreshArgs, ResourceSide};
use crate::commands::Context;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ResourceView<'a> {
    side: &'static str,
    #[serde(flatten)]
    resource: &'a Resource,
}

#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Side")]
    side: &'static str,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Bound to")]
    bound: String,
}

impl From<&ResourceView<'_>> for ResourceRow {
    fn from(v: &ResourceView<'_>) -> Self {
        Self {
            side: v.side,
            id: v.resource.id.clone(),
            label: v.resource.label.clone(),
            kind: v.resource.kind.to_string(),
            node: v.resource.node.name.clone(),
            bound: v.resource.bound_sender.clone().unwrap_or_default(),
        }
    }
}

pub async fn handle(args: RefreshArgs, ctx: &Context) -> Result<(), CliError> {
    let bridge = ctx.bridge()?;
    let snapshot = bridge.refresh().await;

    let wanted = |side| args.only.is_none_or(|only| only == side);
    let mut views = Vec::new();
    if wanted(ResourceSide::Senders) {
        views.extend(snapshot.senders.iter().map(|resource| ResourceView {
            side: "sender",
            resource,
        }));
    }
    if wanted(ResourceSide::Receivers) {
        views.extend(snapshot.receivers.iter().map(|resource| ResourceView {
            side: "receiver",
            resource,
        }));
    }

    let out = output::render_list(ctx.painter.format, &views, |v| ResourceRow::from(v))?;
    output::print_output(&out, ctx.quiet);

    if let Some(at) = snapshot.refreshed_at {
        ctx.note(&format!(
            "{} node(s), {} sender(s), {} receiver(s) at {}",
            snapshot.nodes.len(),
            snapshot.senders.len(),
            snapshot.receivers.len(),
            at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    Ok(())
}
