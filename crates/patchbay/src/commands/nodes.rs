//! Node list management and API version probing.

use tabled::Tabled;

use patchbay_config::NodeEntry;
use patchbay_core::DetectedVersions;

use crate::cli::{NodesArgs, NodesCommand};
use crate::commands::Context;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Node API")]
    node_version: String,
    #[tabled(rename = "Connection API")]
    connection_version: String,
}

impl From<&NodeEntry> for NodeRow {
    fn from(n: &NodeEntry) -> Self {
        Self {
            name: n.name.clone(),
            url: n.url.clone(),
            node_version: n.node_version.clone(),
            connection_version: n.connection_version.clone(),
        }
    }
}

pub async fn handle(args: NodesArgs, ctx: &mut Context) -> Result<(), CliError> {
    match args.command {
        NodesCommand::List => {
            let out = output::render_list(ctx.painter.format, &ctx.config.nodes, |n| {
                NodeRow::from(n)
            })?;
            output::print_output(&out, ctx.quiet);
            Ok(())
        }

        NodesCommand::Add {
            name,
            url,
            node_version,
            connection_version,
            detect,
        } => {
            let mut entry = NodeEntry::new(name, url);
            if detect {
                let found = detect_versions(ctx, &entry.url).await?;
                entry.node_version = found.node.unwrap_or_default();
                entry.connection_version = found.connection.unwrap_or_default();
            }
            if let Some(v) = node_version {
                entry.node_version = v;
            }
            if let Some(v) = connection_version {
                entry.connection_version = v;
            }

            let summary = format!(
                "Added node '{}' (node {}, connection {})",
                entry.name, entry.node_version, entry.connection_version
            );
            ctx.config.add_node(entry)?;
            ctx.save()?;
            ctx.note(&summary);
            Ok(())
        }

        NodesCommand::Remove { name } => {
            let removed = ctx.config.remove_node(&name)?;
            ctx.save()?;
            ctx.note(&format!("Removed node '{}' ({})", removed.name, removed.url));
            Ok(())
        }

        NodesCommand::Detect { target } => {
            let url = ctx
                .config
                .node(&target)
                .map_or_else(|| target.clone(), |n| n.url.clone());
            let found = detect_versions(ctx, &url).await?;
            let out = output::render_single(ctx.painter.format, &found, |d| {
                format!(
                    "node API:       {}\nconnection API: {}",
                    d.node.as_deref().unwrap_or("-"),
                    d.connection.as_deref().unwrap_or("-")
                )
            })?;
            output::print_output(&out, ctx.quiet);
            Ok(())
        }
    }
}

/// Both APIs must answer on a known version.
async fn detect_versions(ctx: &Context, url: &str) -> Result<DetectedVersions, CliError> {
    let bridge = ctx.bridge()?;
    let found = bridge.detect_versions(url).await?;
    if found.node.is_none() || found.connection.is_none() {
        return Err(CliError::ConnectionFailed {
            url: url.to_owned(),
            reason: format!(
                "no known API version answered (node: {}, connection: {})",
                found.node.as_deref().unwrap_or("none"),
                found.connection.as_deref().unwrap_or("none")
            ),
        });
    }
    Ok(found)
}
