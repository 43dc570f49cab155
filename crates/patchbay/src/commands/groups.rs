//! Logical group handlers.

use serde::Serialize;
use tabled::Tabled;

use patchbay_core::{Bridge, GroupKind, GroupUpdate, LogicalGroup};

use crate::cli::{GroupFields, GroupsArgs, GroupsCommand};
use crate::commands::Context;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct GroupView {
    name: String,
    #[serde(flatten)]
    group: LogicalGroup,
}

#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Video")]
    video: String,
    #[tabled(rename = "Audio")]
    audio: String,
    #[tabled(rename = "Data")]
    data: String,
}

impl From<&GroupView> for GroupRow {
    fn from(v: &GroupView) -> Self {
        Self {
            id: v.group.id,
            name: v.name.clone(),
            video: v.group.video.clone().unwrap_or_default(),
            audio: v.group.audio.clone().unwrap_or_default(),
            data: v.group.data.clone().unwrap_or_default(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: GroupsArgs, ctx: &Context) -> Result<(), CliError> {
    let bridge = ctx.bridge()?;
    match args.command {
        GroupsCommand::List { kind } => {
            let views: Vec<GroupView> = bridge
                .groups(kind.into())
                .into_iter()
                .map(|(name, group)| GroupView { name, group })
                .collect();
            let out = output::render_list(ctx.painter.format, &views, |v| GroupRow::from(v))?;
            output::print_output(&out, ctx.quiet);
            Ok(())
        }

        GroupsCommand::Add { kind, name, fields } => {
            let kind = GroupKind::from(kind);
            if existing(&bridge, kind, &name).is_some() {
                return Err(CliError::Conflict {
                    resource_type: kind.singular().into(),
                    identifier: name,
                    detail: format!("Use: patchbay groups update {kind} <name>"),
                });
            }

            let mut update = GroupUpdate::new(name.clone());
            update.id = fields.id;
            update.video = fields.video;
            update.audio = fields.audio;
            update.data = fields.data;

            let id = bridge.upsert_group(kind, update).await?;
            ctx.note(&format!("Added {} '{name}' with ID {id}", kind.singular()));
            Ok(())
        }

        GroupsCommand::Update {
            kind,
            name,
            rename,
            fields,
        } => {
            let kind = GroupKind::from(kind);
            let current = existing(&bridge, kind, &name).ok_or_else(|| CliError::NotFound {
                resource_type: kind.singular().into(),
                identifier: name.clone(),
                list_command: format!("groups list {kind}"),
            })?;

            let update = merge(&name, rename.as_deref(), &current, fields);
            if update.name != name && existing(&bridge, kind, &update.name).is_some() {
                return Err(CliError::Conflict {
                    resource_type: kind.singular().into(),
                    identifier: update.name,
                    detail: "Pick a name that is not in use".into(),
                });
            }

            let new_name = update.name.clone();
            let id = bridge.upsert_group(kind, update).await?;
            ctx.note(&format!("Updated {} '{new_name}' (ID {id})", kind.singular()));
            Ok(())
        }

        GroupsCommand::Delete { kind, name } => {
            let kind = GroupKind::from(kind);
            let removed = bridge.delete_group(kind, &name).await?;
            ctx.note(&format!(
                "Deleted {} '{name}' (ID {})",
                kind.singular(),
                removed.id
            ));
            Ok(())
        }
    }
}

fn existing(bridge: &Bridge, kind: GroupKind, name: &str) -> Option<LogicalGroup> {
    bridge.registry().snapshot().groups(kind).get(name).cloned()
}

/// Fields that were not given keep their current values.
fn merge(name: &str, rename: Option<&str>, current: &LogicalGroup, fields: GroupFields) -> GroupUpdate {
    let mut update = GroupUpdate::new(rename.unwrap_or(name));
    if rename.is_some() {
        update = update.renamed_from(name);
    }
    update.id = fields.id;
    update.video = fields.video.or_else(|| current.video.clone());
    update.audio = fields.audio.or_else(|| current.audio.clone());
    update.data = fields.data.or_else(|| current.data.clone());
    update
}
