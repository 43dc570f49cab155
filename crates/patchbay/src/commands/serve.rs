//! `serve`: run the bridge until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use patchbay_core::{Bridge, Reload, ReloadSource};

use crate::cli::ServeArgs;
use crate::commands::Context;
use crate::error::CliError;

pub async fn handle(args: ServeArgs, ctx: &Context) -> Result<(), CliError> {
    let mut config = ctx.bridge_config()?;
    if args.emulator {
        config.settings.enable_emulator = true;
    }
    if let Some(bind) = args.bind {
        config.emulator.bind = bind;
    }
    if let Some(port) = args.port {
        config.emulator.port = port;
    }

    let source = reload_source(ctx.config_path.clone(), args.emulator);
    let bridge = Bridge::with_reload_source(config, source)?;
    bridge.start().await?;

    if let Some(hub) = bridge.emulator().await {
        if let Some(addr) = hub.local_addr().await {
            ctx.note(&format!("Videohub emulator listening on {addr}"));
        }
    }
    info!(
        nodes = bridge.config().nodes.len(),
        registry = %bridge.config().registry_path.display(),
        "serving; press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    bridge.shutdown().await;
    Ok(())
}

/// Re-read `[settings]` and `[[nodes]]` from the config file on every
/// refresh tick, so `patchbay nodes add` reaches a running daemon.
/// `--emulator` keeps the emulator on whatever the file says.
fn reload_source(path: PathBuf, force_emulator: bool) -> ReloadSource {
    Arc::new(move || {
        let loaded = patchbay_config::load_config(&path)
            .and_then(|cfg| cfg.to_bridge_config(path.parent()));
        match loaded {
            Ok(config) => {
                let mut settings = config.settings;
                settings.enable_emulator |= force_emulator;
                Some(Reload {
                    settings,
                    nodes: config.nodes,
                })
            }
            Err(e) => {
                warn!(error = %e, "cannot reload configuration, keeping current values");
                None
            }
        }
    })
}
