//! Command dispatch: CLI args -> bridge operations -> output formatting.

pub mod groups;
pub mod nodes;
pub mod refresh;
pub mod routing;
pub mod serve;

use std::path::PathBuf;

use patchbay_config::Config;
use patchbay_core::{Bridge, BridgeConfig};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output::Painter;

/// Loaded configuration plus output options for one invocation.
pub struct Context {
    pub config_path: PathBuf,
    pub config: Config,
    pub painter: Painter,
    pub quiet: bool,
}

impl Context {
    pub fn load(global: &GlobalOpts) -> Result<Self, CliError> {
        let config_path = global
            .config
            .clone()
            .unwrap_or_else(patchbay_config::config_path);
        let config = patchbay_config::load_config(&config_path)?;
        Ok(Self {
            config_path,
            config,
            painter: Painter::new(global.output, global.color),
            quiet: global.quiet,
        })
    }

    pub fn bridge_config(&self) -> Result<BridgeConfig, CliError> {
        Ok(self.config.to_bridge_config(self.config_path.parent())?)
    }

    /// A bridge for one-shot commands; nothing is started.
    pub fn bridge(&self) -> Result<Bridge, CliError> {
        Ok(Bridge::new(self.bridge_config()?)?)
    }

    pub fn save(&self) -> Result<(), CliError> {
        Ok(patchbay_config::save_config(&self.config, &self.config_path)?)
    }

    /// Status line for humans on stderr.
    pub fn note(&self, message: &str) {
        if !self.quiet {
            eprintln!("{message}");
        }
    }
}

pub async fn dispatch(cmd: Command, ctx: &mut Context) -> Result<(), CliError> {
    match cmd {
        Command::Serve(args) => serve::handle(args, ctx).await,
        Command::Refresh(args) => refresh::handle(args, ctx).await,
        Command::Groups(args) => groups::handle(args, ctx).await,
        Command::Take { source, receiver } => routing::take(source, receiver, ctx).await,
        Command::TakeMany { source, receivers } => {
            routing::take_many(source, &receivers, ctx).await
        }
        Command::Disconnect { receiver } => routing::disconnect(receiver, ctx).await,
        Command::Status { receiver } => routing::status(receiver, ctx).await,
        Command::Nodes(args) => nodes::handle(args, ctx).await,
    }
}
