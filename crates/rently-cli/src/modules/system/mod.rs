pub(crate) mod args;
pub(crate) mod config;
mod session;
pub(crate) mod types;

pub(crate) use config::{
    ensure_secure_addr, handle_config_command, load_config, resolve_addr, save_config,
};
pub(crate) use session::{build_client, sync_session};
pub(crate) use types::{CliConfig, CliContext, CommandContext};
