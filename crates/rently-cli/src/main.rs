use clap::Parser;
use std::io::{self, Write};

mod cli_args;
mod cli_command;
mod modules;

use crate::cli_args::*;
use crate::cli_command::handle_command;
use crate::modules::auth::{handle_login, handle_logout, load_session_token};
use crate::modules::system::{
    build_client, ensure_secure_addr, handle_config_command, load_config, resolve_addr,
    save_config, sync_session, CommandContext,
};
use rently_client::ApiError;
use tracing_subscriber::EnvFilter;

pub(crate) const DEFAULT_ADDR: &str = "https://127.0.0.1:8080";
pub(crate) const DEFAULT_CONTEXT: &str = "default";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    let mut config = load_config()?;

    match cli.command {
        Command::Config(args) => {
            handle_config_command(args, &mut config)?;
            save_config(&config)?;
        }
        Command::Login(args) => {
            handle_login(args, cli.addr, cli.context, cli.insecure, &mut config).await?;
            save_config(&config)?;
        }
        Command::Logout(args) => {
            handle_logout(args, cli.addr, cli.context, cli.insecure, &mut config)?;
            save_config(&config)?;
        }
        command => {
            let context_name = cli
                .context
                .clone()
                .or_else(|| config.current_context.clone());
            let addr = resolve_addr(cli.addr.clone(), context_name.as_deref(), &config)?;
            ensure_secure_addr(&addr, cli.insecure)?;
            let api = build_client(&addr, cli.insecure)?;

            // A token given on the command line is never written back.
            let persist = cli.token.is_none();
            let token = match cli.token.clone() {
                Some(token) => Some(token),
                None => match context_name.as_deref() {
                    Some(name) => load_session_token(name)?,
                    None => None,
                },
            };
            if let Some(token) = token {
                api.set_token(token);
            }

            let mut events = api.subscribe();
            let mut ctx = CommandContext {
                api: &api,
                context_name,
            };
            let result = handle_command(command, &mut ctx).await;
            if persist {
                if let Some(name) = ctx.context_name.as_deref() {
                    sync_session(&mut events, name, &mut config)?;
                    save_config(&config)?;
                }
            }
            if let Err(err) = result {
                match err.downcast_ref::<ApiError>() {
                    Some(ApiError::SessionExpired) => {
                        anyhow::bail!("session expired; run `rently login`")
                    }
                    Some(api_err) if api_err.is_timeout() => {
                        anyhow::bail!("server did not respond in time: {api_err}")
                    }
                    _ => return Err(err),
                }
            }
        }
    }

    Ok(())
}

fn init_logging(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter)?)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

pub(crate) fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let password = rpassword::read_password()?;
    if password.trim().is_empty() {
        anyhow::bail!("password is required");
    }
    Ok(password)
}
