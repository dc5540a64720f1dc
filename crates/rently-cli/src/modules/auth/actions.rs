use chrono::Utc;
use rently_client::RequestDescriptor;

use crate::cli_args::*;
use crate::modules::auth::types::{LoginRequest, LoginResult};
use crate::modules::auth::{load_session_token, store_session_token};
use crate::modules::shared::print_json;
use crate::modules::system::{
    build_client, ensure_secure_addr, sync_session, CliConfig, CliContext, CommandContext,
};
use crate::{prompt_password, DEFAULT_ADDR, DEFAULT_CONTEXT};

pub(crate) async fn handle_login(
    args: LoginArgs,
    addr_arg: Option<String>,
    context_arg: Option<String>,
    allow_insecure: bool,
    config: &mut CliConfig,
) -> anyhow::Result<()> {
    let context_name = args
        .context
        .or(context_arg)
        .or_else(|| config.current_context.clone())
        .unwrap_or_else(|| DEFAULT_CONTEXT.to_string());
    let addr = addr_arg
        .or_else(|| {
            config
                .contexts
                .get(&context_name)
                .map(|ctx| ctx.addr.clone())
        })
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());
    ensure_secure_addr(&addr, allow_insecure)?;

    let password = match args.password {
        Some(password) => password,
        None => prompt_password("Password: ")?,
    };

    let api = build_client(&addr, allow_insecure)?;
    let descriptor = RequestDescriptor::post("/auth/login").json(&LoginRequest {
        username: args.username.clone(),
        password,
    })?;
    let login: LoginResult = api
        .execute_as(&descriptor)
        .await
        .map_err(|err| anyhow::anyhow!("Login failed: {}", err.message()))?;
    if login.token.trim().is_empty() {
        anyhow::bail!("Login failed: server returned an empty token");
    }

    store_session_token(&context_name, &login.token)?;
    let entry = config
        .contexts
        .entry(context_name.clone())
        .or_insert_with(|| CliContext::new(addr.clone()));
    entry.addr = addr;
    entry.username = Some(args.username);
    entry.logged_in_at = Some(Utc::now().to_rfc3339());
    entry.refreshed_at = None;
    config.current_context = Some(context_name);

    println!("Logged in");
    Ok(())
}

pub(crate) fn handle_logout(
    args: LogoutArgs,
    addr_arg: Option<String>,
    context_arg: Option<String>,
    allow_insecure: bool,
    config: &mut CliConfig,
) -> anyhow::Result<()> {
    let context_name = args
        .context
        .or(context_arg)
        .or_else(|| config.current_context.clone())
        .unwrap_or_else(|| DEFAULT_CONTEXT.to_string());
    let Some(context) = config.contexts.get(&context_name).cloned() else {
        anyhow::bail!("context not found: {}", context_name);
    };
    let addr = addr_arg.unwrap_or(context.addr);

    let api = build_client(&addr, allow_insecure)?;
    if let Some(token) = load_session_token(&context_name)? {
        api.set_token(token);
    }
    let mut events = api.subscribe();
    api.logout();
    sync_session(&mut events, &context_name, config)?;

    println!("Logged out");
    Ok(())
}

pub(crate) async fn handle_whoami(ctx: &mut CommandContext<'_>) -> anyhow::Result<()> {
    let value = ctx.api.execute(&RequestDescriptor::get("/auth/me")).await?;
    print_json(&value)
}
