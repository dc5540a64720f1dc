use crate::cli_args::*;
use crate::modules::auth::handle_whoami;
use crate::modules::resources::{handle_resource, handle_upload, Resource};
use crate::modules::system::CommandContext;

pub(crate) async fn handle_command(
    command: Command,
    ctx: &mut CommandContext<'_>,
) -> anyhow::Result<()> {
    match command {
        Command::Whoami => handle_whoami(ctx).await?,
        Command::House(args) => handle_resource(Resource::House, args, ctx).await?,
        Command::Room(args) => handle_resource(Resource::Room, args, ctx).await?,
        Command::Contract(args) => handle_resource(Resource::Contract, args, ctx).await?,
        Command::Invoice(args) => handle_resource(Resource::Invoice, args, ctx).await?,
        Command::Tenant(args) => handle_resource(Resource::Tenant, args, ctx).await?,
        Command::Upload(args) => handle_upload(args, ctx).await?,
        Command::Config(_) | Command::Login(_) | Command::Logout(_) => {
            unreachable!()
        }
    }

    Ok(())
}
