use clap::{ArgAction, Parser, Subcommand};

pub use crate::modules::auth::args::*;
pub use crate::modules::resources::args::*;
pub use crate::modules::system::args::*;

#[derive(Parser)]
#[command(name = "rently")]
#[command(about = "Rently property management CLI")]
pub struct Cli {
    #[arg(long, env = "RENTLY_ADDR")]
    pub addr: Option<String>,
    #[arg(long, env = "RENTLY_TOKEN")]
    pub token: Option<String>,
    #[arg(long)]
    pub context: Option<String>,
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    #[arg(long, help = "Allow http:// and invalid TLS certificates")]
    pub insecure: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    Config(ConfigArgs),
    Login(LoginArgs),
    Logout(LogoutArgs),
    #[command(about = "Show the signed-in account")]
    Whoami,
    #[command(about = "Manage houses")]
    House(ResourceArgs),
    #[command(about = "Manage rooms")]
    Room(ResourceArgs),
    #[command(about = "Manage rental contracts")]
    Contract(ResourceArgs),
    #[command(about = "Manage invoices")]
    Invoice(ResourceArgs),
    #[command(about = "Manage tenants")]
    Tenant(ResourceArgs),
    #[command(about = "Upload a file (multipart)")]
    Upload(UploadArgs),
}
