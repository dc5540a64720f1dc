use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Args)]
pub struct ResourceArgs {
    #[command(subcommand)]
    pub command: ResourceCommand,
}

#[derive(Subcommand)]
pub enum ResourceCommand {
    #[command(about = "List records")]
    List(ListArgs),
    #[command(about = "Show one record")]
    Get(IdArgs),
    #[command(about = "Create a record from JSON")]
    Create(DataArgs),
    #[command(about = "Update a record from JSON")]
    Update(UpdateArgs),
    #[command(about = "Delete a record")]
    Delete(IdArgs),
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long)]
    pub page: Option<u32>,
    #[arg(long)]
    pub size: Option<u32>,
    #[arg(long = "filter", help = "Query filter as key=value (repeatable)")]
    pub filters: Vec<String>,
}

#[derive(Args)]
pub struct IdArgs {
    pub id: String,
}

#[derive(Args)]
pub struct DataArgs {
    #[arg(long, conflicts_with = "data_file", help = "JSON body")]
    pub data: Option<String>,
    #[arg(long, help = "Path to a JSON body")]
    pub data_file: Option<PathBuf>,
}

#[derive(Args)]
pub struct UpdateArgs {
    pub id: String,
    #[command(flatten)]
    pub data: DataArgs,
}

#[derive(Args)]
pub struct UploadArgs {
    #[arg(help = "File to upload")]
    pub file: PathBuf,
    #[arg(long, default_value = "file", help = "Form field name for the file")]
    pub field: String,
    #[arg(long, default_value = "/files", help = "Upload endpoint")]
    pub to: String,
    #[arg(long, help = "MIME type of the file")]
    pub mime: Option<String>,
    #[arg(long = "text", help = "Extra form field as key=value (repeatable)")]
    pub fields: Vec<String>,
}
