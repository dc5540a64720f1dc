use std::fs;

use rently_client::{MultipartForm, RequestDescriptor};
use serde_json::Value;
use tracing::info;

use super::types::Resource;
use crate::cli_args::*;
use crate::modules::shared::{parse_key_value, print_json};
use crate::modules::system::CommandContext;

pub(crate) async fn handle_resource(
    resource: Resource,
    args: ResourceArgs,
    ctx: &mut CommandContext<'_>,
) -> anyhow::Result<()> {
    let descriptor = build_descriptor(resource, args.command)?;
    let value = ctx.api.execute(&descriptor).await?;
    if value.is_null() {
        println!("OK");
        return Ok(());
    }
    print_json(&value)
}

pub(crate) fn build_descriptor(
    resource: Resource,
    command: ResourceCommand,
) -> anyhow::Result<RequestDescriptor> {
    let descriptor = match command {
        ResourceCommand::List(args) => {
            let mut descriptor = RequestDescriptor::get(resource.path());
            if let Some(page) = args.page {
                descriptor = descriptor.query("page", page.to_string());
            }
            if let Some(size) = args.size {
                descriptor = descriptor.query("size", size.to_string());
            }
            for raw in &args.filters {
                let (key, value) = parse_key_value(raw)?;
                descriptor = descriptor.query(key, value);
            }
            descriptor
        }
        ResourceCommand::Get(args) => RequestDescriptor::get(resource.item_path(&args.id)),
        ResourceCommand::Create(args) => {
            RequestDescriptor::post(resource.path()).json_value(read_body(&args)?)
        }
        ResourceCommand::Update(args) => {
            RequestDescriptor::put(resource.item_path(&args.id)).json_value(read_body(&args.data)?)
        }
        ResourceCommand::Delete(args) => RequestDescriptor::delete(resource.item_path(&args.id)),
    };
    Ok(descriptor)
}

fn read_body(args: &DataArgs) -> anyhow::Result<Value> {
    let raw = match (&args.data, &args.data_file) {
        (Some(data), _) => data.clone(),
        (None, Some(path)) => fs::read_to_string(path)?,
        (None, None) => anyhow::bail!("--data or --data-file is required"),
    };
    let value: Value = serde_json::from_str(&raw)
        .map_err(|err| anyhow::anyhow!("body is not valid JSON: {err}"))?;
    if !value.is_object() {
        anyhow::bail!("body must be a JSON object");
    }
    Ok(value)
}

pub(crate) async fn handle_upload(
    args: UploadArgs,
    ctx: &mut CommandContext<'_>,
) -> anyhow::Result<()> {
    let descriptor = upload_descriptor(&args)?;
    info!(file = %args.file.display(), to = %args.to, "uploading file");
    let value = ctx.api.execute(&descriptor).await?;
    print_json(&value)
}

pub(crate) fn upload_descriptor(args: &UploadArgs) -> anyhow::Result<RequestDescriptor> {
    let data = fs::read(&args.file)
        .map_err(|err| anyhow::anyhow!("failed to read {}: {err}", args.file.display()))?;
    let file_name = args
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow::anyhow!("invalid file name: {}", args.file.display()))?
        .to_string();

    let mut form = MultipartForm::new();
    for raw in &args.fields {
        let (key, value) = parse_key_value(raw)?;
        form = form.text(key, value);
    }
    form = form.file(args.field.clone(), file_name, args.mime.clone(), data);
    Ok(RequestDescriptor::post(args.to.clone()).multipart(form))
}
