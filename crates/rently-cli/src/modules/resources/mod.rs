mod actions;
pub(crate) mod args;
mod types;

pub(crate) use actions::{build_descriptor, handle_resource, handle_upload, upload_descriptor};
pub(crate) use types::Resource;
