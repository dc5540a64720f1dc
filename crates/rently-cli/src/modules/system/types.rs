use rently_client::ApiClient;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Default)]
pub struct CliConfig {
    #[serde(default)]
    pub current_context: Option<String>,
    #[serde(default)]
    pub contexts: HashMap<String, CliContext>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct CliContext {
    pub addr: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub logged_in_at: Option<String>,
    #[serde(default)]
    pub refreshed_at: Option<String>,
}

impl CliContext {
    pub fn new(addr: String) -> Self {
        Self {
            addr,
            username: None,
            logged_in_at: None,
            refreshed_at: None,
        }
    }
}

pub struct CommandContext<'a> {
    pub api: &'a ApiClient,
    pub context_name: Option<String>,
}
