use std::env;

use log::{debug, error, info};

use crate::error::Result;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub ollama_url: String,
    pub model: String,
}

impl Config {
    /// Load a bot's configuration from the environment.
    ///
    /// The Discord token is required; the Ollama URL and model name fall back
    /// to defaults when their variables are unset.
    pub fn from_env(token_var: &str, model_var: &str, default_model: &str) -> Result<Self> {
        debug!("Loading configuration from environment");
        dotenvy::dotenv().ok();

        let discord_token = env::var(token_var).map_err(|e| {
            error!("Failed to load {token_var} from environment: {e}");
            e
        })?;

        let ollama_url =
            env::var("OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let model = env::var(model_var).unwrap_or_else(|_| default_model.to_string());

        info!("Configuration loaded successfully");
        debug!("Discord token length: {} characters", discord_token.len());
        debug!("Ollama URL: {ollama_url}");
        debug!("Model: {model}");

        Ok(Self {
            discord_token,
            ollama_url,
            model,
        })
    }
}
