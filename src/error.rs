use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Serenity error: {0}")]
    Serenity(Box<poise::serenity_prelude::Error>),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Ollama API error ({status}): {message}")]
    OllamaApi {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("Ollama response error: {0}")]
    OllamaResponse(String),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Attachment fetch error: {0}")]
    AttachmentFetch(String),
}

impl From<poise::serenity_prelude::Error> for BotError {
    fn from(err: poise::serenity_prelude::Error) -> Self {
        BotError::Serenity(Box::new(err))
    }
}

impl BotError {
    /// Returns a user-friendly error message suitable for displaying in Discord
    pub fn user_message(&self) -> String {
        match self {
            BotError::Serenity(_) => {
                "Sorry, I'm having trouble communicating with Discord right now. Please try again later.".to_string()
            }
            BotError::EnvVar(_) => {
                "Sorry, there's a configuration issue on my end. Please contact the bot administrator.".to_string()
            }
            BotError::OllamaApi { .. } | BotError::OllamaResponse(_) | BotError::Reqwest(_) => {
                "I'm sorry, but I couldn't process that.".to_string()
            }
            BotError::AttachmentFetch(_) => "I couldn't fetch the image.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
