//! Satoshi: image-analysis bot over Ollama's `/api/generate` endpoint.
//!
//! Keeps no history; every call ships the prompt and one base64-encoded
//! image attachment.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use log::{debug, error, info};
use mime::Mime;
use poise::{
    Framework, FrameworkOptions, builtins,
    serenity_prelude::{
        Attachment, ClientBuilder, Context, FullEvent, GatewayIntents,
        Message as SerenityMessage,
    },
};

use crate::config::Config;
use crate::delivery::{ChannelSink, deliver};
use crate::error::{BotError, Result};
use crate::ollama::OllamaClient;
use crate::trigger::Trigger;

const WAKE_PHRASE: &str = "hello satoshi";
const DEFAULT_PROMPT: &str = "What is in the image?";
const DEFAULT_MODEL: &str = "llava-llama3:latest";
const ATTACH_PROMPT: &str = "Please attach an image for me to analyze.";

type CommandContext<'a> = poise::Context<'a, Data, BotError>;

struct Data {
    ollama: Arc<OllamaClient>,
}

/// Run the Satoshi bot until shutdown.
pub async fn run() -> Result<()> {
    info!("Initializing satoshi");
    let config = Config::from_env("SATOSHI_TOKEN", "SATOSHI_MODEL", DEFAULT_MODEL)?;

    // Image calls are single-shot; no persona message is sent.
    let ollama = Arc::new(OllamaClient::new(&config.ollama_url, &config.model, None)?);

    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![satoshi()],
            event_handler: |ctx, event, _framework, data| Box::pin(event_handler(ctx, event, data)),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some("!".to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("{} has connected to Discord", ready.user.name);
                info!("Bot is in {} guild(s)", ready.guilds.len());
                for guild in &ready.guilds {
                    debug!(" - guild id {}", guild.id);
                }
                builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(Data { ollama })
            })
        })
        .build();

    let mut client = ClientBuilder::new(config.discord_token, intents)
        .framework(framework)
        .await?;

    tokio::select! {
        result = client.start() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down...");
        }
    }

    Ok(())
}

async fn event_handler(ctx: &Context, event: &FullEvent, data: &Data) -> Result<()> {
    if let FullEvent::Message { new_message } = event {
        let bot_id = ctx.cache.current_user().id;
        let trigger = Trigger::new(bot_id, WAKE_PHRASE, DEFAULT_PROMPT);
        let mentions_bot = new_message.mentions_user_id(bot_id);

        if let Some(prompt) = trigger.resolve(new_message.author.id, &new_message.content, mentions_bot)
        {
            info!(
                "Received message from {} in channel {}: {}",
                new_message.author.tag(),
                new_message.channel_id,
                new_message.content
            );

            let ctx = ctx.clone();
            let message = new_message.clone();
            let ollama = data.ollama.clone();
            tokio::spawn(async move {
                handle_prompt(&ctx, &message, &ollama, &prompt).await;
            });
        }
    }
    Ok(())
}

async fn handle_prompt(
    ctx: &Context,
    message: &SerenityMessage,
    ollama: &Arc<OllamaClient>,
    prompt: &str,
) {
    let sink = ChannelSink::new(ctx.http.clone(), message.channel_id);

    let Some(attachment) = first_image_attachment(&message.attachments) else {
        info!(
            "No image attachment from {}; asking for one",
            message.author.tag()
        );
        if let Err(e) = deliver(&sink, ATTACH_PROMPT).await {
            error!(
                "Failed to deliver clarification in channel {}: {e}",
                message.channel_id
            );
        }
        return;
    };

    let image_base64 = match fetch_image_as_base64(&attachment.url).await {
        Ok(encoded) => encoded,
        Err(e) => {
            error!(
                "Failed to fetch image attachment {}: {e}",
                attachment.filename
            );
            if let Err(e) = deliver(&sink, &e.user_message()).await {
                error!(
                    "Failed to deliver fetch-error reply in channel {}: {e}",
                    message.channel_id
                );
            }
            return;
        }
    };

    debug!("Processing image with prompt: {prompt}");
    let typing = message.channel_id.start_typing(&ctx.http);
    let result = ollama.generate_with_image(prompt, image_base64).await;
    typing.stop();

    let reply = match result {
        Ok(response) => {
            info!(
                "Replying to {} in channel {} ({} characters)",
                message.author.tag(),
                message.channel_id,
                response.chars().count()
            );
            response
        }
        Err(e) => {
            error!("Image turn for {} failed: {e}", message.author.tag());
            e.user_message()
        }
    };

    if let Err(e) = deliver(&sink, &reply).await {
        error!(
            "Failed to deliver response in channel {}: {e}",
            message.channel_id
        );
    }
}

/// First attachment whose content type parses as `image/*`.
fn first_image_attachment(attachments: &[Attachment]) -> Option<&Attachment> {
    attachments.iter().find(|attachment| {
        attachment
            .content_type
            .as_ref()
            .and_then(|ct| ct.parse::<Mime>().ok())
            .is_some_and(|mime| mime.type_() == mime::IMAGE)
    })
}

/// Download an attachment and encode it for the generate endpoint.
async fn fetch_image_as_base64(url: &str) -> Result<String> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| BotError::AttachmentFetch(e.to_string()))?;

    if !response.status().is_success() {
        return Err(BotError::AttachmentFetch(format!(
            "unexpected status {}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| BotError::AttachmentFetch(e.to_string()))?;
    debug!("Fetched image attachment ({} bytes)", bytes.len());

    Ok(STANDARD.encode(&bytes))
}

/// Ask Satoshi to analyze an image.
#[poise::command(slash_command, prefix_command)]
async fn satoshi(
    ctx: CommandContext<'_>,
    #[description = "Question about the image"]
    #[rest]
    _prompt: Option<String>,
) -> Result<()> {
    // Slash invocations carry no attachment through this path; point the
    // user at the message flow instead.
    ctx.say(ATTACH_PROMPT).await?;
    Ok(())
}
