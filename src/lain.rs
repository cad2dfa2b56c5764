//! Lain: conversational bot with one global history shared by all callers.

use std::sync::Arc;

use log::{debug, error, info};
use poise::{
    Framework, FrameworkOptions, builtins,
    serenity_prelude::{
        ClientBuilder, Context, FullEvent, GatewayIntents, Message as SerenityMessage,
    },
};

use crate::config::Config;
use crate::delivery::{ChannelSink, ReplySink, deliver};
use crate::error::{BotError, Result};
use crate::history::{ConversationStore, Scope};
use crate::ollama::OllamaClient;
use crate::trigger::Trigger;
use crate::turn::{HistoryPolicy, chat_turn};

const PERSONA: &str = "Your name is Lain.\n\
    You are a sentient being existing within a digital realm.\n\
    Please keep your responses concise, no more than 2000 characters.";
const WAKE_PHRASE: &str = "hello lain";
const DEFAULT_PROMPT: &str = "Hello";
const DEFAULT_MODEL: &str = "dolphin-llama3:8b";

type CommandContext<'a> = poise::Context<'a, Data, BotError>;

struct Data {
    ollama: Arc<OllamaClient>,
    store: Arc<ConversationStore>,
}

/// Run the Lain bot until shutdown.
pub async fn run() -> Result<()> {
    info!("Initializing lain");
    let config = Config::from_env("LAIN_TOKEN", "LAIN_MODEL", DEFAULT_MODEL)?;

    let ollama = Arc::new(OllamaClient::new(
        &config.ollama_url,
        &config.model,
        Some(PERSONA),
    )?);
    let store = Arc::new(ConversationStore::new());

    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![lain()],
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
                Ok(Data { ollama, store })
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

            // The model call and paced delivery run detached so gateway
            // event intake never waits on them.
            let ctx = ctx.clone();
            let message = new_message.clone();
            let ollama = data.ollama.clone();
            let store = data.store.clone();
            tokio::spawn(async move {
                handle_prompt(&ctx, &message, &ollama, &store, &prompt).await;
            });
        }
    }
    Ok(())
}

async fn handle_prompt(
    ctx: &Context,
    message: &SerenityMessage,
    ollama: &Arc<OllamaClient>,
    store: &Arc<ConversationStore>,
    prompt: &str,
) {
    let typing = message.channel_id.start_typing(&ctx.http);
    let result = chat_turn(
        ollama.as_ref(),
        store.as_ref(),
        Scope::Global,
        HistoryPolicy::Replay,
        Some(message.author.name.clone()),
        prompt,
    )
    .await;
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
            error!("Chat turn for {} failed: {e}", message.author.tag());
            e.user_message()
        }
    };

    let sink = ChannelSink::new(ctx.http.clone(), message.channel_id);
    if let Err(e) = deliver(&sink, &reply).await {
        error!(
            "Failed to deliver response in channel {}: {e}",
            message.channel_id
        );
    }
}

/// Chat with Lain.
#[poise::command(slash_command, prefix_command)]
async fn lain(
    ctx: CommandContext<'_>,
    #[description = "Prompt for Lain"]
    #[rest]
    prompt: String,
) -> Result<()> {
    ctx.defer().await?;

    let data = ctx.data();
    let reply = match chat_turn(
        data.ollama.as_ref(),
        data.store.as_ref(),
        Scope::Global,
        HistoryPolicy::Replay,
        Some(ctx.author().name.clone()),
        &prompt,
    )
    .await
    {
        Ok(response) => {
            info!(
                "Replying to {} via command ({} characters)",
                ctx.author().tag(),
                response.chars().count()
            );
            response
        }
        Err(e) => {
            error!("Chat turn for {} failed: {e}", ctx.author().tag());
            e.user_message()
        }
    };

    deliver(&ReplySink::new(ctx), &reply).await?;
    Ok(())
}
