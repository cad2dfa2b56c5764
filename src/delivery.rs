//! Splitting model responses into Discord-sized chunks and sending them.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use poise::serenity_prelude::{ChannelId, Http};

use crate::error::Result;

/// Discord's message length limit for standard users.
pub const MAX_CHUNK_CHARS: usize = 2000;

/// Pause between consecutive chunks to stay under the outbound rate limit.
pub const CHUNK_PACING: Duration = Duration::from_secs(15);

/// Outbound message capability, one per channel or command invocation.
pub trait MessageSink {
    fn send(&self, content: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Sink that posts chunks straight to a Discord channel.
pub struct ChannelSink {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelSink {
    #[must_use]
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

impl MessageSink for ChannelSink {
    async fn send(&self, content: &str) -> Result<()> {
        self.channel_id.say(&self.http, content).await?;
        Ok(())
    }
}

/// Sink that replies through a command invocation.
pub struct ReplySink<'a, U: Send + Sync + 'static, E: Send + Sync> {
    ctx: poise::Context<'a, U, E>,
}

impl<'a, U: Send + Sync + 'static, E: Send + Sync> ReplySink<'a, U, E> {
    #[must_use]
    pub fn new(ctx: poise::Context<'a, U, E>) -> Self {
        Self { ctx }
    }
}

impl<U: Send + Sync + 'static, E: Send + Sync> MessageSink for ReplySink<'_, U, E> {
    async fn send(&self, content: &str) -> Result<()> {
        self.ctx.say(content).await?;
        Ok(())
    }
}

/// Split a response into chunks of at most [`MAX_CHUNK_CHARS`] characters.
///
/// Chunks are contiguous, in order, and concatenate back to the input
/// exactly, whitespace included. An empty input produces no chunks.
#[must_use]
pub fn chunk_message(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for c in text.chars() {
        current.push(c);
        count += 1;
        if count == MAX_CHUNK_CHARS {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Deliver a response through the sink, chunk by chunk, pausing
/// [`CHUNK_PACING`] after every chunk except the last.
///
/// A failed send abandons the remaining chunks; no retry.
pub async fn deliver(sink: &impl MessageSink, text: &str) -> Result<()> {
    let chunks = chunk_message(text);
    debug!(
        "Delivering response in {} chunk(s) ({} characters)",
        chunks.len(),
        text.chars().count()
    );

    for (idx, chunk) in chunks.iter().enumerate() {
        if let Err(e) = sink.send(chunk).await {
            warn!("Failed to send chunk {} of {}: {e}", idx + 1, chunks.len());
            return Err(e);
        }
        if idx < chunks.len() - 1 {
            debug!("Pacing for {}s before next chunk", CHUNK_PACING.as_secs());
            tokio::time::sleep(CHUNK_PACING).await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::time::Instant;

    use super::*;
    use crate::error::BotError;

    /// Records every send attempt and the instant it happened; can be told
    /// to reject the nth attempt.
    struct RecordingSink {
        attempts: Mutex<Vec<(String, Instant)>>,
        reject_attempt: Option<usize>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                attempts: Mutex::new(Vec::new()),
                reject_attempt: None,
            }
        }

        fn rejecting_attempt(n: usize) -> Self {
            Self {
                attempts: Mutex::new(Vec::new()),
                reject_attempt: Some(n),
            }
        }

        fn attempts(&self) -> Vec<(String, Instant)> {
            self.attempts.lock().unwrap().clone()
        }
    }

    impl MessageSink for RecordingSink {
        async fn send(&self, content: &str) -> Result<()> {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push((content.to_string(), Instant::now()));
            if self.reject_attempt == Some(attempts.len()) {
                return Err(BotError::from(poise::serenity_prelude::Error::Other(
                    "message rejected",
                )));
            }
            Ok(())
        }
    }

    #[test]
    fn chunks_concatenate_to_original() {
        let text = "abcdefghij".repeat(450); // 4500 chars
        let chunks = chunk_message(&text);

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_CHUNK_CHARS));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn exact_limit_is_a_single_chunk() {
        let text = "x".repeat(MAX_CHUNK_CHARS);
        assert_eq!(chunk_message(&text).len(), 1);

        let text = "x".repeat(MAX_CHUNK_CHARS + 1);
        let chunks = chunk_message(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].len(), 1);
    }

    #[test]
    fn empty_input_produces_no_chunks() {
        assert!(chunk_message("").is_empty());
    }

    #[test]
    fn whitespace_only_input_is_preserved() {
        let chunks = chunk_message(" \n\t ");
        assert_eq!(chunks, vec![" \n\t ".to_string()]);
    }

    #[test]
    fn multibyte_text_splits_on_character_boundaries() {
        let text = "é".repeat(2500);
        let chunks = chunk_message(&text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), MAX_CHUNK_CHARS);
        assert_eq!(chunks.concat(), text);
    }

    #[tokio::test(start_paused = true)]
    async fn multi_chunk_delivery_paces_between_chunks() {
        let sink = RecordingSink::new();
        let text = "y".repeat(4100); // three chunks

        deliver(&sink, &text).await.expect("delivery failed");

        let attempts = sink.attempts();
        assert_eq!(attempts.len(), 3);
        assert_eq!(
            attempts.iter().map(|(c, _)| c.as_str()).collect::<String>(),
            text
        );
        // Exactly N-1 pacing delays, each of the configured interval.
        assert_eq!(attempts[1].1 - attempts[0].1, CHUNK_PACING);
        assert_eq!(attempts[2].1 - attempts[1].1, CHUNK_PACING);
    }

    #[tokio::test(start_paused = true)]
    async fn single_chunk_delivery_does_not_pause() {
        let sink = RecordingSink::new();
        let start = Instant::now();

        deliver(&sink, "short response").await.expect("delivery failed");

        assert_eq!(sink.attempts().len(), 1);
        assert_eq!(Instant::now() - start, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_chunk_abandons_the_rest() {
        let sink = RecordingSink::rejecting_attempt(2);
        let text = "z".repeat(4100); // three chunks

        let result = deliver(&sink, &text).await;

        assert!(result.is_err());
        // Chunks 1 and 2 were attempted; chunk 3 never was.
        assert_eq!(sink.attempts().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_response_is_a_no_op() {
        let sink = RecordingSink::new();

        deliver(&sink, "").await.expect("delivery failed");

        assert!(sink.attempts().is_empty());
    }
}
