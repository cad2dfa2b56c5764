//! Deciding whether an inbound message addresses the bot, and with what.

use poise::serenity_prelude::UserId;

/// Mention and wake-phrase resolution for one bot identity.
pub struct Trigger {
    bot_id: UserId,
    wake_phrase: String,
    default_prompt: String,
}

impl Trigger {
    #[must_use]
    pub fn new(bot_id: UserId, wake_phrase: &str, default_prompt: &str) -> Self {
        Self {
            bot_id,
            wake_phrase: wake_phrase.to_lowercase(),
            default_prompt: default_prompt.to_string(),
        }
    }

    /// Returns the effective prompt when the message addresses the bot.
    ///
    /// A message is addressing when it mentions the bot or contains the wake
    /// phrase, case-insensitively. Mention tokens are stripped everywhere,
    /// the wake phrase only at its first occurrence; a prompt that ends up
    /// empty is replaced by the default. Self-authored messages never
    /// address.
    #[must_use]
    pub fn resolve(&self, author_id: UserId, content: &str, mentions_bot: bool) -> Option<String> {
        if author_id == self.bot_id {
            return None;
        }

        let addressed = mentions_bot || content.to_lowercase().contains(&self.wake_phrase);
        if !addressed {
            return None;
        }

        let mention = format!("<@{}>", self.bot_id);
        let mention_nick = format!("<@!{}>", self.bot_id);
        let stripped = content.replace(&mention_nick, "").replace(&mention, "");
        let stripped = strip_first_ignore_case(&stripped, &self.wake_phrase);

        let prompt = stripped.trim();
        if prompt.is_empty() {
            Some(self.default_prompt.clone())
        } else {
            Some(prompt.to_string())
        }
    }
}

/// Remove the first case-insensitive occurrence of `needle` from `haystack`.
///
/// Matching is done character by character so multibyte content around the
/// needle cannot shift byte offsets.
fn strip_first_ignore_case(haystack: &str, needle: &str) -> String {
    let needle_chars: Vec<char> = needle.chars().collect();
    if needle_chars.is_empty() {
        return haystack.to_string();
    }

    let hay_chars: Vec<(usize, char)> = haystack.char_indices().collect();
    for (i, &(start, _)) in hay_chars.iter().enumerate() {
        if i + needle_chars.len() > hay_chars.len() {
            break;
        }
        let found = hay_chars[i..i + needle_chars.len()]
            .iter()
            .zip(&needle_chars)
            .all(|(&(_, hc), &nc)| hc.eq_ignore_ascii_case(&nc));
        if found {
            let end = hay_chars
                .get(i + needle_chars.len())
                .map_or(haystack.len(), |&(idx, _)| idx);
            let mut out = String::with_capacity(haystack.len() - (end - start));
            out.push_str(&haystack[..start]);
            out.push_str(&haystack[end..]);
            return out;
        }
    }

    haystack.to_string()
}
