//! Discord bots that relay chat and image prompts to a local Ollama instance.
//!
//! Three bots share this crate: `lain` holds one global conversation that is
//! replayed as model context on every call, `syntax` keeps per-channel
//! reference history and answers coding questions single-shot, and `satoshi`
//! analyzes image attachments through the `/api/generate` endpoint.

pub mod config;
pub mod delivery;
pub mod error;
pub mod history;
pub mod lain;
pub mod ollama;
pub mod satoshi;
pub mod syntax;
pub mod trigger;
pub mod turn;
