//! OpenAI-compatible HTTP implementations of the embedding, scoring and
//! summarization capabilities.
//!
//! All three share one [`OpenAiClient`], which owns the bearer token, the
//! base URL, the per-call timeout and the [`RetryPolicy`].

mod client;
mod embed;
pub mod retry;
mod score;
mod summarize;

pub use client::OpenAiClient;
pub use embed::OpenAiEmbedder;
pub use retry::RetryPolicy;
pub use score::{OpenAiScorer, parse_lenient};
pub use summarize::OpenAiSummarizer;
