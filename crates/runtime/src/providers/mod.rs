//! LLM provider adapters.
//!
//! Each provider implements [`Backend`](crate::model::Backend) for its
//! specific API.

#[cfg(test)]
pub(crate) mod mock;
mod openai;
mod sse;

pub use openai::{DEFAULT_BASE_URL, OpenAiBackend, OpenAiBackendBuilder};
