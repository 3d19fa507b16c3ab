//! Toolbridge runtime: streamed model turns with API-backed tools.
//!
//! This crate connects a streaming LLM backend to an HTTP API described by
//! an OpenAPI-style document. The model sees the API's operations as tools;
//! when it calls one, the runtime performs the HTTP request and resumes the
//! model with the result.
//!
//! # Overview
//!
//! - **Backend**: a streaming LLM provider ([`OpenAiBackend`]).
//! - **ToolHost**: the set of tools a turn may call. [`InvocationRegistry`]
//!   maps each operation of an API description to an HTTP invoker.
//! - **Orchestrator**: runs one turn, invoking tools and resuming generation
//!   until the model produces a final answer.
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use openapi::ApiDescription;
//! use runtime::{
//!     InvocationRegistry, Message, OpenAiBackend, Orchestrator, RegistryOptions, TurnEvent,
//! };
//!
//! # async fn example() -> runtime::Result<()> {
//! let description = ApiDescription::load("widgets.yaml")?;
//! let registry = InvocationRegistry::from_description(&description, RegistryOptions::default())?;
//! let backend = OpenAiBackend::builder("sk-...", "gpt-4o-mini").build();
//! let orchestrator = Orchestrator::new(backend, registry);
//!
//! let mut turn = orchestrator.run_turn(vec![Message::user("Which widgets are red?")]);
//! while let Some(event) = turn.next().await {
//!     if let TurnEvent::Text(delta) = event? {
//!         print!("{delta}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod error;
pub mod model;
mod orchestrator;
pub mod providers;
pub mod tools;

pub use error::{Error, Result};
pub use model::{
    Backend, FinishReason, Message, ModelError, ModelEvent, Part, Role, ToolCall, ToolResult,
    ToolSpec,
};
pub use orchestrator::{Completion, Orchestrator, ToolErrorPolicy, TurnConfig, TurnEvent};
pub use providers::{OpenAiBackend, OpenAiBackendBuilder};
pub use tools::{EmptyToolHost, InvocationRegistry, RegistryOptions, ToolError, ToolHost};
