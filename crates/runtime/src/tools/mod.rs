//! Tool hosts and the API invocation registry.

mod empty;
pub mod errors;
mod host;
mod registry;

pub use empty::EmptyToolHost;
pub use errors::ToolError;
pub use host::ToolHost;
pub use registry::{HttpInvoker, InvocationRegistry, Invoker, RegistryOptions};
