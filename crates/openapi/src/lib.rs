//! OpenAPI-style API descriptions as model tools.
//!
//! This crate turns an API description into the flat function schemas a
//! language model can call, and turns a call's arguments back into an HTTP
//! request. It performs no network I/O.
//!
//! # Example
//!
//! ```no_run
//! use openapi::{ApiDescription, translate, request};
//! use serde_json::json;
//!
//! # fn example() -> openapi::Result<()> {
//! let description = ApiDescription::load("spec.json")?;
//! let tools = translate(&description)?;
//! for tool in &tools {
//!     println!("{}: {}", tool.name, tool.description);
//! }
//!
//! let operation = description.operation("listWidgets").expect("declared");
//! let args = json!({ "color": "red" });
//! let req = request::build(operation, description.base_url()?, args.as_object().unwrap());
//! println!("{} {}", req.method, req.url);
//! # Ok(())
//! # }
//! ```

mod description;
mod error;
pub mod request;
mod translate;

pub use description::{
    ApiDescription, HttpMethod, MediaType, ObjectSchema, Operation, Parameter, PrimitiveSchema,
    RequestBody, Server,
};
pub use error::{Result, SchemaError};
pub use request::HttpRequest;
pub use translate::{CollisionPolicy, ParameterSchema, ToolDefinition, Translator, translate};
