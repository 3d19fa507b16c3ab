//! Invocation registry: dispatch from tool name to a live HTTP call.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use openapi::{ApiDescription, CollisionPolicy, HttpMethod, Operation, ToolDefinition, Translator};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::model::{ToolCall, ToolSpec};
use crate::tools::{ToolError, ToolHost};
use crate::{Error, Result};

/// Something that can run one tool with decoded arguments.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, args: &Map<String, Value>) -> std::result::Result<Value, ToolError>;
}

/// Invokes one API operation over HTTP.
pub struct HttpInvoker {
    client: reqwest::Client,
    operation_id: String,
    operation: Operation,
    base_url: String,
}

impl HttpInvoker {
    pub fn new(
        client: reqwest::Client,
        operation_id: impl Into<String>,
        operation: Operation,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            operation_id: operation_id.into(),
            operation,
            base_url: base_url.into(),
        }
    }

    fn network_error(&self, e: reqwest::Error) -> ToolError {
        ToolError::Network {
            operation_id: self.operation_id.clone(),
            message: e.to_string(),
        }
    }
}

fn to_reqwest(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Options => reqwest::Method::OPTIONS,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Trace => reqwest::Method::TRACE,
    }
}

#[async_trait]
impl Invoker for HttpInvoker {
    async fn invoke(&self, args: &Map<String, Value>) -> std::result::Result<Value, ToolError> {
        let request = openapi::request::build(&self.operation, &self.base_url, args);
        debug!(
            operation_id = %self.operation_id,
            method = %request.method,
            url = %request.url,
            body = ?request.body,
            "calling API operation"
        );

        let mut req = self
            .client
            .request(to_reqwest(request.method), &request.url);
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let response = req.send().await.map_err(|e| self.network_error(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.network_error(e))?;
        debug!(operation_id = %self.operation_id, %status, body = %text, "API response");

        if !status.is_success() {
            return Err(ToolError::ApiCall {
                operation_id: self.operation_id.clone(),
                status: status.as_u16(),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ToolError::InvalidResponse {
            operation_id: self.operation_id.clone(),
            message: e.to_string(),
        })
    }
}

/// Options for building a registry.
#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
    /// Per-request timeout for downstream API calls. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// How parameter/body name collisions are resolved during translation.
    pub collision: CollisionPolicy,
}

/// Maps tool names to invokers.
///
/// Built once per session from one API description and never mutated
/// afterwards; pass it by value or reference to the orchestrator.
pub struct InvocationRegistry {
    specs: Vec<ToolSpec>,
    invokers: HashMap<String, Box<dyn Invoker>>,
}

impl std::fmt::Debug for InvocationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.invokers.keys().collect();
        names.sort();
        f.debug_struct("InvocationRegistry")
            .field("tools", &self.specs.len())
            .field("invokers", &names)
            .finish()
    }
}

impl InvocationRegistry {
    /// Translate `description` and register one HTTP invoker per operation.
    pub fn from_description(description: &ApiDescription, options: RegistryOptions) -> Result<Self> {
        let tools = Translator::new(options.collision).translate(description)?;
        Self::build(description, tools, &options)
    }

    /// Register an HTTP invoker for each tool definition.
    ///
    /// A definition without a matching operation keeps its spec but gets no
    /// invoker, so calling it fails with [`ToolError::OperationNotFound`].
    pub fn build(
        description: &ApiDescription,
        tools: Vec<ToolDefinition>,
        options: &RegistryOptions,
    ) -> Result<Self> {
        let base_url = description.base_url()?;

        let mut client = reqwest::Client::builder();
        if let Some(timeout) = options.request_timeout {
            client = client.timeout(timeout);
        }
        let client = client
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;

        let mut registry = Self::empty();
        for tool in tools {
            match description.operation(&tool.name) {
                Some(operation) => {
                    debug!(tool = %tool.name, "registering invoker");
                    let invoker =
                        HttpInvoker::new(client.clone(), &tool.name, operation.clone(), base_url);
                    registry.invokers.insert(tool.name.clone(), Box::new(invoker));
                }
                None => warn!(tool = %tool.name, "no operation for tool; calls will fail"),
            }
            registry.specs.push(ToolSpec::from(tool));
        }

        debug!(tools = registry.specs.len(), "invocation registry ready");
        Ok(registry)
    }

    /// A registry with no tools.
    pub fn empty() -> Self {
        Self {
            specs: Vec::new(),
            invokers: HashMap::new(),
        }
    }

    /// Add a tool backed by a custom invoker.
    pub fn with_invoker(mut self, spec: ToolSpec, invoker: impl Invoker + 'static) -> Self {
        self.invokers.insert(spec.name.clone(), Box::new(invoker));
        self.specs.retain(|s| s.name != spec.name);
        self.specs.push(spec);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.invokers.contains_key(name)
    }

    /// Invoke a tool by name.
    pub async fn invoke(
        &self,
        name: &str,
        args: &Map<String, Value>,
    ) -> std::result::Result<Value, ToolError> {
        let invoker = self
            .invokers
            .get(name)
            .ok_or_else(|| ToolError::OperationNotFound(name.to_string()))?;
        invoker.invoke(args).await
    }
}

impl ToolHost for InvocationRegistry {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn execute(&self, call: &ToolCall) -> std::result::Result<Value, ToolError> {
        let empty = Map::new();
        let args = match &call.input {
            Value::Object(args) => args,
            Value::Null => &empty,
            other => {
                return Err(ToolError::ArgumentParse {
                    name: call.name.clone(),
                    reason: format!("expected a JSON object, got {other}"),
                });
            }
        };
        self.invoke(&call.name, args).await
    }
}
