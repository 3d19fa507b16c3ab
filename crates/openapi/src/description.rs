//! API description model and loading.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::{Result, SchemaError};

/// HTTP method of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    /// Parse a path-item key. Keys that are not HTTP methods yield `None`.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "get" => Some(Self::Get),
            "put" => Some(Self::Put),
            "post" => Some(Self::Post),
            "delete" => Some(Self::Delete),
            "options" => Some(Self::Options),
            "head" => Some(Self::Head),
            "patch" => Some(Self::Patch),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Head => "HEAD",
            Self::Patch => "PATCH",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A server entry. Only the first one is used as the base URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Schema of a single primitive field: a parameter or a body property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
}

/// A path or query parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in", default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub schema: PrimitiveSchema,
}

/// Object schema of a JSON request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Property schemas in document order.
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ObjectSchema {
    /// Iterate properties in document order.
    ///
    /// A property whose schema is not an object is reported with an empty
    /// schema instead of failing.
    pub fn properties(&self) -> impl Iterator<Item = (&str, PrimitiveSchema)> {
        self.properties.iter().map(|(name, schema)| {
            let schema = serde_json::from_value(schema.clone()).unwrap_or_default();
            (name.as_str(), schema)
        })
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<ObjectSchema>,
}

/// A request body, keyed by media type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default)]
    pub content: Map<String, Value>,
}

impl RequestBody {
    pub const JSON: &'static str = "application/json";

    /// The `application/json` object schema, if the body declares one.
    pub fn json_schema(&self) -> Option<ObjectSchema> {
        let media = self.content.get(Self::JSON)?;
        let media: MediaType = serde_json::from_value(media.clone()).ok()?;
        media.schema
    }
}

/// One method + path entry of the description.
#[derive(Debug, Clone)]
pub struct Operation {
    pub method: HttpMethod,
    pub path: String,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    servers: Vec<Server>,
    #[serde(default)]
    paths: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawOperation {
    #[serde(rename = "operationId")]
    operation_id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    #[serde(default)]
    parameters: Vec<Value>,
    #[serde(rename = "requestBody")]
    request_body: Option<RequestBody>,
}

/// An OpenAPI-style API description.
///
/// Operations are kept in document order: path order first, then method
/// order within each path item.
#[derive(Debug, Clone)]
pub struct ApiDescription {
    servers: Vec<Server>,
    operations: Vec<Operation>,
}

impl ApiDescription {
    /// Load a description from a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            Some("yaml" | "yml") => Self::from_yaml(&content),
            other => Err(SchemaError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: Value =
            serde_yaml::from_str(yaml).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Build a description from an already-parsed document.
    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawDocument =
            serde_json::from_value(value).map_err(|e| SchemaError::Parse(e.to_string()))?;

        let mut operations = Vec::new();
        for (path, item) in raw.paths {
            let Value::Object(item) = item else {
                warn!(%path, "skipping path item that is not an object");
                continue;
            };
            for (key, op) in item {
                // Path items also hold shared parameters, summaries and extensions.
                let Some(method) = HttpMethod::from_key(&key) else {
                    continue;
                };
                let raw: RawOperation = serde_json::from_value(op)
                    .map_err(|e| SchemaError::Parse(format!("{method} {path}: {e}")))?;
                operations.push(Operation {
                    method,
                    path: path.clone(),
                    operation_id: raw.operation_id,
                    summary: raw.summary,
                    description: raw.description,
                    parameters: parse_parameters(raw.parameters, method, &path),
                    request_body: raw.request_body,
                });
            }
        }

        Ok(Self {
            servers: raw.servers,
            operations,
        })
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    /// The URL of the first declared server.
    pub fn base_url(&self) -> Result<&str> {
        self.servers
            .first()
            .map(|s| s.url.as_str())
            .ok_or(SchemaError::MissingServer)
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Find an operation by its dispatch key.
    pub fn operation(&self, operation_id: &str) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|op| op.operation_id.as_deref() == Some(operation_id))
    }
}

fn parse_parameters(raw: Vec<Value>, method: HttpMethod, path: &str) -> Vec<Parameter> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_value::<Parameter>(value) {
            Ok(param) => Some(param),
            Err(e) => {
                warn!(%method, %path, error = %e, "skipping unsupported parameter");
                None
            }
        })
        .collect()
}
