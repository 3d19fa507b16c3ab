//! Translation of API operations into model-facing tool definitions.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::description::{ApiDescription, Operation, PrimitiveSchema};
use crate::{Result, SchemaError};

/// How a parameter and a request body property with the same name are merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The request body property replaces the parameter.
    #[default]
    BodyWins,
    /// Translation fails with [`SchemaError::NameCollision`].
    Reject,
}

/// Flat JSON object schema of a tool's arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: Map<String, Value>,
    pub required: Vec<String>,
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self {
            kind: "object".to_string(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }
}

impl ParameterSchema {
    fn insert(&mut self, name: &str, schema: &PrimitiveSchema) {
        let value = serde_json::to_value(schema).unwrap_or_else(|_| json!({}));
        self.properties.insert(name.to_string(), value);
    }

    fn require(&mut self, name: &str) {
        if !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
    }
}

/// A callable function exposed to the model, one per operation.
///
/// `name` is the operation's `operationId` and doubles as the dispatch key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

impl ToolDefinition {
    /// Render in the `{"type": "function", "function": {..}}` shape.
    pub fn to_function_json(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Converts API operations into tool definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Translator {
    collision: CollisionPolicy,
}

impl Translator {
    pub fn new(collision: CollisionPolicy) -> Self {
        Self { collision }
    }

    /// Translate every operation, in document order.
    ///
    /// Fails on the first operation without an `operationId` and on any
    /// `operationId` declared twice; no partial tool set is returned.
    pub fn translate(&self, description: &ApiDescription) -> Result<Vec<ToolDefinition>> {
        let mut seen = HashSet::new();
        let mut tools = Vec::with_capacity(description.operations().len());

        for operation in description.operations() {
            let tool = self.translate_operation(operation)?;
            if !seen.insert(tool.name.clone()) {
                return Err(SchemaError::DuplicateOperationId(tool.name));
            }
            tools.push(tool);
        }

        debug!(count = tools.len(), "translated operations into tools");
        Ok(tools)
    }

    /// Translate a single operation.
    pub fn translate_operation(&self, operation: &Operation) -> Result<ToolDefinition> {
        let name = operation
            .operation_id
            .clone()
            .ok_or_else(|| SchemaError::MissingOperationId {
                method: operation.method.to_string(),
                path: operation.path.clone(),
            })?;
        debug!(operation_id = %name, "translating operation");

        let mut schema = ParameterSchema::default();

        for param in &operation.parameters {
            let param_schema = PrimitiveSchema {
                description: param
                    .description
                    .clone()
                    .or_else(|| param.schema.description.clone()),
                ..param.schema.clone()
            };
            schema.insert(&param.name, &param_schema);
            if param.required {
                schema.require(&param.name);
            }
        }

        let body = operation
            .request_body
            .as_ref()
            .and_then(|body| body.json_schema());
        if let Some(body) = body {
            for (prop, prop_schema) in body.properties() {
                let collides = operation.parameters.iter().any(|p| p.name == prop);
                if collides && self.collision == CollisionPolicy::Reject {
                    return Err(SchemaError::NameCollision {
                        operation_id: name,
                        name: prop.to_string(),
                    });
                }
                schema.insert(prop, &prop_schema);
                if body.is_required(prop) {
                    schema.require(prop);
                }
            }
        }

        let description = operation
            .summary
            .clone()
            .or_else(|| operation.description.clone())
            .unwrap_or_default();

        Ok(ToolDefinition {
            name,
            description,
            parameters: schema,
        })
    }
}

/// Translate with the default collision policy.
pub fn translate(description: &ApiDescription) -> Result<Vec<ToolDefinition>> {
    Translator::default().translate(description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn describe(paths: Value) -> ApiDescription {
        ApiDescription::from_value(json!({
            "servers": [{ "url": "http://localhost" }],
            "paths": paths,
        }))
        .unwrap()
    }

    fn property(tool: &ToolDefinition, name: &str) -> Option<PrimitiveSchema> {
        let value = tool.parameters.properties.get(name)?;
        serde_json::from_value(value.clone()).ok()
    }

    fn single(paths: Value) -> ToolDefinition {
        let tools = translate(&describe(paths)).unwrap();
        assert_eq!(tools.len(), 1);
        tools.into_iter().next().unwrap()
    }

    #[test]
    fn merges_parameters_and_body() {
        let tool = single(json!({
            "/appointments": {
                "post": {
                    "operationId": "CreateAppointment",
                    "summary": "Book a visit",
                    "parameters": [
                        { "name": "propertyId", "in": "query", "required": true,
                          "description": "Listing code", "schema": { "type": "string" } },
                        { "name": "source", "in": "query", "schema": { "type": "string", "enum": ["web", "chat"] } }
                    ],
                    "requestBody": { "content": { "application/json": { "schema": {
                        "type": "object",
                        "properties": {
                            "email": { "type": "string" },
                            "slot": { "type": "integer", "enum": [9, 10, 11] }
                        },
                        "required": ["email"]
                    }}}}
                }
            }
        }));

        assert_eq!(tool.name, "CreateAppointment");
        assert_eq!(tool.description, "Book a visit");
        assert_eq!(tool.parameters.kind, "object");
        let names: Vec<_> = tool.parameters.properties.keys().cloned().collect();
        assert_eq!(names, ["propertyId", "source", "email", "slot"]);
        assert_eq!(tool.parameters.required, ["propertyId", "email"]);

        let source = property(&tool, "source").unwrap();
        assert_eq!(source.values, Some(vec![json!("web"), json!("chat")]));
        let slot = property(&tool, "slot").unwrap();
        assert_eq!(slot.kind.as_deref(), Some("integer"));
        assert_eq!(slot.values, Some(vec![json!(9), json!(10), json!(11)]));
        assert_eq!(
            property(&tool, "propertyId").unwrap().description.as_deref(),
            Some("Listing code")
        );
    }

    #[test]
    fn parameter_descriptions_reach_the_tool_schema() {
        let tool = single(json!({
            "/imoveis": {
                "get": {
                    "operationId": "searchListings",
                    "parameters": [
                        { "name": "cidade", "in": "query", "description": "Cidade do imóvel",
                          "schema": { "type": "string", "description": "ignored" } },
                        { "name": "quartos", "in": "query",
                          "schema": { "type": "integer", "description": "Número de quartos" } },
                        { "name": "page", "in": "query", "schema": { "type": "integer" } }
                    ]
                }
            }
        }));

        let properties = &tool.parameters.properties;
        assert_eq!(
            properties["cidade"],
            json!({ "type": "string", "description": "Cidade do imóvel" })
        );
        assert_eq!(
            properties["quartos"],
            json!({ "type": "integer", "description": "Número de quartos" })
        );
        assert_eq!(properties["page"], json!({ "type": "integer" }));
    }

    #[test]
    fn body_property_wins_on_collision() {
        let tool = single(json!({
            "/items": {
                "put": {
                    "operationId": "updateItem",
                    "parameters": [{ "name": "id", "in": "query", "required": true, "schema": { "type": "string" } }],
                    "requestBody": { "content": { "application/json": { "schema": {
                        "type": "object",
                        "properties": { "id": { "type": "integer" } }
                    }}}}
                }
            }
        }));

        assert_eq!(tool.parameters.properties.len(), 1);
        assert_eq!(property(&tool, "id").unwrap().kind.as_deref(), Some("integer"));
        assert_eq!(tool.parameters.required, ["id"]);
    }

    #[test]
    fn reject_policy_fails_on_collision() {
        let desc = describe(json!({
            "/items": {
                "put": {
                    "operationId": "updateItem",
                    "parameters": [{ "name": "id", "in": "query", "schema": { "type": "string" } }],
                    "requestBody": { "content": { "application/json": { "schema": {
                        "properties": { "id": { "type": "integer" } }
                    }}}}
                }
            }
        }));

        let err = Translator::new(CollisionPolicy::Reject)
            .translate(&desc)
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::NameCollision { ref operation_id, ref name }
                if operation_id == "updateItem" && name == "id"
        ));
    }

    #[test]
    fn operation_without_inputs_has_empty_schema() {
        let tool = single(json!({ "/widgets": { "get": { "operationId": "listWidgets" } } }));
        assert_eq!(tool.description, "");
        assert!(tool.parameters.properties.is_empty());
        assert!(tool.parameters.required.is_empty());
    }

    #[test]
    fn non_json_body_contributes_nothing() {
        let tool = single(json!({
            "/upload": {
                "post": {
                    "operationId": "upload",
                    "requestBody": { "content": { "multipart/form-data": { "schema": {
                        "type": "object", "properties": { "file": { "type": "string" } }
                    }}}}
                }
            }
        }));
        assert!(tool.parameters.properties.is_empty());
    }

    #[test]
    fn json_body_without_schema_contributes_nothing() {
        let tool = single(json!({
            "/ping": {
                "post": {
                    "operationId": "ping",
                    "requestBody": { "content": { "application/json": {} } }
                }
            }
        }));
        assert!(tool.parameters.properties.is_empty());
    }

    #[test]
    fn missing_operation_id_fails() {
        let desc = describe(json!({ "/widgets": { "get": { "summary": "no id" } } }));
        let err = translate(&desc).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::MissingOperationId { ref method, ref path }
                if method == "GET" && path == "/widgets"
        ));
    }

    #[test]
    fn duplicate_operation_id_fails() {
        let desc = describe(json!({
            "/a": { "get": { "operationId": "same" } },
            "/b": { "get": { "operationId": "same" } }
        }));
        assert!(matches!(
            translate(&desc),
            Err(SchemaError::DuplicateOperationId(id)) if id == "same"
        ));
    }

    #[test]
    fn description_falls_back_to_operation_description() {
        let tool = single(json!({
            "/slots": { "get": { "operationId": "GetSlots", "description": "Free visit slots" } }
        }));
        assert_eq!(tool.description, "Free visit slots");
    }

    #[test]
    fn function_json_shape() {
        let tool = single(json!({ "/widgets": { "get": { "operationId": "listWidgets", "summary": "List" } } }));
        assert_eq!(
            tool.to_function_json(),
            json!({
                "type": "function",
                "function": {
                    "name": "listWidgets",
                    "description": "List",
                    "parameters": { "type": "object", "properties": {}, "required": [] }
                }
            })
        );
    }
}
