//! HTTP request construction from operation metadata.

use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::description::{HttpMethod, Operation};

pub const CONTENT_TYPE: &str = "Content-Type";
pub const APPLICATION_JSON: &str = "application/json";

/// A fully built request, ready to be sent by any HTTP client.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Build the request for `operation` with the model-supplied `args`.
///
/// Operations with a request body (other than GET) get every argument as a
/// JSON body, undeclared ones included. All other operations get the
/// arguments as a query string in argument order. The path template is used
/// as written; path variables are not substituted.
pub fn build(operation: &Operation, base_url: &str, args: &Map<String, Value>) -> HttpRequest {
    let mut url = format!("{}{}", base_url.trim_end_matches('/'), operation.path);

    let sends_body = operation.method != HttpMethod::Get && operation.request_body.is_some();
    if sends_body {
        return HttpRequest {
            method: operation.method,
            url,
            headers: vec![(CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string())],
            body: Some(Value::Object(args.clone())),
        };
    }

    if !args.is_empty() {
        url.push('?');
        url.push_str(&query_string(args));
    }

    HttpRequest {
        method: operation.method,
        url,
        headers: Vec::new(),
        body: None,
    }
}

/// Form-encode arguments, keeping their order.
pub fn query_string(args: &Map<String, Value>) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(args.iter().map(|(k, v)| (k, query_value(v))))
        .finish()
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(query_value).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}
