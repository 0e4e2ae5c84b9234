//! Finalized response bodies shared by the pipeline, the observer, and the
//! HTTP layer.

use serde::Serialize;
use serde_json::Value;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Body written to the client, either a decoded JSON document or opaque text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Json(_) => None,
            ResponseBody::Text(text) => Some(text),
        }
    }

    /// Serialize for the wire: JSON documents compactly, text verbatim.
    pub fn render(&self) -> String {
        match self {
            ResponseBody::Json(value) => value.to_string(),
            ResponseBody::Text(text) => text.clone(),
        }
    }
}

impl From<Value> for ResponseBody {
    fn from(value: Value) -> Self {
        ResponseBody::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_keeps_document_key_order() {
        let body = ResponseBody::Json(json!({"id": 1, "name": "a"}));
        assert_eq!(body.render(), r#"{"id":1,"name":"a"}"#);
    }

    #[test]
    fn render_text_verbatim() {
        let body = ResponseBody::Text("<h1>hi</h1>\n".to_string());
        assert_eq!(body.render(), "<h1>hi</h1>\n");
        assert!(body.as_json().is_none());
    }
}
