//! Opaque pipeline descriptor forwarded to the processing server
//!
//! The server defines the schema; this core passes the document through
//! unchanged as the `prompt` field of the offer request and never inspects
//! or validates its contents.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::Result;

/// Server-defined processing-pipeline descriptor
///
/// Serializes transparently as the wrapped JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineSpec(Value);

impl PipelineSpec {
    /// Wrap an already-parsed descriptor
    pub fn new(spec: Value) -> Self {
        Self(spec)
    }

    /// Parse a descriptor from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(Self(serde_json::from_str(text)?))
    }

    /// Borrow the underlying document
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl Default for PipelineSpec {
    /// Pass-through pipeline: load the sampled frame and preview it.
    /// Works against a stock server when the caller supplies nothing.
    fn default() -> Self {
        Self(json!({
            "12": {
                "inputs": { "image": "sampled_frame.jpg", "upload": "image" },
                "class_type": "LoadImage",
                "_meta": { "title": "Load Image" }
            },
            "13": {
                "inputs": { "images": ["12", 0] },
                "class_type": "PreviewImage",
                "_meta": { "title": "Preview Image" }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_passthrough_graph() {
        let spec = PipelineSpec::default();
        let value = spec.as_value();
        assert_eq!(value["12"]["class_type"], "LoadImage");
        assert_eq!(value["13"]["class_type"], "PreviewImage");
    }

    #[test]
    fn test_serializes_transparently() {
        let spec = PipelineSpec::new(json!({"a": 1}));
        let text = serde_json::to_string(&spec).unwrap();
        assert_eq!(text, r#"{"a":1}"#);
    }

    #[test]
    fn test_from_json_round_trip() {
        let spec = PipelineSpec::from_json(r#"{"node": {"class_type": "Blur"}}"#).unwrap();
        assert_eq!(spec.as_value()["node"]["class_type"], "Blur");
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(PipelineSpec::from_json("not json").is_err());
    }
}
