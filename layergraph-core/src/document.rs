// src/document.rs

//! JSON model documents: the persisted form of one layer.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::LayerGraphError;
use crate::node::{checked_numel, Node, NodeData};
use crate::setting::{SettingMap, SettingValue};

/// Persisted state of one layer.
///
/// ```json
/// {
///   "layer_type": 27, "layer_name": "dup", "layer_idx": 3,
///   "bottom_nodes": ["x"], "top_nodes": ["x_dup"],
///   "setting": {"dup_count": 3, "phrase_type": 2},
///   "param": [{"shape": [1, 1, 3, 4], "value": [0.1, ...]}]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDocument {
    pub layer_type: i64,
    pub layer_name: String,
    pub layer_idx: i64,
    #[serde(default)]
    pub bottom_nodes: Vec<String>,
    #[serde(default)]
    pub top_nodes: Vec<String>,
    #[serde(default)]
    pub setting: Map<String, Value>,
    /// Omitted when the layer has no parameters or they were not requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<Vec<ParamDocument>>,
}

/// One parameter node: a fixed 4-D shape and its values in row-major order
/// (last dimension fastest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDocument {
    pub shape: [usize; 4],
    pub value: Vec<f32>,
}

impl LayerDocument {
    pub fn from_json_str(text: &str) -> Result<Self, LayerGraphError> {
        serde_json::from_str(text).map_err(malformed)
    }

    pub fn from_value(value: Value) -> Result<Self, LayerGraphError> {
        serde_json::from_value(value).map_err(malformed)
    }

    pub fn to_value(&self) -> Result<Value, LayerGraphError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_string(&self) -> Result<String, LayerGraphError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_string_pretty(&self) -> Result<String, LayerGraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn malformed(err: serde_json::Error) -> LayerGraphError {
    LayerGraphError::MalformedDocument {
        field: "<document>".to_string(),
        message: err.to_string(),
    }
}

impl ParamDocument {
    /// Value count the shape calls for, or `None` when the shape is too
    /// large to allocate.
    pub fn numel(&self) -> Option<usize> {
        checked_numel(&self.shape)
    }

    /// Captures the shape and data of a parameter node.
    pub fn from_node(node: &NodeData) -> Self {
        ParamDocument {
            shape: node.shape(),
            value: node.data_vec(),
        }
    }

    /// Rebuilds parameter `index`, resized to the persisted shape.
    pub fn to_node(&self, index: usize, name: impl Into<String>) -> Result<Node, LayerGraphError> {
        let corrupt = |expected| LayerGraphError::CorruptParameter {
            index,
            shape: self.shape,
            expected,
            actual: self.value.len(),
        };
        let expected = self.numel().ok_or_else(|| corrupt(usize::MAX))?;
        if expected != self.value.len() {
            return Err(corrupt(expected));
        }
        let mut data = NodeData::new(name);
        data.resize(self.shape, [self.shape[0], 1], true)?;
        data.set_data(&self.value)?;
        Ok(Node::from_data(data))
    }
}

/// Encodes settings into a document object.
///
/// `None` values are declared-but-unset requirements and are not written.
pub fn encode_settings(settings: &SettingMap) -> Result<Map<String, Value>, LayerGraphError> {
    let mut root = Map::new();
    for (key, value) in settings {
        let encoded = match value {
            SettingValue::None => continue,
            SettingValue::Int(v) => Value::from(*v),
            SettingValue::Float(v) => {
                let number = Number::from_f64(f64::from(*v)).ok_or_else(|| {
                    LayerGraphError::InvalidSetting {
                        key: key.clone(),
                        message: format!("non-finite float {} cannot be persisted", v),
                    }
                })?;
                Value::Number(number)
            }
            SettingValue::Bool(v) => Value::Bool(*v),
            SettingValue::String(v) => Value::String(v.clone()),
            SettingValue::Map(m) => Value::Object(encode_settings(m)?),
        };
        root.insert(key.clone(), encoded);
    }
    Ok(root)
}

/// Decodes a document object into settings.
///
/// Array and null entries have no setting representation and are skipped.
pub fn decode_settings(root: &Map<String, Value>) -> Result<SettingMap, LayerGraphError> {
    let mut settings = SettingMap::new();
    for (key, value) in root {
        let decoded = match value {
            Value::Number(n) => decode_number(key, n)?,
            Value::Bool(b) => SettingValue::Bool(*b),
            Value::String(s) => SettingValue::String(s.clone()),
            Value::Object(m) => SettingValue::Map(decode_settings(m)?),
            Value::Array(_) | Value::Null => {
                warn!("Skipping setting '{}': arrays and nulls are not supported", key);
                continue;
            }
        };
        settings.insert(key.clone(), decoded);
    }
    Ok(settings)
}

fn decode_number(key: &str, n: &Number) -> Result<SettingValue, LayerGraphError> {
    if let Some(i) = n.as_i64() {
        return Ok(SettingValue::Int(i));
    }
    if n.is_u64() {
        return Err(LayerGraphError::MalformedDocument {
            field: format!("setting.{}", key),
            message: format!("integer {} out of range", n),
        });
    }
    match n.as_f64() {
        Some(f) => Ok(SettingValue::Float(f as f32)),
        None => Err(LayerGraphError::MalformedDocument {
            field: format!("setting.{}", key),
            message: format!("unrepresentable number {}", n),
        }),
    }
}

#[cfg(test)]
#[path = "document_test.rs"]
mod tests;
