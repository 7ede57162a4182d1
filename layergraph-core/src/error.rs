use thiserror::Error;

/// Custom error type for the LayerGraph framework.
///
/// Every variant is fatal for the layer that raised it: the surrounding graph
/// executor decides whether to abort construction or training.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum LayerGraphError {
    #[error("Missing required setting '{key}' for layer '{layer}'")]
    MissingSetting { layer: String, key: String },

    #[error("Invalid value for setting '{key}': {message}")]
    InvalidSetting { key: String, message: String },

    #[error("Setting type mismatch: expected {expected}, found {actual}")]
    SettingTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Malformed model document field '{field}': {message}")]
    MalformedDocument { field: String, message: String },

    #[error("Unknown layer type id {0}")]
    UnknownLayerType(i64),

    #[error("No constructor registered for layer type {0}")]
    UnregisteredLayer(String),

    #[error("{layer}: expected {expected} {role} nodes, got {actual}")]
    ArityMismatch {
        layer: String,
        role: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("{layer}: {operation} called before setup_layer")]
    NotConfigured { layer: String, operation: String },

    #[error("{layer}: {operation} called before the layer was reshaped")]
    NotReshaped { layer: String, operation: String },

    #[error("Corrupt parameter {index}: shape {shape:?} needs {expected} values, found {actual}")]
    CorruptParameter {
        index: usize,
        shape: [usize; 4],
        expected: usize,
        actual: usize,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Failed to acquire {lock_type} lock: {reason}")]
    LockError { lock_type: String, reason: String },
}

impl LayerGraphError {
    /// True for missing/invalid settings and malformed documents.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            LayerGraphError::MissingSetting { .. }
                | LayerGraphError::InvalidSetting { .. }
                | LayerGraphError::MalformedDocument { .. }
                | LayerGraphError::UnknownLayerType(_)
                | LayerGraphError::UnregisteredLayer(_)
        )
    }

    /// True for arity mismatches, buffer shape incompatibilities and use of
    /// a layer before its setup or reshape.
    pub fn is_shape_error(&self) -> bool {
        matches!(
            self,
            LayerGraphError::ArityMismatch { .. }
                | LayerGraphError::ShapeMismatch { .. }
                | LayerGraphError::NotConfigured { .. }
                | LayerGraphError::NotReshaped { .. }
        )
    }
}

impl From<serde_json::Error> for LayerGraphError {
    fn from(err: serde_json::Error) -> Self {
        LayerGraphError::Serialization(err.to_string())
    }
}
