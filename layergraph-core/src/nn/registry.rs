use std::collections::HashMap;

use log::{debug, warn};

use crate::document::LayerDocument;
use crate::error::LayerGraphError;
use crate::nn::layer::Layer;
use crate::nn::layers::register_builtin_layers;
use crate::types::LayerType;

/// Builds a fresh, unconfigured layer.
pub type LayerConstructor = fn() -> Box<dyn Layer>;

/// Maps layer types to constructors.
#[derive(Default)]
pub struct LayerRegistry {
    constructors: HashMap<LayerType, LayerConstructor>,
}

impl LayerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every layer shipped with this crate.
    pub fn with_builtin_layers() -> Self {
        let mut registry = Self::new();
        register_builtin_layers(&mut registry);
        registry
    }

    /// Registers `constructor` for `layer_type`, returning any constructor it
    /// replaces.
    pub fn register(
        &mut self,
        layer_type: LayerType,
        constructor: LayerConstructor,
    ) -> Option<LayerConstructor> {
        let previous = self.constructors.insert(layer_type, constructor);
        if previous.is_some() {
            warn!("LayerRegistry: replacing constructor for {}", layer_type);
        } else {
            debug!("LayerRegistry: registered {}", layer_type);
        }
        previous
    }

    pub fn contains(&self, layer_type: LayerType) -> bool {
        self.constructors.contains_key(&layer_type)
    }

    /// Registered types in id order.
    pub fn registered_types(&self) -> Vec<LayerType> {
        let mut types: Vec<LayerType> = self.constructors.keys().copied().collect();
        types.sort();
        types
    }

    pub fn create(&self, layer_type: LayerType) -> Result<Box<dyn Layer>, LayerGraphError> {
        let constructor = self
            .constructors
            .get(&layer_type)
            .ok_or_else(|| LayerGraphError::UnregisteredLayer(layer_type.to_string()))?;
        Ok(constructor())
    }

    /// Instantiates the layer a document describes and loads it. The layer
    /// still needs `setup_layer` with its bound nodes.
    pub fn create_from_document(
        &self,
        doc: &LayerDocument,
    ) -> Result<Box<dyn Layer>, LayerGraphError> {
        let layer_type = LayerType::from_id(doc.layer_type)?;
        let mut layer = self.create(layer_type)?;
        layer.load_model(doc)?;
        Ok(layer)
    }
}

/// Creates a built-in layer of the given type.
pub fn create_layer(layer_type: LayerType) -> Result<Box<dyn Layer>, LayerGraphError> {
    LayerRegistry::with_builtin_layers().create(layer_type)
}
