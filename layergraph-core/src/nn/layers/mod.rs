pub mod batch_duplicate;

pub use batch_duplicate::BatchDuplicateLayer;

use crate::nn::layer::Layer;
use crate::nn::registry::LayerRegistry;
use crate::types::LayerType;

/// Registers every layer variant shipped with this crate.
pub fn register_builtin_layers(registry: &mut LayerRegistry) {
    registry.register(LayerType::BatchDuplicate, || {
        Box::new(BatchDuplicateLayer::new()) as Box<dyn Layer>
    });
}
