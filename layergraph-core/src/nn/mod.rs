// src/nn/mod.rs
// Layer contract, the variant registry and the concrete layers.

pub mod init;
pub mod layer;
pub mod layers;
pub mod registry;

// Re-export common items
pub use init::Initializer;
pub use layer::{Layer, LayerBase};
pub use layers::BatchDuplicateLayer;
pub use registry::{create_layer, LayerRegistry};
