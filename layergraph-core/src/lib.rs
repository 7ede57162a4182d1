//! # layergraph-core
//!
//! The layer abstraction of a computation-graph engine: the contract every
//! layer variant honours (setup, reshape, forward, backprop), variant-typed
//! settings, shared node buffers and the JSON model document each layer is
//! persisted to.
//!
//! ```
//! use layergraph_core::{create_layer, settings, Layer, LayerType, Node};
//! use layergraph_core::utils::rng::seeded_rng;
//!
//! let bottom = Node::with_shape("x", [2, 1, 1, 3]).unwrap();
//! let top = Node::new("x_dup");
//! let mut dup = create_layer(LayerType::BatchDuplicate).unwrap();
//! dup.setup_layer(settings! { "dup_count" => 3 }, &[bottom.clone()], &[top.clone()], seeded_rng(0))
//!     .unwrap();
//! dup.check_reshape(&[bottom.clone()], &[top.clone()]).unwrap();
//! dup.forward(&[bottom], &[top.clone()]).unwrap();
//! assert_eq!(top.shape().unwrap(), [6, 1, 1, 3]);
//! ```

pub mod document;
pub mod error;
pub mod nn;
pub mod node;
pub mod setting;
pub mod types;
pub mod utils;

pub use document::{LayerDocument, ParamDocument};
pub use error::LayerGraphError;
pub use nn::{create_layer, Layer, LayerBase, LayerRegistry};
pub use node::{Node, NodeData};
pub use setting::{SettingMap, SettingValue};
pub use types::{LayerCategory, LayerType, Phase};
