use std::fmt::Debug;

use log::debug;

use crate::document::{decode_settings, encode_settings, LayerDocument, ParamDocument};
use crate::error::LayerGraphError;
use crate::nn::init::Initializer;
use crate::node::Node;
use crate::setting::{apply_defaults, get_setting, SettingMap, SettingValue};
use crate::types::{LayerType, Phase};
use crate::utils::rng::SharedRng;

/// Setting key holding the layer's [`Phase`] id.
pub const PHASE_KEY: &str = "phrase_type";

/// State shared by every layer variant: identity, topology, settings and
/// parameters.
///
/// Variants embed a `LayerBase` and expose it through [`Layer::base`]; the
/// provided trait methods (persistence, reshape caching, `prop_all`) work on
/// it directly.
#[derive(Debug, Clone)]
pub struct LayerBase {
    pub layer_type: LayerType,
    pub phase: Phase,
    pub layer_name: String,
    pub layer_idx: i64,
    /// Names of the input nodes, resolved by the graph builder.
    pub bottom_nodes: Vec<String>,
    pub top_nodes: Vec<String>,
    pub settings: SettingMap,
    /// Declared settings. `SettingValue::None` marks a mandatory key.
    pub defaults: SettingMap,
    pub params: Vec<Node>,
    /// Per bottom: whether error propagates back through it.
    pub prop_error: Vec<bool>,
    /// Per parameter: whether its gradient is computed.
    pub prop_grad: Vec<bool>,
    rng: Option<SharedRng>,
    configured: bool,
    shaped: bool,
    cached_batch: Option<usize>,
}

impl LayerBase {
    pub fn new(layer_type: LayerType) -> Self {
        LayerBase {
            layer_type,
            phase: Phase::Both,
            layer_name: String::new(),
            layer_idx: 0,
            bottom_nodes: Vec::new(),
            top_nodes: Vec::new(),
            settings: SettingMap::new(),
            defaults: SettingMap::new(),
            params: Vec::new(),
            prop_error: Vec::new(),
            prop_grad: Vec::new(),
            rng: None,
            configured: false,
            shaped: false,
            cached_batch: None,
        }
    }

    /// Sets name, index and node names, as the graph builder does when it
    /// creates a layer without a model document.
    pub fn set_topology(
        &mut self,
        layer_name: impl Into<String>,
        layer_idx: i64,
        bottom_nodes: &[&str],
        top_nodes: &[&str],
    ) {
        self.layer_name = layer_name.into();
        self.layer_idx = layer_idx;
        self.bottom_nodes = bottom_nodes.iter().map(|s| s.to_string()).collect();
        self.top_nodes = top_nodes.iter().map(|s| s.to_string()).collect();
    }

    /// Base requirements, chained to by every variant's `require`.
    pub fn require(&mut self) {
        self.defaults
            .entry(PHASE_KEY.to_string())
            .or_insert(SettingValue::Int(Phase::Both.id()));
    }

    /// Applies declared defaults to caller settings without touching `self`.
    pub fn resolve_settings(&self, settings: SettingMap) -> Result<SettingMap, LayerGraphError> {
        let mut resolved = settings;
        apply_defaults(&mut resolved, &self.defaults, &self.layer_name)?;
        Ok(resolved)
    }

    /// Commits resolved settings and keeps the randomness capability.
    pub fn configure(&mut self, settings: SettingMap, rng: SharedRng) -> Result<(), LayerGraphError> {
        let phase = match settings.get(PHASE_KEY) {
            Some(value) => Phase::from_id(value.as_int()?)?,
            None => Phase::Both,
        };
        debug!(
            "{} '{}': configured with {}",
            self.layer_type,
            self.layer_name,
            SettingValue::Map(settings.clone())
        );
        self.phase = phase;
        self.settings = settings;
        self.rng = Some(rng);
        self.configured = true;
        self.shaped = false;
        self.cached_batch = None;
        Ok(())
    }

    pub fn setting(&self, key: &str) -> Result<&SettingValue, LayerGraphError> {
        get_setting(&self.settings, &self.layer_name, key)
    }

    pub fn rng(&self) -> Option<&SharedRng> {
        self.rng.as_ref()
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn is_shaped(&self) -> bool {
        self.shaped
    }

    pub fn cached_batch(&self) -> Option<usize> {
        self.cached_batch
    }

    /// Records a completed reshape for the given bottom batch size.
    pub fn mark_shaped(&mut self, batch: Option<usize>) {
        self.shaped = true;
        self.cached_batch = batch;
    }

    pub fn ensure_configured(&self, operation: &str) -> Result<(), LayerGraphError> {
        if self.configured {
            Ok(())
        } else {
            Err(LayerGraphError::NotConfigured {
                layer: self.layer_name.clone(),
                operation: operation.to_string(),
            })
        }
    }

    pub fn ensure_shaped(&self, operation: &str) -> Result<(), LayerGraphError> {
        self.ensure_configured(operation)?;
        if self.shaped {
            Ok(())
        } else {
            Err(LayerGraphError::NotReshaped {
                layer: self.layer_name.clone(),
                operation: operation.to_string(),
            })
        }
    }

    /// Whether error flows back into bottom `index`. Layers that never set
    /// flags propagate everywhere.
    pub fn propagates_error(&self, index: usize) -> bool {
        self.prop_error.get(index).copied().unwrap_or(true)
    }

    pub fn propagates_grad(&self, index: usize) -> bool {
        self.prop_grad.get(index).copied().unwrap_or(true)
    }

    pub fn prop_all(&mut self, bottom_num: usize, param_num: usize) {
        self.prop_error = vec![true; bottom_num];
        self.prop_grad = vec![true; param_num];
    }

    /// Appends a parameter node of `shape` filled by `initializer` using the
    /// shared randomness capability.
    pub fn init_param(
        &mut self,
        shape: [usize; 4],
        initializer: &Initializer,
    ) -> Result<(), LayerGraphError> {
        self.ensure_configured("init_param")?;
        let node = Node::with_shape(
            format!("{}.param{}", self.layer_name, self.params.len()),
            shape,
        )?;
        if let Some(rng) = self.rng.as_ref() {
            initializer.fill(&mut *node.write()?, rng)?;
        }
        self.params.push(node);
        Ok(())
    }

    pub fn save_model(&self, include_params: bool) -> Result<LayerDocument, LayerGraphError> {
        let param = if include_params && !self.params.is_empty() {
            let mut list = Vec::with_capacity(self.params.len());
            for node in &self.params {
                list.push(ParamDocument::from_node(&*node.read()?));
            }
            Some(list)
        } else {
            None
        };
        Ok(LayerDocument {
            layer_type: i64::from(self.layer_type.id()),
            layer_name: self.layer_name.clone(),
            layer_idx: self.layer_idx,
            bottom_nodes: self.bottom_nodes.clone(),
            top_nodes: self.top_nodes.clone(),
            setting: encode_settings(&self.settings)?,
            param,
        })
    }

    /// Restores identity, topology, settings and (if present) parameters.
    ///
    /// All fields are validated before anything is assigned.
    pub fn load_model(&mut self, doc: &LayerDocument) -> Result<(), LayerGraphError> {
        let layer_type = LayerType::from_id(doc.layer_type)?;
        if layer_type != self.layer_type && self.layer_type != LayerType::Unknown {
            return Err(LayerGraphError::MalformedDocument {
                field: "layer_type".to_string(),
                message: format!(
                    "document describes {} but layer is {}",
                    layer_type, self.layer_type
                ),
            });
        }
        let settings = decode_settings(&doc.setting)?;
        let params = match &doc.param {
            Some(list) => Some(
                list.iter()
                    .enumerate()
                    .map(|(i, p)| p.to_node(i, format!("{}.param{}", doc.layer_name, i)))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };

        self.layer_type = layer_type;
        self.layer_name = doc.layer_name.clone();
        self.layer_idx = doc.layer_idx;
        self.bottom_nodes = doc.bottom_nodes.clone();
        self.top_nodes = doc.top_nodes.clone();
        self.settings = settings;
        if let Some(params) = params {
            debug!("'{}': loaded {} parameter nodes", self.layer_name, params.len());
            self.params = params;
        }
        Ok(())
    }
}

/// The contract every layer variant implements.
///
/// A layer moves from constructed to configured (`setup_layer`) to shaped
/// (first `reshape`); `forward` and `backprop` are only valid once shaped.
/// Bottom and top nodes are shared with other layers and are never owned by
/// the layer; only its parameter nodes are.
///
/// `backprop` must add into bottom diffs, never overwrite them: a node read by
/// several consumers collects one contribution from each. Zeroing diffs before
/// a backward sweep is the scheduler's job.
pub trait Layer: Debug + Send + Sync {
    fn base(&self) -> &LayerBase;

    fn base_mut(&mut self) -> &mut LayerBase;

    fn bottom_node_num(&self) -> usize;

    fn top_node_num(&self) -> usize;

    fn param_node_num(&self) -> usize;

    /// Declares recognised setting keys and their defaults. Variants insert
    /// their own keys and then chain to `LayerBase::require`.
    fn require(&mut self) {
        self.base_mut().require();
    }

    /// Binds settings and the randomness capability and validates arity and
    /// variant settings.
    fn setup_layer(
        &mut self,
        settings: SettingMap,
        bottom: &[Node],
        top: &[Node],
        rng: SharedRng,
    ) -> Result<(), LayerGraphError>;

    /// Reconstitutes the layer from a model document, then sets it up with
    /// the decoded settings.
    fn setup_layer_from_document(
        &mut self,
        doc: &LayerDocument,
        bottom: &[Node],
        top: &[Node],
        rng: SharedRng,
    ) -> Result<(), LayerGraphError> {
        self.load_model(doc)?;
        let settings = self.base().settings.clone();
        self.setup_layer(settings, bottom, top, rng)
    }

    /// Computes top shapes from bottom shapes and resizes the top nodes.
    /// Implementations record the bottom batch with `LayerBase::mark_shaped`.
    fn reshape(&mut self, bottom: &[Node], top: &[Node]) -> Result<(), LayerGraphError>;

    /// Reshapes only if the bottom batch size changed since the last reshape.
    /// Returns whether `reshape` ran.
    fn check_reshape(&mut self, bottom: &[Node], top: &[Node]) -> Result<bool, LayerGraphError> {
        self.check_arity(bottom, top)?;
        let batch = match bottom.first() {
            Some(node) => Some(node.batch_size()?),
            None => None,
        };
        let base = self.base();
        if base.is_shaped() && batch.is_some() && base.cached_batch() == batch {
            return Ok(false);
        }
        self.reshape(bottom, top)?;
        Ok(true)
    }

    fn forward(&mut self, bottom: &[Node], top: &[Node]) -> Result<(), LayerGraphError>;

    fn backprop(&mut self, bottom: &[Node], top: &[Node]) -> Result<(), LayerGraphError>;

    fn save_model(&self, include_params: bool) -> Result<LayerDocument, LayerGraphError> {
        self.base().save_model(include_params)
    }

    fn load_model(&mut self, doc: &LayerDocument) -> Result<(), LayerGraphError> {
        self.base_mut().load_model(doc)
    }

    fn layer_type(&self) -> LayerType {
        self.base().layer_type
    }

    fn phase(&self) -> Phase {
        self.base().phase
    }

    /// Marks every bottom and every parameter as propagating.
    fn prop_all(&mut self) {
        let (bottom_num, param_num) = (self.bottom_node_num(), self.param_node_num());
        self.base_mut().prop_all(bottom_num, param_num);
    }

    fn params(&self) -> &[Node] {
        &self.base().params
    }

    fn params_mut(&mut self) -> &mut Vec<Node> {
        &mut self.base_mut().params
    }

    /// Fails unless the bound node lists match the declared arity.
    fn check_arity(&self, bottom: &[Node], top: &[Node]) -> Result<(), LayerGraphError> {
        let name = &self.base().layer_name;
        if bottom.len() != self.bottom_node_num() {
            return Err(LayerGraphError::ArityMismatch {
                layer: name.clone(),
                role: "bottom",
                expected: self.bottom_node_num(),
                actual: bottom.len(),
            });
        }
        if top.len() != self.top_node_num() {
            return Err(LayerGraphError::ArityMismatch {
                layer: name.clone(),
                role: "top",
                expected: self.top_node_num(),
                actual: top.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "layer_test.rs"]
mod tests;
