use super::*;
use crate::document::{LayerDocument, ParamDocument};
use crate::error::LayerGraphError;
use crate::nn::init::Initializer;
use crate::node::Node;
use crate::setting::{SettingMap, SettingValue};
use crate::types::{LayerType, Phase};
use crate::utils::rng::seeded_rng;
use approx::assert_relative_eq;

// Mock layer with one (1, 1, rows, cols) weight: top = bottom row-wise scaled by w[0].
#[derive(Debug)]
struct MockScaleLayer {
    base: LayerBase,
    reshape_calls: usize,
}

impl MockScaleLayer {
    fn new() -> Self {
        MockScaleLayer {
            base: LayerBase::new(LayerType::FullConnect),
            reshape_calls: 0,
        }
    }
}

impl Layer for MockScaleLayer {
    fn base(&self) -> &LayerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut LayerBase {
        &mut self.base
    }

    fn bottom_node_num(&self) -> usize {
        1
    }

    fn top_node_num(&self) -> usize {
        1
    }

    fn param_node_num(&self) -> usize {
        1
    }

    fn require(&mut self) {
        self.base.defaults.insert("rows".to_string(), SettingValue::Int(3));
        self.base.defaults.insert("cols".to_string(), SettingValue::Int(4));
        self.base.defaults.insert(
            "w_filler".to_string(),
            Initializer::Constant(0.5).to_setting(),
        );
        self.base.require();
    }

    fn setup_layer(
        &mut self,
        settings: SettingMap,
        bottom: &[Node],
        top: &[Node],
        rng: SharedRng,
    ) -> Result<(), LayerGraphError> {
        self.require();
        self.check_arity(bottom, top)?;
        let settings = self.base.resolve_settings(settings)?;
        let rows = settings["rows"].as_int()? as usize;
        let cols = settings["cols"].as_int()? as usize;
        let filler = Initializer::from_setting(&settings["w_filler"])?;
        self.base.configure(settings, rng)?;
        if self.base.params.is_empty() {
            self.base.init_param([1, 1, rows, cols], &filler)?;
        }
        self.prop_all();
        Ok(())
    }

    fn reshape(&mut self, bottom: &[Node], top: &[Node]) -> Result<(), LayerGraphError> {
        self.base.ensure_configured("reshape")?;
        self.check_arity(bottom, top)?;
        self.reshape_calls += 1;
        let shape = bottom[0].shape()?;
        top[0].resize(shape, [shape[0], 1], true)?;
        self.base.mark_shaped(Some(shape[0]));
        Ok(())
    }

    fn forward(&mut self, bottom: &[Node], top: &[Node]) -> Result<(), LayerGraphError> {
        self.base.ensure_shaped("forward")?;
        let w = self.base.params[0].read()?.data_vec()[0];
        let values: Vec<f32> = bottom[0].read()?.data_vec().iter().map(|v| v * w).collect();
        top[0].write()?.set_data(&values)
    }

    fn backprop(&mut self, _bottom: &[Node], _top: &[Node]) -> Result<(), LayerGraphError> {
        self.base.ensure_shaped("backprop")
    }
}

fn configured_mock() -> (MockScaleLayer, Node, Node) {
    let bottom = Node::with_shape("in", [2, 1, 1, 2]).unwrap();
    let top = Node::new("out");
    let mut layer = MockScaleLayer::new();
    layer.base_mut().set_topology("scale", 5, &["in"], &["out"]);
    layer
        .setup_layer(
            crate::settings! { "phrase_type" => 0 },
            &[bottom.clone()],
            &[top.clone()],
            seeded_rng(9),
        )
        .unwrap();
    (layer, bottom, top)
}

#[test]
fn test_setup_applies_defaults_and_phase() {
    let (layer, _, _) = configured_mock();
    assert_eq!(layer.phase(), Phase::Train);
    assert_eq!(layer.base().settings["rows"], SettingValue::Int(3));
    assert_eq!(layer.params().len(), 1);
    assert_eq!(layer.params()[0].shape().unwrap(), [1, 1, 3, 4]);
    assert!(layer.params()[0].read().unwrap().data.iter().all(|&v| v == 0.5));
    assert_eq!(layer.base().prop_error, vec![true]);
    assert_eq!(layer.base().prop_grad, vec![true]);
}

#[test]
fn test_invalid_phase_rejected() {
    let mut layer = MockScaleLayer::new();
    let err = layer
        .setup_layer(
            crate::settings! { "phrase_type" => 7 },
            &[Node::new("a")],
            &[Node::new("b")],
            seeded_rng(0),
        )
        .unwrap_err();
    assert!(matches!(err, LayerGraphError::InvalidSetting { .. }));
}

#[test]
fn test_save_model_fields() {
    let (layer, _, _) = configured_mock();
    let doc = layer.save_model(false).unwrap();
    assert_eq!(doc.layer_type, 11);
    assert_eq!(doc.layer_name, "scale");
    assert_eq!(doc.layer_idx, 5);
    assert_eq!(doc.bottom_nodes, vec!["in".to_string()]);
    assert_eq!(doc.top_nodes, vec!["out".to_string()]);
    assert!(doc.param.is_none());
    assert!(doc.setting["w_filler"].is_object());

    let with_params = layer.save_model(true).unwrap();
    let params = with_params.param.unwrap();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].shape, [1, 1, 3, 4]);
    assert_eq!(params[0].value.len(), 12);
}

#[test]
fn test_parameter_round_trip_into_fresh_layer() {
    let (layer, _, _) = configured_mock();
    let values: Vec<f32> = (0..12).map(|i| (i as f32).sin() * 1e-3 + 0.1).collect();
    layer.params()[0].write().unwrap().set_data(&values).unwrap();

    let text = layer.save_model(true).unwrap().to_json_string().unwrap();
    let doc = LayerDocument::from_json_str(&text).unwrap();

    let mut fresh = MockScaleLayer::new();
    fresh.load_model(&doc).unwrap();
    assert_eq!(fresh.params()[0].shape().unwrap(), [1, 1, 3, 4]);
    let restored = fresh.params()[0].read().unwrap().data_vec();
    for (a, e) in restored.iter().zip(values.iter()) {
        assert_relative_eq!(*a, *e, max_relative = 1e-7);
    }
    assert_eq!(fresh.base().settings, layer.base().settings);
    assert_eq!(fresh.base().bottom_nodes, layer.base().bottom_nodes);
    assert_eq!(fresh.base().layer_idx, 5);
}

#[test]
fn test_setup_from_document_keeps_loaded_params() {
    let (layer, _, _) = configured_mock();
    layer.params()[0].write().unwrap().data.fill(2.0);
    let doc = layer.save_model(true).unwrap();

    let bottom = crate::utils::testing::create_test_node("in", vec![1., 2.], [2, 1, 1, 1], &[1., 1.]);
    let top = Node::new("out");
    let mut fresh = MockScaleLayer::new();
    fresh
        .setup_layer_from_document(&doc, &[bottom.clone()], &[top.clone()], seeded_rng(1))
        .unwrap();
    assert_eq!(fresh.phase(), Phase::Train);
    fresh.check_reshape(&[bottom.clone()], &[top.clone()]).unwrap();
    fresh.forward(&[bottom], &[top.clone()]).unwrap();
    assert_eq!(top.read().unwrap().data_vec(), vec![2.0, 4.0]);
}

#[test]
fn test_load_without_param_keeps_none() {
    let mut layer = MockScaleLayer::new();
    let doc = LayerDocument {
        layer_type: 11,
        layer_name: "fc".to_string(),
        layer_idx: 0,
        bottom_nodes: vec![],
        top_nodes: vec![],
        setting: serde_json::Map::new(),
        param: None,
    };
    layer.load_model(&doc).unwrap();
    assert!(layer.params().is_empty());
}

#[test]
fn test_load_corrupt_param_leaves_layer_untouched() {
    let mut layer = MockScaleLayer::new();
    let doc = LayerDocument {
        layer_type: 11,
        layer_name: "fc".to_string(),
        layer_idx: 1,
        bottom_nodes: vec!["a".to_string()],
        top_nodes: vec![],
        setting: serde_json::Map::new(),
        param: Some(vec![ParamDocument {
            shape: [1, 1, 3, 4],
            value: vec![0.0; 5],
        }]),
    };
    let err = layer.load_model(&doc).unwrap_err();
    assert!(matches!(err, LayerGraphError::CorruptParameter { index: 0, .. }));
    assert!(layer.base().layer_name.is_empty());
    assert!(layer.base().bottom_nodes.is_empty());
}

#[test]
fn test_load_rejects_other_layer_type() {
    let mut layer = MockScaleLayer::new();
    let mut doc = layer.save_model(false).unwrap();
    doc.layer_type = LayerType::BatchDuplicate.id() as i64;
    assert!(matches!(
        layer.load_model(&doc),
        Err(LayerGraphError::MalformedDocument { .. })
    ));
}

#[test]
fn test_check_reshape_caches_batch() {
    let (mut layer, bottom, top) = configured_mock();
    assert!(layer.check_reshape(&[bottom.clone()], &[top.clone()]).unwrap());
    assert!(!layer.check_reshape(&[bottom.clone()], &[top.clone()]).unwrap());
    assert_eq!(layer.reshape_calls, 1);

    bottom.resize([3, 1, 1, 2], [3, 1], true).unwrap();
    assert!(layer.check_reshape(&[bottom.clone()], &[top.clone()]).unwrap());
    assert_eq!(layer.reshape_calls, 2);
}

#[test]
fn test_resetup_clears_shaped_state() {
    let (mut layer, bottom, top) = configured_mock();
    layer.check_reshape(&[bottom.clone()], &[top.clone()]).unwrap();
    assert!(layer.base().is_shaped());
    layer
        .setup_layer(SettingMap::new(), &[bottom.clone()], &[top.clone()], seeded_rng(2))
        .unwrap();
    assert!(!layer.base().is_shaped());
    assert!(layer.forward(&[bottom], &[top]).is_err());
}

#[test]
fn test_load_overflowing_param_shape_is_corruption() {
    let mut layer = MockScaleLayer::new();
    let doc = LayerDocument::from_json_str(
        r#"{"layer_type": 11, "layer_name": "fc", "layer_idx": 3,
            "param": [{"shape": [18446744073709551615, 2, 1, 1], "value": []}]}"#,
    )
    .unwrap();
    let err = layer.load_model(&doc).unwrap_err();
    assert!(matches!(err, LayerGraphError::CorruptParameter { index: 0, .. }));
    assert!(layer.base().layer_name.is_empty());
    assert!(layer.params().is_empty());
}
