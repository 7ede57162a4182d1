use super::*;
use crate::error::LayerGraphError;
use crate::setting::{SettingMap, SettingValue};
use approx::assert_relative_eq;
use serde_json::json;

fn every_tag() -> SettingMap {
    let inner = crate::settings! {
        "init_type" => "gaussian",
        "sigma" => 0.01f32,
        "deep" => crate::settings! { "flag" => true },
    };
    crate::settings! {
        "count" => 3,
        "rate" => 0.1f32,
        "shared" => false,
        "name" => "w",
        "w_filler" => inner,
    }
}

#[test]
fn test_settings_round_trip_all_tags() {
    let settings = every_tag();
    let encoded = encode_settings(&settings).unwrap();
    let decoded = decode_settings(&encoded).unwrap();
    assert_eq!(decoded, settings);
}

#[test]
fn test_settings_round_trip_through_json_text() {
    let settings = every_tag();
    let text = serde_json::to_string(&encode_settings(&settings).unwrap()).unwrap();
    let parsed: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&text).unwrap();
    assert_eq!(decode_settings(&parsed).unwrap(), settings);
}

#[test]
fn test_whole_float_stays_float() {
    let settings = crate::settings! { "scale" => 2.0f32 };
    let text = serde_json::to_string(&encode_settings(&settings).unwrap()).unwrap();
    let parsed: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&text).unwrap();
    assert_eq!(decode_settings(&parsed).unwrap()["scale"], SettingValue::Float(2.0));
}

#[test]
fn test_none_values_are_not_written() {
    let mut settings = SettingMap::new();
    settings.insert("required".to_string(), SettingValue::None);
    settings.insert("x".to_string(), SettingValue::Int(1));
    let encoded = encode_settings(&settings).unwrap();
    assert_eq!(encoded.len(), 1);
    assert!(encoded.contains_key("x"));
}

#[test]
fn test_non_finite_float_rejected() {
    let settings = crate::settings! { "bad" => f32::NAN };
    assert!(matches!(
        encode_settings(&settings),
        Err(LayerGraphError::InvalidSetting { .. })
    ));
}

#[test]
fn test_decode_skips_arrays_and_nulls() {
    let root = json!({
        "a": [1, 2, 3],
        "b": null,
        "c": 4,
        "nested": {"d": [true], "e": "x"}
    });
    let decoded = decode_settings(root.as_object().unwrap()).unwrap();
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded["c"], SettingValue::Int(4));
    let nested = decoded["nested"].as_map().unwrap();
    assert_eq!(nested.len(), 1);
    assert_eq!(nested["e"], SettingValue::String("x".to_string()));
}

#[test]
fn test_decode_rejects_out_of_range_integer() {
    let root = json!({ "big": u64::MAX });
    assert!(matches!(
        decode_settings(root.as_object().unwrap()),
        Err(LayerGraphError::MalformedDocument { .. })
    ));
}

#[test]
fn test_param_document_restores_shape_and_values() {
    let values: Vec<f32> = (0..12).map(|i| i as f32 * 0.25 - 1.0).collect();
    let doc = ParamDocument {
        shape: [1, 1, 3, 4],
        value: values.clone(),
    };
    let node = doc.to_node(0, "param0").unwrap();
    let guard = node.read().unwrap();
    assert_eq!(guard.shape(), [1, 1, 3, 4]);
    for (a, e) in guard.data_vec().iter().zip(values.iter()) {
        assert_relative_eq!(*a, *e);
    }
    assert_eq!(ParamDocument::from_node(&guard), doc);
}

#[test]
fn test_param_document_length_mismatch_is_corruption() {
    let doc = ParamDocument {
        shape: [1, 1, 3, 4],
        value: vec![0.0; 11],
    };
    assert_eq!(
        doc.to_node(2, "p").unwrap_err(),
        LayerGraphError::CorruptParameter {
            index: 2,
            shape: [1, 1, 3, 4],
            expected: 12,
            actual: 11,
        }
    );
}

#[test]
fn test_param_document_overflowing_shape_is_corruption() {
    // 2^63 * 2 wraps to 0 and would match an empty value list
    for shape in [[usize::MAX, 2, 1, 1], [1usize << 63, 2, 1, 1], [1 << 40, 1 << 40, 1, 1]] {
        let doc = ParamDocument { shape, value: vec![] };
        assert_eq!(doc.numel(), None);
        let err = doc.to_node(0, "p").unwrap_err();
        assert!(matches!(err, LayerGraphError::CorruptParameter { index: 0, actual: 0, .. }));
    }
}

#[test]
fn test_param_document_oversized_shape_from_json() {
    let doc = LayerDocument::from_json_str(
        r#"{"layer_type": 11, "layer_name": "fc", "layer_idx": 0,
            "param": [{"shape": [18446744073709551615, 2, 1, 1], "value": [0.5]}]}"#,
    )
    .unwrap();
    let params = doc.param.unwrap();
    assert_eq!(params[0].shape[0], usize::MAX);
    assert!(matches!(
        params[0].to_node(0, "fc.param0"),
        Err(LayerGraphError::CorruptParameter { .. })
    ));
}

#[test]
fn test_layer_document_json_shape() {
    let doc = LayerDocument::from_json_str(
        r#"{
            "layer_type": 27,
            "layer_name": "dup",
            "layer_idx": 1,
            "bottom_nodes": ["x"],
            "top_nodes": ["y"],
            "setting": {"dup_count": 3}
        }"#,
    )
    .unwrap();
    assert_eq!(doc.layer_type, 27);
    assert!(doc.param.is_none());

    let value = doc.to_value().unwrap();
    assert!(value.get("param").is_none());
    assert_eq!(value["bottom_nodes"], json!(["x"]));
}

#[test]
fn test_layer_document_null_param_is_absent() {
    let doc = LayerDocument::from_value(json!({
        "layer_type": 1, "layer_name": "r", "layer_idx": 0,
        "bottom_nodes": [], "top_nodes": [], "setting": {}, "param": null
    }))
    .unwrap();
    assert!(doc.param.is_none());
}

#[test]
fn test_layer_document_malformed_shape() {
    let err = LayerDocument::from_value(json!({
        "layer_type": 1, "layer_name": "r", "layer_idx": 0,
        "param": [{"shape": [1, 2, 3], "value": [0.0]}]
    }))
    .unwrap_err();
    assert!(err.is_configuration_error());
}
