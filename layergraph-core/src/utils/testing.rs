use crate::node::{Node, NodeData};

/// Checks that a node's data buffer has `expected_shape` and values within
/// `tolerance` of `expected_data`.
/// Panics on the first mismatch.
pub fn check_node_near(
    actual: &Node,
    expected_shape: [usize; 4],
    expected_data: &[f32],
    tolerance: f32,
) {
    let guard = actual.read().expect("Failed to read node in check_node_near");
    assert_eq!(guard.shape(), expected_shape, "Shape mismatch");
    check_values_near(&guard.data_vec(), expected_data, tolerance);
}

/// Same as [`check_node_near`] for the gradient buffer.
pub fn check_diff_near(
    actual: &Node,
    expected_shape: [usize; 4],
    expected_data: &[f32],
    tolerance: f32,
) {
    let guard = actual.read().expect("Failed to read node in check_diff_near");
    assert_eq!(guard.shape(), expected_shape, "Shape mismatch");
    check_values_near(&guard.diff_vec(), expected_data, tolerance);
}

pub fn check_values_near(actual: &[f32], expected: &[f32], tolerance: f32) {
    assert_eq!(actual.len(), expected.len(), "Data length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        let diff = (*a - *e).abs();
        if diff > tolerance {
            panic!(
                "Data mismatch at index {}: actual={:?}, expected={:?}, diff={:?}, tolerance={:?}",
                i, a, e, diff, tolerance
            );
        }
    }
}

/// Helper to create a node of `shape` holding `data` (row-major) and a
/// length buffer with one column per row.
pub fn create_test_node(name: &str, data: Vec<f32>, shape: [usize; 4], lengths: &[f32]) -> Node {
    let mut node = NodeData::new(name);
    node.resize(shape, [shape[0], 1], true)
        .expect("Failed to size test node");
    node.set_data(&data).expect("Failed to create test node");
    assert_eq!(lengths.len(), shape[0], "One length per batch row");
    for (row, len) in lengths.iter().enumerate() {
        node.length[[row, 0]] = *len;
    }
    Node::from_data(node)
}
