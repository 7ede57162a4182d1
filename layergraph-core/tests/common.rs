use layergraph_core::{Node, NodeData};

// Shared by several integration test crates; not every crate uses every helper.
#[allow(dead_code)]
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Node of shape `(rows.len(), 1, 1, width)` whose row `i` is `rows[i]` and
/// whose length column holds `i + 1`.
#[allow(dead_code)]
pub fn node_from_rows(name: &str, rows: &[Vec<f32>]) -> Node {
    let width = rows.first().map_or(0, |r| r.len());
    let mut data = NodeData::new(name);
    data.resize([rows.len(), 1, 1, width], [rows.len(), 1], true)
        .expect("Test node sizing failed");
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    data.set_data(&flat).expect("Test node creation failed");
    for i in 0..rows.len() {
        data.length[[i, 0]] = (i + 1) as f32;
    }
    Node::from_data(data)
}

#[allow(dead_code)]
pub fn rows_of(values: &[f32], width: usize) -> Vec<Vec<f32>> {
    values.chunks(width).map(|c| c.to_vec()).collect()
}
