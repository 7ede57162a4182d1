// src/node.rs

use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ndarray::{Array2, Array4, ArrayView2, ArrayViewMut2};

use crate::error::LayerGraphError;

/// Storage behind a [`Node`].
///
/// `data` and `diff` always share one 4-D shape `(batch, channel, height, width)`;
/// `length` holds per-row sequence metadata with one row per batch entry.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub name: String,
    /// Primary values.
    pub data: Array4<f32>,
    /// Gradient accumulator, same shape as `data`.
    pub diff: Array4<f32>,
    /// Sequence lengths or other per-row metadata.
    pub length: Array2<f32>,
}

impl NodeData {
    pub fn new(name: impl Into<String>) -> Self {
        NodeData {
            name: name.into(),
            data: Array4::zeros((0, 0, 0, 0)),
            diff: Array4::zeros((0, 0, 0, 0)),
            length: Array2::zeros((0, 0)),
        }
    }

    /// Returns `[batch, channel, height, width]`.
    pub fn shape(&self) -> [usize; 4] {
        let d = self.data.dim();
        [d.0, d.1, d.2, d.3]
    }

    pub fn length_shape(&self) -> [usize; 2] {
        let d = self.length.dim();
        [d.0, d.1]
    }

    pub fn batch_size(&self) -> usize {
        self.data.dim().0
    }

    /// Number of values in one batch row (`channel * height * width`).
    pub fn row_size(&self) -> usize {
        let [_, c, h, w] = self.shape();
        c * h * w
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Resizes data and diff to `shape` and the length buffer to `length_shape`.
    ///
    /// Buffers whose shape already matches keep their contents unless `init`
    /// is set, in which case every buffer is zero-filled.
    ///
    /// Fails without touching any buffer when either shape is too large to
    /// allocate.
    pub fn resize(
        &mut self,
        shape: [usize; 4],
        length_shape: [usize; 2],
        init: bool,
    ) -> Result<(), LayerGraphError> {
        for dims in [&shape[..], &length_shape[..]] {
            if checked_numel(dims).is_none() {
                return Err(LayerGraphError::ShapeMismatch {
                    expected: vec![isize::MAX as usize / std::mem::size_of::<f32>()],
                    actual: dims.to_vec(),
                    operation: format!("resize of node '{}' (buffer too large)", self.name),
                });
            }
        }
        let [n, c, h, w] = shape;
        if self.shape() != shape {
            self.data = Array4::zeros((n, c, h, w));
            self.diff = Array4::zeros((n, c, h, w));
        } else if init {
            self.data.fill(0.0);
            self.diff.fill(0.0);
        }
        if self.length_shape() != length_shape {
            self.length = Array2::zeros((length_shape[0], length_shape[1]));
        } else if init {
            self.length.fill(0.0);
        }
        Ok(())
    }

    /// 2-D `(batch, row_size)` view of the data buffer.
    pub fn data_d2(&self) -> Result<ArrayView2<'_, f32>, LayerGraphError> {
        let rows = (self.batch_size(), self.row_size());
        self.data
            .view()
            .into_shape(rows)
            .map_err(|e| flatten_error(&self.name, "data_d2", e))
    }

    pub fn data_d2_mut(&mut self) -> Result<ArrayViewMut2<'_, f32>, LayerGraphError> {
        let rows = (self.batch_size(), self.row_size());
        let name = self.name.clone();
        self.data
            .view_mut()
            .into_shape(rows)
            .map_err(|e| flatten_error(&name, "data_d2_mut", e))
    }

    pub fn diff_d2(&self) -> Result<ArrayView2<'_, f32>, LayerGraphError> {
        let rows = (self.batch_size(), self.row_size());
        self.diff
            .view()
            .into_shape(rows)
            .map_err(|e| flatten_error(&self.name, "diff_d2", e))
    }

    pub fn diff_d2_mut(&mut self) -> Result<ArrayViewMut2<'_, f32>, LayerGraphError> {
        let rows = (self.batch_size(), self.row_size());
        let name = self.name.clone();
        self.diff
            .view_mut()
            .into_shape(rows)
            .map_err(|e| flatten_error(&name, "diff_d2_mut", e))
    }

    /// Overwrites the data buffer. `values` is row-major over the current shape.
    pub fn set_data(&mut self, values: &[f32]) -> Result<(), LayerGraphError> {
        if values.len() != self.numel() {
            return Err(LayerGraphError::ShapeMismatch {
                expected: self.shape().to_vec(),
                actual: vec![values.len()],
                operation: format!("set_data on node '{}'", self.name),
            });
        }
        for (dst, src) in self.data.iter_mut().zip(values) {
            *dst = *src;
        }
        Ok(())
    }

    /// Adds `delta` into the gradient buffer.
    pub fn accumulate_diff(&mut self, delta: &Array4<f32>) -> Result<(), LayerGraphError> {
        if delta.dim() != self.diff.dim() {
            let d = delta.dim();
            return Err(LayerGraphError::ShapeMismatch {
                expected: self.shape().to_vec(),
                actual: vec![d.0, d.1, d.2, d.3],
                operation: format!("accumulate_diff on node '{}'", self.name),
            });
        }
        self.diff += delta;
        Ok(())
    }

    pub fn zero_diff(&mut self) {
        self.diff.fill(0.0);
    }

    /// Data values in row-major order.
    pub fn data_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }

    pub fn diff_vec(&self) -> Vec<f32> {
        self.diff.iter().copied().collect()
    }

    pub fn shape_string(&self) -> String {
        let [n, c, h, w] = self.shape();
        let [ln, lc] = self.length_shape();
        format!(
            "{}: data ({}, {}, {}, {}) length ({}, {})",
            self.name, n, c, h, w, ln, lc
        )
    }
}

fn flatten_error(name: &str, op: &str, err: ndarray::ShapeError) -> LayerGraphError {
    LayerGraphError::ShapeMismatch {
        expected: vec![],
        actual: vec![],
        operation: format!("{} on node '{}': {}", op, name, err),
    }
}

/// Shared handle to a buffer passed between layers.
///
/// `Node` uses `Arc<RwLock<NodeData>>` so the producing layer and every
/// consumer hold the same storage. Cloning a `Node` clones the handle.
///
/// Gradient buffers are accumulated by every consumer during backprop, so the
/// scheduler must call [`Node::zero_diff`] (or [`zero_all_diffs`]) once before
/// each backward sweep.
#[derive(Clone)]
pub struct Node {
    pub(crate) inner: Arc<RwLock<NodeData>>,
}

impl Node {
    /// Creates an empty node; the producing layer sizes it during reshape.
    pub fn new(name: impl Into<String>) -> Self {
        Node::from_data(NodeData::new(name))
    }

    /// Creates a zero-filled node of the given shape with a `(batch, 1)` length buffer.
    pub fn with_shape(name: impl Into<String>, shape: [usize; 4]) -> Result<Self, LayerGraphError> {
        let mut data = NodeData::new(name);
        data.resize(shape, [shape[0], 1], true)?;
        Ok(Node::from_data(data))
    }

    pub fn from_data(data: NodeData) -> Self {
        Node {
            inner: Arc::new(RwLock::new(data)),
        }
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, NodeData>, LayerGraphError> {
        self.inner.read().map_err(|_| LayerGraphError::LockError {
            lock_type: "read".to_string(),
            reason: "node lock poisoned".to_string(),
        })
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, NodeData>, LayerGraphError> {
        self.inner.write().map_err(|_| LayerGraphError::LockError {
            lock_type: "write".to_string(),
            reason: "node lock poisoned".to_string(),
        })
    }

    pub fn name(&self) -> Result<String, LayerGraphError> {
        Ok(self.read()?.name.clone())
    }

    pub fn shape(&self) -> Result<[usize; 4], LayerGraphError> {
        Ok(self.read()?.shape())
    }

    pub fn batch_size(&self) -> Result<usize, LayerGraphError> {
        Ok(self.read()?.batch_size())
    }

    pub fn resize(
        &self,
        shape: [usize; 4],
        length_shape: [usize; 2],
        init: bool,
    ) -> Result<(), LayerGraphError> {
        self.write()?.resize(shape, length_shape, init)
    }

    pub fn zero_diff(&self) -> Result<(), LayerGraphError> {
        self.write()?.zero_diff();
        Ok(())
    }

    /// True when both handles refer to the same storage.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.read() {
            Ok(guard) => write!(f, "Node({})", guard.shape_string()),
            Err(_) => write!(f, "Node(<poisoned>)"),
        }
    }
}

/// Element count of a buffer with dimensions `dims`, or `None` when an `f32`
/// buffer of that shape cannot be addressed (the byte size of the non-zero
/// axes must fit `isize`).
pub fn checked_numel(dims: &[usize]) -> Option<usize> {
    let addressable = dims
        .iter()
        .filter(|&&d| d != 0)
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))?;
    let bytes = addressable.checked_mul(std::mem::size_of::<f32>())?;
    if bytes > isize::MAX as usize {
        return None;
    }
    Some(dims.iter().product())
}

/// Zeroes the gradient buffer of every node. Run once before a backward sweep.
pub fn zero_all_diffs(nodes: &[Node]) -> Result<(), LayerGraphError> {
    for node in nodes {
        node.zero_diff()?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "node_test.rs"]
mod tests;
