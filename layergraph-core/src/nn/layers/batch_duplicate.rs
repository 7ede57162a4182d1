use log::debug;

use crate::error::LayerGraphError;
use crate::nn::layer::{Layer, LayerBase};
use crate::node::Node;
use crate::setting::{SettingMap, SettingValue};
use crate::types::LayerType;
use crate::utils::rng::SharedRng;

/// Repeats every batch row `dup_count` times.
///
/// Bottom row `i` becomes top rows `[i * dup_count, (i + 1) * dup_count)` in
/// both the data and the length buffer. Backprop sums the diffs of those top
/// rows back into bottom row `i`.
///
/// Settings: `dup_count` (int, required, > 0).
#[derive(Debug)]
pub struct BatchDuplicateLayer {
    base: LayerBase,
    dup_count: usize,
    nbatch: usize,
    top_nbatch: usize,
}

impl BatchDuplicateLayer {
    pub fn new() -> Self {
        BatchDuplicateLayer {
            base: LayerBase::new(LayerType::BatchDuplicate),
            dup_count: 0,
            nbatch: 0,
            top_nbatch: 0,
        }
    }

    pub fn dup_count(&self) -> usize {
        self.dup_count
    }

    fn parse_dup_count(&self, settings: &SettingMap) -> Result<usize, LayerGraphError> {
        let count = crate::setting::get_setting(settings, &self.base.layer_name, "dup_count")?
            .as_int()?;
        if count <= 0 {
            return Err(LayerGraphError::InvalidSetting {
                key: "dup_count".to_string(),
                message: format!("BatchDuplicateLayer: dup_count need > 0, got {}", count),
            });
        }
        usize::try_from(count).map_err(|_| LayerGraphError::InvalidSetting {
            key: "dup_count".to_string(),
            message: format!("BatchDuplicateLayer: dup_count {} is too large", count),
        })
    }

    // Bottom is read while top is written; one node cannot be both.
    fn check_not_in_place(&self, bottom: &Node, top: &Node, operation: &str) -> Result<(), LayerGraphError> {
        if bottom.ptr_eq(top) {
            return Err(LayerGraphError::InvalidSetting {
                key: "top_nodes".to_string(),
                message: format!(
                    "BatchDuplicateLayer {}: '{}' cannot run in place",
                    operation, self.base.layer_name
                ),
            });
        }
        Ok(())
    }

    fn check_buffers(&self, bottom: &Node, top: &Node, operation: &str) -> Result<(), LayerGraphError> {
        self.check_not_in_place(bottom, top, operation)?;
        let b = bottom.read()?;
        let t = top.read()?;
        let [bn, c, h, w] = b.shape();
        let expected = [self.top_nbatch, c, h, w];
        if bn != self.nbatch || t.shape() != expected {
            return Err(LayerGraphError::ShapeMismatch {
                expected: expected.to_vec(),
                actual: t.shape().to_vec(),
                operation: format!("BatchDuplicateLayer {} (bottom batch {})", operation, bn),
            });
        }
        Ok(())
    }
}

impl Default for BatchDuplicateLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer for BatchDuplicateLayer {
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
        0
    }

    fn require(&mut self) {
        // No default: the caller must set it
        self.base
            .defaults
            .insert("dup_count".to_string(), SettingValue::None);
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
        self.check_not_in_place(&bottom[0], &top[0], "setup")?;
        let settings = self.base.resolve_settings(settings)?;
        let dup_count = self.parse_dup_count(&settings)?;

        self.base.configure(settings, rng)?;
        self.dup_count = dup_count;
        Ok(())
    }

    fn reshape(&mut self, bottom: &[Node], top: &[Node]) -> Result<(), LayerGraphError> {
        self.base.ensure_configured("reshape")?;
        self.check_arity(bottom, top)?;
        self.check_not_in_place(&bottom[0], &top[0], "reshape")?;

        let (shape, length_cols) = {
            let b = bottom[0].read()?;
            (b.shape(), b.length_shape()[1])
        };
        let [nbatch, c, h, w] = shape;
        let top_nbatch = nbatch
            .checked_mul(self.dup_count)
            .ok_or_else(|| LayerGraphError::ShapeMismatch {
                expected: vec![nbatch, c, h, w],
                actual: vec![nbatch, self.dup_count],
                operation: format!(
                    "BatchDuplicateLayer reshape: batch {} x dup_count {} overflows",
                    nbatch, self.dup_count
                ),
            })?;
        top[0].resize([top_nbatch, c, h, w], [top_nbatch, length_cols], true)?;

        self.nbatch = nbatch;
        self.top_nbatch = top_nbatch;
        self.base.mark_shaped(Some(nbatch));

        debug!("{}: bottom0 {}", self.base.layer_name, bottom[0].read()?.shape_string());
        debug!("{}: top0 {}", self.base.layer_name, top[0].read()?.shape_string());
        Ok(())
    }

    fn forward(&mut self, bottom: &[Node], top: &[Node]) -> Result<(), LayerGraphError> {
        self.base.ensure_shaped("forward")?;
        self.check_arity(bottom, top)?;
        self.check_buffers(&bottom[0], &top[0], "forward")?;

        let b = bottom[0].read()?;
        let mut t = top[0].write()?;
        if b.length.ncols() != t.length.ncols() || t.length.nrows() != self.top_nbatch {
            return Err(LayerGraphError::ShapeMismatch {
                expected: vec![self.top_nbatch, b.length.ncols()],
                actual: vec![t.length.nrows(), t.length.ncols()],
                operation: "BatchDuplicateLayer forward (length)".to_string(),
            });
        }
        let bottom_data = b.data_d2()?;
        {
            let mut top_data = t.data_d2_mut()?;
            for i in 0..self.nbatch {
                for k in 0..self.dup_count {
                    top_data
                        .row_mut(i * self.dup_count + k)
                        .assign(&bottom_data.row(i));
                }
            }
        }
        for i in 0..self.nbatch {
            for k in 0..self.dup_count {
                t.length
                    .row_mut(i * self.dup_count + k)
                    .assign(&b.length.row(i));
            }
        }
        Ok(())
    }

    fn backprop(&mut self, bottom: &[Node], top: &[Node]) -> Result<(), LayerGraphError> {
        self.base.ensure_shaped("backprop")?;
        self.check_arity(bottom, top)?;
        if !self.base.propagates_error(0) {
            return Ok(());
        }
        self.check_buffers(&bottom[0], &top[0], "backprop")?;

        let t = top[0].read()?;
        let mut b = bottom[0].write()?;
        let top_diff = t.diff_d2()?;
        let mut bottom_diff = b.diff_d2_mut()?;
        for i in 0..self.nbatch {
            let mut row = bottom_diff.row_mut(i);
            for k in 0..self.dup_count {
                row += &top_diff.row(i * self.dup_count + k);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "batch_duplicate_test.rs"]
mod tests;
