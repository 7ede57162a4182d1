use rand::distributions::{Distribution, Uniform};
use rand_distr::Normal;

use crate::error::LayerGraphError;
use crate::node::NodeData;
use crate::setting::{SettingMap, SettingValue};
use crate::utils::rng::SharedRng;

/// How a parameter node is filled at setup.
///
/// Configured through a nested map setting, e.g.
/// `"w_filler": {"init_type": "gaussian", "mean": 0.0, "sigma": 0.01}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Initializer {
    Zero,
    Constant(f32),
    /// Uniform in `[-range, range]`.
    Uniform { range: f32 },
    Gaussian { mean: f32, sigma: f32 },
    /// Glorot uniform with `fan_in = width`, `fan_out = height`.
    Xavier,
}

impl Initializer {
    pub fn from_setting(value: &SettingValue) -> Result<Self, LayerGraphError> {
        let map = value.as_map()?;
        let init_type = map
            .get("init_type")
            .ok_or_else(|| invalid("init_type", "missing"))?
            .as_str()?;
        match init_type {
            "zero" => Ok(Initializer::Zero),
            "constant" => Ok(Initializer::Constant(float_or(map, "value", 0.0)?)),
            "uniform" => {
                let range = float_or(map, "range", 0.0)?;
                if !(range >= 0.0) || !range.is_finite() {
                    return Err(invalid("range", "must be finite and >= 0"));
                }
                Ok(Initializer::Uniform { range })
            }
            "gaussian" => {
                let mean = float_or(map, "mean", 0.0)?;
                let sigma = float_or(map, "sigma", 1.0)?;
                if !(sigma >= 0.0) || !sigma.is_finite() {
                    return Err(invalid("sigma", "must be finite and >= 0"));
                }
                Ok(Initializer::Gaussian { mean, sigma })
            }
            "xavier" => Ok(Initializer::Xavier),
            other => Err(invalid("init_type", &format!("unknown initializer '{}'", other))),
        }
    }

    pub fn to_setting(&self) -> SettingValue {
        let map = match *self {
            Initializer::Zero => crate::settings! { "init_type" => "zero" },
            Initializer::Constant(value) => {
                crate::settings! { "init_type" => "constant", "value" => value }
            }
            Initializer::Uniform { range } => {
                crate::settings! { "init_type" => "uniform", "range" => range }
            }
            Initializer::Gaussian { mean, sigma } => {
                crate::settings! { "init_type" => "gaussian", "mean" => mean, "sigma" => sigma }
            }
            Initializer::Xavier => crate::settings! { "init_type" => "xavier" },
        };
        SettingValue::Map(map)
    }

    /// Overwrites the data buffer of `node`.
    pub fn fill(&self, node: &mut NodeData, rng: &SharedRng) -> Result<(), LayerGraphError> {
        match *self {
            Initializer::Zero => node.data.fill(0.0),
            Initializer::Constant(value) => node.data.fill(value),
            Initializer::Uniform { range } => sample_uniform(node, range, rng)?,
            Initializer::Gaussian { mean, sigma } => {
                let normal = Normal::new(mean, sigma)
                    .map_err(|e| invalid("sigma", &e.to_string()))?;
                let mut rng = lock(rng)?;
                node.data.iter_mut().for_each(|v| *v = normal.sample(&mut *rng));
            }
            Initializer::Xavier => {
                let [_, _, fan_out, fan_in] = node.shape();
                let denom = (fan_in + fan_out).max(1) as f32;
                sample_uniform(node, (6.0 / denom).sqrt(), rng)?;
            }
        }
        Ok(())
    }
}

fn sample_uniform(node: &mut NodeData, range: f32, rng: &SharedRng) -> Result<(), LayerGraphError> {
    let dist = Uniform::new_inclusive(-range, range);
    let mut rng = lock(rng)?;
    node.data.iter_mut().for_each(|v| *v = dist.sample(&mut *rng));
    Ok(())
}

fn lock(rng: &SharedRng) -> Result<std::sync::MutexGuard<'_, rand::rngs::StdRng>, LayerGraphError> {
    rng.lock().map_err(|_| LayerGraphError::LockError {
        lock_type: "mutex".to_string(),
        reason: "random generator lock poisoned".to_string(),
    })
}

fn float_or(map: &SettingMap, key: &str, default: f32) -> Result<f32, LayerGraphError> {
    match map.get(key) {
        None => Ok(default),
        // Integer literals are accepted for float fields
        Some(SettingValue::Int(v)) => Ok(*v as f32),
        Some(value) => value.as_float(),
    }
}

fn invalid(key: &str, message: &str) -> LayerGraphError {
    LayerGraphError::InvalidSetting {
        key: key.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
#[path = "init_test.rs"]
mod tests;
