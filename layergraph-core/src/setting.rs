// src/setting.rs

use std::collections::BTreeMap;
use std::fmt;

use crate::error::LayerGraphError;

/// Settings of one layer, keyed by setting name.
///
/// Ordered so that persisted documents are deterministic.
pub type SettingMap = BTreeMap<String, SettingValue>;

/// A single configuration value.
///
/// `None` is only meaningful as a declared default: it marks a key the caller
/// must supply. The `Map` variant owns its nested settings, which is how
/// structured options (e.g. parameter initialisers) are expressed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SettingValue {
    #[default]
    None,
    Int(i64),
    Float(f32),
    Bool(bool),
    String(String),
    Map(SettingMap),
}

impl SettingValue {
    /// Name of the variant, used in type-mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            SettingValue::None => "none",
            SettingValue::Int(_) => "int",
            SettingValue::Float(_) => "float",
            SettingValue::Bool(_) => "bool",
            SettingValue::String(_) => "string",
            SettingValue::Map(_) => "map",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, SettingValue::None)
    }

    fn mismatch(&self, expected: &'static str) -> LayerGraphError {
        LayerGraphError::SettingTypeMismatch {
            expected,
            actual: self.type_name(),
        }
    }

    pub fn as_int(&self) -> Result<i64, LayerGraphError> {
        match self {
            SettingValue::Int(v) => Ok(*v),
            other => Err(other.mismatch("int")),
        }
    }

    pub fn as_float(&self) -> Result<f32, LayerGraphError> {
        match self {
            SettingValue::Float(v) => Ok(*v),
            other => Err(other.mismatch("float")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, LayerGraphError> {
        match self {
            SettingValue::Bool(v) => Ok(*v),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_str(&self) -> Result<&str, LayerGraphError> {
        match self {
            SettingValue::String(v) => Ok(v),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_map(&self) -> Result<&SettingMap, LayerGraphError> {
        match self {
            SettingValue::Map(v) => Ok(v),
            other => Err(other.mismatch("map")),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::None => write!(f, "<required>"),
            SettingValue::Int(v) => write!(f, "{}", v),
            SettingValue::Float(v) => write!(f, "{}", v),
            SettingValue::Bool(v) => write!(f, "{}", v),
            SettingValue::String(v) => write!(f, "{:?}", v),
            SettingValue::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        SettingValue::Int(v)
    }
}

impl From<i32> for SettingValue {
    fn from(v: i32) -> Self {
        SettingValue::Int(i64::from(v))
    }
}

impl From<f32> for SettingValue {
    fn from(v: f32) -> Self {
        SettingValue::Float(v)
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Bool(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::String(v.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(v: String) -> Self {
        SettingValue::String(v)
    }
}

impl From<SettingMap> for SettingValue {
    fn from(v: SettingMap) -> Self {
        SettingValue::Map(v)
    }
}

/// Looks up `key`, failing with `MissingSetting` when it is absent.
pub fn get_setting<'a>(
    settings: &'a SettingMap,
    layer: &str,
    key: &str,
) -> Result<&'a SettingValue, LayerGraphError> {
    settings
        .get(key)
        .filter(|v| !v.is_none())
        .ok_or_else(|| LayerGraphError::MissingSetting {
            layer: layer.to_string(),
            key: key.to_string(),
        })
}

/// Merges declared `defaults` into `settings`.
///
/// Keys already supplied by the caller win. A default of `SettingValue::None`
/// marks a mandatory key; if the caller did not supply it the merge fails and
/// `settings` is left untouched.
pub fn apply_defaults(
    settings: &mut SettingMap,
    defaults: &SettingMap,
    layer: &str,
) -> Result<(), LayerGraphError> {
    if let Some((key, _)) = defaults
        .iter()
        .find(|(key, value)| value.is_none() && settings.get(*key).map_or(true, |v| v.is_none()))
    {
        return Err(LayerGraphError::MissingSetting {
            layer: layer.to_string(),
            key: key.clone(),
        });
    }
    for (key, value) in defaults {
        if !settings.contains_key(key) {
            settings.insert(key.clone(), value.clone());
        }
    }
    Ok(())
}

/// Builds a `SettingMap` from `key => value` pairs.
///
/// ```
/// use layergraph_core::settings;
/// let s = settings! { "dup_count" => 3, "phrase_type" => 2 };
/// assert_eq!(s["dup_count"].as_int().unwrap(), 3);
/// ```
#[macro_export]
macro_rules! settings {
    () => { $crate::setting::SettingMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::setting::SettingMap::new();
        $( map.insert(($key).to_string(), $crate::setting::SettingValue::from($value)); )+
        map
    }};
}

#[cfg(test)]
#[path = "setting_test.rs"]
mod tests;
