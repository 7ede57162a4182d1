use std::fmt;

use crate::error::LayerGraphError;

/// Broad family a layer type belongs to, following the id ranges of the
/// persisted `layer_type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerCategory {
    /// Id 0, also used for connections sharing an existing layer.
    Unknown,
    /// Ids 1-10.
    Activation,
    /// Ids 11-50.
    Common,
    /// Ids 51-70.
    Loss,
    /// Ids 71 and above.
    Input,
}

/// Identifies a layer variant.
///
/// The discriminants are the integers stored in model documents and must
/// never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum LayerType {
    Unknown = 0,

    // Activation 1-10
    RectifiedLinear = 1,
    Sigmoid = 2,
    Tanh = 3,

    // Common 11-50
    FullConnect = 11,
    Flatten = 12,
    Dropout = 13,
    Conv = 14,
    MaxPooling = 15,
    SumPooling = 16,
    AvgPooling = 17,
    Concat = 18,
    ChConcat = 19,
    Split = 20,
    Embedding = 21,
    Cross = 22,
    Match = 23,
    Lstm = 24,
    WholeMaxPooling = 25,
    WholeAvePooling = 26,
    BatchDuplicate = 27,

    // Loss 51-70
    Softmax = 51,
    L2Loss = 52,
    MultiLogistic = 53,
    HingeLoss = 54,
    PairHingeLoss = 55,
    Accuracy = 56,

    // Input 71-
    TextData = 71,
    SequenceClassificationData = 72,
    NextBasketData = 73,
}

impl LayerType {
    pub const ALL: [LayerType; 30] = [
        LayerType::Unknown,
        LayerType::RectifiedLinear,
        LayerType::Sigmoid,
        LayerType::Tanh,
        LayerType::FullConnect,
        LayerType::Flatten,
        LayerType::Dropout,
        LayerType::Conv,
        LayerType::MaxPooling,
        LayerType::SumPooling,
        LayerType::AvgPooling,
        LayerType::Concat,
        LayerType::ChConcat,
        LayerType::Split,
        LayerType::Embedding,
        LayerType::Cross,
        LayerType::Match,
        LayerType::Lstm,
        LayerType::WholeMaxPooling,
        LayerType::WholeAvePooling,
        LayerType::BatchDuplicate,
        LayerType::Softmax,
        LayerType::L2Loss,
        LayerType::MultiLogistic,
        LayerType::HingeLoss,
        LayerType::PairHingeLoss,
        LayerType::Accuracy,
        LayerType::TextData,
        LayerType::SequenceClassificationData,
        LayerType::NextBasketData,
    ];

    /// The integer written to the `layer_type` document field.
    pub fn id(self) -> i32 {
        self as i32
    }

    /// Parses a persisted `layer_type` id.
    pub fn from_id(id: i64) -> Result<Self, LayerGraphError> {
        LayerType::ALL
            .iter()
            .copied()
            .find(|ty| i64::from(ty.id()) == id)
            .ok_or(LayerGraphError::UnknownLayerType(id))
    }

    pub fn category(self) -> LayerCategory {
        match self.id() {
            0 => LayerCategory::Unknown,
            1..=10 => LayerCategory::Activation,
            11..=50 => LayerCategory::Common,
            51..=70 => LayerCategory::Loss,
            _ => LayerCategory::Input,
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.id())
    }
}

/// Execution mode a layer participates in.
///
/// Stored in the `phrase_type` setting as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    Train = 0,
    Test = 1,
    #[default]
    Both = 2,
}

impl Phase {
    pub fn id(self) -> i64 {
        self as i64
    }

    pub fn from_id(id: i64) -> Result<Self, LayerGraphError> {
        match id {
            0 => Ok(Phase::Train),
            1 => Ok(Phase::Test),
            2 => Ok(Phase::Both),
            other => Err(LayerGraphError::InvalidSetting {
                key: "phrase_type".to_string(),
                message: format!("unknown phase id {}", other),
            }),
        }
    }

    /// Whether a layer tagged with `self` runs during `current`.
    pub fn is_active_in(self, current: Phase) -> bool {
        self == Phase::Both || current == Phase::Both || self == current
    }
}
