use serde::{Deserialize, Serialize};

/// Label shown on a result card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultKind {
    #[serde(rename = "Recommended")]
    Recommended,
    #[serde(rename = "Alternative 1")]
    FirstAlternative,
    #[serde(rename = "Alternative 2")]
    SecondAlternative,
    #[serde(rename = "Simulation (Standard)")]
    SimulatedStandard,
    #[serde(rename = "Simulation (Short)")]
    SimulatedShort,
    #[serde(rename = "Simulation (Long)")]
    SimulatedLong,
}

impl ResultKind {
    /// Label for the classifier result at zero-based position `index`.
    pub fn for_classifier_rank(index: usize) -> Self {
        match index {
            0 => ResultKind::Recommended,
            1 => ResultKind::FirstAlternative,
            _ => ResultKind::SecondAlternative,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResultKind::Recommended => "Recommended",
            ResultKind::FirstAlternative => "Alternative 1",
            ResultKind::SecondAlternative => "Alternative 2",
            ResultKind::SimulatedStandard => "Simulation (Standard)",
            ResultKind::SimulatedShort => "Simulation (Short)",
            ResultKind::SimulatedLong => "Simulation (Long)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// 1-based, in descending confidence order.
    pub rank: u8,
    /// Always `None`: the classifier only predicts length.
    pub diameter: Option<f64>,
    /// Nail length in millimetres.
    pub length: u32,
    /// Percentage in 0..=100, one decimal place.
    pub confidence: f64,
    #[serde(rename = "type")]
    pub kind: ResultKind,
}

/// Why a prediction was served by the arithmetic estimator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum FallbackReason {
    NoModel,
    InferenceFailed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    Classifier,
    Fallback(FallbackReason),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub results: Vec<PredictionResult>,
    pub source: PredictionSource,
}

impl Prediction {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, PredictionSource::Fallback(_))
    }
}
