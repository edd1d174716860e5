use serde::Serialize;

use super::prediction_types::PredictionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppState {
    #[default]
    Idle,
    Calculating,
    Success,
    Error,
}

/// Display data for one result card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardView {
    pub is_primary: bool,
    pub label: &'static str,
    pub length_mm: String,
    pub confidence_caption: String,
    /// Width of the confidence bar, clamped to 0..=100.
    pub confidence_bar: f64,
}

impl CardView {
    pub fn from_result(result: &PredictionResult, is_primary: bool) -> Self {
        CardView {
            is_primary,
            label: result.kind.label(),
            length_mm: format!("{} mm", result.length),
            confidence_caption: format!("{}% confidence", result.confidence),
            confidence_bar: result.confidence.clamp(0.0, 100.0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FormSnapshot {
    pub state: AppState,
    pub input: String,
    pub results: Vec<PredictionResult>,
    pub cards: Vec<CardView>,
    pub validation_message: Option<String>,
    pub error: Option<String>,
}
