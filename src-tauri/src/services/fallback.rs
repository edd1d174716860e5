//! Arithmetic stand-in for the classifier.
//!
//! The slope was calibrated so that a 175 cm patient lands on 330 mm. The
//! confidences are fixed placeholders, not statistics.

use crate::models::prediction_types::{PredictionResult, ResultKind};

const MM_PER_CM: f64 = 1.89;
const STEP_MM: f64 = 15.0;
const MIN_LENGTH_MM: f64 = 240.0;
const MAX_LENGTH_MM: f64 = 480.0;

const STANDARD_CONFIDENCE: f64 = 92.5;
const SHORT_CONFIDENCE: f64 = 85.0;
const LONG_CONFIDENCE: f64 = 72.0;

/// Primary length for `height_cm`, snapped to the 15 mm grid and clamped to
/// the classifier's range.
pub fn standard_length(height_cm: f64) -> u32 {
    let raw = height_cm * MM_PER_CM;
    let snapped = (raw / STEP_MM).round() * STEP_MM;
    snapped.clamp(MIN_LENGTH_MM, MAX_LENGTH_MM) as u32
}

/// Three ranked results: standard, one step shorter, one step longer.
///
/// Only the standard length is clamped, so the short and long variants can
/// fall outside 240..=480 at the extremes.
pub fn estimate(height_cm: f64) -> [PredictionResult; 3] {
    let length = standard_length(height_cm);
    let step = STEP_MM as u32;

    [
        PredictionResult {
            rank: 1,
            diameter: None,
            length,
            confidence: STANDARD_CONFIDENCE,
            kind: ResultKind::SimulatedStandard,
        },
        PredictionResult {
            rank: 2,
            diameter: None,
            length: length.saturating_sub(step),
            confidence: SHORT_CONFIDENCE,
            kind: ResultKind::SimulatedShort,
        },
        PredictionResult {
            rank: 3,
            diameter: None,
            length: length + step,
            confidence: LONG_CONFIDENCE,
            kind: ResultKind::SimulatedLong,
        },
    ]
}
