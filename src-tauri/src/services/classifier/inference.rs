use crate::error::AppError;
use crate::models::prediction_types::{PredictionResult, ResultKind};
use crate::services::classifier::mapping::{length_for_class, CLASS_COUNT};
use crate::services::classifier::network::DenseNetwork;
use ndarray::Array2;

pub const TOP_K: usize = 3;

/// Rejects networks that cannot serve height → length predictions.
pub fn ensure_compatible(model: &DenseNetwork) -> Result<(), AppError> {
    if model.input_width() != 1 {
        return Err(format!(
            "Classifier expects {} input features, height is a single feature",
            model.input_width()
        )
        .into());
    }
    if model.output_width() != CLASS_COUNT {
        return Err(format!(
            "Classifier produces {} classes, the length table has {}",
            model.output_width(),
            CLASS_COUNT
        )
        .into());
    }
    Ok(())
}

/// Class probabilities for a single height.
pub fn class_probabilities(model: &DenseNetwork, height_cm: f64) -> Result<Vec<f32>, AppError> {
    // Input and output buffers are dropped at the end of this scope on every path.
    let input = Array2::from_elem((1, 1), height_cm as f32);
    let output = model.forward(&input)?;

    if output.ncols() != CLASS_COUNT {
        return Err(format!(
            "Model produced {} values, expected {}",
            output.ncols(),
            CLASS_COUNT
        )
        .into());
    }
    if output.iter().any(|p| !p.is_finite()) {
        return Err("Model produced non-finite probabilities".into());
    }

    Ok(output.row(0).to_vec())
}

/// Highest `k` entries, descending. Equal values keep their index order.
pub fn top_classes(probabilities: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    indexed.truncate(k);
    indexed
}

/// Probability as a percentage with one decimal place.
pub fn confidence_percent(probability: f32) -> f64 {
    (probability as f64 * 1000.0).round() / 10.0
}

pub fn run_inference_with_model(
    model: &DenseNetwork,
    height_cm: f64,
) -> Result<Vec<PredictionResult>, AppError> {
    let probabilities = class_probabilities(model, height_cm)?;

    let results = top_classes(&probabilities, TOP_K)
        .into_iter()
        .enumerate()
        .map(|(i, (class_idx, probability))| {
            let class = length_for_class(class_idx);
            PredictionResult {
                rank: (i + 1) as u8,
                diameter: class.diameter.map(f64::from),
                length: class.length,
                confidence: confidence_percent(probability),
                kind: ResultKind::for_classifier_rank(i),
            }
        })
        .collect();

    Ok(results)
}
