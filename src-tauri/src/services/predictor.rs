use crate::config::PredictorConfig;
use crate::error::AppError;
use crate::models::prediction_types::{FallbackReason, Prediction, PredictionResult, PredictionSource};
use crate::services::classifier::inference;
use crate::services::classifier::model_manager::ModelState;
use crate::services::fallback;
use std::time::Duration;
use tracing::{debug, warn};

/// Turns a height into three ranked length predictions.
#[derive(Clone)]
pub struct Predictor {
    state: ModelState,
    fallback_delay: Duration,
}

impl Predictor {
    pub fn new(state: ModelState, fallback_delay: Duration) -> Self {
        Self {
            state,
            fallback_delay,
        }
    }

    pub fn from_config(state: ModelState, config: &PredictorConfig) -> Self {
        Self::new(state, config.fallback_delay())
    }

    /// Uses the classifier when one is loaded. Inference failures degrade to
    /// the arithmetic estimator and are reported through `source`, never as
    /// an error. Only a non-finite height is an error.
    pub async fn predict(&self, height_cm: f64) -> Result<Prediction, AppError> {
        if !height_cm.is_finite() {
            return Err(format!("Height must be a finite number, got {}", height_cm).into());
        }

        let Some(model) = self.state.snapshot() else {
            if !self.fallback_delay.is_zero() {
                tokio::time::sleep(self.fallback_delay).await;
            }
            debug!("No classifier loaded, using estimator for {} cm", height_cm);
            return Ok(fallback_prediction(height_cm, FallbackReason::NoModel));
        };

        let outcome = tokio::task::spawn_blocking(move || {
            inference::run_inference_with_model(&model, height_cm)
        })
        .await
        .map_err(|e| AppError {
            message: format!("Inference task failed: {}", e),
        })
        .and_then(|result| result);

        match outcome {
            Ok(results) => Ok(Prediction {
                results,
                source: PredictionSource::Classifier,
            }),
            Err(e) => {
                warn!("Classifier inference failed, using estimator: {}", e);
                Ok(fallback_prediction(
                    height_cm,
                    FallbackReason::InferenceFailed(e.message),
                ))
            }
        }
    }

    pub async fn predict_nail_size(&self, height_cm: f64) -> Result<Vec<PredictionResult>, AppError> {
        Ok(self.predict(height_cm).await?.results)
    }
}

fn fallback_prediction(height_cm: f64, reason: FallbackReason) -> Prediction {
    Prediction {
        results: fallback::estimate(height_cm).to_vec(),
        source: PredictionSource::Fallback(reason),
    }
}
