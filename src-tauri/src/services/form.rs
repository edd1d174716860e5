//! Height form lifecycle: Idle → Calculating → Success | Error, back to Idle
//! through `reset`.

use crate::error::AppError;
use crate::models::form_types::{AppState, CardView, FormSnapshot};
use crate::models::prediction_types::PredictionResult;
use crate::services::predictor::Predictor;
use thiserror::Error;

pub const MIN_HEIGHT_CM: f64 = 50.0;
pub const MAX_HEIGHT_CM: f64 = 250.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Please enter the patient's height")]
    Empty,
    #[error("Please enter a valid height (50cm - 250cm)")]
    NotANumber,
    #[error("Please enter a valid height (50cm - 250cm), got {0}")]
    OutOfRange(f64),
    #[error("A prediction is already being calculated")]
    Busy,
    #[error("Reset the form before calculating again")]
    ResultsShown,
}

/// Parses user input as a height in centimetres within the accepted range.
pub fn parse_height(input: &str) -> Result<f64, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    let height: f64 = trimmed.parse().map_err(|_| ValidationError::NotANumber)?;
    if !height.is_finite() {
        return Err(ValidationError::NotANumber);
    }
    if !(MIN_HEIGHT_CM..=MAX_HEIGHT_CM).contains(&height) {
        return Err(ValidationError::OutOfRange(height));
    }
    Ok(height)
}

#[derive(Debug, Clone, Default)]
pub struct FormController {
    state: AppState,
    input: String,
    results: Vec<PredictionResult>,
    validation_message: Option<String>,
    error: Option<String>,
}

impl FormController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn results(&self) -> &[PredictionResult] {
        &self.results
    }

    pub fn validation_message(&self) -> Option<&str> {
        self.validation_message.as_deref()
    }

    /// The submit control is enabled only with some input, from `Idle` or
    /// after an `Error`.
    pub fn can_submit(&self) -> bool {
        !self.input.trim().is_empty()
            && matches!(self.state, AppState::Idle | AppState::Error)
    }

    /// Validates `input` and enters `Calculating`. On error the state is
    /// unchanged and the message is kept for display.
    pub fn submit(&mut self, input: &str) -> Result<f64, ValidationError> {
        match self.state {
            AppState::Calculating => return Err(ValidationError::Busy),
            AppState::Success => return Err(ValidationError::ResultsShown),
            AppState::Idle | AppState::Error => {}
        }
        self.input = input.to_string();

        match parse_height(input) {
            Ok(height) => {
                self.state = AppState::Calculating;
                self.results.clear();
                self.validation_message = None;
                self.error = None;
                Ok(height)
            }
            Err(e) => {
                self.validation_message = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Records the outcome of the calculation started by `submit`. Ignored in
    /// any other state.
    pub fn complete(&mut self, outcome: Result<Vec<PredictionResult>, AppError>) -> AppState {
        if self.state != AppState::Calculating {
            return self.state;
        }
        match outcome {
            Ok(results) => {
                self.results = results;
                self.state = AppState::Success;
            }
            Err(e) => {
                self.error = Some(e.message);
                self.state = AppState::Error;
            }
        }
        self.state
    }

    /// Clears the form. Not allowed while calculating.
    pub fn reset(&mut self) -> bool {
        if self.state == AppState::Calculating {
            return false;
        }
        *self = Self::default();
        true
    }

    /// Submits, predicts and completes in one step.
    pub async fn calculate(
        &mut self,
        predictor: &Predictor,
        input: &str,
    ) -> Result<AppState, ValidationError> {
        let height = self.submit(input)?;
        let outcome = predictor.predict_nail_size(height).await;
        Ok(self.complete(outcome))
    }

    /// First result is the primary card.
    pub fn cards(&self) -> Vec<CardView> {
        self.results
            .iter()
            .enumerate()
            .map(|(i, result)| CardView::from_result(result, i == 0))
            .collect()
    }

    pub fn snapshot(&self) -> FormSnapshot {
        FormSnapshot {
            state: self.state,
            input: self.input.clone(),
            results: self.results.clone(),
            cards: self.cards(),
            validation_message: self.validation_message.clone(),
            error: self.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classifier::model_manager::ModelState;
    use crate::services::fallback;
    use std::time::Duration;

    #[test]
    fn parse_height_accepts_range_bounds() {
        assert_eq!(parse_height("50"), Ok(50.0));
        assert_eq!(parse_height(" 250 "), Ok(250.0));
        assert_eq!(parse_height("175.5"), Ok(175.5));
    }

    #[test]
    fn parse_height_rejects_bad_input() {
        assert_eq!(parse_height(""), Err(ValidationError::Empty));
        assert_eq!(parse_height("   "), Err(ValidationError::Empty));
        assert_eq!(parse_height("abc"), Err(ValidationError::NotANumber));
        assert_eq!(parse_height("NaN"), Err(ValidationError::NotANumber));
        assert_eq!(parse_height("inf"), Err(ValidationError::NotANumber));
        assert_eq!(parse_height("10"), Err(ValidationError::OutOfRange(10.0)));
        assert_eq!(parse_height("999"), Err(ValidationError::OutOfRange(999.0)));
        assert_eq!(parse_height("49.9"), Err(ValidationError::OutOfRange(49.9)));
    }

    #[test]
    fn invalid_input_never_enters_calculating() {
        let mut form = FormController::new();
        for input in ["abc", "10", "999"] {
            assert!(form.submit(input).is_err());
            assert_eq!(form.state(), AppState::Idle);
            assert!(form.validation_message().is_some());
        }
    }

    #[test]
    fn valid_submit_enters_calculating_and_blocks_resubmit() {
        let mut form = FormController::new();
        assert_eq!(form.submit("175"), Ok(175.0));
        assert_eq!(form.state(), AppState::Calculating);
        assert!(!form.can_submit());
        assert_eq!(form.submit("180"), Err(ValidationError::Busy));
        assert!(!form.reset());
    }

    #[test]
    fn complete_moves_to_success_or_error() {
        let mut form = FormController::new();
        form.submit("175").unwrap();
        let state = form.complete(Ok(fallback::estimate(175.0).to_vec()));
        assert_eq!(state, AppState::Success);
        assert_eq!(form.results().len(), 3);

        assert!(form.reset());
        assert_eq!(form.state(), AppState::Idle);
        assert!(form.results().is_empty());
        assert!(!form.can_submit());

        form.submit("175").unwrap();
        let state = form.complete(Err(AppError::new("boom")));
        assert_eq!(state, AppState::Error);
        assert_eq!(form.snapshot().error.as_deref(), Some("boom"));
    }

    #[test]
    fn success_requires_reset_before_next_submit() {
        let mut form = FormController::new();
        form.submit("175").unwrap();
        form.complete(Ok(fallback::estimate(175.0).to_vec()));

        assert!(!form.can_submit());
        assert_eq!(form.submit("180"), Err(ValidationError::ResultsShown));
        assert_eq!(form.state(), AppState::Success);
        assert_eq!(form.results().len(), 3);

        assert!(form.reset());
        assert_eq!(form.submit("180"), Ok(180.0));
        assert_eq!(form.state(), AppState::Calculating);
    }

    #[test]
    fn error_allows_resubmit() {
        let mut form = FormController::new();
        form.submit("175").unwrap();
        form.complete(Err(AppError::new("boom")));

        assert!(form.can_submit());
        assert_eq!(form.submit("176"), Ok(176.0));
        assert_eq!(form.state(), AppState::Calculating);
    }

    #[test]
    fn complete_outside_calculating_is_ignored() {
        let mut form = FormController::new();
        assert_eq!(form.complete(Err(AppError::new("late"))), AppState::Idle);
        assert!(form.snapshot().error.is_none());
    }

    #[test]
    fn cards_mark_first_result_primary() {
        let mut form = FormController::new();
        form.submit("175").unwrap();
        form.complete(Ok(fallback::estimate(175.0).to_vec()));

        let cards = form.cards();
        assert_eq!(cards.len(), 3);
        assert!(cards[0].is_primary);
        assert!(!cards[1].is_primary && !cards[2].is_primary);
        assert_eq!(cards[0].length_mm, "330 mm");
        assert_eq!(cards[0].confidence_caption, "92.5% confidence");
        assert_eq!(cards[1].confidence_caption, "85% confidence");
        assert_eq!(cards[0].label, "Simulation (Standard)");
    }

    #[tokio::test]
    async fn calculate_runs_full_cycle_with_fallback() {
        let predictor = Predictor::new(ModelState::new(), Duration::ZERO);
        let mut form = FormController::new();

        assert_eq!(form.calculate(&predictor, "175").await, Ok(AppState::Success));
        assert_eq!(form.results()[0].length, 330);

        assert!(form.reset());
        assert_eq!(
            form.calculate(&predictor, "abc").await,
            Err(ValidationError::NotANumber)
        );
        assert_eq!(form.state(), AppState::Idle);
    }
}
