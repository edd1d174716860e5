use crate::error::AppError;
use crate::models::form_types::FormSnapshot;
use crate::services::form::FormController;
use crate::services::predictor::Predictor;
use std::sync::{Mutex, MutexGuard};
use tauri::State;

pub type FormState = Mutex<FormController>;

fn lock<'a>(form: &'a State<'_, FormState>) -> Result<MutexGuard<'a, FormController>, AppError> {
    form.lock().map_err(|_| AppError::new("Form state is poisoned"))
}

/// Validation problems come back in the snapshot, not as an error.
#[tauri::command]
pub async fn submit_height(
    form: State<'_, FormState>,
    predictor: State<'_, Predictor>,
    input: String,
) -> Result<FormSnapshot, AppError> {
    let height = {
        let mut form = lock(&form)?;
        match form.submit(&input) {
            Ok(height) => height,
            Err(_) => return Ok(form.snapshot()),
        }
    };

    // The lock is released while predicting; Calculating rejects resubmits.
    let outcome = predictor.predict_nail_size(height).await;

    let mut form = lock(&form)?;
    form.complete(outcome);
    Ok(form.snapshot())
}

#[tauri::command]
pub fn reset_form(form: State<'_, FormState>) -> Result<FormSnapshot, AppError> {
    let mut form = lock(&form)?;
    form.reset();
    Ok(form.snapshot())
}

#[tauri::command]
pub fn get_form_state(form: State<'_, FormState>) -> Result<FormSnapshot, AppError> {
    Ok(lock(&form)?.snapshot())
}
