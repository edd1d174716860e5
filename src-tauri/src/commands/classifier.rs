use crate::error::AppError;
use crate::models::model_types::{Acquisition, ModelStatus};
use crate::models::prediction_types::PredictionResult;
use crate::services::classifier::model_manager::ModelManager;
use crate::services::predictor::Predictor;
use base64::Engine;
use tauri::{AppHandle, State};
use tauri_plugin_dialog::DialogExt;

#[tauri::command]
pub async fn get_model_status(model_manager: State<'_, ModelManager>) -> Result<ModelStatus, AppError> {
    Ok(model_manager.status().await)
}

/// Weights arrive base64-encoded from the webview's file input.
#[tauri::command]
pub async fn load_model_from_user_file(
    model_manager: State<'_, ModelManager>,
    weights_base64: String,
) -> Result<Acquisition, AppError> {
    let weights = base64::engine::general_purpose::STANDARD.decode(weights_base64.as_bytes())?;
    Ok(model_manager.load_from_user_file(weights).await)
}

/// Native file picker variant of `load_model_from_user_file`. `None` when the
/// user cancels.
#[tauri::command]
pub async fn pick_weights_file(
    app: AppHandle,
    model_manager: State<'_, ModelManager>,
) -> Result<Option<Acquisition>, AppError> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    app.dialog()
        .file()
        .add_filter("Model weights", &["bin"])
        .pick_file(move |path| {
            let _ = tx.send(path);
        });

    let Some(path) = rx.await.map_err(|_| AppError::new("File dialog closed unexpectedly"))? else {
        return Ok(None);
    };
    let path = path.into_path().map_err(|e| AppError {
        message: format!("Unsupported file location: {}", e),
    })?;
    let weights = tokio::fs::read(&path).await.map_err(|e| AppError {
        message: format!("Failed to read {}: {}", path.display(), e),
    })?;

    Ok(Some(model_manager.load_from_user_file(weights).await))
}

#[tauri::command]
pub async fn predict_nail_size(
    predictor: State<'_, Predictor>,
    height_cm: f64,
) -> Result<Vec<PredictionResult>, AppError> {
    predictor.predict_nail_size(height_cm).await
}
