#[cfg(feature = "desktop")]
mod commands;
pub mod config;
pub mod error;
#[cfg(feature = "desktop")]
mod logging;
pub mod models;
pub mod services;

pub use config::PredictorConfig;
pub use error::AppError;
pub use models::form_types::AppState;
pub use models::model_types::{Acquisition, ModelOrigin, ModelStatus};
pub use models::prediction_types::{
    FallbackReason, Prediction, PredictionResult, PredictionSource, ResultKind,
};
pub use services::classifier::model_manager::{ModelManager, ModelState};
pub use services::form::{FormController, ValidationError};
pub use services::predictor::Predictor;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use crate::config::CONFIG_FILE;
    use tauri::{Emitter, Manager};

    logging::init();

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_window_state::Builder::default().build())
        .setup(|app| {
            let app_data_dir = app.path().app_data_dir()?;
            std::fs::create_dir_all(&app_data_dir)?;

            let config = PredictorConfig::load(&app_data_dir.join(CONFIG_FILE))?;
            let assets_dir = app.path().resource_dir()?;

            let model_manager = ModelManager::new(&config, app_data_dir, assets_dir)?;
            let predictor = Predictor::from_config(model_manager.state(), &config);
            app.manage(model_manager.clone());
            app.manage(predictor);
            app.manage(commands::form::FormState::new(FormController::new()));

            // Store first, then the bundled model.json; predictions use the
            // estimator until one of them succeeds.
            let app_handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                let _ = app_handle.emit("model-acquisition", serde_json::json!({
                    "status": "loading"
                }));
                let outcome = model_manager.initialize().await;
                let _ = app_handle.emit("model-acquisition", &outcome);
            });

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::classifier::get_model_status,
            commands::classifier::load_model_from_user_file,
            commands::classifier::pick_weights_file,
            commands::classifier::predict_nail_size,
            commands::form::submit_height,
            commands::form::reset_form,
            commands::form::get_form_state,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
