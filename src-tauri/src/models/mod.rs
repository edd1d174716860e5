pub mod form_types;
pub mod model_types;
pub mod prediction_types;
