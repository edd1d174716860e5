pub mod classifier;
pub mod fallback;
pub mod form;
pub mod predictor;
