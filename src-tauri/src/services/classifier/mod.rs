pub mod artifact;
pub mod inference;
pub mod mapping;
pub mod model_manager;
pub mod network;
pub mod source;
pub mod store;
