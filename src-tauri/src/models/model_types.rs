use serde::Serialize;

/// Where the active classifier was acquired from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelOrigin {
    Cache,
    Remote,
    UserFile,
}

/// Outcome of a single acquisition attempt. Failures never escape as errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Acquisition {
    Loaded(ModelOrigin),
    Failed(String),
}

impl Acquisition {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Acquisition::Loaded(_))
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct ModelStatus {
    pub ready: bool,
    pub loading: bool,
    pub origin: Option<ModelOrigin>,
    pub error: Option<String>,
}
