use crate::error::AppError;
use crate::services::classifier::artifact::{ModelArtifact, MODEL_FILE, SHARD_FILE};
use crate::services::classifier::source::{fetch_artifact, DirectorySource};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Durable classifier cache: `<data_dir>/<key>/model.json` plus one shard.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(data_dir: &Path, key: &str) -> Self {
        Self {
            dir: data_dir.join(key),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn exists(&self) -> bool {
        self.model_path().exists()
    }

    pub async fn load(&self, timeout: Duration) -> Result<ModelArtifact, AppError> {
        if !self.exists() {
            return Err(format!("No stored model at {}", self.dir.display()).into());
        }
        let source = DirectorySource::new(self.dir.clone());
        fetch_artifact(&source, MODEL_FILE, timeout).await
    }

    /// Writes the shard first so a readable `model.json` always has its weights.
    pub async fn save(&self, artifact: &ModelArtifact) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| AppError {
            message: format!("Failed to create model directory: {}", e),
        })?;

        let shard_path = self.dir.join(SHARD_FILE);
        tokio::fs::write(&shard_path, artifact.weight_bytes())
            .await
            .map_err(|e| AppError {
                message: format!("Failed to write {}: {}", shard_path.display(), e),
            })?;

        let model_path = self.model_path();
        tokio::fs::write(&model_path, artifact.to_model_json()?)
            .await
            .map_err(|e| AppError {
                message: format!("Failed to write {}: {}", model_path.display(), e),
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classifier::artifact::encode_weights;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path(), "ortho-predict-model");
        assert!(!store.exists());

        let values: Vec<f32> = (0..427).map(|i| i as f32 * 0.01).collect();
        let artifact = ModelArtifact::with_builtin_architecture(encode_weights(&values)).unwrap();
        store.save(&artifact).await.unwrap();

        assert!(store.exists());
        assert!(dir.path().join("ortho-predict-model").join(SHARD_FILE).exists());

        let loaded = store.load(Duration::from_secs(5)).await.unwrap();
        assert_eq!(loaded.weight_bytes(), artifact.weight_bytes());
        assert_eq!(
            loaded.descriptor().model_topology,
            artifact.descriptor().model_topology
        );
    }

    #[tokio::test]
    async fn missing_store_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path(), "ortho-predict-model");
        let err = store.load(Duration::from_secs(5)).await.unwrap_err();
        assert!(err.message.contains("No stored model"));
    }

    #[tokio::test]
    async fn truncated_shard_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path(), "ortho-predict-model");
        let artifact = ModelArtifact::with_builtin_architecture(vec![0u8; 427 * 4]).unwrap();
        store.save(&artifact).await.unwrap();
        std::fs::write(store.dir().join(SHARD_FILE), [0u8; 16]).unwrap();

        assert!(store.load(Duration::from_secs(5)).await.is_err());
    }
}
