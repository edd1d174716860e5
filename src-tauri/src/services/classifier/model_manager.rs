use crate::config::PredictorConfig;
use crate::error::AppError;
use crate::models::model_types::{Acquisition, ModelOrigin, ModelStatus};
use crate::services::classifier::artifact::ModelArtifact;
use crate::services::classifier::inference;
use crate::services::classifier::network::DenseNetwork;
use crate::services::classifier::source::{fetch_artifact, source_for, ModelSource};
use crate::services::classifier::store::ModelStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Clone)]
struct LoadedModel {
    network: Arc<DenseNetwork>,
    origin: ModelOrigin,
}

/// Shared handle to the active classifier.
///
/// Only [`ModelManager`] writes it. Readers take an `Arc` snapshot, so an
/// acquisition in flight never blocks a prediction.
#[derive(Clone, Default)]
pub struct ModelState {
    inner: Arc<RwLock<Option<LoadedModel>>>,
}

impl ModelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<Arc<DenseNetwork>> {
        self.read().as_ref().map(|m| m.network.clone())
    }

    pub fn is_loaded(&self) -> bool {
        self.read().is_some()
    }

    pub fn origin(&self) -> Option<ModelOrigin> {
        self.read().as_ref().map(|m| m.origin)
    }

    fn set(&self, network: Arc<DenseNetwork>, origin: ModelOrigin) {
        *self.write() = Some(LoadedModel { network, origin });
    }

    fn clear(&self) {
        *self.write() = None;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<LoadedModel>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<LoadedModel>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    pub(crate) fn set_for_test(&self, network: DenseNetwork, origin: ModelOrigin) {
        self.set(Arc::new(network), origin);
    }
}

/// Held for the duration of one acquisition attempt.
struct AcquireGuard<'a> {
    _lock: MutexGuard<'a, ()>,
    loading: &'a AtomicBool,
}

impl Drop for AcquireGuard<'_> {
    fn drop(&mut self) {
        self.loading.store(false, Ordering::Relaxed);
    }
}

/// Acquires the classifier: persisted store first, then the remote source,
/// or a weights file supplied by the user.
#[derive(Clone)]
pub struct ModelManager {
    store: ModelStore,
    remote: Arc<dyn ModelSource>,
    model_location: String,
    state: ModelState,
    acquiring: Arc<Mutex<()>>,
    loading: Arc<AtomicBool>,
    error: Arc<Mutex<Option<String>>>,
    fetch_timeout: Duration,
}

impl ModelManager {
    pub fn new(
        config: &PredictorConfig,
        data_dir: PathBuf,
        assets_dir: PathBuf,
    ) -> Result<Self, AppError> {
        let remote = source_for(&config.model_url, assets_dir, config.fetch_timeout())?;
        Ok(Self::with_source(
            ModelStore::new(&data_dir, &config.store_key),
            remote,
            config.model_url.clone(),
            config.fetch_timeout(),
        ))
    }

    pub fn with_source(
        store: ModelStore,
        remote: Arc<dyn ModelSource>,
        model_location: impl Into<String>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            remote,
            model_location: model_location.into(),
            state: ModelState::new(),
            acquiring: Arc::new(Mutex::new(())),
            loading: Arc::new(AtomicBool::new(false)),
            error: Arc::new(Mutex::new(None)),
            fetch_timeout,
        }
    }

    /// Handle for the prediction service.
    pub fn state(&self) -> ModelState {
        self.state.clone()
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_loaded()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Relaxed)
    }

    pub async fn get_error(&self) -> Option<String> {
        self.error.lock().await.clone()
    }

    pub async fn status(&self) -> ModelStatus {
        ModelStatus {
            ready: self.is_ready(),
            loading: self.is_loading(),
            origin: self.state.origin(),
            error: self.get_error().await,
        }
    }

    /// Startup sequence: the store, then the remote source if that failed.
    pub async fn initialize(&self) -> Acquisition {
        let cached = self.load_from_cache().await;
        if cached.is_loaded() {
            return cached;
        }
        self.load_from_server().await
    }

    pub async fn load_from_cache(&self) -> Acquisition {
        let _guard = self.begin().await;

        let result = self
            .store
            .load(self.fetch_timeout)
            .await
            .and_then(build_classifier);

        match result {
            Ok(network) => {
                self.state.set(Arc::new(network), ModelOrigin::Cache);
                info!("Classifier loaded from {}", self.store.dir().display());
                self.succeeded(ModelOrigin::Cache).await
            }
            Err(e) => {
                debug!("No usable cached classifier: {}", e);
                self.failed(e).await
            }
        }
    }

    /// On failure the current state is left as it was.
    pub async fn load_from_server(&self) -> Acquisition {
        let _guard = self.begin().await;

        let result = fetch_artifact(self.remote.as_ref(), &self.model_location, self.fetch_timeout)
            .await
            .and_then(build_classifier);

        match result {
            Ok(network) => {
                let network = Arc::new(network);
                self.state.set(network.clone(), ModelOrigin::Remote);
                info!("Classifier loaded from {}", self.model_location);
                self.persist(network.artifact()).await;
                self.succeeded(ModelOrigin::Remote).await
            }
            Err(e) => {
                warn!("Classifier not available at {}: {}", self.model_location, e);
                self.failed(e).await
            }
        }
    }

    /// Rebuilds the classifier from a weights file and the built-in
    /// architecture. Unlike the other strategies, a failure here also clears
    /// any classifier that was active.
    pub async fn load_from_user_file(&self, weights: Vec<u8>) -> Acquisition {
        let _guard = self.begin().await;

        let result = ModelArtifact::with_builtin_architecture(weights).and_then(build_classifier);

        match result {
            Ok(network) => {
                let network = Arc::new(network);
                self.state.set(network.clone(), ModelOrigin::UserFile);
                info!("Classifier loaded from user-supplied weights");
                self.persist(network.artifact()).await;
                self.succeeded(ModelOrigin::UserFile).await
            }
            Err(e) => {
                warn!("Failed to load user-supplied weights: {}", e);
                self.state.clear();
                self.failed(e).await
            }
        }
    }

    async fn begin(&self) -> AcquireGuard<'_> {
        let lock = self.acquiring.lock().await;
        self.loading.store(true, Ordering::Relaxed);
        AcquireGuard {
            _lock: lock,
            loading: &self.loading,
        }
    }

    /// Best effort: the in-memory classifier stays active if this fails.
    async fn persist(&self, artifact: &ModelArtifact) {
        let result = match tokio::time::timeout(self.fetch_timeout, self.store.save(artifact)).await {
            Ok(result) => result,
            Err(elapsed) => Err(elapsed.into()),
        };
        if let Err(e) = result {
            warn!("Failed to persist classifier to {}: {}", self.store.dir().display(), e);
        }
    }

    async fn succeeded(&self, origin: ModelOrigin) -> Acquisition {
        *self.error.lock().await = None;
        Acquisition::Loaded(origin)
    }

    async fn failed(&self, error: AppError) -> Acquisition {
        *self.error.lock().await = Some(error.message.clone());
        Acquisition::Failed(error.message)
    }
}

fn build_classifier(artifact: ModelArtifact) -> Result<DenseNetwork, AppError> {
    let network = DenseNetwork::from_artifact(artifact)?;
    inference::ensure_compatible(&network)?;
    Ok(network)
}
