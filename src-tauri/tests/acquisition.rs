//! Acquisition order, persistence and failure handling of `ModelManager`,
//! driven through a counting in-memory model source.

use futures::future::BoxFuture;
use ortho_predict_lib::services::classifier::artifact::{encode_weights, ModelArtifact, SHARD_FILE};
use ortho_predict_lib::services::classifier::source::ModelSource;
use ortho_predict_lib::services::classifier::store::ModelStore;
use ortho_predict_lib::{
    Acquisition, AppError, FallbackReason, ModelManager, ModelOrigin, PredictionSource, Predictor,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const WEIGHT_COUNT: usize = 427;
const STORE_KEY: &str = "ortho-predict-model";
const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct CountingSource {
    files: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
    hang: bool,
}

impl CountingSource {
    fn serving(artifact: &ModelArtifact) -> Self {
        let mut files = HashMap::new();
        files.insert("./model.json".to_string(), artifact.to_model_json().unwrap());
        files.insert(format!("./{}", SHARD_FILE), artifact.weight_bytes().to_vec());
        Self {
            files,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelSource for CountingSource {
    fn fetch<'a>(&'a self, location: &'a str) -> BoxFuture<'a, Result<Vec<u8>, AppError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                futures::future::pending::<()>().await;
            }
            self.files
                .get(location)
                .cloned()
                .ok_or_else(|| AppError::new(format!("{} not found", location)))
        })
    }
}

/// Zero hidden weights; the output bias alone decides the ranking.
fn weights_favouring(class: usize) -> Vec<u8> {
    let mut values = vec![0.0f32; WEIGHT_COUNT];
    values[WEIGHT_COUNT - 17 + class] = 4.0;
    encode_weights(&values)
}

fn artifact_favouring(class: usize) -> ModelArtifact {
    ModelArtifact::with_builtin_architecture(weights_favouring(class)).unwrap()
}

fn manager(data_dir: &std::path::Path, source: Arc<CountingSource>) -> ModelManager {
    ModelManager::with_source(
        ModelStore::new(data_dir, STORE_KEY),
        source,
        "./model.json",
        TIMEOUT,
    )
}

#[tokio::test]
async fn cache_hit_never_touches_remote() {
    let dir = tempfile::tempdir().unwrap();
    ModelStore::new(dir.path(), STORE_KEY)
        .save(&artifact_favouring(6))
        .await
        .unwrap();

    let remote = Arc::new(CountingSource::serving(&artifact_favouring(10)));
    let manager = manager(dir.path(), remote.clone());

    assert_eq!(manager.initialize().await, Acquisition::Loaded(ModelOrigin::Cache));
    assert_eq!(remote.calls(), 0);
    assert!(manager.is_ready());
}

#[tokio::test]
async fn cache_miss_loads_remote_and_persists_it() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(CountingSource::serving(&artifact_favouring(6)));
    let manager = manager(dir.path(), remote.clone());

    assert_eq!(manager.initialize().await, Acquisition::Loaded(ModelOrigin::Remote));
    assert_eq!(remote.calls(), 2);
    assert!(manager.store().exists());

    // Next session comes up from the store alone.
    let offline = Arc::new(CountingSource::default());
    let next = self::manager(dir.path(), offline.clone());
    assert_eq!(next.initialize().await, Acquisition::Loaded(ModelOrigin::Cache));
    assert_eq!(offline.calls(), 0);

    let prediction = Predictor::new(next.state(), Duration::ZERO)
        .predict(175.0)
        .await
        .unwrap();
    assert_eq!(prediction.source, PredictionSource::Classifier);
    assert_eq!(prediction.results[0].length, 330);
}

#[tokio::test]
async fn corrupt_store_falls_through_to_remote() {
    let dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(dir.path(), STORE_KEY);
    std::fs::create_dir_all(store.dir()).unwrap();
    let manifest = serde_json::json!({
        "format": "layers-model",
        "modelTopology": {},
        "weightsManifest": [{ "paths": [SHARD_FILE], "weights": [
            { "name": "out/kernel", "shape": [4294967296u64, 4294967296u64], "dtype": "float32" }
        ]}]
    });
    std::fs::write(store.model_path(), manifest.to_string()).unwrap();
    std::fs::write(store.dir().join(SHARD_FILE), [0u8; 8]).unwrap();

    let remote = Arc::new(CountingSource::serving(&artifact_favouring(6)));
    let manager = manager(dir.path(), remote.clone());

    assert!(!manager.load_from_cache().await.is_loaded());
    assert_eq!(manager.initialize().await, Acquisition::Loaded(ModelOrigin::Remote));
    assert_eq!(remote.calls(), 2);
    // The remote copy replaced the corrupt one.
    assert!(store.load(TIMEOUT).await.is_ok());
}

#[tokio::test]
async fn unreadable_store_falls_through_to_remote() {
    let dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(dir.path(), STORE_KEY);
    std::fs::create_dir_all(store.dir()).unwrap();
    std::fs::write(store.model_path(), b"{ not json").unwrap();

    let remote = Arc::new(CountingSource::serving(&artifact_favouring(6)));
    let manager = manager(dir.path(), remote.clone());

    assert_eq!(manager.initialize().await, Acquisition::Loaded(ModelOrigin::Remote));
    assert!(manager.is_ready());
}

#[tokio::test]
async fn no_model_anywhere_leaves_estimator_in_charge() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path(), Arc::new(CountingSource::default()));

    let outcome = manager.initialize().await;
    assert!(!outcome.is_loaded());

    let status = manager.status().await;
    assert!(!status.ready);
    assert!(!status.loading);
    assert!(status.origin.is_none());
    assert!(status.error.unwrap().contains("not found"));

    let prediction = Predictor::new(manager.state(), Duration::ZERO)
        .predict(175.0)
        .await
        .unwrap();
    assert_eq!(prediction.source, PredictionSource::Fallback(FallbackReason::NoModel));
    assert_eq!(prediction.results[0].length, 330);
}

#[tokio::test]
async fn failed_remote_load_keeps_active_model() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path(), Arc::new(CountingSource::default()));

    assert!(manager.load_from_user_file(weights_favouring(3)).await.is_loaded());
    assert!(!manager.load_from_server().await.is_loaded());

    assert!(manager.is_ready());
    assert_eq!(manager.status().await.origin, Some(ModelOrigin::UserFile));
}

#[tokio::test]
async fn failed_user_upload_clears_active_model() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path(), Arc::new(CountingSource::default()));

    assert!(manager.load_from_user_file(weights_favouring(3)).await.is_loaded());
    let outcome = manager.load_from_user_file(vec![0u8; 10]).await;

    assert!(matches!(outcome, Acquisition::Failed(ref reason) if reason.contains("manifest expects")));
    assert!(!manager.is_ready());
}

#[tokio::test]
async fn user_upload_is_persisted_for_next_session() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path(), Arc::new(CountingSource::default()));

    assert_eq!(
        manager.load_from_user_file(weights_favouring(16)).await,
        Acquisition::Loaded(ModelOrigin::UserFile)
    );

    let next = self::manager(dir.path(), Arc::new(CountingSource::default()));
    assert!(next.load_from_cache().await.is_loaded());
    let results = Predictor::new(next.state(), Duration::ZERO)
        .predict_nail_size(200.0)
        .await
        .unwrap();
    assert_eq!(results[0].length, 480);
}

#[tokio::test]
async fn persistence_failure_does_not_roll_back_load() {
    let dir = tempfile::tempdir().unwrap();
    // A plain file where the store directory should be.
    std::fs::write(dir.path().join(STORE_KEY), b"occupied").unwrap();

    let manager = manager(dir.path(), Arc::new(CountingSource::serving(&artifact_favouring(6))));

    assert_eq!(manager.initialize().await, Acquisition::Loaded(ModelOrigin::Remote));
    assert!(manager.is_ready());
    assert!(manager.status().await.error.is_none());
}

#[tokio::test]
async fn remote_model_with_wrong_class_count_is_rejected() {
    let json = serde_json::json!({
        "format": "layers-model",
        "modelTopology": { "config": { "layers": [
            { "class_name": "Dense", "config": { "name": "out", "units": 5, "activation": "softmax" } }
        ]}},
        "weightsManifest": [{ "paths": ["group1-shard1of1.bin"], "weights": [
            { "name": "out/kernel", "shape": [1, 5], "dtype": "float32" },
            { "name": "out/bias", "shape": [5], "dtype": "float32" }
        ]}]
    });
    let mut source = CountingSource::default();
    source.files.insert("./model.json".to_string(), json.to_string().into_bytes());
    source
        .files
        .insert("./group1-shard1of1.bin".to_string(), encode_weights(&[0.0; 10]));

    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path(), Arc::new(source));

    let outcome = manager.load_from_server().await;
    assert!(matches!(outcome, Acquisition::Failed(ref reason) if reason.contains("17")));
    assert!(!manager.is_ready());
    assert!(!manager.store().exists());
}

#[tokio::test(start_paused = true)]
async fn hung_remote_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(CountingSource {
        hang: true,
        ..CountingSource::default()
    });
    let manager = ModelManager::with_source(
        ModelStore::new(dir.path(), STORE_KEY),
        source,
        "./model.json",
        Duration::from_millis(50),
    );

    let outcome = manager.load_from_server().await;
    assert!(matches!(outcome, Acquisition::Failed(ref reason) if reason.contains("timed out")));
    assert!(!manager.is_loading());
}

#[tokio::test]
async fn concurrent_acquisitions_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path(), Arc::new(CountingSource::serving(&artifact_favouring(6))));

    let (upload, remote) = tokio::join!(
        manager.load_from_user_file(weights_favouring(3)),
        manager.load_from_server()
    );

    assert!(upload.is_loaded());
    assert!(remote.is_loaded());
    assert!(manager.is_ready());
    assert!(!manager.is_loading());
    // Whichever ran last owns the state.
    assert!(matches!(
        manager.status().await.origin,
        Some(ModelOrigin::UserFile) | Some(ModelOrigin::Remote)
    ));
}
