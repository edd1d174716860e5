//! Where classifier artifacts are fetched from.

use crate::error::AppError;
use crate::services::classifier::artifact::{ModelArtifact, ModelDescriptor, MAX_WEIGHT_BYTES};
use futures::future::BoxFuture;
use futures::StreamExt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Largest single download accepted, a shard at the weight limit plus slack.
const MAX_FETCH_BYTES: usize = MAX_WEIGHT_BYTES + 1024 * 1024;

/// Fetches the raw bytes behind a location string (a URL or a relative path).
pub trait ModelSource: Send + Sync {
    fn fetch<'a>(&'a self, location: &'a str) -> BoxFuture<'a, Result<Vec<u8>, AppError>>;
}

#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl ModelSource for HttpSource {
    fn fetch<'a>(&'a self, location: &'a str) -> BoxFuture<'a, Result<Vec<u8>, AppError>> {
        Box::pin(async move {
            let response = self.client.get(location).send().await?;

            if !response.status().is_success() {
                return Err(format!(
                    "Failed to download {}: HTTP {}",
                    location,
                    response.status()
                )
                .into());
            }

            let mut body = Vec::new();
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                body.extend_from_slice(&chunk?);
                if body.len() > MAX_FETCH_BYTES {
                    return Err(format!("{} exceeds {} bytes", location, MAX_FETCH_BYTES).into());
                }
            }
            Ok(body)
        })
    }
}

/// Reads locations relative to a directory, e.g. the bundled assets.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl ModelSource for DirectorySource {
    fn fetch<'a>(&'a self, location: &'a str) -> BoxFuture<'a, Result<Vec<u8>, AppError>> {
        Box::pin(async move {
            check_relative(location)?;
            let path = self.root.join(location);
            tokio::fs::read(&path).await.map_err(|e| AppError {
                message: format!("Failed to read {}: {}", path.display(), e),
            })
        })
    }
}

/// HTTP for `http(s)://` locations, the assets directory otherwise.
pub fn source_for(
    location: &str,
    assets_dir: PathBuf,
    timeout: Duration,
) -> Result<Arc<dyn ModelSource>, AppError> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Arc::new(HttpSource::new(timeout)?))
    } else {
        Ok(Arc::new(DirectorySource::new(assets_dir)))
    }
}

/// Local locations must stay below the directory they are read from.
fn check_relative(location: &str) -> Result<(), AppError> {
    let escapes = Path::new(location).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(format!("Refusing path outside the model directory: {}", location).into());
    }
    Ok(())
}

/// Resolves a shard path against the location of its `model.json`.
pub fn resolve_relative(model_location: &str, path: &str) -> Result<String, AppError> {
    if path.contains("://") {
        return Ok(path.to_string());
    }
    check_relative(path)?;
    Ok(match model_location.rfind('/') {
        Some(idx) => format!("{}{}", &model_location[..=idx], path),
        None => path.to_string(),
    })
}

/// Fetches `model.json` and every shard it lists, each bounded by `timeout`.
pub async fn fetch_artifact(
    source: &dyn ModelSource,
    model_location: &str,
    timeout: Duration,
) -> Result<ModelArtifact, AppError> {
    let model_json = tokio::time::timeout(timeout, source.fetch(model_location)).await??;
    let descriptor = ModelDescriptor::parse(&model_json)?;

    let shard_locations = descriptor
        .shard_paths()
        .map(|path| resolve_relative(model_location, path))
        .collect::<Result<Vec<_>, _>>()?;

    let expected = descriptor.expected_weight_bytes()?;
    let mut weights = Vec::new();
    for location in &shard_locations {
        debug!("Fetching weight shard {}", location);
        let shard = tokio::time::timeout(timeout, source.fetch(location)).await??;
        weights.extend_from_slice(&shard);
        if weights.len() > expected {
            return Err(format!(
                "Weight shards exceed the {} bytes the manifest declares",
                expected
            )
            .into());
        }
    }

    ModelArtifact::new(descriptor, weights)
}
