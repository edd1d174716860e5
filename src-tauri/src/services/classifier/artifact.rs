//! Layered-model artifact: a `model.json` descriptor plus float32 weight shards.
//!
//! The weight data of all manifest groups is concatenated in manifest order,
//! the same layout the converter writes. Persisted copies are rewritten with
//! one group and one shard.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use zerocopy::byteorder::little_endian::F32;
use zerocopy::{FromBytes, IntoBytes};

pub const ARTIFACT_FORMAT: &str = "layers-model";
pub const MODEL_FILE: &str = "model.json";
pub const SHARD_FILE: &str = "group1-shard1of1.bin";

const FLOAT32: &str = "float32";
const BYTES_PER_WEIGHT: usize = std::mem::size_of::<f32>();
/// Upper bound on the weight data of one artifact. The shipped model holds 427 weights.
pub const MAX_WEIGHT_BYTES: usize = 16 * 1024 * 1024;

/// Fixed 1→10→10→10→17 architecture paired with user-supplied weight files.
const BUILTIN_ARCHITECTURE: &str = include_str!("../../../assets/model-architecture.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_by: Option<String>,
    pub model_topology: serde_json::Value,
    pub weights_manifest: Vec<WeightGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightGroup {
    pub paths: Vec<String>,
    pub weights: Vec<WeightSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSpec {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: String,
}

impl WeightSpec {
    pub fn element_count(&self) -> Result<usize, AppError> {
        self.shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| format!("Shape {:?} of weight {} overflows", self.shape, self.name).into())
    }

    pub fn byte_len(&self) -> Result<usize, AppError> {
        self.element_count()?
            .checked_mul(BYTES_PER_WEIGHT)
            .ok_or_else(|| format!("Shape {:?} of weight {} overflows", self.shape, self.name).into())
    }
}

impl ModelDescriptor {
    pub fn parse(bytes: &[u8]) -> Result<Self, AppError> {
        let descriptor: ModelDescriptor = serde_json::from_slice(bytes).map_err(|e| AppError {
            message: format!("Failed to parse model descriptor: {}", e),
        })?;

        if let Some(format) = descriptor.format.as_deref() {
            if format != ARTIFACT_FORMAT {
                return Err(format!("Unsupported model format '{}'", format).into());
            }
        }
        if let Some(spec) = descriptor.weight_specs().find(|w| w.dtype != FLOAT32) {
            return Err(format!(
                "Unsupported dtype '{}' for weight {}",
                spec.dtype, spec.name
            )
            .into());
        }
        descriptor.expected_weight_bytes()?;

        Ok(descriptor)
    }

    pub fn builtin() -> Result<Self, AppError> {
        Self::parse(BUILTIN_ARCHITECTURE.as_bytes())
    }

    pub fn weight_specs(&self) -> impl Iterator<Item = &WeightSpec> {
        self.weights_manifest.iter().flat_map(|g| g.weights.iter())
    }

    pub fn shard_paths(&self) -> impl Iterator<Item = &str> {
        self.weights_manifest
            .iter()
            .flat_map(|g| g.paths.iter().map(String::as_str))
    }

    /// Total shard size the manifest declares, capped at [`MAX_WEIGHT_BYTES`].
    pub fn expected_weight_bytes(&self) -> Result<usize, AppError> {
        let total = self.weight_specs().try_fold(0usize, |acc, w| {
            acc.checked_add(w.byte_len()?)
                .ok_or_else(|| AppError::new("Weights manifest size overflows"))
        })?;
        if total > MAX_WEIGHT_BYTES {
            return Err(format!(
                "Weights manifest declares {} bytes, limit is {}",
                total, MAX_WEIGHT_BYTES
            )
            .into());
        }
        Ok(total)
    }

    fn with_single_shard(&self) -> Self {
        ModelDescriptor {
            weights_manifest: vec![WeightGroup {
                paths: vec![SHARD_FILE.to_string()],
                weights: self.weight_specs().cloned().collect(),
            }],
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedWeight {
    pub name: String,
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct ModelArtifact {
    descriptor: ModelDescriptor,
    weights: Vec<u8>,
}

impl ModelArtifact {
    pub fn new(descriptor: ModelDescriptor, weights: Vec<u8>) -> Result<Self, AppError> {
        let expected = descriptor.expected_weight_bytes()?;
        if weights.len() != expected {
            return Err(format!(
                "Weight data is {} bytes, manifest expects {}",
                weights.len(),
                expected
            )
            .into());
        }
        Ok(Self {
            descriptor,
            weights,
        })
    }

    /// Pairs a bare weights file with the built-in architecture.
    pub fn with_builtin_architecture(weights: Vec<u8>) -> Result<Self, AppError> {
        Self::new(ModelDescriptor::builtin()?, weights)
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    pub fn weight_bytes(&self) -> &[u8] {
        &self.weights
    }

    pub fn named_weights(&self) -> Result<Vec<NamedWeight>, AppError> {
        let mut offset: usize = 0;
        let mut named = Vec::new();
        for spec in self.descriptor.weight_specs() {
            let len = spec.byte_len()?;
            let bytes = offset
                .checked_add(len)
                .and_then(|end| self.weights.get(offset..end))
                .ok_or_else(|| format!("Weight data truncated at {}", spec.name))?;
            named.push(NamedWeight {
                name: spec.name.clone(),
                shape: spec.shape.clone(),
                values: decode_weights(bytes)?,
            });
            offset += len;
        }
        Ok(named)
    }

    /// `model.json` contents for a copy stored next to a single [`SHARD_FILE`].
    pub fn to_model_json(&self) -> Result<Vec<u8>, AppError> {
        Ok(serde_json::to_vec_pretty(&self.descriptor.with_single_shard())?)
    }
}

pub fn decode_weights(bytes: &[u8]) -> Result<Vec<f32>, AppError> {
    let values = <[F32]>::ref_from_bytes(bytes).map_err(|_| AppError {
        message: format!("Weight data length {} is not a multiple of 4", bytes.len()),
    })?;
    Ok(values.iter().map(|v| v.get()).collect())
}

pub fn encode_weights(values: &[f32]) -> Vec<u8> {
    let le: Vec<F32> = values.iter().map(|&v| F32::new(v)).collect();
    le.as_slice().as_bytes().to_vec()
}
