//! Sequential dense network rebuilt from a layered-model artifact.
//!
//! Only the layer kinds the length classifier uses are understood: an input
//! layer, dense layers and dropout (identity at inference time).

use crate::error::AppError;
use crate::services::classifier::artifact::{ModelArtifact, NamedWeight};
use ndarray::{Array1, Array2, Axis};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

impl Activation {
    fn parse(name: &str) -> Result<Self, AppError> {
        match name {
            "linear" => Ok(Activation::Linear),
            "relu" => Ok(Activation::Relu),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "softmax" => Ok(Activation::Softmax),
            other => Err(format!("Unsupported activation '{}'", other).into()),
        }
    }

    fn apply(&self, mut x: Array2<f32>) -> Array2<f32> {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => x.mapv(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Tanh => x.mapv(f32::tanh),
            Activation::Softmax => {
                for mut row in x.axis_iter_mut(Axis(0)) {
                    let max = row.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
                    row.mapv_inplace(|v| (v - max).exp());
                    let sum = row.sum();
                    row.mapv_inplace(|v| v / sum);
                }
                x
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DenseLayer {
    pub name: String,
    kernel: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
}

impl DenseLayer {
    pub fn input_width(&self) -> usize {
        self.kernel.nrows()
    }

    pub fn units(&self) -> usize {
        self.kernel.ncols()
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        self.activation.apply(x.dot(&self.kernel) + &self.bias)
    }
}

#[derive(Debug, Clone)]
pub struct DenseNetwork {
    layers: Vec<DenseLayer>,
    artifact: ModelArtifact,
}

impl DenseNetwork {
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, AppError> {
        let layer_configs = topology_layers(&artifact.descriptor().model_topology)?;
        let weights = artifact.named_weights()?;

        let mut declared_input = None;
        let mut layers: Vec<DenseLayer> = Vec::new();

        for layer in layer_configs {
            let class_name = layer["class_name"].as_str().unwrap_or_default();
            let config = &layer["config"];
            match class_name {
                "InputLayer" => {
                    declared_input = config
                        .get("batch_shape")
                        .or_else(|| config.get("batch_input_shape"))
                        .and_then(|shape| shape.get(1))
                        .and_then(Value::as_u64)
                        .map(|w| w as usize);
                }
                "Dense" => layers.push(dense_layer(config, &weights)?),
                "Dropout" => {}
                other => return Err(format!("Unsupported layer type '{}'", other).into()),
            }
        }

        let first = layers
            .first()
            .ok_or_else(|| AppError::new("Model has no dense layers"))?;
        if let Some(width) = declared_input {
            if width != first.input_width() {
                return Err(format!(
                    "Input layer width {} does not match kernel of {}",
                    width, first.name
                )
                .into());
            }
        }
        for pair in layers.windows(2) {
            if pair[0].units() != pair[1].input_width() {
                return Err(format!(
                    "Layer {} outputs {} values but {} expects {}",
                    pair[0].name,
                    pair[0].units(),
                    pair[1].name,
                    pair[1].input_width()
                )
                .into());
            }
        }

        Ok(Self { layers, artifact })
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub fn input_width(&self) -> usize {
        self.layers.first().map_or(0, DenseLayer::input_width)
    }

    pub fn output_width(&self) -> usize {
        self.layers.last().map_or(0, DenseLayer::units)
    }

    /// The artifact this network was built from, kept for persistence.
    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Runs a batch of shape `[rows, input_width]` through every layer.
    pub fn forward(&self, input: &Array2<f32>) -> Result<Array2<f32>, AppError> {
        if input.ncols() != self.input_width() {
            return Err(format!(
                "Input has {} features, model expects {}",
                input.ncols(),
                self.input_width()
            )
            .into());
        }
        let mut x = input.clone();
        for layer in &self.layers {
            x = layer.forward(&x);
        }
        Ok(x)
    }
}

fn topology_layers(topology: &Value) -> Result<&Vec<Value>, AppError> {
    // Keras 3 nests under model_config, Keras 2 puts config at the top level.
    let config = topology
        .get("model_config")
        .map(|m| &m["config"])
        .unwrap_or(&topology["config"]);
    config
        .get("layers")
        .or(Some(config))
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::new("Model topology has no layer list"))
}

fn dense_layer(config: &Value, weights: &[NamedWeight]) -> Result<DenseLayer, AppError> {
    let name = config["name"]
        .as_str()
        .ok_or_else(|| AppError::new("Dense layer without a name"))?;
    let activation = Activation::parse(config["activation"].as_str().unwrap_or("linear"))?;
    let use_bias = config["use_bias"].as_bool().unwrap_or(true);

    let kernel = find_weight(weights, name, "kernel")
        .ok_or_else(|| format!("Missing kernel for layer {}", name))?;
    let [rows, cols] = kernel.shape[..] else {
        return Err(format!("Kernel of {} is not two-dimensional", name).into());
    };
    let kernel = Array2::from_shape_vec((rows, cols), kernel.values.clone())?;

    let bias = if use_bias {
        let bias = find_weight(weights, name, "bias")
            .ok_or_else(|| format!("Missing bias for layer {}", name))?;
        if bias.shape != [cols] {
            return Err(format!("Bias of {} has shape {:?}, expected [{}]", name, bias.shape, cols).into());
        }
        Array1::from_vec(bias.values.clone())
    } else {
        Array1::zeros(cols)
    };

    if let Some(units) = config["units"].as_u64() {
        if units as usize != cols {
            return Err(format!("Layer {} declares {} units but kernel has {}", name, units, cols).into());
        }
    }

    Ok(DenseLayer {
        name: name.to_string(),
        kernel,
        bias,
        activation,
    })
}

/// Matches `dense/kernel` as well as scoped names like `sequential/dense/kernel`.
fn find_weight<'a>(weights: &'a [NamedWeight], layer: &str, kind: &str) -> Option<&'a NamedWeight> {
    let exact = format!("{}/{}", layer, kind);
    let scoped = format!("/{}", exact);
    weights
        .iter()
        .find(|w| w.name == exact || w.name.ends_with(&scoped))
}
