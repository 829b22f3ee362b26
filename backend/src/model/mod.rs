pub mod preprocess;
#[cfg(feature = "torch")]
pub mod torch;
pub mod tract;

use std::path::Path;

pub use preprocess::{InputTensor, Preprocessor};

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Failed to load model {0}: {1}")]
    Load(String, String),
    #[error("Model error: {0}")]
    Model(String),
    #[error("Model returned no scores")]
    EmptyOutput,
    #[error("Model returned {got} scores, expected {expected}")]
    ClassCount { expected: usize, got: usize },
}

/// A loaded classifier. Implementations are shared read-only across workers.
pub trait ModelRuntime: Send + Sync {
    /// Runs one `(1, H, W, 3)` tensor and returns one score per class.
    fn predict(&self, input: &InputTensor) -> Result<Vec<f32>, InferenceError>;
}

/// Picks the runtime from the file extension: `.pt` needs the `torch` feature,
/// everything else goes through the ONNX runtime.
pub fn load_model(path: &Path, input_size: u32) -> Result<Box<dyn ModelRuntime>, InferenceError> {
    let is_torchscript = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "pt" || ext == "pth");

    if is_torchscript {
        #[cfg(feature = "torch")]
        {
            return Ok(Box::new(torch::TorchModel::load(path, input_size)?));
        }
        #[cfg(not(feature = "torch"))]
        {
            return Err(InferenceError::Load(
                path.display().to_string(),
                "TorchScript models need the `torch` feature".into(),
            ));
        }
    }

    Ok(Box::new(tract::TractModel::load(path, input_size)?))
}

/// Index of the highest score. The lowest index wins ties and NaN never wins.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}
