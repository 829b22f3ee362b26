use std::path::Path;

use tract_onnx::prelude::*;

use super::{InferenceError, InputTensor, ModelRuntime};

/// ONNX classifier, optimized once at load time.
pub struct TractModel {
    plan: TypedRunnableModel<TypedModel>,
}

impl TractModel {
    pub fn load(path: &Path, input_size: u32) -> Result<Self, InferenceError> {
        let size = input_size as usize;
        let load_err = |e: TractError| InferenceError::Load(path.display().to_string(), e.to_string());

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(load_err)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, size, size, 3)),
            )
            .map_err(load_err)?
            .into_optimized()
            .map_err(load_err)?
            .into_runnable()
            .map_err(load_err)?;

        log::info!("Loaded ONNX model from {}", path.display());
        Ok(Self { plan })
    }
}

impl ModelRuntime for TractModel {
    fn predict(&self, input: &InputTensor) -> Result<Vec<f32>, InferenceError> {
        let tensor = Tensor::from_shape(&input.shape, &input.data)
            .map_err(|e| InferenceError::Model(e.to_string()))?;
        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| InferenceError::Model(e.to_string()))?;
        let scores = outputs
            .first()
            .ok_or(InferenceError::EmptyOutput)?
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::Model(e.to_string()))?;
        Ok(scores.iter().copied().collect())
    }
}
