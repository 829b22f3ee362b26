use std::path::Path;
use std::sync::Mutex;

use tch::{CModule, Device, Kind, Tensor};

use super::{InferenceError, InputTensor, ModelRuntime};

/// TorchScript classifier exported with an NHWC input.
pub struct TorchModel {
    module: Mutex<CModule>,
    device: Device,
}

impl TorchModel {
    pub fn load(path: &Path, _input_size: u32) -> Result<Self, InferenceError> {
        let device = Device::cuda_if_available();
        let module = CModule::load_on_device(path, device)
            .map_err(|e| InferenceError::Load(path.display().to_string(), e.to_string()))?;
        log::info!("Loaded TorchScript model from {} on {:?}", path.display(), device);
        Ok(Self {
            module: Mutex::new(module),
            device,
        })
    }
}

impl ModelRuntime for TorchModel {
    fn predict(&self, input: &InputTensor) -> Result<Vec<f32>, InferenceError> {
        let shape: Vec<i64> = input.shape.iter().map(|d| *d as i64).collect();
        let tensor = Tensor::from_slice(&input.data)
            .view(shape.as_slice())
            .to_device(self.device);

        let output = {
            let module = self
                .module
                .lock()
                .map_err(|_| InferenceError::Model("model lock poisoned".into()))?;
            module
                .forward_ts(&[tensor])
                .map_err(|e| InferenceError::Model(e.to_string()))?
        };

        let output_flat = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);
        let num_elements = output_flat.size()[0] as usize;
        let mut output_vec = vec![0.0f32; num_elements];
        output_flat.copy_data(&mut output_vec, num_elements);
        Ok(output_vec)
    }
}
