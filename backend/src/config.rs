use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "config/app.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub thresholds: ThresholdConfig,
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub input_size: u32,
    pub normalization: NormalizationConfig,
    pub apply_softmax: bool,
}

/// Per-channel `(value - mean) / std`, applied to raw `0..=255` RGB values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationConfig {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub upload_cutoff: f64,
    pub stream_cutoff: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub source: CameraSource,
    pub font_path: Option<PathBuf>,
    pub font_scale: f32,
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CameraSource {
    Device { index: i32 },
    Directory { path: PathBuf },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            static_dir: PathBuf::from("static"),
            upload_dir: PathBuf::from("static/uploads"),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("hybrid_final.onnx"),
            input_size: 224,
            normalization: NormalizationConfig::default(),
            apply_softmax: false,
        }
    }
}

impl Default for NormalizationConfig {
    // EfficientNet rescales inside the network, so inputs stay in 0..=255.
    fn default() -> Self {
        Self {
            mean: [0.0; 3],
            std: [1.0; 3],
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            upload_cutoff: 40.0,
            stream_cutoff: 50.0,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: CameraSource::Device { index: 0 },
            font_path: None,
            font_scale: 32.0,
            jpeg_quality: 80,
        }
    }
}

impl AppConfig {
    /// Loads `$CONFIG_PATH` (or `config/app.yaml`), then applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(Path::new(&config_path))?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!(
                "Config file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let config_str =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        log::info!("Loaded config from {}", path.display());
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(config_str)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PORT", port.clone()))?;
        }
        if let Ok(model_path) = std::env::var("MODEL_PATH") {
            self.model.path = PathBuf::from(model_path);
        }
        if let Ok(upload_dir) = std::env::var("UPLOAD_DIR") {
            self.server.upload_dir = PathBuf::from(upload_dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, cutoff) in [
            ("thresholds.upload_cutoff", self.thresholds.upload_cutoff),
            ("thresholds.stream_cutoff", self.thresholds.stream_cutoff),
        ] {
            if !(0.0..=100.0).contains(&cutoff) {
                return Err(ConfigError::InvalidValue(name, cutoff.to_string()));
            }
        }
        if self.model.input_size == 0 {
            return Err(ConfigError::InvalidValue("model.input_size", "0".into()));
        }
        if self.model.normalization.std.iter().any(|s| *s == 0.0) {
            return Err(ConfigError::InvalidValue(
                "model.normalization.std",
                format!("{:?}", self.model.normalization.std),
            ));
        }
        if !(1..=100).contains(&self.camera.jpeg_quality) {
            return Err(ConfigError::InvalidValue(
                "camera.jpeg_quality",
                self.camera.jpeg_quality.to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_both_cutoffs() {
        let config = AppConfig::default();
        assert_eq!(config.thresholds.upload_cutoff, 40.0);
        assert_eq!(config.thresholds.stream_cutoff, 50.0);
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.model.input_size, 224);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config = AppConfig::from_yaml(
            r#"
server:
  port: 9000
thresholds:
  upload_cutoff: 50.0
camera:
  source:
    kind: directory
    path: frames
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.thresholds.upload_cutoff, 50.0);
        assert_eq!(config.thresholds.stream_cutoff, 50.0);
        assert_eq!(
            config.camera.source,
            CameraSource::Directory {
                path: PathBuf::from("frames")
            }
        );
    }

    #[test]
    fn out_of_range_cutoff_is_rejected() {
        let mut config = AppConfig::default();
        config.thresholds.stream_cutoff = 120.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue("thresholds.stream_cutoff", _))
        ));
    }

    #[test]
    fn zero_std_is_rejected() {
        let mut config = AppConfig::default();
        config.model.normalization.std = [1.0, 0.0, 1.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_means_defaults() {
        let config = AppConfig::from_file(Path::new("does/not/exist.yaml")).unwrap();
        assert_eq!(config.server.upload_dir, PathBuf::from("static/uploads"));
    }
}
