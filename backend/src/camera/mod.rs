pub mod device;
pub mod directory;

use image::RgbImage;

use crate::config::CameraSource;

pub use device::DeviceCamera;
pub use directory::DirectoryCamera;

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),
    #[error("Failed to read frame: {0}")]
    Read(String),
    #[error("Camera capture is not supported in this build: {0}")]
    Unsupported(&'static str),
}

/// An opened capture handle. `Ok(None)` means the source has no more frames.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CameraError>;
}

/// Opens a fresh, exclusively owned capture handle per stream.
pub trait Camera: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameSource>, CameraError>;
    fn describe(&self) -> String;
}

/// Builds the configured camera. A `device` source needs the `webcam` feature.
pub fn from_source(source: &CameraSource) -> Result<Box<dyn Camera>, CameraError> {
    match source {
        CameraSource::Device { index } => {
            if !DeviceCamera::SUPPORTED {
                return Err(CameraError::Unsupported(
                    "capture devices need a build with `--features webcam`; \
                     use `camera.source.kind: directory` otherwise",
                ));
            }
            Ok(Box::new(DeviceCamera::new(*index)))
        }
        CameraSource::Directory { path } => Ok(Box::new(DirectoryCamera::new(path.clone()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn directory_source_builds_a_directory_camera() {
        let camera = from_source(&CameraSource::Directory {
            path: PathBuf::from("/srv/frames"),
        })
        .unwrap();
        assert!(camera.describe().contains("/srv/frames"));
    }

    #[cfg(not(feature = "webcam"))]
    #[test]
    fn device_source_is_refused_without_capture_support() {
        let result = from_source(&crate::config::AppConfig::default().camera.source);
        assert!(matches!(result, Err(CameraError::Unsupported(_))));
    }

    #[cfg(feature = "webcam")]
    #[test]
    fn device_source_builds_a_device_camera() {
        let camera = from_source(&CameraSource::Device { index: 3 }).unwrap();
        assert_eq!(camera.describe(), "capture device 3");
    }
}
