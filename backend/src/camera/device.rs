use super::{Camera, CameraError, FrameSource};

/// A local capture device, addressed by index.
#[derive(Debug, Clone)]
pub struct DeviceCamera {
    index: i32,
}

impl DeviceCamera {
    /// Whether this build can open capture devices.
    pub const SUPPORTED: bool = cfg!(feature = "webcam");

    pub fn new(index: i32) -> Self {
        Self { index }
    }
}

impl Camera for DeviceCamera {
    #[cfg(feature = "webcam")]
    fn open(&self) -> Result<Box<dyn FrameSource>, CameraError> {
        Ok(Box::new(opencv_capture::OpenCvFrames::open(self.index)?))
    }

    #[cfg(not(feature = "webcam"))]
    fn open(&self) -> Result<Box<dyn FrameSource>, CameraError> {
        Err(CameraError::Unsupported("rebuild with the `webcam` feature"))
    }

    fn describe(&self) -> String {
        format!("capture device {}", self.index)
    }
}

#[cfg(feature = "webcam")]
mod opencv_capture {
    use image::RgbImage;
    use opencv::core::Mat;
    use opencv::prelude::*;
    use opencv::{imgproc, videoio};

    use super::{CameraError, FrameSource};

    pub struct OpenCvFrames {
        capture: videoio::VideoCapture,
    }

    impl OpenCvFrames {
        pub fn open(index: i32) -> Result<Self, CameraError> {
            let capture = videoio::VideoCapture::new(index, videoio::CAP_ANY)
                .map_err(|e| CameraError::Open(e.to_string()))?;
            let opened = capture
                .is_opened()
                .map_err(|e| CameraError::Open(e.to_string()))?;
            if !opened {
                return Err(CameraError::Open(format!("device {} did not open", index)));
            }
            Ok(Self { capture })
        }
    }

    impl FrameSource for OpenCvFrames {
        fn next_frame(&mut self) -> Result<Option<RgbImage>, CameraError> {
            let mut bgr = Mat::default();
            let grabbed = self
                .capture
                .read(&mut bgr)
                .map_err(|e| CameraError::Read(e.to_string()))?;
            if !grabbed || bgr.empty() {
                return Ok(None);
            }

            let mut rgb = Mat::default();
            imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)
                .map_err(|e| CameraError::Read(e.to_string()))?;

            let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
            let bytes = rgb
                .data_bytes()
                .map_err(|e| CameraError::Read(e.to_string()))?
                .to_vec();
            RgbImage::from_raw(width, height, bytes)
                .map(Some)
                .ok_or_else(|| CameraError::Read("frame buffer size mismatch".into()))
        }
    }
}
