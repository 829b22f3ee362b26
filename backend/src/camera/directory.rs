use std::path::PathBuf;
use std::vec::IntoIter;

use image::RgbImage;

use super::{Camera, CameraError, FrameSource};

/// Replays the images of a directory in file-name order, once.
#[derive(Debug, Clone)]
pub struct DirectoryCamera {
    dir: PathBuf,
}

impl DirectoryCamera {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl Camera for DirectoryCamera {
    fn open(&self) -> Result<Box<dyn FrameSource>, CameraError> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", self.dir.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| image::ImageFormat::from_path(path).is_ok())
            .collect();
        files.sort();

        log::debug!(
            "Opened frame directory {} with {} frames",
            self.dir.display(),
            files.len()
        );
        Ok(Box::new(DirectoryFrames {
            files: files.into_iter(),
        }))
    }

    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }
}

struct DirectoryFrames {
    files: IntoIter<PathBuf>,
}

impl FrameSource for DirectoryFrames {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CameraError> {
        let Some(path) = self.files.next() else {
            return Ok(None);
        };
        let frame = image::open(&path)
            .map_err(|e| CameraError::Read(format!("{}: {}", path.display(), e)))?;
        Ok(Some(frame.to_rgb8()))
    }
}
