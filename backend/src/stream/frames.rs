use std::convert::Infallible;
use std::io::Cursor;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::web::Bytes;
use futures::Stream;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::{Overlay, frame_part};
use crate::camera::{Camera, CameraError, FrameSource};
use crate::inference::InferenceService;
use crate::model::InferenceError;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Streaming,
    /// Terminal: the source ended, failed, or the stream was cancelled.
    Exhausted,
}

/// Lazy sequence of annotated, multipart-framed JPEG frames from one camera handle.
pub struct AnnotatedFrames {
    source: Box<dyn FrameSource>,
    service: InferenceService,
    overlay: Arc<Overlay>,
    jpeg_quality: u8,
    cancel: CancellationToken,
    state: StreamState,
    frames_sent: u64,
}

impl AnnotatedFrames {
    pub fn new(
        source: Box<dyn FrameSource>,
        service: InferenceService,
        overlay: Arc<Overlay>,
        jpeg_quality: u8,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            service,
            overlay,
            jpeg_quality,
            cancel,
            state: StreamState::Streaming,
            frames_sent: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    fn annotate(&self, frame: RgbImage) -> Result<Bytes, StreamError> {
        let frame = DynamicImage::ImageRgb8(frame);
        let prediction = self.service.classify_frame(&frame)?;

        let mut frame = frame.into_rgb8();
        self.overlay.draw(&mut frame, &prediction);

        let mut jpeg = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut jpeg, self.jpeg_quality).encode_image(&frame)?;
        Ok(frame_part(jpeg.get_ref()))
    }

    fn finish(&mut self) -> Option<Bytes> {
        self.state = StreamState::Exhausted;
        None
    }
}

impl Iterator for AnnotatedFrames {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        if self.state == StreamState::Exhausted {
            return None;
        }
        if self.cancel.is_cancelled() {
            log::debug!("Frame stream cancelled after {} frames", self.frames_sent);
            return self.finish();
        }

        let frame = match self.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("Camera ran out of frames after {}", self.frames_sent);
                return self.finish();
            }
            Err(e) => {
                log::warn!("Stopping frame stream: {}", e);
                return self.finish();
            }
        };

        match self.annotate(frame) {
            Ok(part) => {
                self.frames_sent += 1;
                Some(part)
            }
            Err(e) => {
                log::error!("Stopping frame stream: {}", e);
                self.finish()
            }
        }
    }
}

/// Everything a `/video_feed` request needs to start its own capture.
#[derive(Clone)]
pub struct StreamAnnotator {
    camera: Arc<dyn Camera>,
    service: InferenceService,
    overlay: Arc<Overlay>,
    jpeg_quality: u8,
}

impl StreamAnnotator {
    pub fn new(
        camera: Arc<dyn Camera>,
        service: InferenceService,
        overlay: Overlay,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            camera,
            service,
            overlay: Arc::new(overlay),
            jpeg_quality,
        }
    }

    /// Opens a new camera handle; each call owns its own device.
    pub fn start(&self, cancel: CancellationToken) -> Result<AnnotatedFrames, StreamError> {
        let source = self.camera.open()?;
        log::info!("Streaming from {}", self.camera.describe());
        Ok(AnnotatedFrames::new(
            source,
            self.service.clone(),
            self.overlay.clone(),
            self.jpeg_quality,
            cancel,
        ))
    }

    /// Runs the frame loop on a blocking thread and hands chunks to the response.
    ///
    /// Dropping the returned stream (client went away) cancels the loop.
    pub fn byte_stream(&self) -> FrameStream {
        let cancel = CancellationToken::new();
        let (tx, rx) = tokio::sync::mpsc::channel::<Bytes>(1);
        let annotator = self.clone();
        let token = cancel.clone();

        actix_web::rt::task::spawn_blocking(move || {
            let frames = match annotator.start(token.clone()) {
                Ok(frames) => frames,
                Err(e) => {
                    log::warn!("Video feed unavailable: {}", e);
                    return;
                }
            };
            for part in frames {
                if tx.blocking_send(part).is_err() {
                    log::info!("Video feed client disconnected");
                    token.cancel();
                    break;
                }
            }
        });

        FrameStream {
            parts: ReceiverStream::new(rx),
            _cancel_on_drop: cancel.drop_guard(),
        }
    }
}

pub struct FrameStream {
    parts: ReceiverStream<Bytes>,
    _cancel_on_drop: DropGuard,
}

impl Stream for FrameStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.parts).poll_next(cx).map(|part| part.map(Ok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::DirectoryCamera;
    use crate::config::{NormalizationConfig, ThresholdConfig};
    use crate::model::{InputTensor, ModelRuntime, Preprocessor};
    use futures::StreamExt;
    use image::Rgb;
    use std::path::Path;

    struct Scores(Vec<f32>);

    impl ModelRuntime for Scores {
        fn predict(&self, _input: &InputTensor) -> Result<Vec<f32>, InferenceError> {
            Ok(self.0.clone())
        }
    }

    fn service(scores: Vec<f32>) -> InferenceService {
        InferenceService::new(
            Arc::new(Scores(scores)),
            Preprocessor::new(32, NormalizationConfig::default()),
            &ThresholdConfig::default(),
        )
    }

    fn write_frames(dir: &Path, count: usize) {
        for i in 0..count {
            RgbImage::from_pixel(48, 32, Rgb([30, 140, 50]))
                .save(dir.join(format!("frame_{:03}.png", i)))
                .unwrap();
        }
    }

    fn annotator(dir: &Path, scores: Vec<f32>) -> StreamAnnotator {
        StreamAnnotator::new(
            Arc::new(DirectoryCamera::new(dir.to_path_buf())),
            service(scores),
            Overlay::bundled(24.0).unwrap(),
            80,
        )
    }

    #[test]
    fn yields_one_framed_jpeg_per_frame_then_stays_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 3);

        let mut frames = annotator(dir.path(), vec![0.9, 0.05, 0.03, 0.02])
            .start(CancellationToken::new())
            .unwrap();
        let parts: Vec<Bytes> = frames.by_ref().collect();

        assert_eq!(parts.len(), 3);
        for part in &parts {
            assert!(part.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8"));
            assert!(part.ends_with(b"\r\n"));
        }
        assert_eq!(frames.state(), StreamState::Exhausted);
        assert_eq!(frames.frames_sent(), 3);
        assert!(frames.next().is_none());
    }

    #[test]
    fn cancellation_stops_the_sequence() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 5);

        let token = CancellationToken::new();
        let mut frames = annotator(dir.path(), vec![0.9, 0.05, 0.03, 0.02])
            .start(token.clone())
            .unwrap();

        assert!(frames.next().is_some());
        token.cancel();
        assert!(frames.next().is_none());
        assert_eq!(frames.state(), StreamState::Exhausted);
        assert_eq!(frames.frames_sent(), 1);
    }

    #[test]
    fn model_failure_ends_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 2);

        let mut frames = annotator(dir.path(), vec![1.0, 0.0])
            .start(CancellationToken::new())
            .unwrap();
        assert!(frames.next().is_none());
        assert_eq!(frames.state(), StreamState::Exhausted);
    }

    #[test]
    fn unavailable_camera_fails_to_start() {
        let annotator = annotator(Path::new("/nonexistent/frames"), vec![0.25; 4]);
        assert!(matches!(
            annotator.start(CancellationToken::new()),
            Err(StreamError::Camera(CameraError::Open(_)))
        ));
    }

    #[actix_web::test]
    async fn byte_stream_forwards_all_frames() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 2);

        let parts: Vec<_> = annotator(dir.path(), vec![0.1, 0.1, 0.1, 0.7])
            .byte_stream()
            .collect()
            .await;
        assert_eq!(parts.len(), 2);
    }

    #[actix_web::test]
    async fn byte_stream_is_empty_without_camera() {
        let parts: Vec<_> = annotator(Path::new("/nonexistent/frames"), vec![0.25; 4])
            .byte_stream()
            .collect()
            .await;
        assert!(parts.is_empty());
    }
}
