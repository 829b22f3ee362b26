pub mod frames;
pub mod overlay;

pub use frames::{AnnotatedFrames, FrameStream, StreamAnnotator, StreamError, StreamState};
pub use overlay::Overlay;

use actix_web::web::Bytes;

pub const BOUNDARY: &str = "frame";

pub fn content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={}", BOUNDARY)
}

/// Wraps one JPEG in the `multipart/x-mixed-replace` part framing.
pub fn frame_part(jpeg: &[u8]) -> Bytes {
    let header = format!("--{}\r\nContent-Type: image/jpeg\r\n\r\n", BOUNDARY);
    let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_names_the_boundary() {
        assert_eq!(content_type(), "multipart/x-mixed-replace; boundary=frame");
    }

    #[test]
    fn part_is_framed() {
        let part = frame_part(b"JPEG");
        assert_eq!(
            &part[..],
            b"--frame\r\nContent-Type: image/jpeg\r\n\r\nJPEG\r\n"
        );
    }
}
