use std::path::Path;

use ab_glyph::{FontArc, InvalidFont, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;

use crate::inference::Prediction;

const CONFIDENT: Rgb<u8> = Rgb([0, 255, 0]);
const UNSURE: Rgb<u8> = Rgb([255, 0, 0]);
const ORIGIN: (i32, i32) = (20, 12);

static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// Draws the prediction caption onto webcam frames.
pub struct Overlay {
    font: FontArc,
    scale: PxScale,
}

impl Overlay {
    /// Uses the bundled DejaVu Sans.
    pub fn bundled(scale: f32) -> Result<Self, InvalidFont> {
        Ok(Self {
            font: FontArc::try_from_slice(BUNDLED_FONT)?,
            scale: PxScale::from(scale),
        })
    }

    /// Loads `font_path` when given, falling back to the bundled font if it is unusable.
    pub fn load(font_path: Option<&Path>, scale: f32) -> Result<Self, InvalidFont> {
        let custom = font_path.and_then(|path| match std::fs::read(path) {
            Ok(bytes) => match FontArc::try_from_vec(bytes) {
                Ok(font) => Some(font),
                Err(e) => {
                    log::warn!("Font {} is not usable: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Failed to read font {}: {}", path.display(), e);
                None
            }
        });

        match custom {
            Some(font) => Ok(Self {
                font,
                scale: PxScale::from(scale),
            }),
            None => Self::bundled(scale),
        }
    }

    pub fn caption(prediction: &Prediction) -> String {
        format!(
            "{} ({:.2}%)",
            prediction.label.overlay_name(),
            prediction.confidence
        )
    }

    pub fn color(prediction: &Prediction) -> Rgb<u8> {
        if prediction.is_confident() {
            CONFIDENT
        } else {
            UNSURE
        }
    }

    pub fn draw(&self, frame: &mut RgbImage, prediction: &Prediction) {
        let caption = Self::caption(prediction);
        draw_text_mut(
            frame,
            Self::color(prediction),
            ORIGIN.0,
            ORIGIN.1,
            self.scale,
            &self.font,
            &caption,
        );
    }
}
