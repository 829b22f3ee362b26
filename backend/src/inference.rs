use std::sync::Arc;

use image::DynamicImage;
use image::imageops::FilterType;
use shared::ClassLabel;

use crate::config::{AppConfig, ThresholdConfig};
use crate::model::{self, InferenceError, ModelRuntime, Preprocessor};

pub const LOW_CONFIDENCE_MESSAGE: &str = "Model kurang yakin terhadap kondisi daun tomat.";

pub fn description(label: ClassLabel) -> &'static str {
    match label {
        ClassLabel::IrisYellowVirus => {
            "Penyakit virus yang menyebabkan daun menguning, \
             pertumbuhan terhambat, dan hasil panen menurun."
        }
        ClassLabel::StemphyliumLeafBlight => {
            "Penyakit jamur yang menyebabkan bercak coklat keabu-abuan \
             pada daun dan dapat menyebabkan daun mengering."
        }
        ClassLabel::Healthy => "Daun bawang dalam kondisi sehat tanpa gejala penyakit.",
        ClassLabel::PurpleBlotch => {
            "Penyakit jamur yang ditandai bercak ungu kehitaman \
             dengan tepi kekuningan pada daun."
        }
        ClassLabel::Undetected => LOW_CONFIDENCE_MESSAGE,
    }
}

/// How a raw top probability turns into a reported label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidencePolicy {
    /// Percent; the top class must score strictly above it.
    pub cutoff: f64,
    /// Decimal places applied before comparing against the cutoff.
    pub round_to: Option<u32>,
    pub filter: FilterType,
}

impl ConfidencePolicy {
    pub fn upload(cutoff: f64) -> Self {
        Self {
            cutoff,
            round_to: Some(2),
            filter: FilterType::CatmullRom,
        }
    }

    pub fn stream(cutoff: f64) -> Self {
        Self {
            cutoff,
            round_to: None,
            filter: FilterType::Triangle,
        }
    }

    fn percent(&self, probability: f32) -> f64 {
        let percent = probability as f64 * 100.0;
        match self.round_to {
            Some(places) => {
                let factor = 10f64.powi(places as i32);
                (percent * factor).round_ties_even() / factor
            }
            None => percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: ClassLabel,
    pub confidence: f64,
    pub description: &'static str,
}

impl Prediction {
    pub fn is_confident(&self) -> bool {
        self.label.is_detected()
    }
}

/// Turns a score vector into a prediction under `policy`.
pub fn decide(scores: &[f32], policy: &ConfidencePolicy) -> Result<Prediction, InferenceError> {
    if scores.is_empty() {
        return Err(InferenceError::EmptyOutput);
    }
    if scores.len() != ClassLabel::CLASSES.len() {
        return Err(InferenceError::ClassCount {
            expected: ClassLabel::CLASSES.len(),
            got: scores.len(),
        });
    }

    let class_id = model::argmax(scores).ok_or_else(|| {
        InferenceError::Model("model returned only NaN scores".into())
    })?;
    let confidence = policy.percent(scores[class_id]);

    let label = match ClassLabel::from_index(class_id) {
        Some(label) if confidence > policy.cutoff => label,
        _ => ClassLabel::Undetected,
    };

    Ok(Prediction {
        label,
        confidence,
        description: description(label),
    })
}

/// Immutable classifier shared by every request handler and stream.
#[derive(Clone)]
pub struct InferenceService {
    model: Arc<dyn ModelRuntime>,
    preprocessor: Preprocessor,
    apply_softmax: bool,
    upload_policy: ConfidencePolicy,
    stream_policy: ConfidencePolicy,
}

impl InferenceService {
    pub fn new(
        model: Arc<dyn ModelRuntime>,
        preprocessor: Preprocessor,
        thresholds: &ThresholdConfig,
    ) -> Self {
        Self {
            model,
            preprocessor,
            apply_softmax: false,
            upload_policy: ConfidencePolicy::upload(thresholds.upload_cutoff),
            stream_policy: ConfidencePolicy::stream(thresholds.stream_cutoff),
        }
    }

    pub fn from_config(model: Arc<dyn ModelRuntime>, config: &AppConfig) -> Self {
        let preprocessor = Preprocessor::new(
            config.model.input_size,
            config.model.normalization.clone(),
        );
        Self::new(model, preprocessor, &config.thresholds).with_softmax(config.model.apply_softmax)
    }

    pub fn with_softmax(mut self, apply_softmax: bool) -> Self {
        self.apply_softmax = apply_softmax;
        self
    }

    pub fn classify(
        &self,
        image: &DynamicImage,
        policy: &ConfidencePolicy,
    ) -> Result<Prediction, InferenceError> {
        let tensor = self.preprocessor.to_tensor(image, policy.filter);
        let mut scores = self.model.predict(&tensor)?;
        if self.apply_softmax {
            scores = model::softmax(&scores);
        }
        decide(&scores, policy)
    }

    /// Decodes uploaded bytes and classifies them with the upload cutoff.
    pub fn classify_upload(&self, image: &[u8]) -> Result<Prediction, InferenceError> {
        let image = Preprocessor::decode(image)?;
        self.classify(&image, &self.upload_policy)
    }

    pub fn classify_frame(&self, frame: &DynamicImage) -> Result<Prediction, InferenceError> {
        self.classify(frame, &self.stream_policy)
    }
}
