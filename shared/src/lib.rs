use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Leaf condition predicted by the classifier.
///
/// The four disease/health classes are listed in the order of the model's
/// output vector. `Undetected` is never produced by the model itself; it is
/// reported when the top class is not confident enough.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString,
    IntoStaticStr,
)]
pub enum ClassLabel {
    #[strum(serialize = "Iris_yellow_virus")]
    #[serde(rename = "Iris_yellow_virus")]
    IrisYellowVirus,
    #[strum(serialize = "Stemphylium_leaf_blight")]
    #[serde(rename = "Stemphylium_leaf_blight")]
    StemphyliumLeafBlight,
    #[strum(serialize = "healthy")]
    #[serde(rename = "healthy")]
    Healthy,
    #[strum(serialize = "purple_blotch")]
    #[serde(rename = "purple_blotch")]
    PurpleBlotch,
    #[strum(serialize = "Tidak_Terdeteksi")]
    #[serde(rename = "Tidak_Terdeteksi")]
    Undetected,
}

impl ClassLabel {
    /// Model output order.
    pub const CLASSES: [ClassLabel; 4] = [
        ClassLabel::IrisYellowVirus,
        ClassLabel::StemphyliumLeafBlight,
        ClassLabel::Healthy,
        ClassLabel::PurpleBlotch,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::CLASSES.get(index).copied()
    }

    pub fn is_detected(&self) -> bool {
        !matches!(self, ClassLabel::Undetected)
    }

    /// Name shown to users: the class name with underscores turned into spaces.
    pub fn display_name(&self) -> String {
        let name: &'static str = self.into();
        name.replace('_', " ")
    }

    /// Name drawn on webcam frames.
    pub fn overlay_name(&self) -> &'static str {
        match self {
            ClassLabel::Undetected => "Unknown",
            other => other.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PredictResponse {
    pub prediction: String,
    pub confidence: f64,
    pub description: String,
    pub image_path: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DeleteResponse {
    pub status: String,
}

impl DeleteResponse {
    pub fn deleted() -> Self {
        Self {
            status: "deleted".into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn classes_follow_model_output_order() {
        assert_eq!(ClassLabel::from_index(0), Some(ClassLabel::IrisYellowVirus));
        assert_eq!(ClassLabel::from_index(3), Some(ClassLabel::PurpleBlotch));
        assert_eq!(ClassLabel::from_index(4), None);
        assert!(ClassLabel::CLASSES.iter().all(ClassLabel::is_detected));
        assert_eq!(ClassLabel::iter().count(), 5);
    }

    #[test]
    fn display_names_replace_underscores() {
        assert_eq!(
            ClassLabel::StemphyliumLeafBlight.display_name(),
            "Stemphylium leaf blight"
        );
        assert_eq!(ClassLabel::Healthy.display_name(), "healthy");
        assert_eq!(ClassLabel::Undetected.display_name(), "Tidak Terdeteksi");
    }

    #[test]
    fn overlay_uses_unknown_for_sentinel() {
        assert_eq!(ClassLabel::Undetected.overlay_name(), "Unknown");
        assert_eq!(ClassLabel::PurpleBlotch.overlay_name(), "purple_blotch");
    }

    #[test]
    fn class_names_parse_back() {
        assert_eq!(
            ClassLabel::from_str("Iris_yellow_virus").unwrap(),
            ClassLabel::IrisYellowVirus
        );
        assert_eq!(ClassLabel::Healthy.to_string(), "healthy");
    }

    #[test]
    fn predict_response_wire_shape() {
        let response = PredictResponse {
            prediction: "healthy".into(),
            confidence: 97.5,
            description: "ok".into(),
            image_path: "/static/uploads/leaf.jpg".into(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["prediction"], "healthy");
        assert_eq!(json["confidence"], 97.5);
        assert_eq!(json["image_path"], "/static/uploads/leaf.jpg");
        assert_eq!(
            serde_json::to_value(DeleteResponse::deleted()).unwrap(),
            serde_json::json!({"status": "deleted"})
        );
    }
}
