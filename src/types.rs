use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of keypoints the hand landmark model reports for one hand.
pub const HAND_LANDMARKS: usize = 21;

/// Anatomical indices into a [`LandmarkSet`] (MediaPipe hand convention).
pub mod hand {
    pub const WRIST: usize = 0;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_BASE: usize = 5;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_BASE: usize = 9;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_BASE: usize = 13;
    pub const RING_TIP: usize = 16;
    pub const PINKY_BASE: usize = 17;
    pub const PINKY_TIP: usize = 20;
}

/// A single hand keypoint.
///
/// `x`/`y` are normalized to [0, 1] by image width/height (y grows downward),
/// `z` is relative depth with no fixed range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a hand has exactly {} landmarks, got {}", HAND_LANDMARKS, .0)]
pub struct LandmarkCountError(pub usize);

/// The keypoints of one detected hand, or nothing when no hand was found.
///
/// Length is always 0 or [`HAND_LANDMARKS`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn empty() -> Self {
        Self { points: Vec::new() }
    }

    pub fn from_array(points: [Landmark; HAND_LANDMARKS]) -> Self {
        Self {
            points: points.to_vec(),
        }
    }

    pub fn from_points(points: Vec<Landmark>) -> Result<Self, LandmarkCountError> {
        match points.len() {
            0 | HAND_LANDMARKS => Ok(Self { points }),
            n => Err(LandmarkCountError(n)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    /// Keypoint at an anatomical index, `None` for an empty set.
    pub fn get(&self, index: usize) -> Option<Landmark> {
        self.points.get(index).copied()
    }

    pub fn into_points(self) -> Vec<Landmark> {
        self.points
    }
}

/// Closed set of recognized signs. `None` means no recognized gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GestureLabel {
    #[serde(rename = "I Love You")]
    ILoveYou,
    #[serde(rename = "Hello")]
    Hello,
    #[serde(rename = "Thank You")]
    ThankYou,
    #[serde(rename = "Yes")]
    Yes,
    #[serde(rename = "No")]
    No,
    #[serde(rename = "None")]
    None,
}

/// Class order the trained models were fitted with.
pub const MODEL_LABELS: [GestureLabel; 5] = [
    GestureLabel::ILoveYou,
    GestureLabel::Hello,
    GestureLabel::ThankYou,
    GestureLabel::Yes,
    GestureLabel::No,
];

impl GestureLabel {
    /// Maps a model class index to its label.
    pub fn from_index(idx: usize) -> Option<Self> {
        MODEL_LABELS.get(idx).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GestureLabel::ILoveYou => "I Love You",
            GestureLabel::Hello => "Hello",
            GestureLabel::ThankYou => "Thank You",
            GestureLabel::Yes => "Yes",
            GestureLabel::No => "No",
            GestureLabel::None => "None",
        }
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationResult {
    pub label: GestureLabel,
    /// In [0, 1]. Fixed at 1.0 for the rule engine.
    pub confidence: f32,
}

impl ClassificationResult {
    pub fn new(label: GestureLabel, confidence: f32) -> Self {
        Self { label, confidence }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmark_set_rejects_partial_hands() {
        assert!(LandmarkSet::from_points(vec![]).is_ok());
        assert!(LandmarkSet::from_points(vec![Landmark::default(); 21]).is_ok());
        assert_eq!(
            LandmarkSet::from_points(vec![Landmark::default(); 20]),
            Err(LandmarkCountError(20))
        );
        assert_eq!(
            LandmarkSet::from_points(vec![Landmark::default(); 42]),
            Err(LandmarkCountError(42))
        );
    }

    #[test]
    fn model_label_table_order() {
        assert_eq!(GestureLabel::from_index(0), Some(GestureLabel::ILoveYou));
        assert_eq!(GestureLabel::from_index(1), Some(GestureLabel::Hello));
        assert_eq!(GestureLabel::from_index(2), Some(GestureLabel::ThankYou));
        assert_eq!(GestureLabel::from_index(3), Some(GestureLabel::Yes));
        assert_eq!(GestureLabel::from_index(4), Some(GestureLabel::No));
        assert_eq!(GestureLabel::from_index(5), None);
    }

    #[test]
    fn labels_serialize_as_display_text() {
        let json = serde_json::to_string(&GestureLabel::ThankYou).unwrap();
        assert_eq!(json, "\"Thank You\"");
        let back: GestureLabel = serde_json::from_str("\"I Love You\"").unwrap();
        assert_eq!(back, GestureLabel::ILoveYou);
        assert_eq!(GestureLabel::None.to_string(), "None");
    }
}
