//! Flattening of hand landmarks into the model input vector.
//!
//! Layout matches the training data: landmark-major, coordinate-minor
//! (`[lm0.x, lm0.y, lm0.z, lm1.x, ...]`).

use crate::types::{LandmarkSet, HAND_LANDMARKS};

/// 21 landmarks × (x, y, z)
pub const FEATURE_LEN: usize = HAND_LANDMARKS * 3;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector([f32; FEATURE_LEN]);

impl FeatureVector {
    /// Builds the vector for a detected hand. Returns `None` for an empty set.
    pub fn from_landmarks(landmarks: &LandmarkSet) -> Option<Self> {
        if landmarks.is_empty() {
            return None;
        }

        let mut values = [0.0; FEATURE_LEN];
        for (i, lm) in landmarks.points().iter().enumerate() {
            values[i * 3] = lm.x;
            values[i * 3 + 1] = lm.y;
            values[i * 3 + 2] = lm.z;
        }
        Some(Self(values))
    }

    pub fn from_values(values: [f32; FEATURE_LEN]) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        FEATURE_LEN
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Landmark;

    #[test]
    fn empty_hand_has_no_features() {
        assert!(FeatureVector::from_landmarks(&LandmarkSet::empty()).is_none());
    }

    #[test]
    fn layout_is_landmark_major() {
        let mut points = [Landmark::default(); HAND_LANDMARKS];
        for (i, p) in points.iter_mut().enumerate() {
            let i = i as f32;
            *p = Landmark::new(i, i + 0.25, i + 0.5);
        }
        let features = FeatureVector::from_landmarks(&LandmarkSet::from_array(points)).unwrap();
        let v = features.as_slice();

        assert_eq!(v.len(), 63);
        assert_eq!(&v[0..3], &[0.0, 0.25, 0.5]);
        assert_eq!(&v[3..6], &[1.0, 1.25, 1.5]);
        assert_eq!(&v[60..63], &[20.0, 20.25, 20.5]);
    }
}
