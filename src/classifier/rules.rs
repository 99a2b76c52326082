//! Geometric gesture rules over raw hand landmarks.
//!
//! Image coordinates grow downward, so a smaller `y` is higher in the frame.

use super::GestureClassifier;
use crate::error::FrameError;
use crate::types::{hand, ClassificationResult, GestureLabel, Landmark, LandmarkSet};

/// How far above its base a fingertip must sit to count as extended.
pub const EXTENDED_THRESHOLD: f32 = 0.1;
/// Max per-axis distance between thumb tip and middle-finger base.
pub const THUMB_NEAR_THRESHOLD: f32 = 0.1;
/// Max horizontal gap between neighbouring fingertips.
pub const FINGERS_CLOSE_THRESHOLD: f32 = 0.05;

/// The rule engine has no probabilistic output; every answer is reported at 1.0.
pub const RULE_CONFIDENCE: f32 = 1.0;

/// Boolean features the rules are written against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandPredicates {
    pub index_extended: bool,
    pub middle_extended: bool,
    pub ring_extended: bool,
    pub pinky_extended: bool,
    pub thumb_near_middle_base: bool,
    /// Wrist right of the index base.
    pub palm_outward: bool,
    /// Wrist above the index base.
    pub palm_down: bool,
    pub fingers_close: bool,
    /// Thumb tip above the wrist.
    pub thumb_above_wrist: bool,
}

fn is_extended(tip: Landmark, base: Landmark) -> bool {
    tip.y < base.y - EXTENDED_THRESHOLD
}

impl HandPredicates {
    /// Returns `None` when no hand was detected.
    pub fn from_landmarks(landmarks: &LandmarkSet) -> Option<Self> {
        let pt = |idx: usize| landmarks.get(idx);

        let wrist = pt(hand::WRIST)?;
        let thumb_tip = pt(hand::THUMB_TIP)?;
        let index_tip = pt(hand::INDEX_TIP)?;
        let middle_tip = pt(hand::MIDDLE_TIP)?;
        let ring_tip = pt(hand::RING_TIP)?;
        let pinky_tip = pt(hand::PINKY_TIP)?;
        let index_base = pt(hand::INDEX_BASE)?;
        let middle_base = pt(hand::MIDDLE_BASE)?;
        let ring_base = pt(hand::RING_BASE)?;
        let pinky_base = pt(hand::PINKY_BASE)?;

        let close = |a: Landmark, b: Landmark| (a.x - b.x).abs() < FINGERS_CLOSE_THRESHOLD;

        Some(Self {
            index_extended: is_extended(index_tip, index_base),
            middle_extended: is_extended(middle_tip, middle_base),
            ring_extended: is_extended(ring_tip, ring_base),
            pinky_extended: is_extended(pinky_tip, pinky_base),
            thumb_near_middle_base: (thumb_tip.x - middle_base.x).abs() < THUMB_NEAR_THRESHOLD
                && (thumb_tip.y - middle_base.y).abs() < THUMB_NEAR_THRESHOLD,
            palm_outward: wrist.x > index_base.x,
            palm_down: wrist.y < index_base.y,
            fingers_close: close(index_tip, middle_tip)
                && close(middle_tip, ring_tip)
                && close(ring_tip, pinky_tip),
            thumb_above_wrist: thumb_tip.y < wrist.y,
        })
    }

    fn all_extended(&self) -> bool {
        self.index_extended && self.middle_extended && self.ring_extended && self.pinky_extended
    }

    fn none_extended(&self) -> bool {
        !self.index_extended && !self.middle_extended && !self.ring_extended && !self.pinky_extended
    }
}

type Rule = fn(&HandPredicates) -> bool;

/// Evaluated top to bottom; the first match wins.
pub const RULES: [(GestureLabel, Rule); 5] = [
    (GestureLabel::ILoveYou, |p| {
        p.index_extended
            && p.pinky_extended
            && !p.middle_extended
            && !p.ring_extended
            && p.thumb_near_middle_base
    }),
    (GestureLabel::Hello, |p| {
        p.all_extended() && p.fingers_close && p.palm_outward
    }),
    (GestureLabel::ThankYou, |p| {
        p.all_extended() && p.fingers_close && !p.palm_outward
    }),
    (GestureLabel::Yes, |p| p.none_extended() && p.thumb_above_wrist),
    (GestureLabel::No, |p| {
        p.index_extended && p.middle_extended && !p.ring_extended && !p.pinky_extended && p.palm_down
    }),
];

pub fn decide(predicates: &HandPredicates) -> GestureLabel {
    RULES
        .iter()
        .find(|(_, rule)| rule(predicates))
        .map(|(label, _)| *label)
        .unwrap_or(GestureLabel::None)
}

/// Stateless classifier driven purely by landmark geometry.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, landmarks: &LandmarkSet) -> ClassificationResult {
        let label = match HandPredicates::from_landmarks(landmarks) {
            Some(predicates) => decide(&predicates),
            None => GestureLabel::None,
        };
        ClassificationResult::new(label, RULE_CONFIDENCE)
    }
}

impl GestureClassifier for RuleBasedClassifier {
    fn name(&self) -> String {
        "Rule-based (hand geometry)".to_string()
    }

    fn classify(&self, landmarks: &LandmarkSet) -> Result<ClassificationResult, FrameError> {
        Ok(RuleBasedClassifier::classify(self, landmarks))
    }
}
