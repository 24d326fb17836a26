use crate::common::region::Region;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single result produced by a stage: where it was found, plus the
/// kind-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub location: Region,
    pub kind: DetectionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectionKind {
    Face { label: String, confidence: f32 },
    Emotion { label: String },
    AgeGender { age: f32, male_probability: f32 },
    HeadPose { yaw: f32, pitch: f32, roll: f32 },
}

impl Detection {
    pub fn new(location: Region, kind: DetectionKind) -> Self {
        Self { location, kind }
    }

    pub fn face(location: Region, confidence: f32) -> Self {
        Self::new(
            location,
            DetectionKind::Face {
                label: "face".to_string(),
                confidence,
            },
        )
    }

    pub fn emotion(location: Region, label: impl Into<String>) -> Self {
        Self::new(
            location,
            DetectionKind::Emotion {
                label: label.into(),
            },
        )
    }

    pub fn age_gender(location: Region, age: f32, male_probability: f32) -> Self {
        Self::new(
            location,
            DetectionKind::AgeGender {
                age,
                male_probability,
            },
        )
    }

    pub fn head_pose(location: Region, yaw: f32, pitch: f32, roll: f32) -> Self {
        Self::new(location, DetectionKind::HeadPose { yaw, pitch, roll })
    }
}

impl DetectionKind {
    pub fn name(&self) -> &'static str {
        match self {
            DetectionKind::Face { .. } => "face",
            DetectionKind::Emotion { .. } => "emotion",
            DetectionKind::AgeGender { .. } => "age_gender",
            DetectionKind::HeadPose { .. } => "head_pose",
        }
    }
}

impl fmt::Display for DetectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionKind::Face { label, confidence } => {
                write!(f, "{label} (confidence {confidence:.3})")
            }
            DetectionKind::Emotion { label } => write!(f, "emotion: {label}"),
            DetectionKind::AgeGender {
                age,
                male_probability,
            } => {
                let gender = if *male_probability > 0.5 { "M" } else { "F" };
                write!(f, "age {age:.0}, gender {gender}")
            }
            DetectionKind::HeadPose { yaw, pitch, roll } => {
                write!(f, "head pose yaw {yaw:.1} pitch {pitch:.1} roll {roll:.1}")
            }
        }
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.location)
    }
}
