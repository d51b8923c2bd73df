//! Frame classes used to bucket pools

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::FramePoolError;

/// Kind of frame a sensor stream produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameType {
    Video,
    Depth,
    Color,
    Infrared,
    Fisheye,
    Disparity,
    Motion,
    Pose,
    Points,
    Composite,
}

impl FrameType {
    /// All frame types, in key order
    pub const ALL: [FrameType; 10] = [
        FrameType::Video,
        FrameType::Depth,
        FrameType::Color,
        FrameType::Infrared,
        FrameType::Fisheye,
        FrameType::Disparity,
        FrameType::Motion,
        FrameType::Pose,
        FrameType::Points,
        FrameType::Composite,
    ];

    /// Lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            FrameType::Video => "video",
            FrameType::Depth => "depth",
            FrameType::Color => "color",
            FrameType::Infrared => "infrared",
            FrameType::Fisheye => "fisheye",
            FrameType::Disparity => "disparity",
            FrameType::Motion => "motion",
            FrameType::Pose => "pose",
            FrameType::Points => "points",
            FrameType::Composite => "composite",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FrameType {
    type Err = FramePoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        FrameType::ALL
            .into_iter()
            .find(|t| t.name() == lower)
            .ok_or_else(|| FramePoolError::invalid_parameter("frame_type", format!("unknown frame type '{}'", s)))
    }
}

/// `(frame type, max payload size)`: requests with equal keys share a pool
///
/// Ordered by frame type, then payload size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameClassKey {
    pub frame_type: FrameType,
    pub max_payload_size: usize,
}

impl FrameClassKey {
    pub fn new(frame_type: FrameType, max_payload_size: usize) -> Self {
        Self {
            frame_type,
            max_payload_size,
        }
    }
}

impl fmt::Display for FrameClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.frame_type, self.max_payload_size)
    }
}
