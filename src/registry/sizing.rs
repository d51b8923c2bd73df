//! Payload capacity estimation for stream profiles

use std::{fmt, str::FromStr};

use crate::error::{FramePoolError, Result};

use super::key::FrameType;

/// Pixel formats produced by depth/vision sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Z16,
    Disparity16,
    Disparity32,
    Y8,
    Y10Bpack,
    Y16,
    Raw10,
    Raw16,
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
    Yuyv,
    Uyvy,
    /// Compressed; sized by its decoded RGB upper bound
    Mjpeg,
    Xyz32f,
    MotionXyz32f,
}

impl PixelFormat {
    /// Bytes per pixel as `(numerator, denominator)`
    pub fn bytes_per_pixel(&self) -> (usize, usize) {
        match self {
            PixelFormat::Y8 => (1, 1),
            PixelFormat::Y10Bpack | PixelFormat::Raw10 => (5, 4),
            PixelFormat::Z16
            | PixelFormat::Disparity16
            | PixelFormat::Y16
            | PixelFormat::Raw16
            | PixelFormat::Yuyv
            | PixelFormat::Uyvy => (2, 1),
            PixelFormat::Rgb8 | PixelFormat::Bgr8 | PixelFormat::Mjpeg => (3, 1),
            PixelFormat::Rgba8 | PixelFormat::Bgra8 | PixelFormat::Disparity32 => (4, 1),
            PixelFormat::Xyz32f | PixelFormat::MotionXyz32f => (12, 1),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::Z16 => "z16",
            PixelFormat::Disparity16 => "disparity16",
            PixelFormat::Disparity32 => "disparity32",
            PixelFormat::Y8 => "y8",
            PixelFormat::Y10Bpack => "y10bpack",
            PixelFormat::Y16 => "y16",
            PixelFormat::Raw10 => "raw10",
            PixelFormat::Raw16 => "raw16",
            PixelFormat::Rgb8 => "rgb8",
            PixelFormat::Bgr8 => "bgr8",
            PixelFormat::Rgba8 => "rgba8",
            PixelFormat::Bgra8 => "bgra8",
            PixelFormat::Yuyv => "yuyv",
            PixelFormat::Uyvy => "uyvy",
            PixelFormat::Mjpeg => "mjpeg",
            PixelFormat::Xyz32f => "xyz32f",
            PixelFormat::MotionXyz32f => "motion_xyz32f",
        }
    }

    const ALL: [PixelFormat; 17] = [
        PixelFormat::Z16,
        PixelFormat::Disparity16,
        PixelFormat::Disparity32,
        PixelFormat::Y8,
        PixelFormat::Y10Bpack,
        PixelFormat::Y16,
        PixelFormat::Raw10,
        PixelFormat::Raw16,
        PixelFormat::Rgb8,
        PixelFormat::Bgr8,
        PixelFormat::Rgba8,
        PixelFormat::Bgra8,
        PixelFormat::Yuyv,
        PixelFormat::Uyvy,
        PixelFormat::Mjpeg,
        PixelFormat::Xyz32f,
        PixelFormat::MotionXyz32f,
    ];
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = FramePoolError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        PixelFormat::ALL
            .into_iter()
            .find(|f| f.name() == lower)
            .ok_or_else(|| FramePoolError::invalid_parameter("format", format!("unknown pixel format '{}'", s)))
    }
}

/// A negotiated sensor stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamProfile {
    pub frame_type: FrameType,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl StreamProfile {
    pub fn new(frame_type: FrameType, format: PixelFormat, width: u32, height: u32, fps: u32) -> Self {
        Self {
            frame_type,
            format,
            width,
            height,
            fps,
        }
    }
}

/// Computes the payload capacity a frame class is bucketed by
pub trait FrameSizeEstimator: Send + Sync + fmt::Debug {
    /// Payload bytes for a `width × height` image in `format`
    fn estimate(&self, format: PixelFormat, width: u32, height: u32) -> Result<usize>;

    /// Payload bytes for a stream profile
    fn estimate_profile(&self, profile: &StreamProfile) -> Result<usize> {
        self.estimate(profile.format, profile.width, profile.height)
    }
}

/// `width × height × bytes_per_pixel`, rounded up for packed formats
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSizeEstimator;

impl FrameSizeEstimator for DefaultSizeEstimator {
    fn estimate(&self, format: PixelFormat, width: u32, height: u32) -> Result<usize> {
        if width == 0 || height == 0 {
            return Err(FramePoolError::invalid_parameter(
                "resolution",
                format!("{}x{} has no pixels", width, height),
            ));
        }

        let (num, den) = format.bytes_per_pixel();
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(num))
            .map(|bytes| (bytes + den - 1) / den)
            .ok_or_else(|| {
                FramePoolError::invalid_parameter("resolution", format!("{}x{} {} overflows", width, height, format))
            })
    }
}
