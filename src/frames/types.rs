//! Ready-made frame object types

use crate::{
    error::{FramePoolError, Result},
    registry::FrameType,
};

use super::object::{FrameObject, Payload};

/// Capture bookkeeping carried by every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Kind of frame
    pub frame_type: FrameType,
    /// Sensor frame counter
    pub frame_number: u64,
    /// Capture timestamp in microseconds
    pub timestamp_us: u64,
}

impl FrameHeader {
    /// Create a header
    pub fn new(frame_type: FrameType, frame_number: u64, timestamp_us: u64) -> Self {
        Self {
            frame_type,
            frame_number,
            timestamp_us,
        }
    }
}

/// Untyped frame: a header and a byte payload
#[derive(Debug)]
pub struct RawFrame {
    header: FrameHeader,
    payload: Payload,
}

impl FrameObject for RawFrame {
    type Init = FrameHeader;

    fn construct(payload: Payload, header: FrameHeader) -> Result<Self> {
        Ok(Self { header, payload })
    }
}

impl RawFrame {
    /// Capture bookkeeping
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// Frame bytes
    pub fn data(&self) -> &[u8] {
        self.payload.as_slice()
    }

    /// Payload region
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Writable payload region
    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }
}

/// Geometry of a video frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFrameInit {
    pub header: FrameHeader,
    pub width: u32,
    pub height: u32,
    /// Bytes per pixel
    pub bpp: u32,
    /// Bytes per row, 0 = tightly packed
    pub stride: u32,
}

/// Frame with 2D image geometry
#[derive(Debug)]
pub struct VideoFrame {
    header: FrameHeader,
    width: u32,
    height: u32,
    bpp: u32,
    stride: u32,
    payload: Payload,
}

impl FrameObject for VideoFrame {
    type Init = VideoFrameInit;

    fn construct(mut payload: Payload, init: VideoFrameInit) -> Result<Self> {
        if init.width == 0 || init.height == 0 || init.bpp == 0 {
            return Err(FramePoolError::frame_construction(format!(
                "degenerate geometry {}x{} @ {} bpp",
                init.width, init.height, init.bpp
            )));
        }

        let row = init.width as usize * init.bpp as usize;
        let stride = match init.stride {
            0 => row,
            s if (s as usize) < row => {
                return Err(FramePoolError::frame_construction(format!(
                    "stride {} shorter than row of {} bytes",
                    s, row
                )))
            }
            s => s as usize,
        };

        let size = stride * init.height as usize;
        if size > payload.capacity() {
            return Err(FramePoolError::frame_construction(format!(
                "{} image bytes exceed payload capacity {}",
                size,
                payload.capacity()
            )));
        }
        payload.set_len(size)?;

        Ok(Self {
            header: init.header,
            width: init.width,
            height: init.height,
            bpp: init.bpp,
            stride: stride as u32,
            payload,
        })
    }
}

impl VideoFrame {
    /// Capture bookkeeping
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        self.bpp
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Image bytes, `stride * height` long
    pub fn data(&self) -> &[u8] {
        self.payload.as_slice()
    }

    /// Writable image bytes
    pub fn data_mut(&mut self) -> &mut [u8] {
        let len = self.payload.len();
        &mut self.payload.as_mut_slice()[..len]
    }

    /// One image row
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height || self.payload.is_released() {
            return None;
        }
        let start = y as usize * self.stride as usize;
        let row = self.width as usize * self.bpp as usize;
        self.data().get(start..start + row)
    }

    /// Detach the image bytes once a consumer has copied them out
    pub fn release_payload(&mut self) -> Result<()> {
        self.payload.release()
    }
}
