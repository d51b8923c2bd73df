//! Buffer pool configuration

use crate::{
    allocators::BUFFER_ALIGNMENT,
    error::{FramePoolError, Result},
};

use super::slot::{SlotLayout, SLOT_HEADER_SIZE};

/// Configuration for buffer pools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Name of the pool, used in logs and diagnostics
    pub name: String,
    /// Maximum payload bytes a frame drawn from this pool can carry
    pub frame_data_buffer_size: usize,
    /// Bytes reserved for the frame object in front of the payload
    pub frame_obj_size: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            frame_data_buffer_size: 4096,
            frame_obj_size: 256,
        }
    }
}

impl BufferPoolConfig {
    /// Create a new configuration with custom name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set payload capacity
    pub fn with_payload_capacity(mut self, size: usize) -> Self {
        self.frame_data_buffer_size = size;
        self
    }

    /// Set frame object region size
    pub fn with_object_size(mut self, size: usize) -> Self {
        self.frame_obj_size = size;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.frame_data_buffer_size == 0 {
            return Err(FramePoolError::invalid_parameter(
                "frame_data_buffer_size",
                "Payload capacity cannot be zero",
            ));
        }

        if self.frame_obj_size == 0 {
            return Err(FramePoolError::invalid_parameter(
                "frame_obj_size",
                "Frame object size cannot be zero",
            ));
        }

        if self
            .frame_data_buffer_size
            .checked_add(self.frame_obj_size)
            .and_then(|n| n.checked_add(SLOT_HEADER_SIZE + BUFFER_ALIGNMENT))
            .map_or(true, |n| n > isize::MAX as usize)
        {
            return Err(FramePoolError::invalid_parameter(
                "frame_data_buffer_size",
                "Slot size overflows the address space",
            ));
        }

        Ok(())
    }

    /// Slot geometry derived from this configuration
    pub fn layout(&self) -> SlotLayout {
        SlotLayout::new(self.frame_obj_size, self.frame_data_buffer_size)
    }

    /// Bytes each slot of this pool charges against the budget
    pub fn frame_total_size(&self) -> usize {
        self.layout().total_size
    }
}

/// Builder pattern for buffer pool configuration
pub struct BufferPoolConfigBuilder {
    config: BufferPoolConfig,
}

impl BufferPoolConfigBuilder {
    /// Create a new builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: BufferPoolConfig::new(name),
        }
    }

    /// Set payload capacity
    pub fn payload_capacity(mut self, size: usize) -> Self {
        self.config.frame_data_buffer_size = size;
        self
    }

    /// Set frame object region size
    pub fn object_size(mut self, size: usize) -> Self {
        self.config.frame_obj_size = size;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<BufferPoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
