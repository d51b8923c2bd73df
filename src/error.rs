//! Error types and handling for framepool

/// Result type alias for framepool operations
pub type Result<T> = std::result::Result<T, FramePoolError>;

/// Error types for the frame buffer pool
#[derive(Debug, thiserror::Error)]
pub enum FramePoolError {
    /// I/O related errors (config file loading)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// The global byte budget does not allow the allocation
    #[error("Budget exceeded: requested {requested}, used {used} of {max}")]
    BudgetExceeded {
        requested: usize,
        used: usize,
        max: usize,
    },

    /// The system allocator refused the request
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory { size: usize },

    /// Free list empty and no fresh slot could be allocated
    #[error("Pool exhausted: no slot of {slot_size} bytes available")]
    Exhausted { slot_size: usize },

    /// A frame object type does not fit the slot's object region
    #[error("Unsupported layout: {message}")]
    UnsupportedLayout { message: String },

    /// In-place construction of a frame object failed
    #[error("Frame construction failed: {message}")]
    FrameConstruction { message: String },

    /// The payload region was already released by its frame
    #[error("Payload already released")]
    PayloadReleased,

    /// A frame class was requested with a different frame object type
    #[error("Type mismatch for {key}: registered {registered}, requested {requested}")]
    TypeMismatch {
        key: String,
        registered: &'static str,
        requested: &'static str,
    },

    /// Configuration parsing errors
    #[error("Config error: {message}")]
    Config { message: String },
}

impl FramePoolError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a budget exceeded error
    pub fn budget_exceeded(requested: usize, used: usize, max: usize) -> Self {
        Self::BudgetExceeded {
            requested,
            used,
            max,
        }
    }

    /// Create an out of memory error
    pub fn out_of_memory(size: usize) -> Self {
        Self::OutOfMemory { size }
    }

    /// Create a pool exhausted error
    pub fn exhausted(slot_size: usize) -> Self {
        Self::Exhausted { slot_size }
    }

    /// Create an unsupported layout error
    pub fn unsupported_layout(message: impl Into<String>) -> Self {
        Self::UnsupportedLayout {
            message: message.into(),
        }
    }

    /// Create a frame construction error
    pub fn frame_construction(message: impl Into<String>) -> Self {
        Self::FrameConstruction {
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error is a resource-exhaustion signal rather than a fault
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            Self::Exhausted { .. } | Self::BudgetExceeded { .. } | Self::OutOfMemory { .. }
        )
    }
}

// Convert from common error types
impl From<std::io::Error> for FramePoolError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

impl From<toml::de::Error> for FramePoolError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("TOML error: {}", err))
    }
}
