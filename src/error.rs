//! Error handling for the loudtrie library
//!
//! One error enum covers the four failure classes of the engine: argument
//! validation, lifecycle misuse, I/O and data-format problems, and capacity
//! overflow during construction.

use thiserror::Error;

/// Main error type for the loudtrie library
#[derive(Error, Debug)]
pub enum TrieError {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or corrupt serialized data
    #[error("Invalid data: {message}")]
    InvalidData {
        /// Error message describing the issue
        message: String,
    },

    /// Index out of bounds access
    #[error("Out of bounds: index {index}, size {size}")]
    OutOfBounds {
        /// The invalid index
        index: usize,
        /// The valid size/length
        size: usize,
    },

    /// Invalid configuration flags or arguments
    #[error("Invalid configuration: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },

    /// Operation not valid in the current lifecycle state
    #[error("Invalid state: {message}")]
    State {
        /// Description of the state violation
        message: String,
    },

    /// A vector, link index or tail offset outgrew its representation
    #[error("Capacity exceeded: {message}")]
    Capacity {
        /// Description of the exhausted resource
        message: String,
    },
}

impl TrieError {
    /// Create an invalid data error
    pub fn invalid_data<S: Into<String>>(message: S) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create an out of bounds error
    pub fn out_of_bounds(index: usize, size: usize) -> Self {
        Self::OutOfBounds { index, size }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a lifecycle state error
    pub fn state<S: Into<String>>(message: S) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create a capacity error
    pub fn capacity<S: Into<String>>(message: S) -> Self {
        Self::Capacity {
            message: message.into(),
        }
    }

    /// Create an I/O error from a message
    pub fn io_error<S: Into<String>>(message: S) -> Self {
        Self::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            message.into(),
        ))
    }

    /// Get the error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::InvalidData { .. } => "data",
            Self::OutOfBounds { .. } => "bounds",
            Self::Configuration { .. } => "config",
            Self::State { .. } => "state",
            Self::Capacity { .. } => "capacity",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TrieError>;

/// Assert that an index is within bounds
#[inline]
pub fn check_bounds(index: usize, size: usize) -> Result<()> {
    if index >= size {
        Err(TrieError::out_of_bounds(index, size))
    } else {
        Ok(())
    }
}
