//! Error types for Shoal.
//!
//! Only setup and IO surfaces fail: GPU initialization, kernel compilation,
//! config loading, buffer readback. The per-tick path never returns an
//! error for a missing resource; it reports a skipped dispatch instead.

use thiserror::Error;

/// Errors produced by the flocking core.
#[derive(Debug, Error)]
pub enum ShoalError {
    /// No compatible GPU adapter found.
    #[error(
        "No compatible GPU adapter found. \
         Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support."
    )]
    NoAdapter,

    /// Failed to create GPU device.
    #[error("Failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),

    /// Failed to map buffer for reading.
    #[error("Failed to map GPU buffer: {0}")]
    BufferMapping(String),

    /// The kernel source did not parse.
    #[error("Failed to parse flocking kernel: {0}")]
    KernelParse(String),

    /// The kernel source has no compute entry point with the requested name.
    #[error("Kernel entry point `{0}` not found")]
    KernelEntryPointMissing(String),

    /// A buffer would exceed the device's storage binding limit.
    #[error("Agent buffer of {requested} bytes exceeds device limit of {limit} bytes")]
    BufferTooLarge { requested: u64, limit: u64 },

    /// Failed to read or write a config file.
    #[error("Config file error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for [`FlockingConfig`](crate::FlockingConfig).
    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config values are out of their legal range.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ShoalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_too_large_message() {
        let err = ShoalError::BufferTooLarge {
            requested: 4096,
            limit: 1024,
        };
        assert_eq!(
            err.to_string(),
            "Agent buffer of 4096 bytes exceeds device limit of 1024 bytes"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ShoalError = io.into();
        assert!(matches!(err, ShoalError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }
}
