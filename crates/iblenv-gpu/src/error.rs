//! GPU backend error types.

use iblenv_core::IblError;
use thiserror::Error;

/// Errors that can occur while setting up or running compute kernels.
#[derive(Error, Debug)]
pub enum GpuError {
    /// No suitable adapter was found.
    #[error("failed to find a compute adapter: {0}")]
    AdapterCreationFailed(#[from] wgpu::RequestAdapterError),

    /// Failed to create the wgpu device.
    #[error("failed to create compute device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// A kernel failed to compile or its pipeline could not be created.
    #[error("pipeline creation failed: {0}")]
    PipelineCreationFailed(String),

    /// The device reported an error while running a kernel.
    #[error("dispatch failed: {0}")]
    DispatchFailed(String),

    /// Reading results back from the device failed.
    #[error("buffer map failed: {0}")]
    BufferMapFailed(String),

    /// The session was used after `release`.
    #[error("backend session already released")]
    Released,
}

impl From<GpuError> for IblError {
    fn from(err: GpuError) -> Self {
        match err {
            GpuError::AdapterCreationFailed(_)
            | GpuError::DeviceCreationFailed(_)
            | GpuError::PipelineCreationFailed(_) => IblError::BackendInitFailed(err.to_string()),
            GpuError::DispatchFailed(_) | GpuError::BufferMapFailed(_) | GpuError::Released => {
                IblError::BackendComputeFailed(err.to_string())
            }
        }
    }
}

/// A specialized Result type for GPU operations.
pub type GpuResult<T> = std::result::Result<T, GpuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let init: IblError = GpuError::PipelineCreationFailed("bad shader".into()).into();
        assert!(init.is_recoverable());
        assert!(init.to_string().contains("bad shader"));

        let compute: IblError = GpuError::BufferMapFailed("lost".into()).into();
        assert!(matches!(compute, IblError::BackendComputeFailed(_)));
        assert!(!compute.is_recoverable());

        let released: IblError = GpuError::Released.into();
        assert!(!released.is_recoverable());
    }
}
