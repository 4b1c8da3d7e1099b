//! Render error types

use std::fmt;

/// Error type for GPU setup, resource allocation, and frame presentation
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// No adapter compatible with the surface was found
    AdapterUnavailable,
    /// The adapter refused the device request
    DeviceRequest(String),
    /// The window surface could not be created
    Surface(String),
    /// A GPU resource could not be created
    Allocation { what: String, reason: String },
    /// Surface was lost (window resized, minimized, etc.)
    SurfaceLost,
    /// GPU out of memory
    OutOfMemory,
    /// Other surface error
    Other(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::AdapterUnavailable => write!(f, "No suitable GPU adapter"),
            RenderError::DeviceRequest(msg) => write!(f, "Device request failed: {}", msg),
            RenderError::Surface(msg) => write!(f, "Surface creation failed: {}", msg),
            RenderError::Allocation { what, reason } => {
                write!(f, "Failed to allocate {}: {}", what, reason)
            }
            RenderError::SurfaceLost => write!(f, "Surface lost"),
            RenderError::OutOfMemory => write!(f, "Out of memory"),
            RenderError::Other(msg) => write!(f, "Render error: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<wgpu::SurfaceError> for RenderError {
    fn from(err: wgpu::SurfaceError) -> Self {
        match err {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => RenderError::SurfaceLost,
            wgpu::SurfaceError::OutOfMemory => RenderError::OutOfMemory,
            other => RenderError::Other(format!("{:?}", other)),
        }
    }
}

impl From<wgpu::CreateSurfaceError> for RenderError {
    fn from(err: wgpu::CreateSurfaceError) -> Self {
        RenderError::Surface(err.to_string())
    }
}

impl From<wgpu::RequestDeviceError> for RenderError {
    fn from(err: wgpu::RequestDeviceError) -> Self {
        RenderError::DeviceRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_display() {
        assert_eq!(format!("{}", RenderError::SurfaceLost), "Surface lost");
        assert_eq!(format!("{}", RenderError::OutOfMemory), "Out of memory");
        assert_eq!(
            format!("{}", RenderError::Other("test".to_string())),
            "Render error: test"
        );
    }

    #[test]
    fn test_allocation_display() {
        let err = RenderError::Allocation {
            what: "AO 0".to_string(),
            reason: "out of memory".to_string(),
        };
        assert_eq!(format!("{}", err), "Failed to allocate AO 0: out of memory");
    }

    #[test]
    fn test_from_surface_error() {
        assert_eq!(RenderError::from(wgpu::SurfaceError::Lost), RenderError::SurfaceLost);
        assert_eq!(RenderError::from(wgpu::SurfaceError::Outdated), RenderError::SurfaceLost);
        assert_eq!(RenderError::from(wgpu::SurfaceError::OutOfMemory), RenderError::OutOfMemory);
        assert!(matches!(
            RenderError::from(wgpu::SurfaceError::Timeout),
            RenderError::Other(_)
        ));
    }
}
