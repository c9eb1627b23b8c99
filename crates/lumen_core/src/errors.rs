//! Error Types
//!
//! This module defines the error types used throughout the renderer.
//!
//! # Overview
//!
//! The main error type [`LumenError`] covers:
//! - GPU initialization failures (adapter, device, surface)
//! - Resource allocation failures for render targets and staging buffers
//! - Readback contention on the CPU-visible staging texel
//! - Shader template and compilation failures
//! - Settings file errors
//!
//! # Severity
//!
//! | Variant                | Severity    | Handling                                   |
//! |------------------------|-------------|--------------------------------------------|
//! | `ResourceCreation`     | Fatal       | Aborts initialization / resize             |
//! | `ShaderCompile`        | Fatal       | Aborts pipeline creation                   |
//! | `ReadbackContention`   | Recoverable | Adaptation skips the frame, keeps old value|
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, LumenError>`.

use thiserror::Error;

/// The main error type for the Lumen renderer.
#[derive(Error, Debug)]
pub enum LumenError {
    // ========================================================================
    // GPU & Rendering Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(String),

    /// Surface creation or configuration failed.
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Event loop error (winit).
    #[error("Event loop error: {0}")]
    EventLoopError(String),

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// A texture, view, staging buffer or uniform buffer could not be allocated.
    #[error("Failed to create {resource}: {reason}")]
    ResourceCreation {
        /// Debug label of the resource being created
        resource: String,
        /// Why the allocation was refused
        reason: String,
    },

    /// The staging texel could not be mapped for CPU reads this frame.
    #[error("Readback contention on {resource}: {reason}")]
    ReadbackContention {
        /// Debug label of the staging resource
        resource: String,
        /// Driver-side reason (pending map, map error, injected fault)
        reason: String,
    },

    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// A shader template failed to load, render or compile.
    #[error("Failed to compile shader '{shader}': {reason}")]
    ShaderCompile {
        /// Logical program name (mapping, brightness, downsample, tonemap)
        shader: String,
        /// Template or compiler message
        reason: String,
    },

    // ========================================================================
    // Configuration & I/O Errors
    // ========================================================================
    /// Settings could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LumenError {
    /// Shorthand for a [`ResourceCreation`](Self::ResourceCreation) error.
    pub fn resource(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResourceCreation {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`ReadbackContention`](Self::ReadbackContention) error.
    pub fn contention(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReadbackContention {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors the frame loop is expected to absorb.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ReadbackContention { .. })
    }
}

/// Alias for `Result<T, LumenError>`.
pub type Result<T> = std::result::Result<T, LumenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_contention_is_recoverable() {
        assert!(LumenError::contention("staging", "busy").is_recoverable());
        assert!(!LumenError::resource("pyramid", "oom").is_recoverable());
        assert!(!LumenError::Config("bad".into()).is_recoverable());
    }

    #[test]
    fn resource_error_message_names_the_resource() {
        let err = LumenError::resource("Luminance Avg 4x4", "out of memory");
        assert_eq!(
            err.to_string(),
            "Failed to create Luminance Avg 4x4: out of memory"
        );
    }
}
