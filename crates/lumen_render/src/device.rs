//! Render Device Abstraction
//!
//! The tone-mapping pipeline never talks to a graphics API directly. It
//! records its work through the [`RenderDevice`] trait, which exposes exactly
//! what the pipeline consumes:
//!
//! - color and depth render targets that can be bound, cleared and sampled
//! - full-screen draws of a [`PixelProgram`] over a set of input textures
//! - a one-texel staging copy that the CPU can map and read
//!
//! Two implementations ship with the crate:
//!
//! | Backend                                         | Use                                  |
//! |-------------------------------------------------|--------------------------------------|
//! | [`WgpuDevice`](crate::backend::WgpuDevice)      | Real GPU rendering through wgpu      |
//! | [`SoftwareDevice`](crate::software::SoftwareDevice) | CPU reference used by tests      |
//!
//! The vertex stage of every full-screen draw is the shared "mapping"
//! triangle, so callers only choose the pixel program.

use lumen_core::Result;
use serde::{Deserialize, Serialize};

use crate::tone_mapping::composite::ToneMapCurve;

// ============================================================================
// Formats
// ============================================================================

/// Color formats a render target can be created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TargetFormat {
    /// Half-float RGBA, the default HDR scene format.
    #[default]
    Rgba16Float,
    /// Full-float RGBA.
    Rgba32Float,
    /// Single-channel float, used by every luminance pyramid image.
    R32Float,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
}

impl TargetFormat {
    /// Number of color channels stored per texel.
    #[inline]
    #[must_use]
    pub fn channels(self) -> usize {
        match self {
            Self::R32Float => 1,
            _ => 4,
        }
    }

    /// Returns `true` for formats that keep values outside `[0, 1]`.
    #[inline]
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Self::Rgba16Float | Self::Rgba32Float | Self::R32Float)
    }

    #[must_use]
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            Self::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            Self::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            Self::R32Float => wgpu::TextureFormat::R32Float,
            Self::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            Self::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            Self::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            Self::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        }
    }

    /// Maps a wgpu format back, returning `None` for formats the pipeline
    /// cannot render into.
    #[must_use]
    pub fn from_wgpu(format: wgpu::TextureFormat) -> Option<Self> {
        Some(match format {
            wgpu::TextureFormat::Rgba16Float => Self::Rgba16Float,
            wgpu::TextureFormat::Rgba32Float => Self::Rgba32Float,
            wgpu::TextureFormat::R32Float => Self::R32Float,
            wgpu::TextureFormat::Rgba8Unorm => Self::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8UnormSrgb => Self::Rgba8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm => Self::Bgra8Unorm,
            wgpu::TextureFormat::Bgra8UnormSrgb => Self::Bgra8UnormSrgb,
            _ => return None,
        })
    }
}

/// Description of a color render target.
#[derive(Debug, Clone, Copy)]
pub struct TargetDesc<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: TargetFormat,
}

impl<'a> TargetDesc<'a> {
    #[must_use]
    pub fn new(label: &'a str, width: u32, height: u32, format: TargetFormat) -> Self {
        Self {
            label,
            width,
            height,
            format,
        }
    }
}

/// Common queries on texture handles handed out by a device.
pub trait TextureHandle {
    /// `(width, height)` in texels.
    fn size(&self) -> (u32, u32);

    fn format(&self) -> TargetFormat;
}

// ============================================================================
// Programs
// ============================================================================

/// Pixel programs the pipeline can run in a full-screen draw.
///
/// | Program      | Inputs                          | Targets                 | Uniform |
/// |--------------|---------------------------------|-------------------------|---------|
/// | `Brightness` | HDR frame                       | min, avg, max (R32F)    | no      |
/// | `Downsample` | min, avg, max of the next level | min, avg, max (R32F)    | no      |
/// | `ToneMap`    | HDR frame                       | presentation target     | yes     |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelProgram {
    Brightness,
    Downsample,
    ToneMap(ToneMapCurve),
}

impl PixelProgram {
    /// Template name under `shaders/`.
    #[must_use]
    pub fn template_name(self) -> &'static str {
        match self {
            Self::Brightness => "brightness",
            Self::Downsample => "downsample",
            Self::ToneMap(_) => "tonemap",
        }
    }

    #[must_use]
    pub fn input_count(self) -> usize {
        match self {
            Self::Brightness | Self::ToneMap(_) => 1,
            Self::Downsample => 3,
        }
    }

    #[must_use]
    pub fn target_count(self) -> usize {
        match self {
            Self::Brightness | Self::Downsample => 3,
            Self::ToneMap(_) => 1,
        }
    }

    #[must_use]
    pub fn uses_uniform(self) -> bool {
        matches!(self, Self::ToneMap(_))
    }
}

/// One full-screen draw: run `program` for every texel of `targets`.
///
/// All targets must share the same size. Every target is overwritten.
pub struct FullScreenDraw<'a, D: RenderDevice + ?Sized> {
    /// Debug label, also used as the render pass label.
    pub label: &'a str,
    pub program: PixelProgram,
    pub inputs: &'a [&'a D::Texture],
    pub uniform: Option<&'a D::Uniform>,
    pub targets: &'a [&'a D::Texture],
}

impl<D: RenderDevice + ?Sized> FullScreenDraw<'_, D> {
    /// Asserts the draw matches its program's signature.
    ///
    /// A mismatch is a wiring bug in the caller, never a runtime condition.
    pub fn assert_well_formed(&self) {
        assert_eq!(
            self.inputs.len(),
            self.program.input_count(),
            "{}: {:?} expects {} inputs",
            self.label,
            self.program,
            self.program.input_count()
        );
        assert_eq!(
            self.targets.len(),
            self.program.target_count(),
            "{}: {:?} expects {} targets",
            self.label,
            self.program,
            self.program.target_count()
        );
        assert_eq!(
            self.uniform.is_some(),
            self.program.uses_uniform(),
            "{}: uniform binding does not match {:?}",
            self.label,
            self.program
        );
        if let Some(first) = self.targets.first() {
            let size = first.size();
            assert!(
                self.targets.iter().all(|t| t.size() == size),
                "{}: all targets of a draw must share one size",
                self.label
            );
        }
    }
}

// ============================================================================
// Readback
// ============================================================================

/// How [`RenderDevice::map_for_read`] behaves when the copy has not landed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadbackWait {
    /// Return [`ReadbackContention`](lumen_core::LumenError::ReadbackContention)
    /// immediately.
    Poll,
    /// Block until the GPU has finished the copy.
    Block,
}

// ============================================================================
// RenderDevice
// ============================================================================

/// Everything the HDR pipeline needs from a graphics backend.
///
/// Handles are backend-owned values. Texture handles are cheap to clone and
/// stay valid until passed to the matching `destroy_*` call.
pub trait RenderDevice {
    type Texture: TextureHandle + Clone;
    type DepthTexture: Clone;
    type Staging;
    type Uniform;

    // --- resources ---------------------------------------------------------

    /// Creates a color target usable as render attachment and shader input.
    fn create_color_target(&mut self, desc: &TargetDesc<'_>) -> Result<Self::Texture>;

    fn create_depth_target(&mut self, label: &str, width: u32, height: u32)
    -> Result<Self::DepthTexture>;

    /// Creates a CPU-readable staging slot holding one `f32`.
    fn create_staging(&mut self, label: &str) -> Result<Self::Staging>;

    fn create_uniform(&mut self, label: &str, size: u64) -> Result<Self::Uniform>;

    fn destroy_texture(&mut self, texture: Self::Texture);

    fn destroy_depth(&mut self, depth: Self::DepthTexture);

    fn destroy_staging(&mut self, staging: Self::Staging);

    fn destroy_uniform(&mut self, uniform: Self::Uniform);

    // --- binding and clears ------------------------------------------------

    fn set_viewport(&mut self, width: u32, height: u32);

    /// Binds color targets and an optional depth target for scene drawing.
    fn bind_targets(&mut self, colors: &[&Self::Texture], depth: Option<&Self::DepthTexture>);

    fn unbind_targets(&mut self);

    fn clear_color(&mut self, target: &Self::Texture, color: [f32; 4]);

    fn clear_depth(&mut self, depth: &Self::DepthTexture, value: f32);

    // --- drawing -----------------------------------------------------------

    fn write_uniform(&mut self, uniform: &Self::Uniform, bytes: &[u8]);

    fn full_screen_draw(&mut self, draw: &FullScreenDraw<'_, Self>) -> Result<()>;

    // --- readback ----------------------------------------------------------

    /// Records a copy of texel `(0, 0)` of `source` into `staging`.
    fn copy_to_staging(&mut self, source: &Self::Texture, staging: &Self::Staging);

    /// Maps `staging` and returns the copied value.
    ///
    /// Fails with `ReadbackContention` when the data is not available.
    fn map_for_read(&mut self, staging: &Self::Staging, wait: ReadbackWait) -> Result<f32>;

    /// Releases a mapping, or abandons one still in flight. No-op when idle.
    fn unmap(&mut self, staging: &Self::Staging);

    // --- submission --------------------------------------------------------

    /// Flushes all recorded commands to the queue.
    fn submit(&mut self);

    fn push_debug_group(&mut self, _label: &str) {}

    fn pop_debug_group(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wgpu_format_mapping_is_reversible() {
        for format in [
            TargetFormat::Rgba16Float,
            TargetFormat::Rgba32Float,
            TargetFormat::R32Float,
            TargetFormat::Rgba8Unorm,
            TargetFormat::Rgba8UnormSrgb,
            TargetFormat::Bgra8Unorm,
            TargetFormat::Bgra8UnormSrgb,
        ] {
            assert_eq!(TargetFormat::from_wgpu(format.to_wgpu()), Some(format));
        }
        assert_eq!(TargetFormat::from_wgpu(wgpu::TextureFormat::Depth32Float), None);
    }

    #[test]
    fn program_signatures() {
        assert_eq!(PixelProgram::Brightness.target_count(), 3);
        assert_eq!(PixelProgram::Downsample.input_count(), 3);
        assert!(PixelProgram::ToneMap(ToneMapCurve::Reinhard).uses_uniform());
        assert!(!PixelProgram::Downsample.uses_uniform());
    }
}
