//! Renderer Settings
//!
//! Global configuration consumed once when the [`RenderContext`](crate::context::RenderContext)
//! is created.
//!
//! | Field              | Description                               | Default               |
//! |--------------------|-------------------------------------------|-----------------------|
//! | `vsync`            | Vertical sync enabled                     | `true`                |
//! | `power_preference` | GPU adapter selection strategy            | `HighPerformance`     |
//! | `buffer_count`     | Presentation buffers / HDR targets        | `2`                   |
//! | `required_limits`  | Required wgpu limits                      | Default               |
//! | `depth_format`     | Depth attachment format                   | `Depth24PlusStencil8` |
//! | `tone_mapping`     | See [`ToneMappingSettings`]               | Default               |
//!
//! # Example
//!
//! ```rust,ignore
//! use lumen::render::{RendererSettings, ToneMappingSettings, ToneMapCurve};
//!
//! let settings = RendererSettings {
//!     vsync: false,
//!     tone_mapping: ToneMappingSettings::default().with_curve(ToneMapCurve::Exponential),
//!     ..Default::default()
//! };
//! ```

use crate::tone_mapping::settings::ToneMappingSettings;

#[derive(Debug, Clone)]
pub struct RendererSettings {
    /// When `true`, the frame rate is capped to the display refresh rate.
    pub vsync: bool,

    /// - `HighPerformance`: prefer a discrete GPU
    /// - `LowPower`: prefer an integrated GPU
    pub power_preference: wgpu::PowerPreference,

    /// Number of presentation buffers. One HDR color+depth pair is created
    /// for each.
    pub buffer_count: usize,

    pub required_limits: wgpu::Limits,

    pub depth_format: wgpu::TextureFormat,

    pub tone_mapping: ToneMappingSettings,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            vsync: true,
            power_preference: wgpu::PowerPreference::HighPerformance,
            buffer_count: 2,
            required_limits: wgpu::Limits::default(),
            depth_format: wgpu::TextureFormat::Depth24PlusStencil8,
            tone_mapping: ToneMappingSettings::default(),
        }
    }
}

impl RendererSettings {
    #[must_use]
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    #[must_use]
    pub fn with_buffer_count(mut self, buffer_count: usize) -> Self {
        self.buffer_count = buffer_count.max(1);
        self
    }

    #[must_use]
    pub fn with_tone_mapping(mut self, tone_mapping: ToneMappingSettings) -> Self {
        self.tone_mapping = tone_mapping;
        self
    }
}
