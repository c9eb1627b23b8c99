//! Lumen Render
//!
//! HDR scene targets and the adaptive tone-mapping pipeline:
//!
//! - [`hdr_target`]: per-buffer HDR color + depth attachments
//! - [`tone_mapping`]: luminance pyramid, brightness reduction, temporal
//!   adaptation and the tone-map composite, driven by [`ToneMapper`]
//! - [`device`]: the [`RenderDevice`] abstraction the pipeline records into
//! - [`backend`]: the wgpu implementation, [`software`]: the CPU reference
//! - [`context`]: [`RenderContext`], which owns a device and a tone mapper
//!   and renders complete frames

pub mod backend;
pub mod context;
pub mod device;
pub mod hdr_target;
pub mod settings;
pub mod shaders;
pub mod software;
pub mod tone_mapping;

pub use backend::{WgpuContext, WgpuDevice};
pub use context::{FrameStatus, RenderContext};
pub use device::{
    FullScreenDraw, PixelProgram, ReadbackWait, RenderDevice, TargetDesc, TargetFormat,
    TextureHandle,
};
pub use hdr_target::{Attachment, HdrRenderTarget};
pub use settings::RendererSettings;
pub use software::SoftwareDevice;
pub use tone_mapping::ToneMapper;
pub use tone_mapping::adaptation::{AdaptUniforms, AdaptationFilter, AdaptationOutcome};
pub use tone_mapping::composite::{ToneMapComposite, ToneMapCurve};
pub use tone_mapping::pyramid::{LuminanceLevel, LuminancePyramid, Reduction};
pub use tone_mapping::reduction::BrightnessReduction;
pub use tone_mapping::settings::{ReadbackLatency, ToneMappingSettings};
