//! Lumen
//!
//! A wgpu renderer whose scene is drawn into HDR targets and brought to the
//! display by an adaptive tone-mapping pipeline.
//!
//! The umbrella crate re-exports the workspace:
//!
//! - [`core`]: errors and frame timing (`lumen_core`)
//! - [`render`]: HDR targets, the tone mapper and its GPU/CPU devices
//!   (`lumen_render`)
//! - [`app`]: the winit application shell (`lumen_app`, `winit` feature)

pub use lumen_core as core;
pub use lumen_render as render;

#[cfg(feature = "winit")]
pub use lumen_app as app;

pub use lumen_core::{LumenError, Result, Timer};
pub use lumen_render::{
    AdaptationOutcome, FrameStatus, HdrRenderTarget, ReadbackLatency, RenderContext,
    RenderDevice, RendererSettings, SoftwareDevice, ToneMapCurve, ToneMapper,
    ToneMappingSettings,
};

/// Everything an application needs in one import.
pub mod prelude {
    pub use lumen_core::{LumenError, Result, Timer};
    pub use lumen_render::{
        AdaptationOutcome, FrameStatus, ReadbackLatency, RenderContext, RenderDevice,
        RendererSettings, TargetFormat, ToneMapCurve, ToneMapper, ToneMappingSettings,
        WgpuDevice,
    };

    #[cfg(feature = "winit")]
    pub use lumen_app::{App, AppHandler, FrameState, Key, LightRig, PointLight};
    #[cfg(feature = "winit")]
    pub use lumen_app::winit::Window;
}
