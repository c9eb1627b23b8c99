//! Render Context
//!
//! [`RenderContext`] owns the wgpu device and the [`ToneMapper`] and drives a
//! complete frame. The window's resize handler is wired to
//! [`RenderContext::resize`]; nothing is reachable through globals.

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use lumen_core::{LumenError, Result};

use crate::backend::{WgpuContext, WgpuDevice};
use crate::device::RenderDevice;
use crate::settings::RendererSettings;
use crate::shaders;
use crate::tone_mapping::ToneMapper;
use crate::tone_mapping::adaptation::AdaptationOutcome;

/// What happened to a requested frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameStatus {
    Presented(AdaptationOutcome),
    /// The surface was lost or outdated and has been reconfigured.
    SurfaceReconfigured,
    /// No presentation texture this frame (timeout, minimized window).
    Skipped,
}

pub struct RenderContext {
    device: WgpuDevice,
    tone_mapper: ToneMapper<WgpuDevice>,
    buffer_count: usize,
    frame_index: u64,
}

impl RenderContext {
    pub async fn new<W>(
        window: W,
        width: u32,
        height: u32,
        settings: RendererSettings,
    ) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        shaders::validate_all()?;

        let ctx = WgpuContext::new(window, &settings, width, height).await?;
        let (width, height) = ctx.size();
        let mut device = WgpuDevice::new(ctx);

        let buffer_count = settings.buffer_count.max(1);
        let tone_mapper = ToneMapper::initialize(
            &mut device,
            width,
            height,
            buffer_count,
            settings.tone_mapping,
        )?;

        Ok(Self {
            device,
            tone_mapper,
            buffer_count,
            frame_index: 0,
        })
    }

    /// Reconfigures the surface and rebuilds every size-dependent resource.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.device.context_mut().resize(width, height);
        self.tone_mapper.resize(&mut self.device, width, height)
    }

    /// HDR buffer used by the next frame.
    #[must_use]
    pub fn buffer_index(&self) -> usize {
        (self.frame_index % self.buffer_count as u64) as usize
    }

    /// Renders one frame.
    ///
    /// `draw_scene` runs with the frame's HDR color and depth bound; it draws
    /// through [`WgpuDevice::begin_scene_pass`].
    pub fn render_frame<F>(&mut self, draw_scene: F) -> Result<FrameStatus>
    where
        F: FnOnce(&mut WgpuDevice),
    {
        let output = match self.device.context().surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output)
            | wgpu::CurrentSurfaceTexture::Suboptimal(output) => output,
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                let (width, height) = self.device.context().size();
                log::warn!("Surface lost, reconfiguring at {width}x{height}");
                self.device.context_mut().resize(width, height);
                return Ok(FrameStatus::SurfaceReconfigured);
            }
            wgpu::CurrentSurfaceTexture::Timeout => return Ok(FrameStatus::Skipped),
            e => return Err(LumenError::SurfaceError(format!("{e:?}"))),
        };
        let target = self.device.wrap_surface_texture(&output.texture)?;
        let index = self.buffer_index();

        let device = &mut self.device;
        let tone_mapper = &mut self.tone_mapper;

        tone_mapper.clear_render_target(device, index);
        tone_mapper.render_target().bind(device, index);
        device.push_debug_group("Scene");
        draw_scene(device);
        device.pop_debug_group();

        tone_mapper.make_brightness_maps(device, index)?;
        let outcome = tone_mapper.post_process_tone_map(device, index, &target)?;
        tone_mapper.unbind_render_targets(device);

        device.submit();
        output.present();
        self.frame_index += 1;
        Ok(FrameStatus::Presented(outcome))
    }

    #[must_use]
    pub fn device(&self) -> &WgpuDevice {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut WgpuDevice {
        &mut self.device
    }

    #[must_use]
    pub fn tone_mapper(&self) -> &ToneMapper<WgpuDevice> {
        &self.tone_mapper
    }

    pub fn tone_mapper_mut(&mut self) -> &mut ToneMapper<WgpuDevice> {
        &mut self.tone_mapper
    }

    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Releases the tone mapper's GPU resources.
    pub fn destroy(self) {
        let Self {
            mut device,
            tone_mapper,
            ..
        } = self;
        tone_mapper.destroy(&mut device);
        device.submit();
    }
}
