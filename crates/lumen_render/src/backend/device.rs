//! wgpu Render Device
//!
//! [`WgpuDevice`] implements [`RenderDevice`] on top of a [`WgpuContext`].
//! Commands are recorded into one lazily created `CommandEncoder` that is
//! flushed by [`submit`](RenderDevice::submit). Staging copies recorded during
//! a frame get their `map_async` request right after that submission.
//!
//! Scene drawing happens outside the trait: after
//! [`HdrRenderTarget::bind`](crate::hdr_target::HdrRenderTarget::bind), call
//! [`WgpuDevice::begin_scene_pass`] to get a render pass on the bound HDR
//! color and depth attachments.

use std::iter;

use smallvec::SmallVec;

use lumen_core::{LumenError, Result};

use super::context::WgpuContext;
use super::pipelines::{PipelineCache, TargetFormats};
use super::readback::{PendingMap, STAGING_SIZE, StagingSlot};
use crate::device::{
    FullScreenDraw, ReadbackWait, RenderDevice, TargetDesc, TargetFormat, TextureHandle,
};

// ============================================================================
// Handles
// ============================================================================

#[derive(Debug, Clone)]
pub struct WgpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: TargetFormat,
    width: u32,
    height: u32,
}

impl WgpuTexture {
    #[must_use]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    #[must_use]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }
}

impl TextureHandle for WgpuTexture {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn format(&self) -> TargetFormat {
        self.format
    }
}

#[derive(Debug, Clone)]
pub struct WgpuDepth {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl WgpuDepth {
    #[must_use]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

pub struct WgpuUniform {
    buffer: wgpu::Buffer,
}

struct BoundTargets {
    colors: SmallVec<[wgpu::TextureView; 2]>,
    color_formats: TargetFormats,
    depth: Option<wgpu::TextureView>,
}

// ============================================================================
// WgpuDevice
// ============================================================================

pub struct WgpuDevice {
    ctx: WgpuContext,
    encoder: Option<wgpu::CommandEncoder>,
    pipelines: PipelineCache,
    pending_maps: Vec<PendingMap>,
    viewport: (u32, u32),
    bound: Option<BoundTargets>,
}

impl WgpuDevice {
    #[must_use]
    pub fn new(ctx: WgpuContext) -> Self {
        let viewport = ctx.size();
        Self {
            ctx,
            encoder: None,
            pipelines: PipelineCache::new(),
            pending_maps: Vec::new(),
            viewport,
            bound: None,
        }
    }

    #[must_use]
    pub fn context(&self) -> &WgpuContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut WgpuContext {
        &mut self.ctx
    }

    /// Wraps a presentation texture so it can be a tone-map output.
    pub fn wrap_surface_texture(&self, texture: &wgpu::Texture) -> Result<WgpuTexture> {
        let format = TargetFormat::from_wgpu(texture.format()).ok_or_else(|| {
            LumenError::SurfaceError(format!(
                "surface format {:?} cannot be a tone-map output",
                texture.format()
            ))
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(WgpuTexture {
            texture: texture.clone(),
            view,
            format,
            width: texture.width(),
            height: texture.height(),
        })
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.ctx.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Lumen Frame Encoder"),
            })
        })
    }

    /// Color formats of the currently bound targets, for building scene
    /// pipelines that match them.
    #[must_use]
    pub fn bound_color_formats(&self) -> Option<&[wgpu::TextureFormat]> {
        self.bound.as_ref().map(|b| b.color_formats.as_slice())
    }

    /// Begins a render pass on the bound color and depth targets, keeping
    /// their contents. Returns `None` when nothing is bound.
    pub fn begin_scene_pass(&mut self, label: &str) -> Option<wgpu::RenderPass<'_>> {
        let bound = self.bound.as_ref()?;
        let (width, height) = self.viewport;
        let device = &self.ctx.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Lumen Frame Encoder"),
            })
        });

        let color_attachments: SmallVec<[Option<wgpu::RenderPassColorAttachment>; 2]> = bound
            .colors
            .iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let depth_stencil_attachment =
            bound
                .depth
                .as_ref()
                .map(|view| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            ..Default::default()
        });
        pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
        Some(pass)
    }

    fn check_size(&self, label: &str, width: u32, height: u32) -> Result<()> {
        let max = self.ctx.max_texture_dimension();
        if width == 0 || height == 0 {
            return Err(LumenError::resource(label, format!("zero-sized {width}x{height}")));
        }
        if width > max || height > max {
            return Err(LumenError::resource(
                label,
                format!("{width}x{height} exceeds the {max} texture limit"),
            ));
        }
        Ok(())
    }
}

impl RenderDevice for WgpuDevice {
    type Texture = WgpuTexture;
    type DepthTexture = WgpuDepth;
    type Staging = StagingSlot;
    type Uniform = WgpuUniform;

    fn create_color_target(&mut self, desc: &TargetDesc<'_>) -> Result<WgpuTexture> {
        self.check_size(desc.label, desc.width, desc.height)?;
        let texture = self.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format.to_wgpu(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(WgpuTexture {
            texture,
            view,
            format: desc.format,
            width: desc.width,
            height: desc.height,
        })
    }

    fn create_depth_target(&mut self, label: &str, width: u32, height: u32) -> Result<WgpuDepth> {
        self.check_size(label, width, height)?;
        let texture = self.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.ctx.depth_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(WgpuDepth { texture, view })
    }

    fn create_staging(&mut self, label: &str) -> Result<StagingSlot> {
        Ok(StagingSlot::new(&self.ctx.device, label))
    }

    fn create_uniform(&mut self, label: &str, size: u64) -> Result<WgpuUniform> {
        let buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(WgpuUniform { buffer })
    }

    fn destroy_texture(&mut self, texture: WgpuTexture) {
        texture.texture.destroy();
    }

    fn destroy_depth(&mut self, depth: WgpuDepth) {
        depth.texture.destroy();
    }

    fn destroy_staging(&mut self, staging: StagingSlot) {
        staging.release();
        staging.buffer().destroy();
    }

    fn destroy_uniform(&mut self, uniform: WgpuUniform) {
        uniform.buffer.destroy();
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn bind_targets(&mut self, colors: &[&WgpuTexture], depth: Option<&WgpuDepth>) {
        self.bound = Some(BoundTargets {
            colors: colors.iter().map(|t| t.view.clone()).collect(),
            color_formats: colors.iter().map(|t| t.format.to_wgpu()).collect(),
            depth: depth.map(|d| d.view.clone()),
        });
    }

    fn unbind_targets(&mut self) {
        self.bound = None;
    }

    fn clear_color(&mut self, target: &WgpuTexture, color: [f32; 4]) {
        let [r, g, b, a] = color.map(f64::from);
        let encoder = self.encoder();
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Color"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            ..Default::default()
        });
    }

    fn clear_depth(&mut self, depth: &WgpuDepth, value: f32) {
        let has_stencil = self.ctx.depth_format.has_stencil_aspect();
        let encoder = self.encoder();
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Depth"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(value),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: has_stencil.then_some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0),
                    store: wgpu::StoreOp::Store,
                }),
            }),
            ..Default::default()
        });
    }

    fn write_uniform(&mut self, uniform: &WgpuUniform, bytes: &[u8]) {
        self.ctx.queue.write_buffer(&uniform.buffer, 0, bytes);
    }

    fn full_screen_draw(&mut self, draw: &FullScreenDraw<'_, Self>) -> Result<()> {
        draw.assert_well_formed();

        let formats: TargetFormats = draw.targets.iter().map(|t| t.format.to_wgpu()).collect();
        let entry = self
            .pipelines
            .get_or_create(&self.ctx.device, draw.program, &formats)?
            .clone();

        let mut entries: SmallVec<[wgpu::BindGroupEntry; 4]> = draw
            .inputs
            .iter()
            .enumerate()
            .map(|(i, input)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(&input.view),
            })
            .collect();
        if let Some(uniform) = draw.uniform {
            entries.push(wgpu::BindGroupEntry {
                binding: draw.inputs.len() as u32,
                resource: uniform.buffer.as_entire_binding(),
            });
        }
        let bind_group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(draw.label),
            layout: &entry.layout,
            entries: &entries,
        });

        let color_attachments: SmallVec<[Option<wgpu::RenderPassColorAttachment>; 3]> = draw
            .targets
            .iter()
            .map(|target| {
                Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let (width, height) = draw.targets[0].size();
        let encoder = self.encoder();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(draw.label),
            color_attachments: &color_attachments,
            ..Default::default()
        });
        pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
        pass.set_pipeline(&entry.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }

    fn copy_to_staging(&mut self, source: &WgpuTexture, staging: &StagingSlot) {
        let pending = staging.mark_recorded();
        self.encoder().copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &source.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: staging.buffer(),
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(STAGING_SIZE as u32),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        self.pending_maps.push(pending);
    }

    fn map_for_read(&mut self, staging: &StagingSlot, wait: ReadbackWait) -> Result<f32> {
        let poll = match wait {
            ReadbackWait::Poll => wgpu::PollType::Poll,
            ReadbackWait::Block => wgpu::PollType::wait_indefinitely(),
        };
        if let Err(e) = self.ctx.device.poll(poll) {
            log::warn!("Device poll failed while reading {}: {e}", staging.label());
        }
        staging.read()
    }

    fn unmap(&mut self, staging: &StagingSlot) {
        staging.release();
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.ctx.queue.submit(iter::once(encoder.finish()));
        }
        for pending in self.pending_maps.drain(..) {
            pending.request();
        }
    }

    fn push_debug_group(&mut self, label: &str) {
        self.encoder().push_debug_group(label);
    }

    fn pop_debug_group(&mut self) {
        self.encoder().pop_debug_group();
    }
}
