//! HDR Scene
//!
//! A ray-traced sphere on a checkered floor lit by three point lights,
//! rendered into the HDR target and tone mapped with eye adaptation.
//!
//! Controls:
//! - F1 / F2 / F3: cycle the intensity of light 1 / 2 / 3 (1, 10, 100)
//! - T: switch between the Reinhard and exponential tone curves
//! - Esc: quit
//!
//! Usage: `hdr_scene [tone_mapping.json]`

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use lumen::prelude::*;

const SCENE_SHADER: &str = include_str!("scene.wgsl");

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct SceneUniforms {
    lights: [[f32; 4]; LightRig::LIGHT_COUNT],
    camera: [f32; 4],
}

impl SceneUniforms {
    fn new(rig: &LightRig, aspect: f32, time: f32) -> Self {
        Self {
            lights: rig
                .lights
                .map(|l| [l.position.x, l.position.y, l.position.z, l.intensity]),
            camera: [aspect, time, 0.0, 0.0],
        }
    }
}

struct HdrSceneApp {
    rig: LightRig,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    report_timer: f32,
}

impl HdrSceneApp {
    fn create_pipeline(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> (wgpu::RenderPipeline, wgpu::BindGroupLayout) {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("HDR Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(SCENE_SHADER.into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("HDR Scene Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("HDR Scene Pipeline Layout"),
            bind_group_layouts: &[Some(&layout)],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("HDR Scene Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: Some(true),
                depth_compare: Some(wgpu::CompareFunction::LessEqual),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        (pipeline, layout)
    }
}

impl AppHandler for HdrSceneApp {
    fn init(ctx: &mut RenderContext, _window: &Arc<Window>) -> lumen::Result<Self> {
        let color_format = ctx.tone_mapper().settings().hdr_format.to_wgpu();
        let wgpu_ctx = ctx.device().context();
        let device = &wgpu_ctx.device;

        let (pipeline, layout) =
            Self::create_pipeline(device, color_format, wgpu_ctx.depth_format);

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("HDR Scene Uniforms"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("HDR Scene Bind Group"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        log::info!("F1/F2/F3 cycle light intensity, T switches the tone curve");

        Ok(Self {
            rig: LightRig::new(),
            pipeline,
            uniform_buffer,
            bind_group,
            report_timer: 0.0,
        })
    }

    fn on_key(&mut self, ctx: &mut RenderContext, key: Key) -> bool {
        if self.rig.handle_key(key) {
            return true;
        }
        if key == Key::T {
            let curve = match ctx.tone_mapper().settings().curve {
                ToneMapCurve::Reinhard => ToneMapCurve::Exponential,
                ToneMapCurve::Exponential => ToneMapCurve::Reinhard,
            };
            log::info!("Tone curve: {curve:?}");
            ctx.tone_mapper_mut().set_curve(curve);
            return true;
        }
        false
    }

    fn update(&mut self, ctx: &mut RenderContext, _window: &Arc<Window>, frame: &FrameState) {
        let (width, height) = ctx.device().context().size();
        let aspect = width as f32 / height.max(1) as f32;
        let uniforms = SceneUniforms::new(&self.rig, aspect, frame.time);
        ctx.device()
            .context()
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        self.report_timer += frame.dt;
        if self.report_timer >= 1.0 {
            self.report_timer = 0.0;
            log::info!(
                "Adapted luminance: {:.4} (lights {:?})",
                ctx.tone_mapper().adapted_luminance(),
                self.rig.intensities()
            );
        }
    }

    fn draw_scene(&mut self, device: &mut WgpuDevice) {
        let Some(mut pass) = device.begin_scene_pass("HDR Scene") else {
            log::warn!("No HDR target bound, scene skipped");
            return;
        };
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

fn load_tone_mapping() -> anyhow::Result<ToneMappingSettings> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading tone mapping settings from {path}");
            Ok(ToneMappingSettings::load(path)?)
        }
        None => Ok(ToneMappingSettings::default()),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = RendererSettings::default().with_tone_mapping(load_tone_mapping()?);

    App::new()
        .with_title("Lumen HDR Scene")
        .with_settings(settings)
        .run::<HdrSceneApp>()?;
    Ok(())
}
