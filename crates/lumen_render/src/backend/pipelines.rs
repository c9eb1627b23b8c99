//! Full-Screen Pipeline Cache
//!
//! One render pipeline per `(program, target formats)` pair, created on first
//! use. Every pipeline uses the mapping triangle as its vertex stage and reads
//! its inputs with `textureLoad`, so no samplers are bound.
//!
//! Bind group layout for a program with `n` inputs:
//!
//! | Binding  | Resource                                   |
//! |----------|--------------------------------------------|
//! | `0..n`   | `texture_2d<f32>` (unfilterable float)     |
//! | `n`      | uniform buffer, if the program takes one   |

use std::borrow::Cow;

use lumen_core::Result;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::device::PixelProgram;
use crate::shaders;

pub type TargetFormats = SmallVec<[wgpu::TextureFormat; 3]>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: PixelProgram,
    targets: TargetFormats,
}

#[derive(Clone)]
pub struct FullScreenPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub layout: wgpu::BindGroupLayout,
}

#[derive(Default)]
pub struct PipelineCache {
    pipelines: FxHashMap<PipelineKey, FullScreenPipeline>,
    modules: FxHashMap<PixelProgram, wgpu::ShaderModule>,
}

impl PipelineCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        program: PixelProgram,
        targets: &[wgpu::TextureFormat],
    ) -> Result<&FullScreenPipeline> {
        let key = PipelineKey {
            program,
            targets: targets.iter().copied().collect(),
        };
        if !self.pipelines.contains_key(&key) {
            let module = self.module(device, program)?.clone();
            let pipeline = Self::create(device, &module, program, targets);
            self.pipelines.insert(key.clone(), pipeline);
        }
        Ok(&self.pipelines[&key])
    }

    fn module(&mut self, device: &wgpu::Device, program: PixelProgram) -> Result<&wgpu::ShaderModule> {
        if !self.modules.contains_key(&program) {
            let source = shaders::render_program(program)?;
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(program.template_name()),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
            });
            self.modules.insert(program, module);
        }
        Ok(&self.modules[&program])
    }

    fn create(
        device: &wgpu::Device,
        module: &wgpu::ShaderModule,
        program: PixelProgram,
        targets: &[wgpu::TextureFormat],
    ) -> FullScreenPipeline {
        let name = program.template_name();
        log::debug!("Creating full-screen pipeline '{name}' for {targets:?}");

        let mut entries: SmallVec<[wgpu::BindGroupLayoutEntry; 4]> = (0..program.input_count())
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding: binding as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            })
            .collect();
        if program.uses_uniform() {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: program.input_count() as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(name),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(name),
            bind_group_layouts: &[Some(&layout)],
            immediate_size: 0,
        });

        let color_targets: SmallVec<[Option<wgpu::ColorTargetState>; 3]> = targets
            .iter()
            .map(|&format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(name),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &color_targets,
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        FullScreenPipeline { pipeline, layout }
    }
}
