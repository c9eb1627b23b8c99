//! Adaptive HDR Tone Mapping
//!
//! [`ToneMapper`] owns everything between the scene draw and presentation:
//!
//! ```text
//! scene ─► HdrRenderTarget ─► BrightnessReduction ─► LuminancePyramid
//!                                                        │ level 0 avg
//!                                                        ▼
//! output ◄─ ToneMapComposite ◄─ AdaptUniforms ◄─ AdaptationFilter
//! ```
//!
//! A frame is recorded in this order:
//!
//! 1. [`clear_render_target`](ToneMapper::clear_render_target)
//! 2. `render_target().bind(..)`, then the caller draws the scene
//! 3. [`make_brightness_maps`](ToneMapper::make_brightness_maps)
//! 4. [`post_process_tone_map`](ToneMapper::post_process_tone_map)
//! 5. [`unbind_render_targets`](ToneMapper::unbind_render_targets)

pub mod adaptation;
pub mod composite;
pub mod pyramid;
pub mod reduction;
pub mod settings;

use lumen_core::{Result, Timer};

use crate::device::RenderDevice;
use crate::hdr_target::HdrRenderTarget;
use adaptation::{AdaptationFilter, AdaptationOutcome};
use composite::{ToneMapComposite, ToneMapCurve};
use pyramid::LuminancePyramid;
use reduction::BrightnessReduction;
use settings::ToneMappingSettings;

pub struct ToneMapper<D: RenderDevice> {
    settings: ToneMappingSettings,
    target: HdrRenderTarget<D>,
    pyramid: LuminancePyramid<D>,
    reduction: BrightnessReduction,
    adaptation: AdaptationFilter<D>,
    composite: ToneMapComposite,
    timer: Timer,
}

impl<D: RenderDevice> ToneMapper<D> {
    /// Creates the HDR target, luminance pyramid and adaptation resources for
    /// a `width × height` output with `buffer_count` presentation buffers.
    ///
    /// Nothing stays allocated when this fails.
    pub fn initialize(
        device: &mut D,
        width: u32,
        height: u32,
        buffer_count: usize,
        settings: ToneMappingSettings,
    ) -> Result<Self> {
        settings.validate()?;

        let target = HdrRenderTarget::new(device, width, height, buffer_count, settings.hdr_format)?;
        Self::assemble(device, target, settings)
    }

    /// Like [`initialize`](Self::initialize), rendering the scene into
    /// caller-owned color attachments.
    pub fn initialize_with_external_colors(
        device: &mut D,
        colors: Vec<D::Texture>,
        settings: ToneMappingSettings,
    ) -> Result<Self> {
        settings.validate()?;

        let target = HdrRenderTarget::with_external_colors(device, colors)?;
        Self::assemble(device, target, settings)
    }

    fn assemble(
        device: &mut D,
        target: HdrRenderTarget<D>,
        settings: ToneMappingSettings,
    ) -> Result<Self> {
        let (width, height) = target.size();

        let mut pyramid = LuminancePyramid::new();
        if let Err(e) = pyramid.build(device, width, height) {
            target.destroy(device);
            return Err(e);
        }

        let adaptation = match AdaptationFilter::new(device, &settings, target.buffer_count()) {
            Ok(filter) => filter,
            Err(e) => {
                pyramid.release(device);
                target.destroy(device);
                return Err(e);
            }
        };

        log::info!(
            "Tone mapper initialized: {width}x{height}, {} pyramid levels, {:?}, {:?} readback",
            pyramid.levels().len(),
            settings.curve,
            settings.readback_latency
        );

        Ok(Self {
            composite: ToneMapComposite::new(settings.curve),
            reduction: BrightnessReduction::new(),
            settings,
            target,
            pyramid,
            adaptation,
            timer: Timer::new(),
        })
    }

    /// Rebuilds the HDR target and the pyramid for a new output size.
    ///
    /// A zero-sized output (minimized window) is ignored. On external color
    /// attachments a size change fails with
    /// [`LumenError::Config`](lumen_core::LumenError::Config) and leaves the
    /// tone mapper unchanged; use
    /// [`resize_with_external_colors`](Self::resize_with_external_colors).
    pub fn resize(&mut self, device: &mut D, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            log::debug!("Ignoring resize to {width}x{height}");
            return Ok(());
        }
        if (width, height) == self.target.size() && !self.pyramid.is_empty() {
            return Ok(());
        }

        self.target.resize(device, width, height)?;
        self.pyramid.resize(device, width, height)?;
        log::info!("Tone mapper resized to {width}x{height}");
        Ok(())
    }

    /// Resize for a tone mapper rendering into external color attachments:
    /// adopts the new attachments and rebuilds everything else at their size.
    pub fn resize_with_external_colors(
        &mut self,
        device: &mut D,
        colors: Vec<D::Texture>,
    ) -> Result<()> {
        self.target.replace_external_colors(device, colors)?;
        let (width, height) = self.target.size();
        self.pyramid.resize(device, width, height)?;
        log::info!("Tone mapper adopted external targets at {width}x{height}");
        Ok(())
    }

    /// Clears the HDR color and depth of `buffer_index`.
    pub fn clear_render_target(&self, device: &mut D, buffer_index: usize) {
        device.push_debug_group("Clear HDR Target");
        self.target
            .clear(device, buffer_index, self.settings.clear_color);
        device.pop_debug_group();
    }

    #[must_use]
    pub fn render_target(&self) -> &HdrRenderTarget<D> {
        &self.target
    }

    /// Reduces the HDR frame of `buffer_index` into the luminance pyramid and
    /// records the readback copy of its average.
    pub fn make_brightness_maps(&mut self, device: &mut D, buffer_index: usize) -> Result<()> {
        let hdr = self.target.color(buffer_index);
        self.reduction.run(device, hdr, &self.pyramid)?;
        if let Some(base) = self.pyramid.base() {
            self.adaptation.record_readback(device, &base.avg);
        }
        Ok(())
    }

    /// Updates the adapted luminance with the frame time measured since the
    /// previous call and composites the HDR frame into `output`.
    pub fn post_process_tone_map(
        &mut self,
        device: &mut D,
        buffer_index: usize,
        output: &D::Texture,
    ) -> Result<AdaptationOutcome> {
        let dt = self.frame_delta();
        self.post_process_tone_map_with_delta(device, buffer_index, output, dt)
    }

    /// [`post_process_tone_map`](Self::post_process_tone_map) with an
    /// explicit frame time in seconds.
    pub fn post_process_tone_map_with_delta(
        &mut self,
        device: &mut D,
        buffer_index: usize,
        output: &D::Texture,
        dt: f32,
    ) -> Result<AdaptationOutcome> {
        let outcome = self.adaptation.update(device, dt);

        self.composite.run(
            device,
            self.target.color(buffer_index),
            self.adaptation.uniform(),
            output,
        )?;
        Ok(outcome)
    }

    fn frame_delta(&mut self) -> f32 {
        let primed = self.timer.is_primed();
        let dt = self.timer.tick().as_secs_f32();
        if primed {
            dt
        } else {
            self.settings.first_frame_dt
        }
    }

    pub fn unbind_render_targets(&self, device: &mut D) {
        device.unbind_targets();
    }

    pub fn set_curve(&mut self, curve: ToneMapCurve) {
        self.settings.curve = curve;
        self.composite.set_curve(curve);
    }

    #[must_use]
    pub fn adapted_luminance(&self) -> f32 {
        self.adaptation.adapted_luminance()
    }

    #[must_use]
    pub fn adaptation(&self) -> &AdaptationFilter<D> {
        &self.adaptation
    }

    #[must_use]
    pub fn pyramid(&self) -> &LuminancePyramid<D> {
        &self.pyramid
    }

    #[must_use]
    pub fn settings(&self) -> &ToneMappingSettings {
        &self.settings
    }

    /// Releases every resource the tone mapper created.
    pub fn destroy(self, device: &mut D) {
        let Self {
            target,
            mut pyramid,
            adaptation,
            ..
        } = self;
        adaptation.destroy(device);
        pyramid.release(device);
        target.destroy(device);
        log::debug!("Tone mapper destroyed");
    }
}
