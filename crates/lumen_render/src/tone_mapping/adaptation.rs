//! Adaptation Filter
//!
//! Tracks the adapted scene luminance. Once per frame the 1×1 average of the
//! luminance pyramid is copied into a CPU-visible staging slot, read back,
//! and blended into the adapted value:
//!
//! ```text
//! adapted += (instant - adapted) * (1 - exp(-dt / tau))
//! ```
//!
//! With [`ReadbackLatency::PreviousFrame`] the copy goes into a free slot of a
//! staging ring sized from the number of frames in flight, and each update
//! polls the slots copied in earlier frames. The newest value that is ready
//! wins. Slots whose copy is still executing stay in flight and are never
//! copied into again until read, so a GPU running several frames behind
//! delays adaptation instead of starving it. The CPU never waits on the GPU.
//! A frame without a ready value is skipped; the previous adapted value stays
//! in effect.

use lumen_core::{LumenError, Result};

use crate::device::{ReadbackWait, RenderDevice};
use crate::tone_mapping::settings::{ReadbackLatency, ToneMappingSettings};

/// Uniform block consumed by the tone-map composite.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AdaptUniforms {
    pub adapted_luminance: f32,
    /// Lower bound applied to `adapted_luminance` before dividing by it.
    pub min_adapted: f32,
    pub _pad: [f32; 2],
}

/// Fraction of the gap to the target closed after `dt` seconds.
#[inline]
#[must_use]
pub fn adaptation_weight(dt: f32, tau: f32) -> f32 {
    1.0 - (-dt / tau).exp()
}

/// One filter step from `adapted` toward `instant`.
#[inline]
#[must_use]
pub fn adapt_luminance(adapted: f32, instant: f32, dt: f32, tau: f32) -> f32 {
    adapted + (instant - adapted) * adaptation_weight(dt, tau)
}

/// Result of one [`AdaptationFilter::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdaptationOutcome {
    Updated { instant: f32, adapted: f32 },
    /// No usable readback this frame; the previous value was kept.
    Skipped,
}

pub struct AdaptationFilter<D: RenderDevice> {
    adapted_luminance: f32,
    tau: f32,
    min_dt: f32,
    min_adapted: f32,
    latency: ReadbackLatency,

    staging: Vec<D::Staging>,
    /// Frame whose copy each slot holds, `None` when the slot is free.
    copied_at: Vec<Option<u64>>,
    uniform: D::Uniform,

    frame: u64,
    skipped_frames: u64,
}

impl<D: RenderDevice> AdaptationFilter<D> {
    /// Allocates the staging ring and the uniform buffer, and uploads the
    /// initial luminance. `frames_in_flight` is how many frames the GPU may
    /// run behind the CPU.
    pub fn new(
        device: &mut D,
        settings: &ToneMappingSettings,
        frames_in_flight: usize,
    ) -> Result<Self> {
        let latency = settings.readback_latency;
        let slot_count = latency.slot_count(frames_in_flight);

        let mut staging = Vec::with_capacity(slot_count);
        for i in 0..slot_count {
            match device.create_staging(&format!("Luminance Readback {i}")) {
                Ok(slot) => staging.push(slot),
                Err(e) => {
                    staging.into_iter().for_each(|slot| device.destroy_staging(slot));
                    return Err(e);
                }
            }
        }

        let uniform = match device.create_uniform(
            "Adaptation Uniforms",
            std::mem::size_of::<AdaptUniforms>() as u64,
        ) {
            Ok(uniform) => uniform,
            Err(e) => {
                staging.into_iter().for_each(|slot| device.destroy_staging(slot));
                return Err(e);
            }
        };

        let filter = Self {
            adapted_luminance: settings.initial_luminance,
            tau: settings.tau_seconds,
            min_dt: settings.min_dt,
            min_adapted: settings.min_adapted,
            latency,
            staging,
            copied_at: vec![None; slot_count],
            uniform,
            frame: 0,
            skipped_frames: 0,
        };
        filter.upload(device);
        Ok(filter)
    }

    /// Records the copy of the pyramid's 1×1 average into a free slot. When
    /// every slot is still in flight the copy is dropped for this frame.
    pub fn record_readback(&mut self, device: &mut D, average: &D::Texture) {
        let Some(slot) = self.copied_at.iter().position(Option::is_none) else {
            log::trace!(
                "All {} luminance readback slots in flight; not copying frame {}",
                self.staging.len(),
                self.frame
            );
            return;
        };
        device.copy_to_staging(average, &self.staging[slot]);
        self.copied_at[slot] = Some(self.frame);
    }

    /// Reads back the average luminance, advances the filter by `dt` seconds
    /// and uploads the adapted value. Advances the frame counter.
    pub fn update(&mut self, device: &mut D, dt: f32) -> AdaptationOutcome {
        let readback = match self.latency {
            ReadbackLatency::PreviousFrame => self.poll_in_flight(device),
            ReadbackLatency::CurrentFrame => {
                device.submit();
                let staging = &self.staging[0];
                let readback = device.map_for_read(staging, ReadbackWait::Block);
                device.unmap(staging);
                self.copied_at[0] = None;
                readback
            }
        };
        self.frame += 1;

        let outcome = match readback {
            Ok(instant) if instant.is_finite() => {
                let adapted = self.step(instant, dt);
                AdaptationOutcome::Updated { instant, adapted }
            }
            Ok(instant) => {
                log::warn!(
                    "Average luminance read back as {instant}; keeping {}",
                    self.adapted_luminance
                );
                AdaptationOutcome::Skipped
            }
            Err(e @ LumenError::ReadbackContention { .. }) => {
                log::trace!("Adaptation skipped this frame: {e}");
                AdaptationOutcome::Skipped
            }
            Err(e) => {
                log::warn!("Luminance readback failed: {e}");
                AdaptationOutcome::Skipped
            }
        };
        if outcome == AdaptationOutcome::Skipped {
            self.skipped_frames += 1;
        }

        self.upload(device);
        outcome
    }

    /// Polls every slot copied before this frame and frees the ones that are
    /// ready. Returns the newest value read.
    fn poll_in_flight(&mut self, device: &mut D) -> Result<f32> {
        let mut newest: Option<(u64, f32)> = None;
        let mut error = None;

        for (staging, copied_at) in self.staging.iter().zip(self.copied_at.iter_mut()) {
            // this frame's copy has not been submitted yet
            let Some(frame) = (*copied_at).filter(|&frame| frame < self.frame) else {
                continue;
            };
            match device.map_for_read(staging, ReadbackWait::Poll) {
                Ok(value) => {
                    device.unmap(staging);
                    *copied_at = None;
                    if newest.is_none_or(|(newest_frame, _)| frame > newest_frame) {
                        newest = Some((frame, value));
                    }
                }
                Err(e @ LumenError::ReadbackContention { .. }) => error = Some(e),
                Err(e) => {
                    device.unmap(staging);
                    *copied_at = None;
                    error = Some(e);
                }
            }
        }

        match (newest, error) {
            (Some((_, value)), _) => Ok(value),
            (None, Some(e)) => Err(e),
            (None, None) => Err(LumenError::contention(
                "Luminance Readback",
                "no readback in flight",
            )),
        }
    }

    /// Blends `instant` into the adapted luminance over `dt` seconds.
    ///
    /// A non-finite or non-positive `dt` is replaced by `min_dt`.
    pub fn step(&mut self, instant: f32, dt: f32) -> f32 {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { self.min_dt };
        self.adapted_luminance =
            adapt_luminance(self.adapted_luminance, instant.max(0.0), dt, self.tau);
        self.adapted_luminance
    }

    fn upload(&self, device: &mut D) {
        device.write_uniform(&self.uniform, bytemuck::bytes_of(&self.uniforms()));
    }

    #[must_use]
    pub fn uniforms(&self) -> AdaptUniforms {
        AdaptUniforms {
            adapted_luminance: self.adapted_luminance,
            min_adapted: self.min_adapted,
            _pad: [0.0; 2],
        }
    }

    #[must_use]
    pub fn adapted_luminance(&self) -> f32 {
        self.adapted_luminance
    }

    #[must_use]
    pub fn uniform(&self) -> &D::Uniform {
        &self.uniform
    }

    #[must_use]
    pub fn latency(&self) -> ReadbackLatency {
        self.latency
    }

    #[must_use]
    pub fn tau(&self) -> f32 {
        self.tau
    }

    /// Staging slots holding a copy that has not been read yet.
    #[must_use]
    pub fn readbacks_in_flight(&self) -> usize {
        self.copied_at.iter().flatten().count()
    }

    /// Size of the staging ring.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.staging.len()
    }

    /// Frames whose update was skipped since creation.
    #[must_use]
    pub fn skipped_frames(&self) -> u64 {
        self.skipped_frames
    }

    pub fn destroy(self, device: &mut D) {
        for slot in self.staging {
            device.unmap(&slot);
            device.destroy_staging(slot);
        }
        device.destroy_uniform(self.uniform);
    }
}
