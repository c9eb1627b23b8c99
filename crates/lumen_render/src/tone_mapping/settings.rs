//! Tone Mapping Settings
//!
//! | Field               | Description                                   | Default          |
//! |---------------------|-----------------------------------------------|------------------|
//! | `tau_seconds`       | Adaptation time constant                      | `0.5`            |
//! | `initial_luminance` | Adapted luminance before the first readback   | `0.18`           |
//! | `first_frame_dt`    | Step used while the frame clock is unprimed   | `1/60`           |
//! | `min_dt`            | Replacement for non-finite or non-positive dt | `1e-4`           |
//! | `min_adapted`       | Floor for the adapted luminance in the shader | `1e-4`           |
//! | `curve`             | Tone curve                                    | `Reinhard`       |
//! | `readback_latency`  | When the average luminance reaches the CPU    | `PreviousFrame`  |
//! | `hdr_format`        | Scene color format                            | `Rgba16Float`    |
//! | `clear_color`       | HDR target clear color                        | `[0, 0, 0, 1]`   |

use std::path::Path;

use lumen_core::{LumenError, Result};
use serde::{Deserialize, Serialize};

use crate::device::TargetFormat;
use crate::tone_mapping::composite::ToneMapCurve;

/// When the 1×1 average luminance is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadbackLatency {
    /// Read the newest value copied in an earlier frame from a staging ring.
    /// Never stalls the CPU.
    #[default]
    PreviousFrame,
    /// Flush and wait for this frame's value before compositing.
    CurrentFrame,
}

impl ReadbackLatency {
    /// Number of staging slots the latency mode needs when the GPU may run
    /// `frames_in_flight` frames behind the CPU.
    #[must_use]
    pub fn slot_count(self, frames_in_flight: usize) -> usize {
        match self {
            Self::PreviousFrame => frames_in_flight.max(1) + 1,
            Self::CurrentFrame => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneMappingSettings {
    pub tau_seconds: f32,
    pub initial_luminance: f32,
    pub first_frame_dt: f32,
    pub min_dt: f32,
    pub min_adapted: f32,
    pub curve: ToneMapCurve,
    pub readback_latency: ReadbackLatency,
    pub hdr_format: TargetFormat,
    pub clear_color: [f32; 4],
}

impl Default for ToneMappingSettings {
    fn default() -> Self {
        Self {
            tau_seconds: 0.5,
            initial_luminance: 0.18,
            first_frame_dt: 1.0 / 60.0,
            min_dt: 1.0e-4,
            min_adapted: 1.0e-4,
            curve: ToneMapCurve::Reinhard,
            readback_latency: ReadbackLatency::PreviousFrame,
            hdr_format: TargetFormat::Rgba16Float,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl ToneMappingSettings {
    #[must_use]
    pub fn with_tau(mut self, tau_seconds: f32) -> Self {
        self.tau_seconds = tau_seconds;
        self
    }

    #[must_use]
    pub fn with_initial_luminance(mut self, luminance: f32) -> Self {
        self.initial_luminance = luminance;
        self
    }

    #[must_use]
    pub fn with_first_frame_dt(mut self, dt: f32) -> Self {
        self.first_frame_dt = dt;
        self
    }

    #[must_use]
    pub fn with_curve(mut self, curve: ToneMapCurve) -> Self {
        self.curve = curve;
        self
    }

    #[must_use]
    pub fn with_readback_latency(mut self, latency: ReadbackLatency) -> Self {
        self.readback_latency = latency;
        self
    }

    #[must_use]
    pub fn with_hdr_format(mut self, format: TargetFormat) -> Self {
        self.hdr_format = format;
        self
    }

    #[must_use]
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Rejects values the filter or the HDR target cannot work with.
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, value: f32| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(LumenError::Config(format!("{name} must be positive, got {value}")))
            }
        };
        positive("tau_seconds", self.tau_seconds)?;
        positive("first_frame_dt", self.first_frame_dt)?;
        positive("min_dt", self.min_dt)?;
        positive("min_adapted", self.min_adapted)?;

        if !(self.initial_luminance.is_finite() && self.initial_luminance >= 0.0) {
            return Err(LumenError::Config(format!(
                "initial_luminance must be finite and non-negative, got {}",
                self.initial_luminance
            )));
        }
        if !self.hdr_format.is_float() || self.hdr_format.channels() != 4 {
            return Err(LumenError::Config(format!(
                "hdr_format must be an RGBA float format, got {:?}",
                self.hdr_format
            )));
        }
        Ok(())
    }

    /// Parses and validates settings from JSON. Missing fields keep their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| LumenError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        log::info!("Loading tone mapping settings from {}", path.display());
        Self::from_json(&json)
    }
}
