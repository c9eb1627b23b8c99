//! Tone-Map Composite Pass
//!
//! Final full-screen pass: compresses the HDR frame into the presentation
//! target using the adapted scene luminance.

use lumen_core::Result;
use serde::{Deserialize, Serialize};

use crate::device::{FullScreenDraw, PixelProgram, RenderDevice};

/// Operator applied per color channel `c` with adapted luminance `La`.
///
/// Both curves map 0 to 0, are monotonic and approach 1 asymptotically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ToneMapCurve {
    /// `c / (c + La)`
    #[default]
    Reinhard,
    /// `1 - exp(-c / La)`
    Exponential,
}

impl ToneMapCurve {
    /// Value of the `TONE_MAP_CURVE` shader define.
    #[must_use]
    pub fn define_value(self) -> &'static str {
        match self {
            Self::Reinhard => "REINHARD",
            Self::Exponential => "EXPONENTIAL",
        }
    }

    /// CPU evaluation of the curve, identical to the shader.
    #[inline]
    #[must_use]
    pub fn apply(self, c: f32, adapted: f32) -> f32 {
        match self {
            Self::Reinhard => c / (c + adapted),
            Self::Exponential => 1.0 - (-c / adapted).exp(),
        }
    }
}

pub struct ToneMapComposite {
    curve: ToneMapCurve,
}

impl ToneMapComposite {
    #[must_use]
    pub fn new(curve: ToneMapCurve) -> Self {
        Self { curve }
    }

    #[must_use]
    pub fn curve(&self) -> ToneMapCurve {
        self.curve
    }

    pub fn set_curve(&mut self, curve: ToneMapCurve) {
        if self.curve != curve {
            log::debug!("Tone map curve: {:?} -> {curve:?}", self.curve);
            self.curve = curve;
        }
    }

    /// Draws `hdr` tone-mapped into `output`. `adapt_uniform` holds the
    /// adapted luminance.
    pub fn run<D: RenderDevice>(
        &self,
        device: &mut D,
        hdr: &D::Texture,
        adapt_uniform: &D::Uniform,
        output: &D::Texture,
    ) -> Result<()> {
        device.push_debug_group("Tone Map");
        let result = device.full_screen_draw(&FullScreenDraw {
            label: "Tone Map Composite",
            program: PixelProgram::ToneMap(self.curve),
            inputs: &[hdr],
            uniform: Some(adapt_uniform),
            targets: &[output],
        });
        device.pop_debug_group();
        result
    }
}
