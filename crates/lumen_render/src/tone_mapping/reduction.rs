//! Brightness Reduction Pass
//!
//! Fills the luminance pyramid from the HDR frame:
//!
//! ```text
//! HDR frame ──Brightness──► level L ──Downsample──► level L-1 ── ... ──► level 0 (1×1)
//! ```
//!
//! Each draw writes the level's min, avg and max images at once. The first
//! draw reduces each top-level texel's footprint on the frame; every further
//! draw reduces 2×2 texels of the level above.

use lumen_core::Result;

use crate::device::{FullScreenDraw, PixelProgram, RenderDevice};
use crate::tone_mapping::pyramid::LuminancePyramid;

/// Rec.709 relative luminance weights.
pub const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

#[derive(Debug, Default)]
pub struct BrightnessReduction;

impl BrightnessReduction {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Number of full-screen draws one run issues.
    #[must_use]
    pub fn draw_count<D: RenderDevice>(pyramid: &LuminancePyramid<D>) -> usize {
        pyramid.levels().len()
    }

    /// Reduces `hdr` into every level of `pyramid`. Does nothing on an empty
    /// pyramid.
    pub fn run<D: RenderDevice>(
        &self,
        device: &mut D,
        hdr: &D::Texture,
        pyramid: &LuminancePyramid<D>,
    ) -> Result<()> {
        let Some(top) = pyramid.top_index() else {
            log::warn!("Brightness reduction skipped: luminance pyramid is empty");
            return Ok(());
        };

        device.push_debug_group("Brightness Reduction");
        let result = Self::record(device, hdr, pyramid, top);
        device.pop_debug_group();
        result
    }

    fn record<D: RenderDevice>(
        device: &mut D,
        hdr: &D::Texture,
        pyramid: &LuminancePyramid<D>,
        top: usize,
    ) -> Result<()> {
        let levels = pyramid.levels();
        let level = &levels[top];
        let label = format!("Brightness {0}x{0}", level.side);
        device.full_screen_draw(&FullScreenDraw {
            label: &label,
            program: PixelProgram::Brightness,
            inputs: &[hdr],
            uniform: None,
            targets: &level.images(),
        })?;

        for i in (0..top).rev() {
            let source = &levels[i + 1];
            let target = &levels[i];
            let label = format!("Downsample {0}x{0}", target.side);
            device.full_screen_draw(&FullScreenDraw {
                label: &label,
                program: PixelProgram::Downsample,
                inputs: &source.images(),
                uniform: None,
                targets: &target.images(),
            })?;
        }
        Ok(())
    }
}
