//! Scaled Luminance Texture Pool
//!
//! A chain of square single-channel float targets, level `i` of side `2^i`,
//! from the 1×1 level 0 up to level `L = floor(log2(min(w, h)))`. Every level
//! exists in triplicate: one image each for the minimum, average and maximum
//! luminance of the region it covers.

use std::fmt;

use lumen_core::{LumenError, Result};

use crate::device::{RenderDevice, TargetDesc, TargetFormat};

/// Which statistic an image of the pyramid stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reduction {
    Min,
    Avg,
    Max,
}

impl Reduction {
    /// Order of the images in a level and of the reduction render targets.
    pub const ALL: [Self; 3] = [Self::Min, Self::Avg, Self::Max];
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Min => "Min",
            Self::Avg => "Avg",
            Self::Max => "Max",
        })
    }
}

/// The three images of one pyramid level.
#[derive(Debug, Clone)]
pub struct LuminanceLevel<T> {
    pub side: u32,
    pub min: T,
    pub avg: T,
    pub max: T,
}

impl<T> LuminanceLevel<T> {
    #[must_use]
    pub fn get(&self, reduction: Reduction) -> &T {
        match reduction {
            Reduction::Min => &self.min,
            Reduction::Avg => &self.avg,
            Reduction::Max => &self.max,
        }
    }

    /// `[min, avg, max]`
    #[must_use]
    pub fn images(&self) -> [&T; 3] {
        [&self.min, &self.avg, &self.max]
    }

    fn into_images(self) -> [T; 3] {
        [self.min, self.avg, self.max]
    }
}

/// Index of the largest level for an output of `width × height`, or `None`
/// when either side is zero.
#[inline]
#[must_use]
pub fn top_level_for(width: u32, height: u32) -> Option<u32> {
    width.min(height).checked_ilog2()
}

/// Number of levels built for `width × height`.
#[inline]
#[must_use]
pub fn level_count_for(width: u32, height: u32) -> usize {
    top_level_for(width, height).map_or(0, |top| top as usize + 1)
}

pub struct LuminancePyramid<D: RenderDevice> {
    levels: Vec<LuminanceLevel<D::Texture>>,
    extent: (u32, u32),
}

impl<D: RenderDevice> Default for LuminancePyramid<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: RenderDevice> LuminancePyramid<D> {
    /// An empty pyramid; call [`build`](Self::build) before use.
    #[must_use]
    pub fn new() -> Self {
        Self {
            levels: Vec::new(),
            extent: (0, 0),
        }
    }

    /// Allocates levels `0..=L` for an output of `width × height`.
    ///
    /// Any previously built levels are released first. On failure every
    /// image allocated by this call is released before the error returns,
    /// leaving the pyramid empty.
    pub fn build(&mut self, device: &mut D, width: u32, height: u32) -> Result<()> {
        self.release(device);

        let Some(top) = top_level_for(width, height) else {
            return Err(LumenError::resource(
                "Luminance Pyramid",
                format!("zero-sized output {width}x{height}"),
            ));
        };

        let mut levels = Vec::with_capacity(top as usize + 1);
        for i in 0..=top {
            match Self::create_level(device, 1 << i) {
                Ok(level) => levels.push(level),
                Err(e) => {
                    log::error!("Luminance pyramid allocation failed at level {i}: {e}");
                    Self::release_levels(device, levels);
                    return Err(e);
                }
            }
        }

        log::debug!(
            "Luminance pyramid built for {width}x{height}: {} levels, top {}x{}",
            levels.len(),
            1 << top,
            1 << top
        );
        self.levels = levels;
        self.extent = (width, height);
        Ok(())
    }

    fn create_image(device: &mut D, reduction: Reduction, side: u32) -> Result<D::Texture> {
        let label = format!("Luminance {reduction} {side}x{side}");
        device.create_color_target(&TargetDesc::new(&label, side, side, TargetFormat::R32Float))
    }

    fn create_level(device: &mut D, side: u32) -> Result<LuminanceLevel<D::Texture>> {
        let min = Self::create_image(device, Reduction::Min, side)?;
        let avg = match Self::create_image(device, Reduction::Avg, side) {
            Ok(texture) => texture,
            Err(e) => {
                device.destroy_texture(min);
                return Err(e);
            }
        };
        let max = match Self::create_image(device, Reduction::Max, side) {
            Ok(texture) => texture,
            Err(e) => {
                device.destroy_texture(min);
                device.destroy_texture(avg);
                return Err(e);
            }
        };
        Ok(LuminanceLevel { side, min, avg, max })
    }

    fn release_levels(device: &mut D, levels: Vec<LuminanceLevel<D::Texture>>) {
        for level in levels {
            for texture in level.into_images() {
                device.destroy_texture(texture);
            }
        }
    }

    /// Frees every level. Idempotent.
    pub fn release(&mut self, device: &mut D) {
        let levels = std::mem::take(&mut self.levels);
        Self::release_levels(device, levels);
        self.extent = (0, 0);
    }

    /// Rebuilds the pyramid for a new output size.
    pub fn resize(&mut self, device: &mut D, width: u32, height: u32) -> Result<()> {
        self.build(device, width, height)
    }

    #[must_use]
    pub fn levels(&self) -> &[LuminanceLevel<D::Texture>] {
        &self.levels
    }

    #[must_use]
    pub fn level(&self, index: usize) -> Option<&LuminanceLevel<D::Texture>> {
        self.levels.get(index)
    }

    /// Level 0, the 1×1 scene statistics.
    #[must_use]
    pub fn base(&self) -> Option<&LuminanceLevel<D::Texture>> {
        self.levels.first()
    }

    /// Index of the largest level.
    #[must_use]
    pub fn top_index(&self) -> Option<usize> {
        self.levels.len().checked_sub(1)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Output size the pyramid was built for.
    #[must_use]
    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }

    /// Side of every level, level 0 first.
    #[must_use]
    pub fn sides(&self) -> Vec<u32> {
        self.levels.iter().map(|level| level.side).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_count_follows_smaller_side() {
        assert_eq!(level_count_for(1, 1), 1);
        assert_eq!(level_count_for(256, 256), 9);
        assert_eq!(level_count_for(1920, 1080), 11);
        assert_eq!(level_count_for(1023, 4096), 10);
        assert_eq!(level_count_for(0, 720), 0);
    }

    #[test]
    fn reduction_labels() {
        let labels: Vec<String> = Reduction::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(labels, ["Min", "Avg", "Max"]);
    }
}
