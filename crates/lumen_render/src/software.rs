//! Software Reference Device
//!
//! A CPU implementation of [`RenderDevice`] that executes the pixel programs
//! with the same arithmetic as the WGSL templates. It backs the integration
//! tests and lets the pipeline run headless.
//!
//! Resources live in [`SlotMap`]s so that destroyed handles are detected and
//! live allocations can be counted. Two faults can be injected:
//!
//! - [`fail_allocations_after`](SoftwareDevice::fail_allocations_after):
//!   the n+1-th allocation fails with `ResourceCreation`
//! - [`contend_next_maps`](SoftwareDevice::contend_next_maps): the next n
//!   `map_for_read` calls fail with `ReadbackContention`
//!
//! Staging follows GPU submission order: a copy is only readable after
//! [`submit`](RenderDevice::submit). [`lag_gpu_frames`](SoftwareDevice::lag_gpu_frames)
//! models a GPU running behind the CPU: a submitted copy only becomes
//! pollable after that many further submissions. Blocking maps always
//! succeed.
//!
//! Float formats are stored at full `f32` precision. Unorm formats are
//! clamped to `[0, 1]`; sRGB encoding is transparent, as on the GPU.

use glam::{Vec3, Vec4};
use lumen_core::{LumenError, Result};
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::device::{
    FullScreenDraw, PixelProgram, ReadbackWait, RenderDevice, TargetDesc, TargetFormat,
    TextureHandle,
};
use crate::tone_mapping::adaptation::AdaptUniforms;
use crate::tone_mapping::composite::ToneMapCurve;
use crate::tone_mapping::reduction::LUMA;

new_key_type! {
    pub struct ImageKey;
    pub struct DepthKey;
    pub struct StagingKey;
    pub struct UniformKey;
}

/// Default largest texture side, matching wgpu's downlevel limit.
pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

// ============================================================================
// Handles
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftTexture {
    key: ImageKey,
    width: u32,
    height: u32,
    format: TargetFormat,
}

impl TextureHandle for SoftTexture {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn format(&self) -> TargetFormat {
        self.format
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftDepth {
    key: DepthKey,
    width: u32,
    height: u32,
}

impl SoftDepth {
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[derive(Debug)]
pub struct SoftStaging {
    key: StagingKey,
}

#[derive(Debug)]
pub struct SoftUniform {
    key: UniformKey,
}

// ============================================================================
// Storage
// ============================================================================

struct Image {
    format: TargetFormat,
    width: u32,
    height: u32,
    texels: Vec<Vec4>,
}

impl Image {
    fn load(&self, x: u32, y: u32) -> Vec4 {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        self.texels[(y * self.width + x) as usize]
    }

    fn store(&mut self, x: u32, y: u32, value: Vec4) {
        let index = (y * self.width + x) as usize;
        self.texels[index] = encode(self.format, value);
    }
}

/// Applies what writing `value` into a texel of `format` keeps.
fn encode(format: TargetFormat, value: Vec4) -> Vec4 {
    match format {
        TargetFormat::R32Float => Vec4::new(value.x, 0.0, 0.0, 1.0),
        TargetFormat::Rgba16Float | TargetFormat::Rgba32Float => value,
        TargetFormat::Rgba8Unorm
        | TargetFormat::Rgba8UnormSrgb
        | TargetFormat::Bgra8Unorm
        | TargetFormat::Bgra8UnormSrgb => value.clamp(Vec4::ZERO, Vec4::ONE),
    }
}

struct DepthImage {
    width: u32,
    values: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum StagingState {
    Idle,
    /// Copy recorded, not yet submitted.
    Recorded(f32),
    /// Submitted; pollable once `submissions` reaches `ready_at`.
    InFlight { value: f32, ready_at: u64 },
    Mapped(f32),
}

struct StagingSlot {
    label: String,
    state: StagingState,
}

/// A full-screen draw as executed by the software device.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub label: String,
    pub program: PixelProgram,
    pub target_size: (u32, u32),
}

// ============================================================================
// SoftwareDevice
// ============================================================================

pub struct SoftwareDevice {
    images: SlotMap<ImageKey, Image>,
    depths: SlotMap<DepthKey, DepthImage>,
    staging: SlotMap<StagingKey, StagingSlot>,
    uniforms: SlotMap<UniformKey, Vec<u8>>,

    viewport: (u32, u32),
    bound_colors: SmallVec<[ImageKey; 4]>,
    bound_depth: Option<DepthKey>,

    max_dimension: u32,
    allocations_left: Option<usize>,
    contended_maps: u32,
    gpu_lag: u64,

    draws: Vec<DrawRecord>,
    debug_groups: Vec<String>,
    open_debug_groups: usize,
    submissions: u64,
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareDevice {
    #[must_use]
    pub fn new() -> Self {
        Self {
            images: SlotMap::with_key(),
            depths: SlotMap::with_key(),
            staging: SlotMap::with_key(),
            uniforms: SlotMap::with_key(),
            viewport: (0, 0),
            bound_colors: SmallVec::new(),
            bound_depth: None,
            max_dimension: DEFAULT_MAX_DIMENSION,
            allocations_left: None,
            contended_maps: 0,
            gpu_lag: 0,
            draws: Vec::new(),
            debug_groups: Vec::new(),
            open_debug_groups: 0,
            submissions: 0,
        }
    }

    #[must_use]
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    // --- fault injection ---------------------------------------------------

    /// Lets `count` more allocations succeed, then fails every following one.
    pub fn fail_allocations_after(&mut self, count: usize) {
        self.allocations_left = Some(count);
    }

    pub fn clear_allocation_limit(&mut self) {
        self.allocations_left = None;
    }

    /// Makes the next `count` calls to `map_for_read` fail.
    pub fn contend_next_maps(&mut self, count: u32) {
        self.contended_maps = count;
    }

    /// Keeps copies submitted from now on unreadable by polling until
    /// `frames` more submissions have happened.
    pub fn lag_gpu_frames(&mut self, frames: u64) {
        self.gpu_lag = frames;
    }

    // --- inspection --------------------------------------------------------

    /// Number of live color targets.
    #[must_use]
    pub fn live_textures(&self) -> usize {
        self.images.len()
    }

    #[must_use]
    pub fn live_depths(&self) -> usize {
        self.depths.len()
    }

    #[must_use]
    pub fn live_staging(&self) -> usize {
        self.staging.len()
    }

    #[must_use]
    pub fn live_uniforms(&self) -> usize {
        self.uniforms.len()
    }

    #[must_use]
    pub fn is_alive(&self, texture: &SoftTexture) -> bool {
        self.images.contains_key(texture.key)
    }

    #[must_use]
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    #[must_use]
    pub fn is_bound(&self, texture: &SoftTexture) -> bool {
        self.bound_colors.contains(&texture.key)
    }

    #[must_use]
    pub fn is_depth_bound(&self, depth: &SoftDepth) -> bool {
        self.bound_depth == Some(depth.key)
    }

    #[must_use]
    pub fn bound_color_count(&self) -> usize {
        self.bound_colors.len()
    }

    #[must_use]
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn take_draws(&mut self) -> Vec<DrawRecord> {
        std::mem::take(&mut self.draws)
    }

    /// Labels of every debug group pushed so far, in order.
    #[must_use]
    pub fn debug_groups(&self) -> &[String] {
        &self.debug_groups
    }

    #[must_use]
    pub fn open_debug_groups(&self) -> usize {
        self.open_debug_groups
    }

    #[must_use]
    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    // --- texel access ------------------------------------------------------

    /// Fills every texel of `texture` with `rgba`.
    pub fn fill(&mut self, texture: &SoftTexture, rgba: [f32; 4]) {
        self.write_texels(texture, |_, _| rgba);
    }

    /// Writes `f(x, y)` into every texel, standing in for a scene draw.
    pub fn write_texels(&mut self, texture: &SoftTexture, mut f: impl FnMut(u32, u32) -> [f32; 4]) {
        let image = self.image_mut(texture.key);
        for y in 0..image.height {
            for x in 0..image.width {
                image.store(x, y, Vec4::from_array(f(x, y)));
            }
        }
    }

    #[must_use]
    pub fn read_texel(&self, texture: &SoftTexture, x: u32, y: u32) -> [f32; 4] {
        let image = self.image(texture.key);
        assert!(x < image.width && y < image.height, "texel ({x}, {y}) out of bounds");
        image.load(x, y).to_array()
    }

    #[must_use]
    pub fn read_depth(&self, depth: &SoftDepth, x: u32, y: u32) -> f32 {
        let image = self
            .depths
            .get(depth.key)
            .expect("depth target used after destroy");
        image.values[(y * image.width + x) as usize]
    }

    // --- internals ---------------------------------------------------------

    fn image(&self, key: ImageKey) -> &Image {
        self.images
            .get(key)
            .expect("texture used after destroy")
    }

    fn image_mut(&mut self, key: ImageKey) -> &mut Image {
        self.images
            .get_mut(key)
            .expect("texture used after destroy")
    }

    fn reserve(&mut self, label: &str, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(LumenError::resource(label, format!("zero-sized {width}x{height}")));
        }
        if width > self.max_dimension || height > self.max_dimension {
            return Err(LumenError::resource(
                label,
                format!("{width}x{height} exceeds the {} limit", self.max_dimension),
            ));
        }
        self.take_allocation(label)
    }

    fn take_allocation(&mut self, label: &str) -> Result<()> {
        match &mut self.allocations_left {
            Some(0) => Err(LumenError::resource(label, "out of memory")),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn run_brightness(&mut self, source: ImageKey, targets: [ImageKey; 3]) {
        let (mins, avgs, maxs) = {
            let src = self.image(source);
            let dst = self.image(targets[0]);
            let (side_x, side_y) = (dst.width, dst.height);
            let texel_count = (side_x * side_y) as usize;
            let mut mins = Vec::with_capacity(texel_count);
            let mut avgs = Vec::with_capacity(texel_count);
            let mut maxs = Vec::with_capacity(texel_count);

            for y in 0..side_y {
                let (y0, rows) = footprint(y, src.height, side_y);
                for x in 0..side_x {
                    let (x0, cols) = footprint(x, src.width, side_x);
                    let mut lum_min = f32::MAX;
                    let mut lum_max = 0.0_f32;
                    let mut lum_sum = 0.0_f32;
                    for dy in 0..rows {
                        for dx in 0..cols {
                            let l = luminance(src.load(x0 + dx, y0 + dy).truncate());
                            lum_min = lum_min.min(l);
                            lum_max = lum_max.max(l);
                            lum_sum += l;
                        }
                    }
                    mins.push(lum_min);
                    avgs.push(lum_sum / (rows * cols) as f32);
                    maxs.push(lum_max);
                }
            }
            (mins, avgs, maxs)
        };
        self.store_reduction(targets, &mins, &avgs, &maxs);
    }

    fn run_downsample(&mut self, sources: [ImageKey; 3], targets: [ImageKey; 3]) {
        let (mins, avgs, maxs) = {
            let [src_min, src_avg, src_max] = sources.map(|key| self.image(key));
            let dst = self.image(targets[0]);
            let texel_count = (dst.width * dst.height) as usize;
            let mut mins = Vec::with_capacity(texel_count);
            let mut avgs = Vec::with_capacity(texel_count);
            let mut maxs = Vec::with_capacity(texel_count);

            for y in 0..dst.height {
                for x in 0..dst.width {
                    let taps = [(0, 0), (1, 0), (0, 1), (1, 1)].map(|(dx, dy)| (2 * x + dx, 2 * y + dy));
                    let tap = |image: &Image, i: usize| image.load(taps[i].0, taps[i].1).x;
                    mins.push(
                        tap(src_min, 0)
                            .min(tap(src_min, 1))
                            .min(tap(src_min, 2).min(tap(src_min, 3))),
                    );
                    avgs.push(
                        0.25 * (tap(src_avg, 0) + tap(src_avg, 1) + tap(src_avg, 2) + tap(src_avg, 3)),
                    );
                    maxs.push(
                        tap(src_max, 0)
                            .max(tap(src_max, 1))
                            .max(tap(src_max, 2).max(tap(src_max, 3))),
                    );
                }
            }
            (mins, avgs, maxs)
        };
        self.store_reduction(targets, &mins, &avgs, &maxs);
    }

    fn store_reduction(&mut self, targets: [ImageKey; 3], mins: &[f32], avgs: &[f32], maxs: &[f32]) {
        for (key, values) in targets.into_iter().zip([mins, avgs, maxs]) {
            let image = self.image_mut(key);
            let width = image.width;
            for (i, &v) in values.iter().enumerate() {
                let i = i as u32;
                image.store(i % width, i / width, Vec4::new(v, 0.0, 0.0, 1.0));
            }
        }
    }

    fn run_tone_map(
        &mut self,
        curve: ToneMapCurve,
        source: ImageKey,
        uniform: &AdaptUniforms,
        target: ImageKey,
    ) {
        let la = uniform.adapted_luminance.max(uniform.min_adapted);
        let pixels = {
            let src = self.image(source);
            let dst = self.image(target);
            let mut pixels = Vec::with_capacity((dst.width * dst.height) as usize);
            for y in 0..dst.height {
                for x in 0..dst.width {
                    let u = (x as f32 + 0.5) / dst.width as f32;
                    let v = (y as f32 + 0.5) / dst.height as f32;
                    let sx = ((u * src.width as f32) as u32).min(src.width - 1);
                    let sy = ((v * src.height as f32) as u32).min(src.height - 1);
                    let hdr = src.load(sx, sy).truncate().max(Vec3::ZERO);
                    let mapped = Vec3::new(
                        curve.apply(hdr.x, la),
                        curve.apply(hdr.y, la),
                        curve.apply(hdr.z, la),
                    );
                    pixels.push(mapped.extend(1.0));
                }
            }
            pixels
        };
        let image = self.image_mut(target);
        let width = image.width;
        for (i, value) in pixels.into_iter().enumerate() {
            let i = i as u32;
            image.store(i % width, i / width, value);
        }
    }
}

/// `(start, count)` of the source texels covered by target texel `i` when
/// `src` texels map onto `dst` texels.
fn footprint(i: u32, src: u32, dst: u32) -> (u32, u32) {
    let lo = i * src / dst;
    let hi = ((i + 1) * src).div_ceil(dst).min(src);
    (lo, hi - lo)
}

fn luminance(rgb: Vec3) -> f32 {
    rgb.dot(Vec3::from_array(LUMA)).max(0.0)
}

impl RenderDevice for SoftwareDevice {
    type Texture = SoftTexture;
    type DepthTexture = SoftDepth;
    type Staging = SoftStaging;
    type Uniform = SoftUniform;

    fn create_color_target(&mut self, desc: &TargetDesc<'_>) -> Result<SoftTexture> {
        self.reserve(desc.label, desc.width, desc.height)?;
        let key = self.images.insert(Image {
            format: desc.format,
            width: desc.width,
            height: desc.height,
            texels: vec![Vec4::ZERO; (desc.width * desc.height) as usize],
        });
        Ok(SoftTexture {
            key,
            width: desc.width,
            height: desc.height,
            format: desc.format,
        })
    }

    fn create_depth_target(&mut self, label: &str, width: u32, height: u32) -> Result<SoftDepth> {
        self.reserve(label, width, height)?;
        let key = self.depths.insert(DepthImage {
            width,
            values: vec![1.0; (width * height) as usize],
        });
        Ok(SoftDepth { key, width, height })
    }

    fn create_staging(&mut self, label: &str) -> Result<SoftStaging> {
        self.take_allocation(label)?;
        let key = self.staging.insert(StagingSlot {
            label: label.to_string(),
            state: StagingState::Idle,
        });
        Ok(SoftStaging { key })
    }

    fn create_uniform(&mut self, label: &str, size: u64) -> Result<SoftUniform> {
        self.take_allocation(label)?;
        let key = self.uniforms.insert(vec![0; size as usize]);
        Ok(SoftUniform { key })
    }

    fn destroy_texture(&mut self, texture: SoftTexture) {
        self.bound_colors.retain(|key| *key != texture.key);
        self.images.remove(texture.key);
    }

    fn destroy_depth(&mut self, depth: SoftDepth) {
        if self.bound_depth == Some(depth.key) {
            self.bound_depth = None;
        }
        self.depths.remove(depth.key);
    }

    fn destroy_staging(&mut self, staging: SoftStaging) {
        self.staging.remove(staging.key);
    }

    fn destroy_uniform(&mut self, uniform: SoftUniform) {
        self.uniforms.remove(uniform.key);
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn bind_targets(&mut self, colors: &[&SoftTexture], depth: Option<&SoftDepth>) {
        self.bound_colors = colors.iter().map(|t| t.key).collect();
        self.bound_depth = depth.map(|d| d.key);
    }

    fn unbind_targets(&mut self) {
        self.bound_colors.clear();
        self.bound_depth = None;
    }

    fn clear_color(&mut self, target: &SoftTexture, color: [f32; 4]) {
        self.fill(target, color);
    }

    fn clear_depth(&mut self, depth: &SoftDepth, value: f32) {
        let image = self
            .depths
            .get_mut(depth.key)
            .expect("depth target used after destroy");
        image.values.fill(value);
    }

    fn write_uniform(&mut self, uniform: &SoftUniform, bytes: &[u8]) {
        let data = self
            .uniforms
            .get_mut(uniform.key)
            .expect("uniform used after destroy");
        data[..bytes.len()].copy_from_slice(bytes);
    }

    fn full_screen_draw(&mut self, draw: &FullScreenDraw<'_, Self>) -> Result<()> {
        draw.assert_well_formed();
        let inputs: SmallVec<[ImageKey; 3]> = draw.inputs.iter().map(|t| t.key).collect();
        let targets: SmallVec<[ImageKey; 3]> = draw.targets.iter().map(|t| t.key).collect();

        match draw.program {
            PixelProgram::Brightness => {
                self.run_brightness(inputs[0], [targets[0], targets[1], targets[2]]);
            }
            PixelProgram::Downsample => {
                self.run_downsample(
                    [inputs[0], inputs[1], inputs[2]],
                    [targets[0], targets[1], targets[2]],
                );
            }
            PixelProgram::ToneMap(curve) => {
                let Some(uniform) = draw.uniform else {
                    unreachable!("checked by assert_well_formed");
                };
                let bytes = self
                    .uniforms
                    .get(uniform.key)
                    .expect("uniform used after destroy");
                let size = std::mem::size_of::<AdaptUniforms>();
                let params: AdaptUniforms = bytes
                    .get(..size)
                    .and_then(|b| bytemuck::try_pod_read_unaligned(b).ok())
                    .ok_or_else(|| {
                        LumenError::resource(draw.label, "uniform buffer smaller than AdaptUniforms")
                    })?;
                self.run_tone_map(curve, inputs[0], &params, targets[0]);
            }
        }

        self.draws.push(DrawRecord {
            label: draw.label.to_string(),
            program: draw.program,
            target_size: draw.targets[0].size(),
        });
        Ok(())
    }

    fn copy_to_staging(&mut self, source: &SoftTexture, staging: &SoftStaging) {
        let value = self.image(source.key).load(0, 0).x;
        let slot = self
            .staging
            .get_mut(staging.key)
            .expect("staging used after destroy");
        slot.state = StagingState::Recorded(value);
    }

    fn map_for_read(&mut self, staging: &SoftStaging, wait: ReadbackWait) -> Result<f32> {
        let contended = self.contended_maps > 0;
        let slot = self
            .staging
            .get_mut(staging.key)
            .expect("staging used after destroy");
        if contended {
            self.contended_maps -= 1;
            return Err(LumenError::contention(&slot.label, "buffer busy"));
        }
        match slot.state {
            StagingState::InFlight { ready_at, .. }
                if wait == ReadbackWait::Poll && self.submissions < ready_at =>
            {
                Err(LumenError::contention(&slot.label, "copy still executing"))
            }
            StagingState::InFlight { value: v, .. } | StagingState::Mapped(v) => {
                slot.state = StagingState::Mapped(v);
                Ok(v)
            }
            StagingState::Recorded(_) => Err(LumenError::contention(&slot.label, "copy not submitted")),
            StagingState::Idle => Err(LumenError::contention(&slot.label, "no readback in flight")),
        }
    }

    fn unmap(&mut self, staging: &SoftStaging) {
        if let Some(slot) = self.staging.get_mut(staging.key)
            && matches!(slot.state, StagingState::InFlight { .. } | StagingState::Mapped(_))
        {
            slot.state = StagingState::Idle;
        }
    }

    fn submit(&mut self) {
        self.submissions += 1;
        let ready_at = self.submissions + self.gpu_lag;
        for slot in self.staging.values_mut() {
            if let StagingState::Recorded(value) = slot.state {
                slot.state = StagingState::InFlight { value, ready_at };
            }
        }
    }

    fn push_debug_group(&mut self, label: &str) {
        self.debug_groups.push(label.to_string());
        self.open_debug_groups += 1;
    }

    fn pop_debug_group(&mut self) {
        assert!(self.open_debug_groups > 0, "pop_debug_group without a matching push");
        self.open_debug_groups -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footprint_covers_whole_source() {
        // 300 texels onto 256: every source texel is visited at least once
        let mut next = 0;
        for i in 0..256 {
            let (lo, count) = footprint(i, 300, 256);
            assert!(lo <= next);
            next = lo + count;
        }
        assert_eq!(next, 300);
    }

    #[test]
    fn long_footprints_are_not_truncated() {
        let (lo, count) = footprint(1, 4096, 2);
        assert_eq!((lo, count), (2048, 2048));
    }

    #[test]
    fn unorm_targets_clamp() {
        assert_eq!(
            encode(TargetFormat::Bgra8UnormSrgb, Vec4::new(2.0, -1.0, 0.5, 1.0)),
            Vec4::new(1.0, 0.0, 0.5, 1.0)
        );
        assert_eq!(encode(TargetFormat::Rgba16Float, Vec4::splat(4.0)), Vec4::splat(4.0));
    }

    #[test]
    fn staging_is_readable_only_after_submit() {
        let mut device = SoftwareDevice::new();
        let texture = device
            .create_color_target(&TargetDesc::new("t", 1, 1, TargetFormat::R32Float))
            .unwrap();
        let staging = device.create_staging("s").unwrap();
        device.fill(&texture, [0.25, 0.0, 0.0, 1.0]);

        device.copy_to_staging(&texture, &staging);
        assert!(device.map_for_read(&staging, ReadbackWait::Poll).is_err());
        device.submit();
        assert_eq!(device.map_for_read(&staging, ReadbackWait::Poll).unwrap(), 0.25);
        device.unmap(&staging);
        assert!(device.map_for_read(&staging, ReadbackWait::Poll).is_err());
    }

    #[test]
    fn lagging_gpu_delays_polled_reads_only() {
        let mut device = SoftwareDevice::new();
        let texture = device
            .create_color_target(&TargetDesc::new("t", 1, 1, TargetFormat::R32Float))
            .unwrap();
        let staging = device.create_staging("s").unwrap();
        device.fill(&texture, [0.5, 0.0, 0.0, 1.0]);
        device.lag_gpu_frames(2);

        device.copy_to_staging(&texture, &staging);
        device.submit();
        assert!(device.map_for_read(&staging, ReadbackWait::Poll).is_err());
        device.submit();
        assert!(device.map_for_read(&staging, ReadbackWait::Poll).is_err());
        device.submit();
        assert_eq!(device.map_for_read(&staging, ReadbackWait::Poll).unwrap(), 0.5);

        device.unmap(&staging);
        device.copy_to_staging(&texture, &staging);
        device.submit();
        assert_eq!(device.map_for_read(&staging, ReadbackWait::Block).unwrap(), 0.5);
    }
}
