//! HDR Render Target Tests
//!
//! Tests for:
//! - Per-buffer color and depth allocation
//! - Binding, viewport and clearing
//! - Resize, including failure and external attachments
//! - Buffer index validation

use lumen::core::LumenError;
use lumen::render::device::{RenderDevice, TargetDesc, TargetFormat, TextureHandle};
use lumen::render::hdr_target::HdrRenderTarget;
use lumen::render::software::{SoftTexture, SoftwareDevice};

fn target(device: &mut SoftwareDevice, buffers: usize) -> HdrRenderTarget<SoftwareDevice> {
    HdrRenderTarget::new(device, 64, 32, buffers, TargetFormat::Rgba16Float).unwrap()
}

fn external_colors(device: &mut SoftwareDevice, count: usize, width: u32, height: u32) -> Vec<SoftTexture> {
    (0..count)
        .map(|i| {
            let label = format!("Swapchain {i}");
            device
                .create_color_target(&TargetDesc::new(&label, width, height, TargetFormat::Rgba32Float))
                .unwrap()
        })
        .collect()
}

// ============================================================================
// Allocation
// ============================================================================

#[test]
fn one_color_and_depth_per_buffer() {
    let mut device = SoftwareDevice::new();
    let target = target(&mut device, 3);

    assert_eq!(target.buffer_count(), 3);
    assert_eq!(target.size(), (64, 32));
    assert_eq!(target.format(), TargetFormat::Rgba16Float);
    assert_eq!(device.live_textures(), 3);
    assert_eq!(device.live_depths(), 3);
    assert_ne!(target.color(0), target.color(1));
    assert_eq!(target.color(2).size(), (64, 32));
}

#[test]
fn failed_allocation_releases_earlier_buffers() {
    let mut device = SoftwareDevice::new();
    device.fail_allocations_after(3);

    let result = HdrRenderTarget::new(&mut device, 64, 32, 2, TargetFormat::Rgba16Float);

    assert!(result.is_err());
    assert_eq!(device.live_textures(), 0);
    assert_eq!(device.live_depths(), 0);
}

#[test]
fn destroy_releases_owned_attachments() {
    let mut device = SoftwareDevice::new();
    let target = target(&mut device, 2);

    target.destroy(&mut device);

    assert_eq!(device.live_textures(), 0);
    assert_eq!(device.live_depths(), 0);
}

// ============================================================================
// Bind and Clear
// ============================================================================

#[test]
fn bind_sets_viewport_and_the_buffer_pair() {
    let mut device = SoftwareDevice::new();
    let target = target(&mut device, 2);

    target.bind(&mut device, 1);

    assert_eq!(device.viewport(), (64, 32));
    assert_eq!(device.bound_color_count(), 1);
    assert!(device.is_bound(target.color(1)));
    assert!(!device.is_bound(target.color(0)));
    assert!(device.is_depth_bound(target.depth(1)));
}

#[test]
fn clear_resets_color_and_depth() {
    let mut device = SoftwareDevice::new();
    let target = target(&mut device, 2);
    device.clear_depth(target.depth(0), 0.25);
    device.fill(target.color(0), [7.0, 7.0, 7.0, 1.0]);

    target.clear(&mut device, 0, [0.1, 0.2, 0.3, 1.0]);

    assert_eq!(device.read_texel(target.color(0), 63, 31), [0.1, 0.2, 0.3, 1.0]);
    assert_eq!(device.read_depth(target.depth(0), 10, 10), 1.0);
}

#[test]
fn clear_touches_only_its_buffer() {
    let mut device = SoftwareDevice::new();
    let target = target(&mut device, 2);
    device.fill(target.color(1), [5.0, 5.0, 5.0, 1.0]);

    target.clear(&mut device, 0, [0.0, 0.0, 0.0, 1.0]);

    assert_eq!(device.read_texel(target.color(1), 0, 0), [5.0, 5.0, 5.0, 1.0]);
}

#[test]
#[should_panic(expected = "out of range")]
fn binding_a_missing_buffer_panics() {
    let mut device = SoftwareDevice::new();
    let target = target(&mut device, 2);

    target.bind(&mut device, 2);
}

// ============================================================================
// Resize
// ============================================================================

#[test]
fn resize_replaces_owned_attachments() {
    let mut device = SoftwareDevice::new();
    let mut target = target(&mut device, 2);
    let old = target.color(0).clone();

    target.resize(&mut device, 128, 96).unwrap();

    assert_eq!(target.size(), (128, 96));
    assert_eq!(target.color(0).size(), (128, 96));
    assert!(!device.is_alive(&old));
    assert_eq!(device.live_textures(), 2);
    assert_eq!(device.live_depths(), 2);
}

#[test]
fn failed_resize_keeps_the_old_attachments() {
    let mut device = SoftwareDevice::new();
    let mut target = target(&mut device, 2);
    let old = target.color(1).clone();

    device.fail_allocations_after(1);
    assert!(target.resize(&mut device, 128, 96).is_err());

    assert_eq!(target.size(), (64, 32));
    assert!(device.is_alive(&old));
    assert_eq!(device.live_textures(), 2);
    assert_eq!(device.live_depths(), 2);
}

// ============================================================================
// External Attachments
// ============================================================================

#[test]
fn external_colors_get_owned_depths() {
    let mut device = SoftwareDevice::new();
    let colors = external_colors(&mut device, 2, 40, 30);

    let target = HdrRenderTarget::with_external_colors(&mut device, colors.clone()).unwrap();

    assert_eq!(target.size(), (40, 30));
    assert_eq!(target.format(), TargetFormat::Rgba32Float);
    assert_eq!(device.live_depths(), 2);

    target.destroy(&mut device);
    assert!(colors.iter().all(|c| device.is_alive(c)));
    assert_eq!(device.live_depths(), 0);
}

#[test]
fn replacing_external_colors_resizes_depths() {
    let mut device = SoftwareDevice::new();
    let colors = external_colors(&mut device, 2, 40, 30);
    let mut target = HdrRenderTarget::with_external_colors(&mut device, colors).unwrap();

    let resized = external_colors(&mut device, 2, 80, 60);
    target
        .replace_external_colors(&mut device, resized.clone())
        .unwrap();

    assert_eq!(target.size(), (80, 60));
    assert_eq!(target.color(1), &resized[1]);
    assert_eq!(device.live_depths(), 2);
}

#[test]
fn external_colors_cannot_be_resized_in_place() {
    let mut device = SoftwareDevice::new();
    let colors = external_colors(&mut device, 2, 40, 30);
    let mut target = HdrRenderTarget::with_external_colors(&mut device, colors).unwrap();
    let depth = target.depth(0).clone();

    let result = target.resize(&mut device, 80, 60);

    assert!(matches!(result, Err(LumenError::Config(_))));
    assert_eq!(target.size(), (40, 30));
    assert_eq!(target.depth(0), &depth);
    assert_eq!(device.live_depths(), 2);
}

#[test]
fn fully_external_target_creates_nothing() {
    let mut device = SoftwareDevice::new();
    let colors = external_colors(&mut device, 1, 16, 16);
    let depth = device.create_depth_target("Swapchain Depth", 16, 16).unwrap();
    let before = (device.live_textures(), device.live_depths());

    let target = HdrRenderTarget::with_external(colors, vec![depth]);
    target.bind(&mut device, 0);
    target.destroy(&mut device);

    assert_eq!((device.live_textures(), device.live_depths()), before);
}
