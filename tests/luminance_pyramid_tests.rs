//! Luminance Pyramid Tests
//!
//! Tests for:
//! - Level count and sides derived from the output size
//! - Image formats and allocation counts
//! - Rebuild on resize and idempotent release
//! - Cleanup after a failed build

use lumen::core::LumenError;
use lumen::render::tone_mapping::pyramid::{
    LuminancePyramid, Reduction, level_count_for, top_level_for,
};
use lumen::render::{SoftwareDevice, TargetFormat, TextureHandle};

fn built(device: &mut SoftwareDevice, width: u32, height: u32) -> LuminancePyramid<SoftwareDevice> {
    let mut pyramid = LuminancePyramid::new();
    pyramid.build(device, width, height).unwrap();
    pyramid
}

// ============================================================================
// Level Layout
// ============================================================================

#[test]
fn full_hd_builds_eleven_levels() {
    let mut device = SoftwareDevice::new();
    let pyramid = built(&mut device, 1920, 1080);

    assert_eq!(pyramid.levels().len(), 11);
    assert_eq!(pyramid.sides(), vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024]);
    assert_eq!(pyramid.top_index(), Some(10));
    assert_eq!(pyramid.extent(), (1920, 1080));
}

#[test]
fn top_level_follows_the_shorter_side() {
    assert_eq!(top_level_for(1023, 4096), Some(9));
    assert_eq!(level_count_for(1023, 4096), 10);
    assert_eq!(top_level_for(4096, 1024), Some(10));
    assert_eq!(top_level_for(0, 720), None);
    assert_eq!(level_count_for(1280, 0), 0);
}

#[test]
fn single_pixel_output_has_only_the_base_level() {
    let mut device = SoftwareDevice::new();
    let pyramid = built(&mut device, 1, 1);

    assert_eq!(pyramid.sides(), vec![1]);
    assert_eq!(pyramid.base().map(|l| l.side), Some(1));
}

#[test]
fn every_level_holds_min_avg_max_r32_images() {
    let mut device = SoftwareDevice::new();
    let pyramid = built(&mut device, 64, 48);

    assert_eq!(device.live_textures(), 3 * pyramid.levels().len());
    for level in pyramid.levels() {
        for reduction in Reduction::ALL {
            let image = level.get(reduction);
            assert_eq!(image.size(), (level.side, level.side));
            assert_eq!(image.format(), TargetFormat::R32Float);
        }
    }
}

// ============================================================================
// Rebuild and Release
// ============================================================================

#[test]
fn resize_matches_a_fresh_build() {
    let mut device = SoftwareDevice::new();
    let mut pyramid = built(&mut device, 640, 480);
    let old_base = pyramid.base().unwrap().avg.clone();

    pyramid.resize(&mut device, 1920, 1080).unwrap();

    let mut other = SoftwareDevice::new();
    let fresh = built(&mut other, 1920, 1080);
    assert_eq!(pyramid.sides(), fresh.sides());
    assert_eq!(device.live_textures(), other.live_textures());
    assert!(!device.is_alive(&old_base));
}

#[test]
fn release_is_idempotent() {
    let mut device = SoftwareDevice::new();
    let mut pyramid = built(&mut device, 128, 128);

    pyramid.release(&mut device);
    pyramid.release(&mut device);

    assert!(pyramid.is_empty());
    assert_eq!(pyramid.extent(), (0, 0));
    assert_eq!(device.live_textures(), 0);
}

// ============================================================================
// Failure Handling
// ============================================================================

#[test]
fn zero_sized_output_is_rejected() {
    let mut device = SoftwareDevice::new();
    let mut pyramid = LuminancePyramid::new();

    let err = pyramid.build(&mut device, 0, 600).unwrap_err();

    assert!(matches!(err, LumenError::ResourceCreation { .. }));
    assert!(pyramid.is_empty());
    assert_eq!(device.live_textures(), 0);
}

#[test]
fn failed_build_releases_every_partial_level() {
    let mut device = SoftwareDevice::new();
    let mut pyramid = LuminancePyramid::new();

    // 256x256 needs 27 images; fail in the middle of a level
    device.fail_allocations_after(10);
    let err = pyramid.build(&mut device, 256, 256).unwrap_err();

    assert!(matches!(err, LumenError::ResourceCreation { .. }));
    assert!(pyramid.is_empty());
    assert_eq!(device.live_textures(), 0);
}

#[test]
fn failed_rebuild_leaves_the_pyramid_empty() {
    let mut device = SoftwareDevice::new();
    let mut pyramid = built(&mut device, 64, 64);

    device.fail_allocations_after(4);
    assert!(pyramid.resize(&mut device, 512, 512).is_err());
    assert!(pyramid.is_empty());
    assert_eq!(device.live_textures(), 0);

    device.clear_allocation_limit();
    pyramid.resize(&mut device, 512, 512).unwrap();
    assert_eq!(pyramid.levels().len(), 10);
}
