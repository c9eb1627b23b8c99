//! Tone Mapper Tests
//!
//! End-to-end frames through `ToneMapper` on the software device:
//! - Initialization, resize and teardown
//! - Reinhard and exponential composites
//! - Eye adaptation across frames
//! - Debug groups and target binding
//! - Settings validation and loading

use lumen::core::LumenError;
use lumen::render::device::{PixelProgram, RenderDevice, TargetDesc, TargetFormat, TextureHandle};
use lumen::render::software::{SoftTexture, SoftwareDevice};
use lumen::render::tone_mapping::ToneMapper;
use lumen::render::tone_mapping::adaptation::AdaptationOutcome;
use lumen::render::tone_mapping::composite::ToneMapCurve;
use lumen::render::tone_mapping::settings::{ReadbackLatency, ToneMappingSettings};

const EPSILON: f32 = 1e-4;
const DT: f32 = 1.0 / 60.0;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn grey(l: f32) -> [f32; 4] {
    [l, l, l, 1.0]
}

struct Fixture {
    device: SoftwareDevice,
    mapper: ToneMapper<SoftwareDevice>,
    output: SoftTexture,
    frame: usize,
}

impl Fixture {
    fn new(width: u32, height: u32, settings: ToneMappingSettings) -> Self {
        let mut device = SoftwareDevice::new();
        let mapper = ToneMapper::initialize(&mut device, width, height, 2, settings).unwrap();
        let output = device
            .create_color_target(&TargetDesc::new("Backbuffer", width, height, TargetFormat::Rgba8Unorm))
            .unwrap();
        Self {
            device,
            mapper,
            output,
            frame: 0,
        }
    }

    /// Renders one frame whose scene is `scene(x, y)`.
    fn render(&mut self, dt: f32, scene: impl FnMut(u32, u32) -> [f32; 4]) -> AdaptationOutcome {
        let index = self.frame % self.mapper.render_target().buffer_count();
        let device = &mut self.device;

        self.mapper.clear_render_target(device, index);
        self.mapper.render_target().bind(device, index);
        device.write_texels(self.mapper.render_target().color(index), scene);
        self.mapper.make_brightness_maps(device, index).unwrap();
        let outcome = self
            .mapper
            .post_process_tone_map_with_delta(device, index, &self.output, dt)
            .unwrap();
        self.mapper.unbind_render_targets(device);
        device.submit();

        self.frame += 1;
        outcome
    }

    fn output(&self, x: u32, y: u32) -> [f32; 4] {
        self.device.read_texel(&self.output, x, y)
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn initialize_allocates_target_pyramid_and_readback() {
    let fx = Fixture::new(256, 256, ToneMappingSettings::default());

    assert_eq!(fx.mapper.pyramid().levels().len(), 9);
    assert_eq!(fx.mapper.render_target().buffer_count(), 2);
    // 2 HDR colors + 9 levels x 3 + the backbuffer
    assert_eq!(fx.device.live_textures(), 2 + 27 + 1);
    assert_eq!(fx.device.live_depths(), 2);
    // one staging slot per buffer in flight, plus one
    assert_eq!(fx.device.live_staging(), 3);
    assert_eq!(fx.device.live_uniforms(), 1);
}

#[test]
fn invalid_settings_allocate_nothing() {
    let mut device = SoftwareDevice::new();

    let result =
        ToneMapper::initialize(&mut device, 64, 64, 2, ToneMappingSettings::default().with_tau(-1.0));

    assert!(matches!(result, Err(LumenError::Config(_))));
    assert_eq!(device.live_textures(), 0);
}

#[test]
fn failed_initialize_leaks_nothing() {
    for budget in [0, 3, 5, 20, 25, 27, 28] {
        let mut device = SoftwareDevice::new();
        device.fail_allocations_after(budget);

        let result = ToneMapper::initialize(&mut device, 64, 64, 2, ToneMappingSettings::default());

        assert!(result.is_err(), "budget {budget}");
        assert_eq!(device.live_textures(), 0, "budget {budget}");
        assert_eq!(device.live_depths(), 0, "budget {budget}");
        assert_eq!(device.live_staging(), 0, "budget {budget}");
        assert_eq!(device.live_uniforms(), 0, "budget {budget}");
    }
}

#[test]
fn resize_rebuilds_size_dependent_resources() {
    let mut fx = Fixture::new(256, 256, ToneMappingSettings::default());

    fx.mapper.resize(&mut fx.device, 1024, 512).unwrap();

    assert_eq!(fx.mapper.render_target().size(), (1024, 512));
    assert_eq!(fx.mapper.pyramid().levels().len(), 10);
    assert_eq!(fx.device.live_textures(), 2 + 30 + 1);
    assert_eq!(fx.device.live_staging(), 3);
}

#[test]
fn zero_sized_resize_is_ignored() {
    let mut fx = Fixture::new(128, 128, ToneMappingSettings::default());

    fx.mapper.resize(&mut fx.device, 0, 720).unwrap();

    assert_eq!(fx.mapper.render_target().size(), (128, 128));
    assert_eq!(fx.mapper.pyramid().levels().len(), 8);
}

#[test]
fn resize_on_external_colors_is_rejected() {
    let mut device = SoftwareDevice::new();
    let colors: Vec<SoftTexture> = (0..2)
        .map(|i| {
            let label = format!("Swapchain {i}");
            device
                .create_color_target(&TargetDesc::new(&label, 64, 64, TargetFormat::Rgba16Float))
                .unwrap()
        })
        .collect();
    let mut mapper =
        ToneMapper::initialize_with_external_colors(&mut device, colors, ToneMappingSettings::default())
            .unwrap();

    let result = mapper.resize(&mut device, 256, 256);

    assert!(matches!(result, Err(LumenError::Config(_))));
    assert_eq!(mapper.render_target().size(), (64, 64));
    assert_eq!(mapper.render_target().color(0).size(), (64, 64));
    assert_eq!(mapper.pyramid().levels().len(), 7);
    assert_eq!(device.live_depths(), 2);

    // same size is a no-op rather than an error
    mapper.resize(&mut device, 64, 64).unwrap();
}

#[test]
fn destroy_releases_everything() {
    let mut fx = Fixture::new(64, 64, ToneMappingSettings::default());
    fx.render(DT, |_, _| grey(1.0));

    fx.mapper.destroy(&mut fx.device);

    // only the backbuffer is left
    assert_eq!(fx.device.live_textures(), 1);
    assert_eq!(fx.device.live_depths(), 0);
    assert_eq!(fx.device.live_staging(), 0);
    assert_eq!(fx.device.live_uniforms(), 0);
}

// ============================================================================
// Composite
// ============================================================================

#[test]
fn mid_grey_at_matching_adaptation_maps_to_half() {
    let settings = ToneMappingSettings::default().with_initial_luminance(1.0);
    let mut fx = Fixture::new(256, 256, settings);

    fx.render(DT, |_, _| grey(1.0));

    let [r, g, b, a] = fx.output(17, 200);
    assert!(approx(r, 0.5) && approx(g, 0.5) && approx(b, 0.5), "{r} {g} {b}");
    assert_eq!(a, 1.0);
}

#[test]
fn exponential_curve_maps_adapted_luminance_to_one_minus_inverse_e() {
    let settings = ToneMappingSettings::default()
        .with_initial_luminance(1.0)
        .with_curve(ToneMapCurve::Exponential);
    let mut fx = Fixture::new(64, 64, settings);

    fx.render(DT, |_, _| grey(1.0));

    assert!(approx(fx.output(0, 0)[0], 1.0 - (-1.0_f32).exp()));
}

#[test]
fn set_curve_switches_the_composite_program() {
    let settings = ToneMappingSettings::default().with_initial_luminance(1.0);
    let mut fx = Fixture::new(64, 64, settings);

    fx.mapper.set_curve(ToneMapCurve::Exponential);
    fx.render(DT, |_, _| grey(1.0));

    let last = fx.device.draws().last().unwrap();
    assert_eq!(last.label, "Tone Map Composite");
    assert_eq!(last.program, PixelProgram::ToneMap(ToneMapCurve::Exponential));
    assert_eq!(fx.mapper.settings().curve, ToneMapCurve::Exponential);
}

#[test]
fn output_is_monotonic_in_scene_radiance() {
    let settings = ToneMappingSettings::default().with_initial_luminance(1.0);
    let mut fx = Fixture::new(64, 64, settings);

    fx.render(DT, |x, _| grey(x as f32 * 0.25));

    let row: Vec<f32> = (0..64).map(|x| fx.output(x, 10)[0]).collect();
    assert!(row.windows(2).all(|w| w[0] < w[1]));
    assert!(row.iter().all(|v| (0.0..1.0).contains(v)));
}

#[test]
fn very_bright_pixels_stay_below_white() {
    let settings = ToneMappingSettings::default().with_initial_luminance(0.18);
    let mut fx = Fixture::new(32, 32, settings);

    fx.render(DT, |_, _| grey(1.0e4));

    let r = fx.output(5, 5)[0];
    assert!(r > 0.99 && r <= 1.0, "{r}");
}

#[test]
fn black_frame_does_not_divide_by_zero() {
    let settings = ToneMappingSettings::default()
        .with_initial_luminance(0.0)
        .with_readback_latency(ReadbackLatency::CurrentFrame);
    let mut fx = Fixture::new(32, 32, settings);

    for _ in 0..3 {
        fx.render(DT, |_, _| grey(0.0));
    }

    assert_eq!(fx.mapper.adapted_luminance(), 0.0);
    assert_eq!(fx.output(3, 3), [0.0, 0.0, 0.0, 1.0]);
}

// ============================================================================
// Adaptation Across Frames
// ============================================================================

#[test]
fn eye_adapts_to_a_brighter_scene() {
    let settings = ToneMappingSettings::default().with_initial_luminance(1.0);
    let mut fx = Fixture::new(64, 64, settings);

    fx.render(0.1, |_, _| grey(1.0));
    let glare = {
        fx.render(0.1, |_, _| grey(10.0));
        fx.output(0, 0)[0]
    };

    let mut previous = fx.mapper.adapted_luminance();
    for _ in 0..100 {
        fx.render(0.1, |_, _| grey(10.0));
        let adapted = fx.mapper.adapted_luminance();
        assert!(adapted >= previous);
        previous = adapted;
    }

    assert!((previous - 10.0).abs() < 1e-2, "adapted {previous}");
    let adapted_output = fx.output(0, 0)[0];
    assert!(adapted_output < glare);
    assert!((adapted_output - 0.5).abs() < 1e-3);
}

#[test]
fn previous_frame_latency_skips_only_the_first_frame() {
    let mut fx = Fixture::new(32, 32, ToneMappingSettings::default());

    let outcomes: Vec<AdaptationOutcome> = (0..4).map(|_| fx.render(DT, |_, _| grey(1.0))).collect();

    assert_eq!(outcomes[0], AdaptationOutcome::Skipped);
    assert!(
        outcomes[1..]
            .iter()
            .all(|o| matches!(o, AdaptationOutcome::Updated { .. }))
    );
    assert_eq!(fx.mapper.adaptation().skipped_frames(), 1);
}

#[test]
fn gpu_a_frame_behind_delays_adaptation_without_stalling_it() {
    let mut fx = Fixture::new(32, 32, ToneMappingSettings::default());
    fx.device.lag_gpu_frames(1);

    let outcomes: Vec<AdaptationOutcome> = (0..10).map(|_| fx.render(DT, |_, _| grey(4.0))).collect();

    assert_eq!(outcomes[..2], [AdaptationOutcome::Skipped; 2]);
    assert!(
        outcomes[2..]
            .iter()
            .all(|o| matches!(o, AdaptationOutcome::Updated { instant, .. } if approx(*instant, 4.0)))
    );
    assert!(fx.mapper.adapted_luminance() > 0.18);
}

#[test]
fn timed_tone_map_uses_first_frame_dt_on_the_first_call() {
    let settings = ToneMappingSettings::default()
        .with_initial_luminance(0.5)
        .with_first_frame_dt(0.25)
        .with_readback_latency(ReadbackLatency::CurrentFrame);
    let mut fx = Fixture::new(16, 16, settings);

    let device = &mut fx.device;
    fx.mapper.clear_render_target(device, 0);
    device.fill(fx.mapper.render_target().color(0), grey(2.0));
    fx.mapper.make_brightness_maps(device, 0).unwrap();
    let outcome = fx
        .mapper
        .post_process_tone_map(device, 0, &fx.output)
        .unwrap();

    let AdaptationOutcome::Updated { instant, adapted } = outcome else {
        panic!("current-frame readback should update");
    };
    let expected = 0.5 + (instant - 0.5) * (1.0 - (-0.25_f32 / 0.5).exp());
    assert!(approx(adapted, expected), "{adapted} vs {expected}");
}

// ============================================================================
// Frame Structure
// ============================================================================

#[test]
fn frame_debug_groups_are_balanced() {
    let mut fx = Fixture::new(64, 64, ToneMappingSettings::default());

    fx.render(DT, |_, _| grey(1.0));

    assert_eq!(
        fx.device.debug_groups(),
        ["Clear HDR Target", "Brightness Reduction", "Tone Map"]
    );
    assert_eq!(fx.device.open_debug_groups(), 0);
}

#[test]
fn frames_alternate_hdr_buffers_and_unbind_at_the_end() {
    let mut fx = Fixture::new(32, 32, ToneMappingSettings::default());

    fx.render(DT, |_, _| grey(1.0));
    fx.render(DT, |_, _| grey(3.0));

    let target = fx.mapper.render_target();
    assert_eq!(fx.device.read_texel(target.color(0), 0, 0), grey(1.0));
    assert_eq!(fx.device.read_texel(target.color(1), 0, 0), grey(3.0));
    assert_eq!(fx.device.bound_color_count(), 0);
}

#[test]
fn clear_uses_the_configured_color() {
    let settings = ToneMappingSettings::default().with_clear_color([0.5, 0.25, 0.125, 1.0]);
    let mut fx = Fixture::new(16, 16, settings);

    fx.mapper.clear_render_target(&mut fx.device, 1);

    let color = fx.mapper.render_target().color(1);
    assert_eq!(fx.device.read_texel(color, 8, 8), [0.5, 0.25, 0.125, 1.0]);
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn settings_load_from_a_json_file() {
    let path = std::env::temp_dir().join(format!("lumen_tone_mapping_{}.json", std::process::id()));
    std::fs::write(
        &path,
        r#"{ "tau_seconds": 2.0, "readback_latency": "CurrentFrame", "clear_color": [0.0, 0.0, 1.0, 1.0] }"#,
    )
    .unwrap();

    let settings = ToneMappingSettings::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(settings.tau_seconds, 2.0);
    assert_eq!(settings.readback_latency, ReadbackLatency::CurrentFrame);
    assert_eq!(settings.clear_color, [0.0, 0.0, 1.0, 1.0]);
    assert_eq!(settings.curve, ToneMapCurve::Reinhard);
}

#[test]
fn missing_settings_file_is_an_io_error() {
    let result = ToneMappingSettings::load("/nonexistent/lumen/tone_mapping.json");

    assert!(matches!(result, Err(LumenError::IoError(_))));
}
