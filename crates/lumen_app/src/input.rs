//! Platform-independent input and the demo light rig.
//!
//! Windowing backends translate their native key codes into [`Key`]; the
//! application decides what a key does. [`LightRig`] holds the three point
//! lights of the demo scene, whose intensities are cycled from the keyboard.

use glam::Vec3;

/// Keys the renderer's applications react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    F1,
    F2,
    F3,
    T,
    Escape,
}

impl Key {
    /// Index of the light a function key cycles.
    #[must_use]
    pub fn light_index(self) -> Option<usize> {
        match self {
            Key::F1 => Some(0),
            Key::F2 => Some(1),
            Key::F3 => Some(2),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub intensity: f32,
}

impl PointLight {
    #[must_use]
    pub const fn new(position: Vec3, intensity: f32) -> Self {
        Self {
            position,
            intensity,
        }
    }
}

/// Three point lights whose intensities step through 1, 10, 100.
#[derive(Debug, Clone, PartialEq)]
pub struct LightRig {
    pub lights: [PointLight; LightRig::LIGHT_COUNT],
}

impl LightRig {
    pub const LIGHT_COUNT: usize = 3;
    pub const INTENSITY_STEP: f32 = 10.0;
    pub const MAX_INTENSITY: f32 = 100.0;

    #[must_use]
    pub fn new() -> Self {
        Self {
            lights: [
                PointLight::new(Vec3::new(0.0, 5.0, 0.0), 1.0),
                PointLight::new(Vec3::new(5.0, 0.0, 0.0), 1.0),
                PointLight::new(Vec3::new(0.0, -5.0, -5.0), 1.0),
            ],
        }
    }

    /// Multiplies the intensity of light `index` by ten, wrapping back to 1
    /// once it exceeds 100. Returns the new intensity, or `None` for an
    /// unknown light.
    pub fn cycle_intensity(&mut self, index: usize) -> Option<f32> {
        let light = self.lights.get_mut(index)?;
        light.intensity *= Self::INTENSITY_STEP;
        if light.intensity > Self::MAX_INTENSITY {
            light.intensity = 1.0;
        }
        log::info!("Light {} intensity: {}", index + 1, light.intensity);
        Some(light.intensity)
    }

    /// Applies a key press. Returns `true` when the rig changed.
    pub fn handle_key(&mut self, key: Key) -> bool {
        key.light_index()
            .and_then(|index| self.cycle_intensity(index))
            .is_some()
    }

    #[must_use]
    pub fn intensities(&self) -> [f32; Self::LIGHT_COUNT] {
        self.lights.map(|l| l.intensity)
    }
}

impl Default for LightRig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_cycles_through_three_decades() {
        let mut rig = LightRig::new();
        let seen: Vec<f32> = (0..4).filter_map(|_| rig.cycle_intensity(1)).collect();
        assert_eq!(seen, vec![10.0, 100.0, 1.0, 10.0]);
        assert_eq!(rig.intensities(), [1.0, 10.0, 1.0]);
    }

    #[test]
    fn function_keys_map_to_lights() {
        let mut rig = LightRig::new();
        assert!(rig.handle_key(Key::F3));
        assert!(!rig.handle_key(Key::T));
        assert!(!rig.handle_key(Key::Escape));
        assert_eq!(rig.intensities(), [1.0, 1.0, 10.0]);
    }

    #[test]
    fn unknown_light_is_ignored() {
        let mut rig = LightRig::new();
        assert_eq!(rig.cycle_intensity(3), None);
        assert_eq!(rig, LightRig::new());
    }
}
