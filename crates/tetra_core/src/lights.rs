//! Light set
//!
//! A small ordered list of point lights. Light 0 drifts slowly high above the
//! scene; every other light orbits the scene at ground level. Positions are a
//! pure function of elapsed time, so [`LightSet::advance`] can be called with
//! any timestamp in any order.

use std::f32::consts::TAU;

use tetra_math::Vec3;

/// Orbit radius of lights 1..N
pub const ORBIT_RADIUS: f32 = 63.5;
/// Height of the orbiting lights
pub const ORBIT_HEIGHT: f32 = 1.6;
/// Height of light 0
pub const OVERHEAD_HEIGHT: f32 = 30.0;
/// Angular speed of light 0 relative to the orbiting lights
pub const OVERHEAD_SPEED: f32 = 0.333;

/// A point light with a spherical volume of influence
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub position: Vec3,
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub intensity: f32,
    /// Draw size of the light marker
    pub radius: f32,
    /// Falloff extent of the light volume
    pub volume: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            ambient: [0.0, 0.0, 0.0, 1.0],
            diffuse: [1.0, 1.0, 1.0, 1.0],
            specular: [1.0, 1.0, 1.0, 1.0],
            intensity: 1.0,
            radius: 1.0,
            volume: 10.0,
        }
    }
}

/// Ordered collection of animated lights
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LightSet {
    lights: Vec<Light>,
}

impl LightSet {
    /// The default rig: one overhead light plus eight orbiting lights
    pub fn new() -> Self {
        let mut lights = Vec::with_capacity(9);
        lights.push(Light {
            diffuse: [0.35, 0.2, 0.22, 1.0],
            intensity: 0.8,
            radius: 8.1,
            volume: 85.0,
            ..Default::default()
        });
        for i in 0..8 {
            let s = (i as f32 / 8.0) * 0.3;
            lights.push(Light {
                diffuse: [0.7 + s * 0.5, 0.2 - s, 0.1 + s * s, 1.0],
                intensity: 0.75,
                radius: 7.05,
                volume: 65.0,
                ..Default::default()
            });
        }
        Self::from_lights(lights)
    }

    /// A set with no lights
    pub fn empty() -> Self {
        Self { lights: Vec::new() }
    }

    /// Wrap an explicit list; positions are placed at time zero
    pub fn from_lights(lights: Vec<Light>) -> Self {
        let mut set = Self { lights };
        set.advance(0.0);
        set
    }

    /// Move every light to its position at `elapsed` seconds
    pub fn advance(&mut self, elapsed: f32) {
        let Some((first, orbiting)) = self.lights.split_first_mut() else {
            return;
        };

        let t = elapsed * OVERHEAD_SPEED;
        first.position = Vec3::new(t.sin(), OVERHEAD_HEIGHT, t.cos());

        if orbiting.is_empty() {
            return;
        }
        let step = TAU / orbiting.len() as f32;
        for (i, light) in orbiting.iter_mut().enumerate() {
            let t = elapsed + step * i as f32;
            light.position = Vec3::new(t.cos() * ORBIT_RADIUS, ORBIT_HEIGHT, t.sin() * ORBIT_RADIUS);
        }
    }

    #[inline]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter()
    }
}
