//! Application configuration
//!
//! Configuration is loaded from multiple sources with the following priority (lowest to highest):
//! 1. `config/default.toml` (version controlled)
//! 2. `config/user.toml` (gitignored, user overrides)
//! 3. Environment variables (`TETRA_SECTION__KEY`)

use figment::{Figment, providers::{Format, Toml, Env}};
use serde::{Serialize, Deserialize};
use std::path::Path;
use tetra_core::{BoundingSphere, MeshingParams, Vec3};
use tetra_render::SaoSettings;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Window configuration
    #[serde(default)]
    pub window: WindowConfig,
    /// Camera configuration
    #[serde(default)]
    pub camera: CameraConfig,
    /// Input surface and meshing configuration
    #[serde(default)]
    pub mesh: MeshConfig,
    /// Rendering configuration
    #[serde(default)]
    pub rendering: RenderingConfig,
    /// Debug configuration
    #[serde(default)]
    pub debug: DebugConfig,
}

impl AppConfig {
    /// Load configuration from default locations
    ///
    /// Priority (lowest to highest):
    /// 1. `config/default.toml`
    /// 2. `config/user.toml`
    /// 3. Environment variables (`TETRA_*`)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific config directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let default_path = config_dir.join("default.toml");
        let user_path = config_dir.join("user.toml");

        let mut figment = Figment::new();

        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }

        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }

        // TETRA_RENDERING__DEBUG_MODE=true -> rendering.debug_mode = true
        figment = figment.merge(Env::prefixed("TETRA_").split("__"));

        figment.extract().map_err(ConfigError::from)
    }
}

/// Window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Window width in pixels
    pub width: u32,
    /// Window height in pixels
    pub height: u32,
    /// Start in fullscreen mode
    pub fullscreen: bool,
    /// Enable VSync
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Tetra - Deferred Tetrahedral Viewer".to_string(),
            width: 1280,
            height: 720,
            fullscreen: false,
            vsync: true,
        }
    }
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Near clipping plane
    pub near: f32,
    /// Far clipping plane
    pub far: f32,
    /// Orbit speed in radians per second (0 holds the camera still)
    pub orbit_speed: f32,
    /// How far past a tight fit the camera backs off from the mesh
    pub distance_scale: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 60.0,
            near: 0.1,
            far: 1000.0,
            orbit_speed: 0.1,
            distance_scale: 1.5,
        }
    }
}

/// Input surface and meshing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Radius of the generated sphere surface
    pub radius: f32,
    /// Icosphere subdivision level
    pub subdivisions: u32,
    /// Quality parameters handed to the tetrahedralizer
    pub meshing: MeshingParams,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            radius: 20.0,
            subdivisions: 3,
            meshing: MeshingParams {
                cell_size: 2.0,
                ..MeshingParams::default()
            },
        }
    }
}

/// Rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingConfig {
    /// Background color [r, g, b, a]
    pub background_color: [f32; 4],
    /// Start with the G-buffer tiles on screen
    pub debug_mode: bool,
    pub draw_floor: bool,
    pub draw_lights: bool,
    /// Start with the AO overlay on screen
    pub draw_ao: bool,
    /// Exploded-view shrink factor (1 = cells touch)
    pub tetra_scale: f32,
    /// Only show cells inside [x, y, z, radius]
    pub clip_sphere: Option<[f32; 4]>,
    /// Ambient obscurance sample radius in world units
    pub ao_radius: f32,
    pub ao_bias: f32,
    pub ao_intensity: f32,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            background_color: [0.02, 0.02, 0.08, 1.0],
            debug_mode: false,
            draw_floor: true,
            draw_lights: true,
            draw_ao: false,
            tetra_scale: 0.9,
            clip_sphere: None,
            ao_radius: 1.0,
            ao_bias: 0.012,
            ao_intensity: 1.0,
        }
    }
}

impl RenderingConfig {
    /// Convert to the renderer's ambient obscurance settings
    pub fn sao_settings(&self) -> SaoSettings {
        SaoSettings {
            radius: self.ao_radius,
            bias: self.ao_bias,
            intensity: self.ao_intensity,
        }
    }

    /// The configured clip sphere; a non-positive radius disables clipping
    pub fn clip_sphere(&self) -> Option<BoundingSphere> {
        self.clip_sphere
            .filter(|s| s[3] > 0.0)
            .map(|s| BoundingSphere {
                center: Vec3::new(s[0], s[1], s[2]),
                radius: s[3],
            })
    }
}

/// Debug configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Configuration error
#[derive(Debug)]
pub struct ConfigError {
    message: String,
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError {
            message: e.to_string(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.mesh.meshing.cell_size, 2.0);
        assert!(config.rendering.draw_floor);
        assert!(!config.rendering.debug_mode);
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml = toml::to_string(&config).unwrap();
        assert!(toml.contains("title"));
        assert!(toml.contains("tetra_scale"));
        assert!(toml.contains("cell_radius_edge_ratio"));
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: AppConfig = toml::from_str("[rendering]\ndebug_mode = true\n").unwrap();
        assert!(config.rendering.debug_mode);
        assert_eq!(config.rendering.tetra_scale, 0.9);
        assert_eq!(config.window.height, 720);
    }

    #[test]
    fn test_clip_sphere_disabled_by_radius() {
        let mut rendering = RenderingConfig::default();
        assert!(rendering.clip_sphere().is_none());

        rendering.clip_sphere = Some([1.0, 2.0, 3.0, 0.0]);
        assert!(rendering.clip_sphere().is_none());

        rendering.clip_sphere = Some([1.0, 2.0, 3.0, 4.0]);
        let sphere = rendering.clip_sphere().unwrap();
        assert_eq!(sphere.center, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(sphere.radius, 4.0);
    }

    #[test]
    fn test_sao_settings() {
        let rendering = RenderingConfig {
            ao_radius: 2.5,
            ..Default::default()
        };
        let sao = rendering.sao_settings();
        assert_eq!(sao.radius, 2.5);
        assert_eq!(sao.bias, rendering.ao_bias);
    }
}
