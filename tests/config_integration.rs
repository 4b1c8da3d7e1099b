//! Integration tests for configuration loading
//!
//! Tests that verify config loading from files and environment variables.

use std::fs;

use serial_test::serial;
use tetra::config::AppConfig;

#[test]
#[serial]
fn test_env_override() {
    std::env::set_var("TETRA_WINDOW__TITLE", "Test From Env");
    let config = AppConfig::load().unwrap();
    assert_eq!(config.window.title, "Test From Env");
    std::env::remove_var("TETRA_WINDOW__TITLE");
}

#[test]
#[serial]
fn test_env_override_nested_section() {
    std::env::set_var("TETRA_RENDERING__DEBUG_MODE", "true");
    std::env::set_var("TETRA_MESH__MESHING__CELL_SIZE", "4.5");
    let config = AppConfig::load().unwrap();
    assert!(config.rendering.debug_mode);
    assert_eq!(config.mesh.meshing.cell_size, 4.5);
    std::env::remove_var("TETRA_RENDERING__DEBUG_MODE");
    std::env::remove_var("TETRA_MESH__MESHING__CELL_SIZE");
}

#[test]
#[serial]
fn test_default_file_loading() {
    let config = AppConfig::load().unwrap();
    assert_eq!(config.mesh.radius, 20.0);
    assert_eq!(config.mesh.subdivisions, 3);
    assert!(config.rendering.clip_sphere.is_none());
}

#[test]
#[serial]
fn test_user_file_overrides_default() {
    let dir = std::env::temp_dir().join(format!("tetra-config-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("default.toml"), "[camera]\nfov = 45.0\nnear = 0.5\n").unwrap();
    fs::write(dir.join("user.toml"), "[camera]\nfov = 70.0\n").unwrap();

    let config = AppConfig::load_from(&dir).unwrap();
    assert_eq!(config.camera.fov, 70.0);
    assert_eq!(config.camera.near, 0.5);
    // Untouched sections keep their defaults
    assert_eq!(config.window.width, 1280);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
#[serial]
fn test_missing_directory_uses_defaults() {
    let config = AppConfig::load_from("does/not/exist").unwrap();
    assert_eq!(config.window.height, 720);
    assert_eq!(config.debug.log_level, "info");
}

#[test]
#[serial]
fn test_bad_value_is_an_error() {
    std::env::set_var("TETRA_WINDOW__WIDTH", "wide");
    let result = AppConfig::load();
    std::env::remove_var("TETRA_WINDOW__WIDTH");
    let err = result.unwrap_err();
    assert!(err.to_string().starts_with("Configuration error"));
}
