//! Tetra host application library
//!
//! Exposes configuration and systems for testing.

pub mod config;
pub mod systems;
