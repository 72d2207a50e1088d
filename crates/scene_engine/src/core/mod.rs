//! # Core Module
//!
//! Scene-wide settings shared by the scene graph and applications.

pub mod config;

pub use config::{Config, ConfigError, EngineConfig, MaterialConfig, SceneConfig, ShaderConfig};
