// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for Grove.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`GROVE_*`)
//!
//! # Usage
//!
//! ```ignore
//! use grove_config::load_config;
//!
//! let config = load_config()?;
//! println!("Database at {}", config.database.url);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::GroveConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default)]
pub struct GroveConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub authz: AuthzConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`GROVE_*`)
/// 2. Config file (`/etc/grove/grove.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<GroveConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<GroveConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Merge `sources` in precedence order and finalize.
pub fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<GroveConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = GroveConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: GroveConfigLayer) -> Result<GroveConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let authz = layer.authz.unwrap_or_default().finalize();

	validate_config(&database, &authz)?;

	info!(
		database = %database.url,
		log_level = %logging.level,
		log_format = %logging.format,
		max_ancestor_depth = authz.max_ancestor_depth,
		"Grove configuration loaded"
	);

	Ok(GroveConfig {
		database,
		logging,
		authz,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(database: &DatabaseConfig, authz: &AuthzConfig) -> Result<(), ConfigError> {
	database.validate()?;

	if authz.max_ancestor_depth == 0 {
		return Err(ConfigError::Validation(
			"authz.max_ancestor_depth must be at least 1".to_string(),
		));
	}

	Ok(())
}
