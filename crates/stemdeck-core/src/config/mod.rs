//! Engine configuration
//!
//! - `EngineConfig` and its sections (pool, automation, mixing)
//! - Generic YAML/JSON load/save for configs and preset bundles
//! - Default config location
//!
//! # Usage
//!
//! ```ignore
//! use stemdeck_core::config::{default_config_path, load_config, save_config, EngineConfig};
//!
//! let path = default_config_path("engine.yaml");
//! let config: EngineConfig = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod engine;
mod io;
mod paths;

pub use engine::{AutomationConfig, EngineConfig, MixingConfig, PoolConfig, StemSizeTable};
pub use io::{load_config, save_config, ConfigFormat};
pub use paths::{default_config_dir, default_config_path};
