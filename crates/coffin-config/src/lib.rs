//! YAML configuration for the Halloween coffin controller
//!
//! Loads the rig configuration document (hardware wiring, detection tuning,
//! settings, scene catalog), resolves `!include` tags, and validates it
//! into an immutable [`CoffinConfig`].
//!
//! # Example
//!
//! ```ignore
//! use coffin_config::CoffinConfig;
//!
//! let config = CoffinConfig::load("/etc/coffin/configs.yaml")?;
//! for scene in config.catalog.iter() {
//!     println!("{}: {} steps", scene.key, scene.steps.len());
//! }
//! ```

mod config;
mod document;
mod error;
mod loader;

pub use config::CoffinConfig;
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_document, DocumentLoader};
