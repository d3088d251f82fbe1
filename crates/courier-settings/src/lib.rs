//! # courier-settings
//!
//! Layered configuration for the courier server.
//!
//! Settings are loaded from four layers (in priority order):
//! 1. **Compiled defaults** — [`CourierSettings::default()`]
//! 2. **User file** — `~/.courier/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `COURIER_*` overrides
//! 4. **Caller overrides** — command-line flags, applied last
//!
//! The result is validated once, after every layer.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings_from_path, settings_path};
pub use types::*;
