//! Configuration for gitosis-keys
//!
//! - The serving program named in forced commands
//! - Optional JSON settings file and path defaults

mod serve;
mod settings;

pub use serve::{ServeCommand, DEFAULT_SERVE_PROGRAM};
pub use settings::{
    default_authorized_keys, default_settings_path, Settings, SyncSettings,
};
