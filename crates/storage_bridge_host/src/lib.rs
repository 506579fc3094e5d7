//! Host bridge between the native extension handler and the storage core.

pub mod api;
pub mod preferences;

pub use api::{core_version, init_logging, ping, HostBridge, PageId};
pub use preferences::{
    extension_identifier, show_extension_preferences, HostActionError, PreferencesHost,
};
