//! Preferences-pane action for the host GUI shell.
//!
//! # Responsibility
//! - Derive the extension identifier from the app bundle identifier.
//! - Run the "show preferences" host action off the caller's thread and
//!   hand its result back to the GUI shell.
//!
//! # Invariants
//! - Failures are reported to the GUI shell only, never to content scripts.
//! - Exactly one result is delivered per request.

use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

const EXTENSION_SUFFIX: &str = "-extension";

/// Host capability that opens the browser's extension preferences.
pub trait PreferencesHost: Send + Sync {
    fn show_preferences_for_extension(&self, extension_id: &str) -> Result<(), HostActionError>;
}

/// Host action failures surfaced to the GUI shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostActionError {
    /// The host rejected or could not perform the action.
    Unavailable(String),
    /// The background worker could not be started.
    Spawn(String),
}

impl Display for HostActionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "host action unavailable: {message}"),
            Self::Spawn(message) => write!(f, "failed to start host action: {message}"),
        }
    }
}

impl Error for HostActionError {}

/// Extension identifier for an app bundle identifier.
///
/// A missing bundle identifier yields the bare suffix.
pub fn extension_identifier(bundle_prefix: Option<&str>) -> String {
    format!("{}{EXTENSION_SUFFIX}", bundle_prefix.unwrap_or_default())
}

/// Asks the host to show the extension preferences pane.
///
/// Returns immediately; the receiver yields the single action result.
pub fn show_extension_preferences(
    host: Arc<dyn PreferencesHost>,
    bundle_prefix: Option<&str>,
) -> Receiver<Result<(), HostActionError>> {
    let (sender, receiver) = mpsc::channel();
    let extension_id = extension_identifier(bundle_prefix);
    let worker_sender = sender.clone();

    let spawned = thread::Builder::new()
        .name("show-preferences".to_string())
        .spawn(move || {
            let result = host.show_preferences_for_extension(&extension_id);
            match &result {
                Ok(()) => info!("event=show_preferences module=host status=ok"),
                Err(err) => error!("event=show_preferences module=host status=error error={err}"),
            }
            // The GUI shell may have stopped listening; nothing left to report to.
            let _ = worker_sender.send(result);
        });

    if let Err(err) = spawned {
        error!("event=show_preferences module=host status=error error={err}");
        let _ = sender.send(Err(HostActionError::Spawn(err.to_string())));
    }
    receiver
}
