//! Settings provider contract.
//!
//! The personal token is owned by the host application and persisted outside
//! this crate. Core only reads it through [`SettingsProvider`].

use std::sync::{PoisonError, RwLock};

/// Host-owned settings consumed by the storage bridge and the GUI shell.
pub trait SettingsProvider: Send + Sync {
    fn personal_token(&self) -> String;
    fn set_personal_token(&self, token: &str);
}

/// Process-local settings provider.
///
/// Used by tests and the CLI; native hosts supply their own persisted
/// implementation.
#[derive(Debug, Default)]
pub struct InMemorySettings {
    personal_token: RwLock<String>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_personal_token(token: impl Into<String>) -> Self {
        Self {
            personal_token: RwLock::new(token.into()),
        }
    }
}

impl SettingsProvider for InMemorySettings {
    fn personal_token(&self) -> String {
        self.personal_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_personal_token(&self, token: &str) {
        let mut guard = self
            .personal_token
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = token.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemorySettings, SettingsProvider};

    #[test]
    fn defaults_to_empty_token() {
        assert_eq!(InMemorySettings::new().personal_token(), "");
    }

    #[test]
    fn set_personal_token_replaces_value() {
        let settings = InMemorySettings::with_personal_token("ghp_old");
        settings.set_personal_token("ghp_new");
        assert_eq!(settings.personal_token(), "ghp_new");
    }
}
