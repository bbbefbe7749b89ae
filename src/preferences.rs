//! Persisted UI preferences

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use lexcrm_storage::{keys, KeyValueStore};

use crate::error::Result;
use crate::messages::Language;

/// Colour scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme: {}", other)),
        }
    }
}

/// Theme and language values kept next to the session
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored theme; unknown values read as the default
    pub fn theme(&self) -> Result<Theme> {
        Ok(self
            .store
            .get(keys::THEME)?
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default())
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        debug!(%theme, "theme changed");
        self.store.set(keys::THEME, theme.as_str())?;
        Ok(())
    }

    /// Stored language, if it is one we support
    pub fn language(&self) -> Result<Option<Language>> {
        Ok(self
            .store
            .get(keys::LANGUAGE)?
            .and_then(|raw| raw.parse().ok()))
    }

    pub fn set_language(&self, language: Language) -> Result<()> {
        debug!(%language, "language changed");
        self.store.set(keys::LANGUAGE, language.code())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexcrm_storage::MemoryStore;

    #[test]
    fn test_theme_round_trip_through_store() {
        let prefs = Preferences::new(Arc::new(MemoryStore::new()));
        assert_eq!(prefs.theme().unwrap(), Theme::Light);

        prefs.set_theme(Theme::Light.toggled()).unwrap();
        assert_eq!(prefs.theme().unwrap(), Theme::Dark);
    }

    #[test]
    fn test_unknown_values_are_ignored() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(keys::THEME, "sepia").unwrap();
        store.set(keys::LANGUAGE, "de").unwrap();

        let prefs = Preferences::new(store);
        assert_eq!(prefs.theme().unwrap(), Theme::Light);
        assert_eq!(prefs.language().unwrap(), None);
    }

    #[test]
    fn test_language_uses_browser_codes() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(keys::LANGUAGE, "en-US").unwrap();

        let prefs = Preferences::new(store.clone());
        assert_eq!(prefs.language().unwrap(), Some(Language::En));

        prefs.set_language(Language::Uk).unwrap();
        assert_eq!(store.get(keys::LANGUAGE).unwrap(), Some("uk".to_string()));
    }
}
