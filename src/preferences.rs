//! Theme and locale as an injected context
//!
//! The context is loaded once from a [`KeyValueStore`], handed to whoever
//! needs it, and saves every change back. Observers follow changes through a
//! `watch` channel instead of reading shared globals.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::docstore::{KeyValueStore, Result};

const THEME_KEY: &str = "theme";
const LOCALE_KEY: &str = "locale";

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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Vi,
    En,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::Vi => "vi",
            Locale::En => "en",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown preference value: {0}")]
pub struct UnknownPreference(pub String);

impl FromStr for Theme {
    type Err = UnknownPreference;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(UnknownPreference(other.to_string())),
        }
    }
}

impl FromStr for Locale {
    type Err = UnknownPreference;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "vi" => Ok(Locale::Vi),
            "en" => Ok(Locale::En),
            other => Err(UnknownPreference(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    pub theme: Theme,
    pub locale: Locale,
}

/// Current theme and locale plus the store they persist to
pub struct PreferencesContext {
    store: Arc<dyn KeyValueStore>,
    tx: watch::Sender<Preferences>,
}

impl PreferencesContext {
    /// Read persisted values, falling back to `defaults` for anything missing
    /// or unreadable
    pub fn load(store: Arc<dyn KeyValueStore>, defaults: Preferences) -> Result<Self> {
        let theme = read_or(&*store, THEME_KEY, defaults.theme)?;
        let locale = read_or(&*store, LOCALE_KEY, defaults.locale)?;
        let (tx, _) = watch::channel(Preferences { theme, locale });
        Ok(Self { store, tx })
    }

    pub fn current(&self) -> Preferences {
        *self.tx.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<Preferences> {
        self.tx.subscribe()
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        if self.current().theme == theme {
            return Ok(());
        }
        self.store.save(THEME_KEY, theme.as_str())?;
        self.tx.send_modify(|prefs| prefs.theme = theme);
        info!(theme = theme.as_str(), "Theme changed");
        Ok(())
    }

    pub fn toggle_theme(&self) -> Result<Theme> {
        let theme = self.current().theme.toggled();
        self.set_theme(theme)?;
        Ok(theme)
    }

    pub fn set_locale(&self, locale: Locale) -> Result<()> {
        if self.current().locale == locale {
            return Ok(());
        }
        self.store.save(LOCALE_KEY, locale.as_str())?;
        self.tx.send_modify(|prefs| prefs.locale = locale);
        info!(locale = locale.as_str(), "Locale changed");
        Ok(())
    }
}

fn read_or<T: FromStr + Copy>(store: &dyn KeyValueStore, key: &str, default: T) -> Result<T> {
    let Some(raw) = store.load(key)? else {
        return Ok(default);
    };
    Ok(raw.parse().unwrap_or_else(|_| {
        warn!(key, value = %raw, "Ignoring unreadable preference");
        default
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docstore::{FjallDocumentStore, FjallKeyValue};
    use tempfile::TempDir;

    fn kv() -> (Arc<dyn KeyValueStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallDocumentStore::open(temp_dir.path().join("prefs")).unwrap();
        (Arc::new(FjallKeyValue::open(store.keyspace()).unwrap()), temp_dir)
    }

    #[test]
    fn test_defaults_when_nothing_saved() {
        let (store, _temp) = kv();
        let defaults = Preferences {
            theme: Theme::Dark,
            locale: Locale::En,
        };
        let ctx = PreferencesContext::load(store, defaults).unwrap();
        assert_eq!(ctx.current(), defaults);
    }

    #[test]
    fn test_changes_persist_across_loads() {
        let (store, _temp) = kv();
        let ctx = PreferencesContext::load(store.clone(), Preferences::default()).unwrap();
        assert_eq!(ctx.toggle_theme().unwrap(), Theme::Dark);
        ctx.set_locale(Locale::En).unwrap();

        let reloaded = PreferencesContext::load(store, Preferences::default()).unwrap();
        assert_eq!(reloaded.current().theme, Theme::Dark);
        assert_eq!(reloaded.current().locale, Locale::En);
    }

    #[test]
    fn test_unreadable_value_falls_back() {
        let (store, _temp) = kv();
        store.save("theme", "sepia").unwrap();
        let ctx = PreferencesContext::load(store, Preferences::default()).unwrap();
        assert_eq!(ctx.current().theme, Theme::Light);
    }

    #[tokio::test]
    async fn test_watchers_see_changes() {
        let (store, _temp) = kv();
        let ctx = PreferencesContext::load(store, Preferences::default()).unwrap();
        let mut rx = ctx.watch();

        ctx.set_theme(Theme::Dark).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().theme, Theme::Dark);
    }
}
