//! Application configuration: TOML files, field-wise merging.
//!
//! The dispatch core reads only the `[cors]` section; every other top-level
//! key is handler-visible through [`Config::get`]. Configs merge overlay
//! style — a later layer wins key-wise, nested tables merge recursively —
//! so a deployment file can sit on top of checked-in defaults.

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use toml::{Table, Value};

use crate::cors::CorsConfig;
use crate::error::Error;

/// Application configuration snapshot.
///
/// Frozen behind an `Arc` when the server starts; handlers see a read-only
/// view for the lifetime of the process.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cors: Option<CorsConfig>,
    #[serde(flatten)]
    settings: Table,
}

impl Config {
    /// Loads a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Lays `overlay` on top of `self`: set fields win, nested tables in
    /// the free-form settings merge key-wise.
    pub fn merge(mut self, overlay: Config) -> Config {
        if overlay.cors.is_some() {
            self.cors = overlay.cors;
        }
        merge_tables(&mut self.settings, overlay.settings);
        self
    }

    /// A handler-visible setting by top-level key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Error> {
        Ok(toml::from_str(raw)?)
    }
}

fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_cors_and_free_form_settings() {
        let config: Config = r#"
            app_name = "demo"

            [cors]
            origin = "*"
            credentials = true

            [limits]
            max_items = 50
        "#
        .parse()
        .unwrap();

        assert!(config.cors.as_ref().unwrap().credentials);
        assert_eq!(config.get("app_name").unwrap().as_str(), Some("demo"));
        assert_eq!(
            config.get("limits").unwrap().get("max_items").unwrap().as_integer(),
            Some(50)
        );
    }

    #[test]
    fn overlay_wins_and_tables_merge_deeply() {
        let base: Config = "a = 1\n[nested]\nx = 1\ny = 1".parse().unwrap();
        let overlay: Config = "a = 2\n[nested]\ny = 2\nz = 2\n[cors]\n".parse().unwrap();

        let merged = base.merge(overlay);
        assert!(merged.cors.is_some());
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(2));
        let nested = merged.get("nested").unwrap();
        assert_eq!(nested.get("x").unwrap().as_integer(), Some(1));
        assert_eq!(nested.get("y").unwrap().as_integer(), Some(2));
        assert_eq!(nested.get("z").unwrap().as_integer(), Some(2));
    }

    #[test]
    fn base_cors_survives_when_overlay_has_none() {
        let base: Config = "[cors]\norigin = \"https://a.dev\"".parse().unwrap();
        let overlay: Config = "unrelated = true".parse().unwrap();
        assert!(base.merge(overlay).cors.is_some());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[cors]\norigin = \"*\"").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert!(config.cors.is_some());
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = Config::from_str("not = = toml").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Config::from_file("/nonexistent/nami.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
