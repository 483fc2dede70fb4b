//! Color-family alias table.
//!
//! Vendors name colors freely ("Cobalt", "Ivory"); the catalog groups them
//! under a smaller set of families. The table maps a lowercase vendor color
//! to its family name and is applied when colors are persisted. Lookups are
//! case-insensitive; colors with no alias pass through unchanged.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::{AppConfig, ConfigError};

const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("cobalt", "Blue"),
    ("ivory", "White"),
    ("gunmetal", "Black"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorAliases {
    by_color: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct AliasFile {
    aliases: BTreeMap<String, String>,
}

impl Default for ColorAliases {
    fn default() -> Self {
        Self::from_pairs(
            DEFAULT_ALIASES
                .iter()
                .map(|(color, family)| ((*color).to_string(), (*family).to_string())),
        )
    }
}

impl ColorAliases {
    /// An empty table: every color resolves to itself.
    #[must_use]
    pub fn none() -> Self {
        Self {
            by_color: HashMap::new(),
        }
    }

    fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            by_color: pairs
                .into_iter()
                .map(|(color, family)| (color.trim().to_lowercase(), family.trim().to_string()))
                .collect(),
        }
    }

    /// Returns the family name for `color`, or `color` itself when no alias exists.
    #[must_use]
    pub fn resolve<'a>(&'a self, color: &'a str) -> &'a str {
        self.by_color
            .get(&color.trim().to_lowercase())
            .map_or(color, String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_color.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_color.is_empty()
    }
}

/// Load and validate a color alias table from a YAML file of the form
/// `aliases: { cobalt: Blue, ivory: White }`.
///
/// The file replaces the built-in defaults entirely.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_color_aliases(path: &Path) -> Result<ColorAliases, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::AliasFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_color_aliases(&content)
}

/// The alias table named by `BEADCAT_COLOR_ALIASES_PATH`, or the built-in
/// defaults when unset.
///
/// # Errors
///
/// Returns `ConfigError` if the configured file cannot be loaded.
pub fn configured_color_aliases(config: &AppConfig) -> Result<ColorAliases, ConfigError> {
    match &config.color_aliases_path {
        Some(path) => load_color_aliases(path),
        None => Ok(ColorAliases::default()),
    }
}

fn parse_color_aliases(content: &str) -> Result<ColorAliases, ConfigError> {
    let file: AliasFile = serde_yaml::from_str(content).map_err(ConfigError::AliasFileParse)?;
    validate_aliases(&file)?;
    Ok(ColorAliases::from_pairs(file.aliases))
}

fn validate_aliases(file: &AliasFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for (color, family) in &file.aliases {
        if color.trim().is_empty() {
            return Err(ConfigError::Validation(
                "alias color must be non-empty".to_string(),
            ));
        }
        if family.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "alias for '{color}' has an empty family name"
            )));
        }
        if !seen.insert(color.trim().to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate alias color: '{color}'"
            )));
        }
    }
    Ok(())
}
