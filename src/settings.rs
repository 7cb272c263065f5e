//! Settings infrastructure for seclsp.
//!
//! This module provides support for loading and parsing settings.toml files
//! that configure how documents are split into grammar sections.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::document::{SectionSegmenter, DEFAULT_GRAMMAR};
use crate::error::{Error, Result};

/// Root settings structure loaded from settings.toml.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Section segmentation configuration.
    pub sections: Option<SectionSettings>,
}

/// Settings for section segmentation.
#[derive(Debug, Default, Deserialize)]
pub struct SectionSettings {
    /// Grammar for content before the first `###` declaration.
    pub default_grammar: Option<String>,
}

impl Settings {
    /// The configured default grammar, or `DEFAULT_GRAMMAR`.
    ///
    /// Names that could never appear in a declaration line are ignored.
    pub fn default_grammar(&self) -> &str {
        let configured = self
            .sections
            .as_ref()
            .and_then(|s| s.default_grammar.as_deref());
        match configured {
            Some(name) if is_grammar_name(name) => name,
            Some(name) => {
                log::warn!(
                    target: "seclsp::settings",
                    "ignoring invalid default grammar '{}'",
                    name
                );
                DEFAULT_GRAMMAR
            }
            None => DEFAULT_GRAMMAR,
        }
    }

    /// Build the section segmenter these settings describe.
    pub fn segmenter(&self) -> SectionSegmenter {
        SectionSegmenter::new(self.default_grammar())
    }
}

fn is_grammar_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Parse settings from TOML text.
pub fn parse_settings(content: &str) -> Result<Settings> {
    toml::from_str(content).map_err(|e| Error::Settings {
        message: e.to_string(),
    })
}

/// Load settings from a settings.toml file.
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(content) => match parse_settings(&content) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!(
                    target: "seclsp::settings",
                    "failed to parse {}: {}",
                    path.display(),
                    e
                );
                Settings::default()
            }
        },
        Err(_) => Settings::default(),
    }
}

/// Discover settings.toml by searching up the directory tree, then direct children.
///
/// Search order:
/// 1. Walk up from `start_dir` to filesystem root
/// 2. If not found, check immediate child directories of `start_dir`
///
/// Returns `(settings, settings_dir)` where `settings_dir` is the directory
/// containing the found settings.toml.
/// If not found, returns `(Settings::default(), start_dir)`.
pub fn discover_settings(start_dir: &Path) -> (Settings, PathBuf) {
    // Phase 1: Walk up from start_dir
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join("settings.toml");
        if candidate.is_file() {
            log::info!(target: "seclsp::settings", "using {}", candidate.display());
            return (load_settings(&candidate), dir.to_path_buf());
        }
        current = dir.parent();
    }

    // Phase 2: Check immediate child directories
    if let Ok(entries) = std::fs::read_dir(start_dir) {
        let mut dirs: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        // read_dir order is platform dependent
        dirs.sort();
        for dir in dirs {
            let candidate = dir.join("settings.toml");
            if candidate.is_file() {
                log::info!(target: "seclsp::settings", "using {}", candidate.display());
                return (load_settings(&candidate), dir);
            }
        }
    }

    (Settings::default(), start_dir.to_path_buf())
}
