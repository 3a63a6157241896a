use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::japanese::{ColorRole, DEFAULT_LOOKUP_LIMIT};
use crate::paths;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaderMode {
    #[default]
    Blocks,
    Live,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub noun: String,
    pub verb: String,
    pub particle: String,
    pub adverb: String,
    pub adjective: String,
    pub prefix: String,
    pub regular: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            noun: "#2f6fde".to_string(),
            verb: "#d2452b".to_string(),
            particle: "#8a8a8a".to_string(),
            adverb: "#2a9d63".to_string(),
            adjective: "#c98a00".to_string(),
            prefix: "#8e44ad".to_string(),
            regular: "#1f1f1f".to_string(),
        }
    }
}

impl Palette {
    pub fn color(&self, role: ColorRole) -> &str {
        match role {
            ColorRole::Noun => &self.noun,
            ColorRole::Verb => &self.verb,
            ColorRole::Particle => &self.particle,
            ColorRole::Adverb => &self.adverb,
            ColorRole::Adjective => &self.adjective,
            ColorRole::Prefix => &self.prefix,
            ColorRole::Regular => &self.regular,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: ReaderMode,
    pub view_width: f64,
    pub view_height: f64,
    pub dictionary_limit: usize,
    pub palette: Palette,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: ReaderMode::Blocks,
            view_width: 1170.0,
            view_height: 2532.0,
            dictionary_limit: DEFAULT_LOOKUP_LIMIT,
            palette: Palette::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    reader: Option<ReaderSettings>,
    colors: Option<ColorSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ReaderSettings {
    mode: Option<ReaderMode>,
    view_width: Option<f64>,
    view_height: Option<f64>,
    dictionary_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ColorSettings {
    noun: Option<String>,
    verb: Option<String>,
    particle: Option<String>,
    adverb: Option<String>,
    adjective: Option<String>,
    prefix: Option<String>,
    regular: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    load_settings_in(paths::settings_dir().as_deref(), extra_path)
}

/// Layers `settings.toml` and `settings.local.toml` from the working
/// directory, then from `base_dir`, then `extra_path`. Later files win.
pub fn load_settings_in(base_dir: Option<&Path>, extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    if let Some(base) = base_dir {
        ensure_settings_file(base)?;
    }

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(base) = base_dir {
        ordered_paths.push(base.join("settings.toml"));
        ordered_paths.push(base.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(reader) = incoming.reader {
            if let Some(mode) = reader.mode {
                self.mode = mode;
            }
            if let Some(width) = reader.view_width
                && width > 0.0
            {
                self.view_width = width;
            }
            if let Some(height) = reader.view_height
                && height > 0.0
            {
                self.view_height = height;
            }
            if let Some(limit) = reader.dictionary_limit
                && limit > 0
            {
                self.dictionary_limit = limit;
            }
        }
        if let Some(colors) = incoming.colors {
            let palette = &mut self.palette;
            for (slot, value) in [
                (&mut palette.noun, colors.noun),
                (&mut palette.verb, colors.verb),
                (&mut palette.particle, colors.particle),
                (&mut palette.adverb, colors.adverb),
                (&mut palette.adjective, colors.adjective),
                (&mut palette.prefix, colors.prefix),
                (&mut palette.regular, colors.regular),
            ] {
                if let Some(color) = value
                    && !color.trim().is_empty()
                {
                    *slot = color;
                }
            }
        }
    }
}

fn ensure_settings_file(base: &Path) -> Result<()> {
    fs::create_dir_all(base)
        .with_context(|| format!("failed to create settings directory: {}", base.display()))?;
    let path = base.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}
