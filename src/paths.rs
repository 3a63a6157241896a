use std::path::{Path, PathBuf};

const BASE_DIR_ENV: &str = "MOKURO_READER_DIR";
const DEFAULT_DIR_NAME: &str = ".mokuro-reader";

/// Directory holding `settings.toml` and the reader state file.
pub(crate) fn settings_dir() -> Option<PathBuf> {
    if let Some(dir) = base_dir_override() {
        return Some(dir);
    }
    default_base_dir()
}

pub(crate) fn state_file() -> PathBuf {
    state_file_in(settings_dir().as_deref())
}

fn state_file_in(base: Option<&Path>) -> PathBuf {
    match base {
        Some(dir) => dir.join("state.json"),
        None => Path::new(DEFAULT_DIR_NAME).join("state.json"),
    }
}

fn base_dir_override() -> Option<PathBuf> {
    std::env::var(BASE_DIR_ENV)
        .ok()
        .and_then(|value| normalize_dir(&value, home().as_deref()))
}

fn default_base_dir() -> Option<PathBuf> {
    home().map(|home| Path::new(&home).join(DEFAULT_DIR_NAME))
}

fn home() -> Option<String> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(home.to_string())
        }
    })
}

fn normalize_dir(value: &str, home: Option<&str>) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let expanded = expand_tilde(trimmed, home);
    let mut normalized = PathBuf::new();
    for component in Path::new(&expanded).components() {
        normalized.push(component.as_os_str());
    }
    Some(normalized)
}

fn expand_tilde(value: &str, home: Option<&str>) -> String {
    let Some(home) = home else {
        return value.to_string();
    };
    if value == "~" {
        return home.to_string();
    }
    match value.strip_prefix("~/") {
        Some(rest) => format!("{}/{}", home.trim_end_matches('/'), rest),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_home_prefix() {
        assert_eq!(
            normalize_dir("~/reader", Some("/home/neko")),
            Some(PathBuf::from("/home/neko/reader"))
        );
        assert_eq!(
            normalize_dir("~", Some("/home/neko")),
            Some(PathBuf::from("/home/neko"))
        );
        assert_eq!(
            normalize_dir("~/reader", None),
            Some(PathBuf::from("~/reader"))
        );
    }

    #[test]
    fn blank_override_is_ignored() {
        assert_eq!(normalize_dir("   ", Some("/home/neko")), None);
    }

    #[test]
    fn collapses_redundant_separators() {
        assert_eq!(
            normalize_dir("/tmp//mokuro/./state", None),
            Some(PathBuf::from("/tmp/mokuro/state"))
        );
    }

    #[test]
    fn state_file_lives_in_base_dir() {
        assert_eq!(
            state_file_in(Some(Path::new("/data/reader"))),
            PathBuf::from("/data/reader/state.json")
        );
        assert_eq!(
            state_file_in(None),
            PathBuf::from(".mokuro-reader/state.json")
        );
    }
}
