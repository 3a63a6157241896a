use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tracing::warn;

pub mod blocks;
pub mod geometry;
pub mod japanese;
pub mod live_text;
pub mod logging;
pub mod mokuro;
mod paths;
pub mod reader;
pub mod settings;
pub mod store;
#[cfg(test)]
mod test_util;
mod util;

pub use geometry::{Point, Rect, Size};
pub use mokuro::{Block, Document, Page, ParseError, Volume};
pub use reader::{ReaderEvent, ReaderState, TapResult};
pub use settings::{ReaderMode, Settings};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub folder: Option<String>,
    pub list_pages: bool,
    pub page: Option<String>,
    pub next: bool,
    pub prev: bool,
    pub tap: Option<String>,
    pub view: Option<String>,
    pub settings_path: Option<String>,
    pub base_dir: Option<PathBuf>,
}

pub async fn run(config: Config) -> Result<String> {
    let base_dir = config.base_dir.clone().or_else(paths::settings_dir);
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings_in(base_dir.as_deref(), settings_path)?;
    let state_file = match base_dir.as_deref() {
        Some(dir) => dir.join("state.json"),
        None => paths::state_file(),
    };
    let store = store::JsonFileStore::open(state_file)?;

    let folder = config
        .folder
        .as_deref()
        .map(str::trim)
        .filter(|folder| !folder.is_empty())
        .ok_or_else(|| anyhow!("no volume folder given (use --folder)"))?;

    let mut reader = ReaderState::new(settings, Box::new(store));
    reader.open(PathBuf::from(folder)).await?;

    if let Some(name) = config.page.as_deref()
        && !reader.go_to_page(name)?
    {
        return Err(anyhow!("no page matches {}", name));
    }
    if config.next && !reader.next()? {
        warn!("already at the last page");
    }
    if config.prev && !reader.previous()? {
        warn!("already at the first page");
    }

    if config.list_pages {
        return Ok(format_page_list(&reader));
    }

    let mut output = format_current_page(&reader);
    if let Some(tap) = config.tap.as_deref() {
        let point = parse_point(tap)?;
        if let Some(view) = config.view.as_deref() {
            reader.set_view_size(parse_size(view)?);
        }
        output.push('\n');
        match reader.tap(point) {
            TapResult::Block(Some(text)) => output.push_str(&japanese::inspector_text(&text)),
            TapResult::Block(None) => {
                output.push_str(&format!("no text at {},{}", point.x, point.y))
            }
            TapResult::Live(outcome) => output.push_str(&format!("live text: {:?}", outcome)),
        }
    }
    Ok(output)
}

fn format_page_list(reader: &ReaderState) -> String {
    let Some(document) = reader.document() else {
        return String::new();
    };
    let current = reader.current_index();
    let mut lines = vec![format!("{} / {}", document.title, document.volume)];
    for (idx, page) in reader.pages_ordered().iter().enumerate() {
        let marker = if Some(idx) == current { "*" } else { " " };
        lines.push(format!(
            "{} {} ({} blocks)",
            marker,
            page.img_path,
            page.blocks.len()
        ));
    }
    lines.join("\n")
}

fn format_current_page(reader: &ReaderState) -> String {
    let total = reader.pages_ordered().len();
    let (Some(index), Some(page)) = (reader.current_index(), reader.current_page()) else {
        return "no page".to_string();
    };
    let file = reader
        .current_file()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "(missing file)".to_string());
    format!("page {}/{}: {} -> {}", index + 1, total, page.img_path, file)
}

fn parse_point(value: &str) -> Result<Point> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| anyhow!("tap must look like X,Y: {}", value))?;
    let x = x
        .trim()
        .parse()
        .with_context(|| format!("invalid tap x: {}", x))?;
    let y = y
        .trim()
        .parse()
        .with_context(|| format!("invalid tap y: {}", y))?;
    Ok(Point::new(x, y))
}

fn parse_size(value: &str) -> Result<Size> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("view must look like WxH: {}", value))?;
    let width: f64 = width
        .trim()
        .parse()
        .with_context(|| format!("invalid view width: {}", width))?;
    let height: f64 = height
        .trim()
        .parse()
        .with_context(|| format!("invalid view height: {}", height))?;
    let size = Size::new(width, height);
    if size.is_empty() {
        return Err(anyhow!("view must have a positive size: {}", value));
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tap_and_view() {
        assert_eq!(parse_point("12.5, 40").unwrap(), Point::new(12.5, 40.0));
        assert_eq!(parse_size("500x750").unwrap(), Size::new(500.0, 750.0));
        assert_eq!(parse_size("500X750").unwrap(), Size::new(500.0, 750.0));
    }

    #[test]
    fn rejects_malformed_tap_and_view() {
        assert!(parse_point("12").is_err());
        assert!(parse_point("a,b").is_err());
        assert!(parse_size("500").is_err());
        assert!(parse_size("0x750").is_err());
    }
}
