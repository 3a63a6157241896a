mod folder;

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::Path;
use thiserror::Error;

use crate::geometry::{Rect, Size};

pub use folder::{Volume, collect_volume_files, resolve_image_file};

pub const SIDECAR_EXTENSION: &str = "mokuro";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed mokuro document: {0}")]
    MalformedDocument(#[source] serde_json::Error),
    #[error("pages field is not an array, an object of pages, or a single page")]
    MalformedPages,
    #[error("no .mokuro file found under {0}")]
    NoSidecarFound(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Document {
    pub version: String,
    pub title: String,
    pub title_uuid: String,
    pub volume: String,
    pub volume_uuid: String,
    pub pages: Vec<Page>,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.title_uuid == other.title_uuid && self.volume_uuid == other.volume_uuid
    }
}

impl Eq for Document {}

#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub version: String,
    pub img_width: u32,
    pub img_height: u32,
    pub blocks: Vec<Block>,
    pub img_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    #[serde(rename = "box")]
    pub bbox: Vec<f64>,
    pub vertical: bool,
    pub font_size: f64,
    pub lines_coords: Vec<Vec<Vec<f64>>>,
    pub lines: Vec<String>,
}

#[derive(Deserialize)]
struct RawDocument {
    version: String,
    title: String,
    title_uuid: String,
    volume: String,
    volume_uuid: String,
    pages: Value,
}

impl Document {
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let raw: RawDocument =
            serde_json::from_slice(bytes).map_err(ParseError::MalformedDocument)?;
        let pages = parse_pages(raw.pages)?;
        Ok(Self {
            version: raw.version,
            title: raw.title,
            title_uuid: raw.title_uuid,
            volume: raw.volume,
            volume_uuid: raw.volume_uuid,
            pages,
        })
    }

    pub fn load(folder: &Path) -> Result<Self, ParseError> {
        Volume::load(folder).map(|volume| volume.document)
    }

    /// Stable across reloads of the same volume; keys the resume marker.
    pub fn id(&self) -> String {
        format!("{}{}", self.volume_uuid, self.title_uuid)
    }

    /// Pages in display order. Sorted on every call.
    pub fn pages_ordered(&self) -> Vec<&Page> {
        let mut pages: Vec<&Page> = self.pages.iter().collect();
        pages.sort_by(|a, b| a.img_path.as_bytes().cmp(b.img_path.as_bytes()));
        pages
    }

    /// The page whose image path is `img_path`, or else the first page in
    /// stored order whose path contains it.
    pub fn page(&self, img_path: &str) -> Option<&Page> {
        self.pages
            .iter()
            .find(|page| page.img_path == img_path)
            .or_else(|| self.pages.iter().find(|page| page.img_path.contains(img_path)))
    }

    pub fn page_index(&self, img_path: &str) -> Option<usize> {
        locate(&self.pages_ordered(), img_path)
    }

    pub fn next_page(&self, img_path: &str) -> Option<&Page> {
        let ordered = self.pages_ordered();
        let index = locate(&ordered, img_path)?;
        ordered.get(index + 1).copied()
    }

    pub fn previous_page(&self, img_path: &str) -> Option<&Page> {
        let ordered = self.pages_ordered();
        let index = locate(&ordered, img_path)?;
        index.checked_sub(1).map(|prev| ordered[prev])
    }
}

/// Exact path match first; containment only when no path is equal.
fn locate(pages: &[&Page], img_path: &str) -> Option<usize> {
    pages
        .iter()
        .position(|page| page.img_path == img_path)
        .or_else(|| pages.iter().position(|page| page.img_path.contains(img_path)))
}

fn parse_pages(value: Value) -> Result<Vec<Page>, ParseError> {
    if let Ok(pages) = Vec::<Page>::deserialize(&value) {
        return Ok(pages);
    }
    if let Ok(pages) = BTreeMap::<String, Page>::deserialize(&value) {
        return Ok(pages.into_values().collect());
    }
    if let Ok(page) = Page::deserialize(&value) {
        return Ok(vec![page]);
    }
    Err(ParseError::MalformedPages)
}

impl Page {
    pub fn image_size(&self) -> Size {
        Size::new(self.img_width as f64, self.img_height as f64)
    }
}

impl Block {
    /// The stored box as rectangles; empty unless the box has exactly 4 numbers.
    pub fn boxes(&self) -> Vec<Rect> {
        match self.bbox.as_slice() {
            [x1, y1, x2, y2] => vec![Rect::from_corners(*x1, *y1, *x2, *y2)],
            _ => Vec::new(),
        }
    }

    pub fn bounding_box(&self) -> Option<Rect> {
        self.boxes().into_iter().reduce(|acc, rect| acc.union(&rect))
    }

    /// Manga lines carry no word spacing, so no separator is inserted.
    pub fn joined_lines(&self) -> String {
        self.lines.concat()
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.vertical == other.vertical
            && self.font_size.to_bits() == other.font_size.to_bits()
            && float_bits(&self.bbox).eq(float_bits(&other.bbox))
            && self.lines_coords.len() == other.lines_coords.len()
            && self
                .lines_coords
                .iter()
                .zip(&other.lines_coords)
                .all(|(a, b)| {
                    a.len() == b.len()
                        && a.iter().zip(b).all(|(p, q)| float_bits(p).eq(float_bits(q)))
                })
            && self.lines == other.lines
    }
}

impl Eq for Block {}

impl Hash for Block {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bbox.len().hash(state);
        float_bits(&self.bbox).for_each(|bits| bits.hash(state));
        self.vertical.hash(state);
        self.font_size.to_bits().hash(state);
        self.lines_coords.len().hash(state);
        for line in &self.lines_coords {
            line.len().hash(state);
            for point in line {
                point.len().hash(state);
                float_bits(point).for_each(|bits| bits.hash(state));
            }
        }
        self.lines.hash(state);
    }
}

fn float_bits(values: &[f64]) -> impl Iterator<Item = u64> + '_ {
    values.iter().map(|value| value.to_bits())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page_json(img_path: &str) -> Value {
        json!({
            "version": "0.2.1",
            "img_width": 1654,
            "img_height": 2339,
            "img_path": img_path,
            "blocks": [{
                "box": [10, 20, 110, 220],
                "vertical": true,
                "font_size": 32.0,
                "lines_coords": [[[10.0, 20.0], [110.0, 20.0], [110.0, 220.0], [10.0, 220.0]]],
                "lines": ["猫が", "好き"]
            }]
        })
    }

    fn document_json(pages: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "version": "0.2.1",
            "title": "Neko",
            "title_uuid": "title-1",
            "volume": "Neko 01",
            "volume_uuid": "volume-1",
            "pages": pages
        }))
        .unwrap()
    }

    #[test]
    fn pages_as_array() {
        let bytes = document_json(json!([page_json("a.jpg"), page_json("b.jpg"), page_json("c.jpg")]));
        let document = Document::parse(&bytes).unwrap();
        assert_eq!(document.pages.len(), 3);
        assert_eq!(document.title, "Neko");
        assert_eq!(document.id(), "volume-1title-1");
    }

    #[test]
    fn pages_as_object_sort_by_path() {
        let bytes = document_json(json!({
            "0": page_json("003.jpg"),
            "1": page_json("001.jpg")
        }));
        let document = Document::parse(&bytes).unwrap();
        assert_eq!(document.pages.len(), 2);
        let ordered: Vec<&str> = document
            .pages_ordered()
            .iter()
            .map(|page| page.img_path.as_str())
            .collect();
        assert_eq!(ordered, vec!["001.jpg", "003.jpg"]);
    }

    #[test]
    fn pages_as_single_object() {
        let bytes = document_json(page_json("only.jpg"));
        let document = Document::parse(&bytes).unwrap();
        assert_eq!(document.pages.len(), 1);
        assert_eq!(document.pages[0].img_path, "only.jpg");
    }

    #[test]
    fn pages_with_other_shapes_fail() {
        for pages in [json!("nope"), json!(12), json!([1, 2]), json!({"a": {"version": 1}})] {
            let err = Document::parse(&document_json(pages)).unwrap_err();
            assert!(matches!(err, ParseError::MalformedPages), "{err}");
        }
    }

    #[test]
    fn missing_top_level_field_fails() {
        let bytes = serde_json::to_vec(&json!({
            "version": "0.2.1",
            "title": "Neko",
            "pages": []
        }))
        .unwrap();
        let err = Document::parse(&bytes).unwrap_err();
        assert!(matches!(err, ParseError::MalformedDocument(_)));

        let err = Document::parse(b"not json").unwrap_err();
        assert!(matches!(err, ParseError::MalformedDocument(_)));
    }

    #[test]
    fn equality_uses_identifiers_only() {
        let a = Document::parse(&document_json(json!([page_json("a.jpg")]))).unwrap();
        let mut b = Document::parse(&document_json(json!([]))).unwrap();
        assert_eq!(a, b);
        b.volume_uuid = "volume-2".to_string();
        assert_ne!(a, b);
    }

    #[test]
    fn ordering_is_bytewise_and_idempotent() {
        let bytes = document_json(json!([
            page_json("b/010.jpg"),
            page_json("B/002.jpg"),
            page_json("a/001.jpg"),
            page_json("b/002.jpg")
        ]));
        let document = Document::parse(&bytes).unwrap();
        let ordered: Vec<String> = document
            .pages_ordered()
            .iter()
            .map(|page| page.img_path.clone())
            .collect();
        assert_eq!(ordered, vec!["B/002.jpg", "a/001.jpg", "b/002.jpg", "b/010.jpg"]);

        let resorted = Document {
            pages: document.pages_ordered().into_iter().cloned().collect(),
            ..document.clone()
        };
        let again: Vec<String> = resorted
            .pages_ordered()
            .iter()
            .map(|page| page.img_path.clone())
            .collect();
        assert_eq!(ordered, again);
    }

    #[test]
    fn navigation_is_adjacent_without_wraparound() {
        let bytes = document_json(json!([
            page_json("vol/003.jpg"),
            page_json("vol/001.jpg"),
            page_json("vol/002.jpg")
        ]));
        let document = Document::parse(&bytes).unwrap();

        assert!(document.previous_page("001.jpg").is_none());
        assert!(document.next_page("003.jpg").is_none());
        assert!(document.next_page("missing.jpg").is_none());

        let next = document.next_page("001.jpg").unwrap();
        assert_eq!(next.img_path, "vol/002.jpg");
        let back = document.previous_page(&next.img_path).unwrap();
        assert_eq!(back.img_path, "vol/001.jpg");

        let next = document.next_page("002.jpg").unwrap();
        assert_eq!(next.img_path, "vol/003.jpg");
        assert_eq!(document.page_index("003.jpg"), Some(2));
    }

    #[test]
    fn unpadded_names_prefer_exact_matches() {
        let names: Vec<String> = (1..=14).map(|n| format!("{}.jpg", n)).collect();
        let pages: Vec<Value> = names.iter().map(|name| page_json(name)).collect();
        let document = Document::parse(&document_json(Value::Array(pages))).unwrap();

        // Bytewise order: 1, 10, 11, 12, 13, 14, 2, 3, ...
        assert_eq!(document.page("2.jpg").unwrap().img_path, "2.jpg");
        assert_eq!(document.page_index("2.jpg"), Some(6));
        assert_eq!(document.next_page("12.jpg").unwrap().img_path, "13.jpg");
        assert_eq!(document.next_page("2.jpg").unwrap().img_path, "3.jpg");
        assert_eq!(document.previous_page("2.jpg").unwrap().img_path, "14.jpg");
        assert_eq!(document.previous_page("3.jpg").unwrap().img_path, "2.jpg");
        assert!(document.next_page("9.jpg").is_none());

        let ordered = document.pages_ordered();
        for pair in ordered.windows(2) {
            let next = document.next_page(&pair[0].img_path).unwrap();
            assert_eq!(next.img_path, pair[1].img_path);
            let back = document.previous_page(&next.img_path).unwrap();
            assert_eq!(back.img_path, pair[0].img_path);
        }
    }

    #[test]
    fn page_lookup_matches_substrings() {
        let bytes = document_json(json!([page_json("Neko%2001/004.jpg")]));
        let document = Document::parse(&bytes).unwrap();
        assert!(document.page("004.jpg").is_some());
        assert!(document.page("005.jpg").is_none());
    }

    #[test]
    fn block_geometry_and_text() {
        let bytes = document_json(json!([page_json("001.jpg")]));
        let document = Document::parse(&bytes).unwrap();
        let block = &document.pages[0].blocks[0];
        assert_eq!(block.bounding_box(), Some(Rect::new(10.0, 20.0, 100.0, 200.0)));
        assert_eq!(block.joined_lines(), "猫が好き");

        let mut broken = block.clone();
        broken.bbox = vec![1.0, 2.0, 3.0];
        assert!(broken.boxes().is_empty());
        assert!(broken.bounding_box().is_none());
    }

    #[test]
    fn blocks_hash_structurally() {
        use std::collections::HashSet;

        let bytes = document_json(json!([page_json("001.jpg"), page_json("002.jpg")]));
        let document = Document::parse(&bytes).unwrap();
        let a = &document.pages[0].blocks[0];
        let b = &document.pages[1].blocks[0];
        assert_eq!(a, b);

        let mut shifted = b.clone();
        shifted.bbox[0] = 11.0;
        let set: HashSet<&Block> = [a, b, &shifted].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
