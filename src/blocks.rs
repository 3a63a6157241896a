use std::collections::HashMap;

use crate::geometry::{Point, Rect};
use crate::mokuro::{Block, Page};

/// Bounding boxes of a page's blocks, for hit-testing taps in pixel space.
///
/// Lookup is a linear scan in map order. Mokuro blocks on one page do not
/// overlap in practice; if they ever do, which block wins is unspecified.
#[derive(Debug, Clone, Default)]
pub struct BlockIndex<'a> {
    rects: HashMap<&'a Block, Rect>,
}

impl<'a> BlockIndex<'a> {
    pub fn build(page: &'a Page) -> Self {
        let rects = page
            .blocks
            .iter()
            .filter_map(|block| {
                let rect = block.bounding_box()?;
                (!rect.is_empty()).then_some((block, rect))
            })
            .collect();
        Self { rects }
    }

    pub fn block_containing(&self, point: Point) -> Option<&'a Block> {
        self.rects
            .iter()
            .find(|(_, rect)| rect.contains(point))
            .map(|(block, _)| *block)
    }

    pub fn rect(&self, block: &Block) -> Option<Rect> {
        self.rects.get(block).copied()
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }
}
