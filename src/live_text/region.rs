use std::collections::VecDeque;

use crate::geometry::{Point, Rect, Size, view_to_image_pixel};

/// Per-cell "this pixel belongs to text" answer from a text analysis.
pub trait TextMask: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn has_text(&self, x: u32, y: u32) -> bool;
}

/// Row-major boolean grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMask {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl BitMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width as usize * height as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                mask.set(x, y, f(x, y));
            }
        }
        mask
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x < self.width && y < self.height {
            let idx = y as usize * self.width as usize + x as usize;
            self.cells[idx] = value;
        }
    }
}

impl TextMask for BitMask {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn has_text(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.cells[y as usize * self.width as usize + x as usize]
    }
}

/// Reads an image-space mask through view coordinates, so regions can be
/// grown over what the user actually sees. Letterbox cells never have text.
pub(crate) struct ProjectedMask<'a> {
    inner: &'a dyn TextMask,
    view: Size,
    image: Size,
}

impl<'a> ProjectedMask<'a> {
    pub(crate) fn new(inner: &'a dyn TextMask, view: Size, image: Size) -> Self {
        Self { inner, view, image }
    }
}

impl TextMask for ProjectedMask<'_> {
    fn width(&self) -> u32 {
        self.view.width.max(0.0).ceil() as u32
    }

    fn height(&self) -> u32 {
        self.view.height.max(0.0).ceil() as u32
    }

    fn has_text(&self, x: u32, y: u32) -> bool {
        let point = Point::new(x as f64, y as f64);
        let Some(pixel) = view_to_image_pixel(point, self.view, self.image) else {
            return false;
        };
        let mx = (pixel.x * self.inner.width() as f64 / self.image.width).floor();
        let my = (pixel.y * self.inner.height() as f64 / self.image.height).floor();
        if mx < 0.0 || my < 0.0 {
            return false;
        }
        let (mx, my) = (mx as u32, my as u32);
        if mx >= self.inner.width() || my >= self.inner.height() {
            return false;
        }
        self.inner.has_text(mx, my)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    /// Inclusive cell bounds: a single cell is a 1x1 rectangle.
    pub bounds: Rect,
    pub cells: usize,
    pub visited: usize,
    pub pops: usize,
}

/// Grows the 4-connected set of text cells reachable from `start`.
///
/// Returns `None` when the seed is outside the mask or is not text itself.
pub fn grow_region(mask: &dyn TextMask, start: Point) -> Option<Region> {
    let width = mask.width();
    let height = mask.height();
    if start.x < 0.0 || start.y < 0.0 {
        return None;
    }
    let sx = start.x.floor() as u64;
    let sy = start.y.floor() as u64;
    if sx >= width as u64 || sy >= height as u64 {
        return None;
    }
    let (sx, sy) = (sx as u32, sy as u32);
    if !mask.has_text(sx, sy) {
        return None;
    }

    let stride = width as usize;
    let mut visited = vec![false; stride * height as usize];
    let mut queue = VecDeque::new();
    visited[sy as usize * stride + sx as usize] = true;
    queue.push_back((sx, sy));
    let mut visited_count = 1usize;
    let mut pops = 0usize;
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (sx, sx, sy, sy);

    while let Some((x, y)) = queue.pop_front() {
        pops += 1;
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);

        let neighbours = [
            (Some(x), y.checked_add(1)),
            (x.checked_add(1), Some(y)),
            (Some(x), y.checked_sub(1)),
            (x.checked_sub(1), Some(y)),
        ];
        for (nx, ny) in neighbours {
            let (Some(nx), Some(ny)) = (nx, ny) else {
                continue;
            };
            if nx >= width || ny >= height {
                continue;
            }
            let idx = ny as usize * stride + nx as usize;
            if visited[idx] || !mask.has_text(nx, ny) {
                continue;
            }
            visited[idx] = true;
            visited_count += 1;
            queue.push_back((nx, ny));
        }
    }

    Some(Region {
        bounds: Rect::new(
            min_x as f64,
            min_y as f64,
            (max_x - min_x + 1) as f64,
            (max_y - min_y + 1) as f64,
        ),
        cells: pops,
        visited: visited_count,
        pops,
    })
}

pub fn region_at(mask: &dyn TextMask, start: Point) -> Option<Rect> {
    grow_region(mask, start).map(|region| region.bounds)
}
