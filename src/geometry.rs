use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Axis-aligned rectangle with its origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x: x1,
            y: y1,
            w: x2 - x1,
            h: y2 - y1,
        }
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.w
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.h
    }

    pub fn is_empty(&self) -> bool {
        !(self.w > 0.0 && self.h > 0.0)
    }

    /// Min edges are inside, max edges are not.
    pub fn contains(&self, point: Point) -> bool {
        !self.is_empty()
            && point.x >= self.x
            && point.y >= self.y
            && point.x < self.max_x()
            && point.y < self.max_y()
    }

    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x1 = self.x.min(other.x);
        let y1 = self.y.min(other.y);
        let x2 = self.max_x().max(other.max_x());
        let y2 = self.max_y().max(other.max_y());
        Rect::from_corners(x1, y1, x2, y2)
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.max_x().min(other.max_x());
        let y2 = self.max_y().min(other.max_y());
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Rect::from_corners(x1, y1, x2, y2))
    }
}

fn fit_scale(view: Size, image: Size) -> Option<f64> {
    if view.is_empty() || image.is_empty() {
        return None;
    }
    Some((view.width / image.width).min(view.height / image.height))
}

/// Where the aspect-fit image sits inside the view.
pub fn displayed_image_rect(view: Size, image: Size) -> Option<Rect> {
    let scale = fit_scale(view, image)?;
    let w = image.width * scale;
    let h = image.height * scale;
    Some(Rect::new(
        (view.width - w) / 2.0,
        (view.height - h) / 2.0,
        w,
        h,
    ))
}

/// Maps a tap in view space onto the source image's pixel grid.
///
/// Returns `None` when the point lands in the letterbox margin or when either
/// size is degenerate. The displayed image's edges count as inside.
pub fn view_to_image_pixel(point: Point, view: Size, image: Size) -> Option<Point> {
    let displayed = displayed_image_rect(view, image)?;
    let rel_x = point.x - displayed.x;
    let rel_y = point.y - displayed.y;
    if rel_x < 0.0 || rel_y < 0.0 || rel_x > displayed.w || rel_y > displayed.h {
        return None;
    }
    Some(Point::new(
        rel_x / displayed.w * image.width,
        rel_y / displayed.h * image.height,
    ))
}

pub fn image_pixel_to_view(point: Point, view: Size, image: Size) -> Option<Point> {
    let displayed = displayed_image_rect(view, image)?;
    Some(Point::new(
        displayed.x + point.x / image.width * displayed.w,
        displayed.y + point.y / image.height * displayed.h,
    ))
}

/// Projects a view-space rectangle into pixel space.
///
/// Both axes subtract `(view_axis * s - image_axis) / 2` after scaling by the
/// inverse fit scale `s`; on the axis that is not letterboxed that term is 0.
/// The result is not clamped to the image.
pub fn crop_region(view_rect: Rect, view: Size, image: Size) -> Option<Rect> {
    let scale = 1.0 / fit_scale(view, image)?;
    let offset_x = (view.width * scale - image.width) / 2.0;
    let offset_y = (view.height * scale - image.height) / 2.0;
    Some(Rect::new(
        view_rect.x * scale - offset_x,
        view_rect.y * scale - offset_y,
        view_rect.w * scale,
        view_rect.h * scale,
    ))
}
