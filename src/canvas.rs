use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// COORDINATE MAPPING
// ============================================================================

/// A position in native image-pixel coordinates (sub-pixel precision).
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct ImagePoint {
    pub x: f32,
    pub y: f32,
}

impl ImagePoint {
    pub const ZERO: ImagePoint = ImagePoint { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// On-screen bounding rectangle of the element displaying the image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    fn is_usable(&self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.left.is_finite()
            && self.top.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }
}

/// Converts a pointer position in display coordinates to native image pixels.
///
/// Each axis is scaled independently by `native / rendered`, so a stretched
/// display maps correctly. The rectangle must be re-read for every pointer
/// event since the element can be resized between events. When the element
/// is not mounted (`None`) or has collapsed to zero size the result is the
/// origin.
pub fn screen_to_image(
    pointer_x: f32,
    pointer_y: f32,
    rect: Option<DisplayRect>,
    native_width: u32,
    native_height: u32,
) -> ImagePoint {
    let Some(rect) = rect.filter(DisplayRect::is_usable) else {
        return ImagePoint::ZERO;
    };
    let scale_x = native_width as f32 / rect.width;
    let scale_y = native_height as f32 / rect.height;
    ImagePoint {
        x: (pointer_x - rect.left) * scale_x,
        y: (pointer_y - rect.top) * scale_y,
    }
}

// ============================================================================
// REGIONS
// ============================================================================

/// Axis-aligned rectangle in image-pixel coordinates.
///
/// Always stored normalized: `(x, y)` is the top-left corner and both
/// dimensions are non-negative.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    /// Builds a region, flipping negative extents so the origin is top-left.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }.normalized()
    }

    /// Region spanned by two opposite corners, in any drag direction.
    pub fn from_corners(a: ImagePoint, b: ImagePoint) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn normalized(self) -> Self {
        let (x, width) = if self.width < 0.0 {
            (self.x + self.width, -self.width)
        } else {
            (self.x, self.width)
        };
        let (y, height) = if self.height < 0.0 {
            (self.y + self.height, -self.height)
        } else {
            (self.y, self.height)
        };
        Self { x, y, width, height }
    }

    pub fn origin(&self) -> ImagePoint {
        ImagePoint::new(self.x, self.y)
    }

    /// Same size, new top-left corner.
    pub fn moved_to(&self, origin: ImagePoint) -> Self {
        Self { x: origin.x, y: origin.y, ..*self }
    }

    /// Closed-bounds containment (edges count as inside).
    pub fn contains(&self, p: ImagePoint) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    /// Pixel span `[x0, x1) × [y0, y1)` covered by this region, clamped to a
    /// `canvas_w × canvas_h` image. `None` when nothing of it is on the canvas.
    pub fn pixel_bounds(&self, canvas_w: u32, canvas_h: u32) -> Option<(u32, u32, u32, u32)> {
        let clamp = |v: f32, max: u32| -> u32 {
            if v.is_nan() || v <= 0.0 {
                0
            } else {
                (v as u32).min(max)
            }
        };
        let x0 = clamp(self.x.floor(), canvas_w);
        let y0 = clamp(self.y.floor(), canvas_h);
        let x1 = clamp((self.x + self.width).ceil(), canvas_w);
        let y1 = clamp((self.y + self.height).ceil(), canvas_h);
        if x1 > x0 && y1 > y0 {
            Some((x0, y0, x1, y1))
        } else {
            None
        }
    }
}

/// Parses `"x,y,width,height"`; negative sizes are normalized.
impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(format!("expected x,y,width,height but got '{}'", s));
        }
        let mut values = [0.0_f32; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse::<f32>()
                .map_err(|e| format!("invalid number '{}': {}", part, e))?;
            if !slot.is_finite() {
                return Err(format!("invalid number '{}'", part));
            }
        }
        Ok(Region::new(values[0], values[1], values[2], values[3]))
    }
}

// ============================================================================
// REGION MODEL
// ============================================================================

/// The set of regions drawn on one image, plus the single selection pointer.
///
/// Insertion order is z-order: later regions sit on top for hit-testing and
/// rendering. Pure data; rendering and mask state live elsewhere.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionModel {
    regions: Vec<Region>,
    selected: Option<usize>,
}

impl RegionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Region> {
        self.regions.get(index)
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_region(&self) -> Option<&Region> {
        self.selected.and_then(|i| self.regions.get(i))
    }

    /// Selects a region; an out-of-range index clears the selection.
    pub fn select(&mut self, index: Option<usize>) {
        self.selected = index.filter(|&i| i < self.regions.len());
    }

    /// Topmost region containing `point` (highest index wins).
    pub fn hit_test(&self, point: ImagePoint) -> Option<usize> {
        self.regions.iter().rposition(|r| r.contains(point))
    }

    /// Appends a region on top of the stack and returns its index.
    pub fn add(&mut self, region: Region) -> usize {
        self.regions.push(region.normalized());
        self.regions.len() - 1
    }

    /// Replaces a region in place without changing its z-order.
    pub fn update_at(&mut self, index: usize, region: Region) -> bool {
        match self.regions.get_mut(index) {
            Some(slot) => {
                *slot = region.normalized();
                true
            }
            None => false,
        }
    }

    /// Removes a region. A selection of that region is dropped; a selection
    /// of a later region follows it down one slot.
    pub fn remove_at(&mut self, index: usize) -> Option<Region> {
        if index >= self.regions.len() {
            return None;
        }
        let removed = self.regions.remove(index);
        self.selected = match self.selected {
            Some(sel) if sel == index => None,
            Some(sel) if sel > index => Some(sel - 1),
            other => other,
        };
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.regions.clear();
        self.selected = None;
    }
}
