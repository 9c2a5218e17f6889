// ============================================================================
// REGION OVERLAY: the editor's render pass over the base image
// ============================================================================

use image::{Rgba, RgbaImage};

use crate::canvas::{Region, RegionModel};

/// Outline colour of the selected region.
pub const SELECTED_STROKE: Rgba<u8> = Rgba([0, 255, 0, 255]);
/// Outline colour of every other region and of the live preview.
pub const REGION_STROKE: Rgba<u8> = Rgba([255, 255, 255, 255]);
/// Translucent white wash over each region's interior.
const FILL_ALPHA: f32 = 0.2;
const STROKE_WIDTH: u32 = 2;

/// Draws every stored region (in z-order) plus the in-progress preview on a
/// copy of `base`.
pub fn render_overlay(base: &RgbaImage, model: &RegionModel, preview: Option<Region>) -> RgbaImage {
    let mut out = base.clone();
    let (w, h) = out.dimensions();
    let selected = model.selected();

    let stored = model.iter().enumerate().map(|(i, r)| {
        let stroke = if Some(i) == selected { SELECTED_STROKE } else { REGION_STROKE };
        (*r, stroke)
    });
    for (region, stroke) in stored.chain(preview.map(|r| (r, REGION_STROKE))) {
        let Some((x0, y0, x1, y1)) = region.pixel_bounds(w, h) else {
            continue;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let on_edge = x < x0 + STROKE_WIDTH
                    || x + STROKE_WIDTH >= x1
                    || y < y0 + STROKE_WIDTH
                    || y + STROKE_WIDTH >= y1;
                let px = out.get_pixel_mut(x, y);
                if on_edge {
                    *px = stroke;
                } else {
                    *px = wash(*px);
                }
            }
        }
    }
    out
}

fn wash(p: Rgba<u8>) -> Rgba<u8> {
    let mix = |c: u8| -> u8 { (c as f32 + (255.0 - c as f32) * FILL_ALPHA).round() as u8 };
    Rgba([mix(p.0[0]), mix(p.0[1]), mix(p.0[2]), p.0[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected_region_uses_selected_stroke() {
        let base = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        let mut model = RegionModel::new();
        model.add(Region::new(0.0, 0.0, 10.0, 10.0));
        model.add(Region::new(12.0, 12.0, 6.0, 6.0));
        model.select(Some(1));

        let out = render_overlay(&base, &model, None);
        assert_eq!(*out.get_pixel(0, 0), REGION_STROKE);
        assert_eq!(*out.get_pixel(12, 12), SELECTED_STROKE);
        // Interior is washed, untouched pixels stay black
        assert_eq!(*out.get_pixel(5, 5), Rgba([51, 51, 51, 255]));
        assert_eq!(*out.get_pixel(19, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_preview_is_drawn_but_base_untouched() {
        let base = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let out = render_overlay(&base, &RegionModel::new(), Some(Region::new(2.0, 2.0, 6.0, 6.0)));
        assert_eq!(*out.get_pixel(2, 2), REGION_STROKE);
        assert_eq!(*base.get_pixel(2, 2), Rgba([0, 0, 0, 255]));
    }
}
