// ============================================================================
// MASK RASTERIZATION: region set to binary mask image
// ============================================================================

use image::codecs::png::PngEncoder;
use image::{ColorType, GrayImage, ImageEncoder, ImageFormat, Luma};
use rayon::prelude::*;

use crate::canvas::Region;
use crate::io::{AssetError, ImageAsset, decode_data_uri, encode_data_uri};

/// Pixel value outside every region (black).
pub const MASK_BACKGROUND: u8 = 0;
/// Pixel value inside at least one region (white).
pub const MASK_SELECTED: u8 = 255;

/// Two-level mask, same size as the image it was drawn on.
///
/// Never edited in place: every region change produces a fresh mask via
/// [`rasterize`].
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    image: GrayImage,
}

impl Mask {
    /// All-background mask.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::from_pixel(width, height, Luma([MASK_BACKGROUND])),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_selected(&self, x: u32, y: u32) -> bool {
        self.image
            .get_pixel_checked(x, y)
            .is_some_and(|p| p.0[0] == MASK_SELECTED)
    }

    pub fn selected_pixels(&self) -> usize {
        self.image.as_raw().par_iter().filter(|&&v| v == MASK_SELECTED).count()
    }

    /// True when no pixel is selected. An empty mask means "no mask".
    pub fn is_empty(&self) -> bool {
        !self.image.as_raw().par_iter().any(|&v| v == MASK_SELECTED)
    }

    pub fn to_png(&self) -> Result<Vec<u8>, AssetError> {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(self.image.as_raw(), self.width(), self.height(), ColorType::L8)
            .map_err(|e| AssetError::Encode(e.to_string()))?;
        Ok(bytes)
    }

    /// PNG-encoded `data:image/png;base64,...` form used for transport.
    pub fn to_data_uri(&self) -> Result<String, AssetError> {
        Ok(encode_data_uri("image/png", &self.to_png()?))
    }

    /// Inverse of [`Mask::to_data_uri`]. Any non-zero pixel counts as selected.
    pub fn from_data_uri(uri: &str) -> Result<Self, AssetError> {
        let data = decode_data_uri(uri)?;
        let decoded = image::load_from_memory_with_format(&data.bytes, ImageFormat::Png)?;
        let mut image = decoded.to_luma8();
        for p in image.pixels_mut() {
            p.0[0] = if p.0[0] == MASK_BACKGROUND { MASK_BACKGROUND } else { MASK_SELECTED };
        }
        Ok(Self { image })
    }

    /// The mask as a transferable asset, or `None` when nothing is selected.
    pub fn to_asset(&self) -> Result<Option<ImageAsset>, AssetError> {
        if self.is_empty() {
            return Ok(None);
        }
        Ok(Some(ImageAsset::Inline(self.to_data_uri()?)))
    }
}

/// Renders the union of `regions` into a fresh `width × height` mask.
///
/// Each row is filled independently on the rayon pool; the output only
/// depends on the inputs, so re-rasterizing the same regions always gives
/// an identical mask.
pub fn rasterize(regions: &[Region], width: u32, height: u32) -> Mask {
    let mut mask = Mask::blank(width, height);
    if width == 0 || height == 0 {
        return mask;
    }

    let spans: Vec<(u32, u32, u32, u32)> = regions
        .iter()
        .filter_map(|r| r.pixel_bounds(width, height))
        .collect();
    if spans.is_empty() {
        return mask;
    }

    let row_len = width as usize;
    mask.image
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as u32;
            for &(x0, y0, x1, y1) in &spans {
                if y >= y0 && y < y1 {
                    row[x0 as usize..x1 as usize].fill(MASK_SELECTED);
                }
            }
        });
    mask
}
