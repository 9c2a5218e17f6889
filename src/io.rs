use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;
use serde::{Deserialize, Serialize};

// ============================================================================
// IMAGE ASSETS
// ============================================================================

/// An image as the editor holds it: either embedded inline as a data URI, or
/// already hosted somewhere and addressable by URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ImageAsset {
    /// `data:image/...;base64,...`; transient, not network addressable.
    Inline(String),
    /// A stable reference returned by an asset host or a pipeline.
    Hosted(String),
}

impl ImageAsset {
    /// Classifies a raw reference string the way the editor receives them.
    pub fn from_reference(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        if reference.starts_with("data:") {
            ImageAsset::Inline(reference)
        } else {
            ImageAsset::Hosted(reference)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ImageAsset::Inline(s) | ImageAsset::Hosted(s) => s,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, ImageAsset::Inline(_))
    }

    pub fn hosted_url(&self) -> Option<&str> {
        match self {
            ImageAsset::Hosted(url) => Some(url),
            ImageAsset::Inline(_) => None,
        }
    }

    /// Short human-readable form; inline payloads are not printed in full.
    pub fn summary(&self) -> String {
        summarize_reference(self.as_str())
    }
}

/// Error type for asset encoding, decoding and file access.
#[derive(Debug)]
pub enum AssetError {
    Io(std::io::Error),
    InvalidDataUri(String),
    Decode(String),
    Encode(String),
}

impl std::fmt::Display for AssetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetError::Io(e) => write!(f, "I/O error: {}", e),
            AssetError::InvalidDataUri(e) => write!(f, "Invalid data URI: {}", e),
            AssetError::Decode(e) => write!(f, "Image decode error: {}", e),
            AssetError::Encode(e) => write!(f, "Image encode error: {}", e),
        }
    }
}

impl std::error::Error for AssetError {}

impl From<std::io::Error> for AssetError {
    fn from(e: std::io::Error) -> Self {
        AssetError::Io(e)
    }
}

impl From<image::ImageError> for AssetError {
    fn from(e: image::ImageError) -> Self {
        AssetError::Decode(e.to_string())
    }
}

// ============================================================================
// DATA URIs
// ============================================================================

/// Decoded contents of a `data:<mime>;base64,<payload>` URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

pub fn decode_data_uri(uri: &str) -> Result<DataUri, AssetError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| AssetError::InvalidDataUri("missing 'data:' scheme".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AssetError::InvalidDataUri("missing ',' separator".into()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| AssetError::InvalidDataUri("only base64 payloads are supported".into()))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| AssetError::InvalidDataUri(e.to_string()))?;
    Ok(DataUri {
        mime: mime.to_string(),
        bytes,
    })
}

/// Drops a leading `data:image/<type>;base64,` so only the payload remains.
/// Strings without that prefix are returned unchanged.
pub fn strip_data_uri_prefix(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("data:image/") else {
        return s;
    };
    let Some((subtype, payload)) = rest.split_once(";base64,") else {
        return s;
    };
    if !subtype.is_empty() && subtype.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        payload
    } else {
        s
    }
}

/// Shortens data URIs to `data:<mime>;base64,<N chars>` for logs and output.
pub fn summarize_reference(reference: &str) -> String {
    match reference.strip_prefix("data:").and_then(|r| r.split_once(',')) {
        Some((header, payload)) => format!("data:{},<{} chars>", header, payload.len()),
        None => reference.to_string(),
    }
}

// ============================================================================
// FILES
// ============================================================================

/// An image file read from disk, kept as an inline asset.
#[derive(Clone, Debug)]
pub struct LoadedImage {
    pub asset: ImageAsset,
    pub width: u32,
    pub height: u32,
}

fn mime_for(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Reads an image file, checks that it decodes, and wraps the original bytes
/// as an inline data URI (no re-encoding, so nothing is lost).
pub fn load_image_file(path: &Path) -> Result<LoadedImage, AssetError> {
    let bytes = std::fs::read(path)?;
    let format = image::guess_format(&bytes)?;
    let img = image::load_from_memory_with_format(&bytes, format)?;
    Ok(LoadedImage {
        asset: ImageAsset::Inline(encode_data_uri(mime_for(format), &bytes)),
        width: img.width(),
        height: img.height(),
    })
}

/// Decodes an inline asset far enough to learn its pixel size.
pub fn inline_dimensions(asset: &ImageAsset) -> Result<(u32, u32), AssetError> {
    let ImageAsset::Inline(uri) = asset else {
        return Err(AssetError::InvalidDataUri("asset is not inline".into()));
    };
    let data = decode_data_uri(uri)?;
    let img = image::load_from_memory(&data.bytes)?;
    Ok((img.width(), img.height()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reference_classifies() {
        assert!(ImageAsset::from_reference("data:image/png;base64,AAAA").is_inline());
        let hosted = ImageAsset::from_reference("https://i.ibb.co/x/room.png");
        assert_eq!(hosted.hosted_url(), Some("https://i.ibb.co/x/room.png"));
    }

    #[test]
    fn test_data_uri_decode() {
        let uri = encode_data_uri("image/png", b"\x89PNG");
        let decoded = decode_data_uri(&uri).unwrap();
        assert_eq!(decoded.mime, "image/png");
        assert_eq!(decoded.bytes, b"\x89PNG");

        assert!(decode_data_uri("https://example.com/a.png").is_err());
        assert!(decode_data_uri("data:image/png,plain").is_err());
        assert!(decode_data_uri("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_data_uri_prefix("data:image/jpeg;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_uri_prefix("QUJD"), "QUJD");
        assert_eq!(strip_data_uri_prefix("data:text/plain;base64,QUJD"), "data:text/plain;base64,QUJD");
    }

    #[test]
    fn test_summary_hides_payload() {
        let asset = ImageAsset::Inline("data:image/png;base64,QUJDRA==".into());
        assert_eq!(asset.summary(), "data:image/png;base64,<8 chars>");
        let hosted = ImageAsset::Hosted("https://x/y.png".into());
        assert_eq!(hosted.summary(), "https://x/y.png");
    }

    #[test]
    fn test_inline_dimensions() {
        let img = image::RgbaImage::new(3, 2);
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();
        let asset = ImageAsset::Inline(encode_data_uri("image/png", &bytes));
        assert_eq!(inline_dimensions(&asset).unwrap(), (3, 2));
        assert!(inline_dimensions(&ImageAsset::Hosted("https://x".into())).is_err());
    }
}
